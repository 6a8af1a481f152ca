//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `AuthService`: login against Odoo with a cached-user fallback
//! - `Session`: the persisted uid of the signed-in user
//! - `CredentialStore`: Secure OS-level credential storage via keyring
//!
//! Odoo authenticates each `execute_kw` call with the uid and password,
//! so the session only records who signed in and never expires.

pub mod credentials;
pub mod error;
pub mod service;
pub mod session;

pub use credentials::CredentialStore;
pub use error::AuthError;
pub use service::{AuthService, LoginOutcome};
pub use session::{Session, SessionData};
