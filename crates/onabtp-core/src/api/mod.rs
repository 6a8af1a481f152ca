//! JSON-RPC client module for the Odoo ERP backend.
//!
//! This module provides the `OdooClient` for authenticating against an
//! Odoo database and running `execute_kw` calls on its models.
//!
//! Odoo has no session token on this endpoint: every object call carries
//! the database name, the uid returned by `common.login`, and the password.

pub mod client;
pub mod error;
pub mod rpc;

pub use client::{Credentials, OdooClient, RetryPolicy, ServerVersion};
pub use error::{diagnose, is_transport_error, ApiError};
pub use rpc::{Domain, SearchOptions};
