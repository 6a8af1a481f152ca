use thiserror::Error;

/// Why a login attempt failed, worded for the user.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identifiants incorrects")]
    InvalidCredentials,

    #[error("Connexion internet requise pour la première authentification")]
    NetworkRequired,

    #[error("Erreur de connexion au serveur")]
    Server(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
