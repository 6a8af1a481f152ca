use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Endpoint not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Odoo error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<RpcErrorData>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Offline mode is enabled")]
    Offline,
}

/// The `data` member of an Odoo JSON-RPC error.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RpcErrorData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub debug: Option<String>,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Transport-level failures are worth retrying and worth queueing a
    /// mutation for. RPC faults and bad payloads are not.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_) | ApiError::ServerError(_) | ApiError::Offline
        )
    }

    /// Human-readable diagnosis of a connection failure, shown to the user.
    pub fn diagnosis(&self) -> &'static str {
        match self {
            ApiError::NetworkError(e) if e.is_timeout() => {
                "Délai d'attente dépassé. Vérifiez votre connexion."
            }
            ApiError::NetworkError(e) => {
                let text = error_chain_text(e);
                if text.contains("dns") || text.contains("resolve") || text.contains("lookup") {
                    "Impossible de résoudre l'hôte. Vérifiez l'URL."
                } else if text.contains("cors") {
                    "Erreur CORS. Le serveur ne permet pas les requêtes depuis cette origine."
                } else if text.contains("timed out") || text.contains("timeout") {
                    "Délai d'attente dépassé. Vérifiez votre connexion."
                } else if e.is_connect() || e.is_request() {
                    "Erreur de réseau. Vérifiez votre connexion internet."
                } else {
                    "Erreur de connexion inconnue. Vérifiez votre réseau et réessayez."
                }
            }
            ApiError::NotFound(_) => "Serveur non trouvé. Vérifiez l'URL de l'API.",
            ApiError::AccessDenied(_) => "Accès refusé. Vérifiez vos permissions.",
            ApiError::ServerError(_) => "Erreur serveur. Réessayez plus tard.",
            ApiError::Rpc { .. } => "Erreur renvoyée par le serveur Odoo.",
            ApiError::Offline => "Mode hors ligne activé.",
            ApiError::InvalidResponse(_) => {
                "Erreur de connexion inconnue. Vérifiez votre réseau et réessayez."
            }
        }
    }
}

/// Lowercased text of an error and all of its sources.
fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_lowercase()
}

/// Diagnose any error raised by the client, looking through `anyhow` context.
pub fn diagnose(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<ApiError>() {
        Some(api) => api.diagnosis(),
        None => {
            let text = err
                .chain()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(": ")
                .to_lowercase();
            if text.contains("cors") {
                "Erreur CORS. Le serveur ne permet pas les requêtes depuis cette origine."
            } else if text.contains("timeout") || text.contains("timed out") {
                "Délai d'attente dépassé. Vérifiez votre connexion."
            } else if text.contains("unable to resolve host") || text.contains("dns") {
                "Impossible de résoudre l'hôte. Vérifiez l'URL."
            } else {
                "Erreur de connexion inconnue. Vérifiez votre réseau et réessayez."
            }
        }
    }
}

/// True when the error chain carries a transport-level `ApiError`.
pub fn is_transport_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<ApiError>())
        .any(ApiError::is_transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_codes() {
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::FORBIDDEN, "no"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_body_long() {
        let body = "é".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }

    #[test]
    fn test_diagnosis_by_status() {
        let err = ApiError::from_status(reqwest::StatusCode::NOT_FOUND, "");
        assert_eq!(err.diagnosis(), "Serveur non trouvé. Vérifiez l'URL de l'API.");
        let err = ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.diagnosis(), "Erreur serveur. Réessayez plus tard.");
    }

    #[test]
    fn test_diagnose_plain_messages() {
        let err = anyhow::anyhow!("Request blocked by CORS policy");
        assert!(diagnose(&err).starts_with("Erreur CORS"));
        let err = anyhow::anyhow!("operation timeout");
        assert!(diagnose(&err).starts_with("Délai"));
        let err = anyhow::anyhow!("Unable to resolve host btp.onaerp.com");
        assert!(diagnose(&err).starts_with("Impossible de résoudre"));
    }

    #[test]
    fn test_rpc_error_is_not_transport() {
        let err = ApiError::Rpc {
            code: 200,
            message: "Odoo Server Error".to_string(),
            data: None,
        };
        assert!(!err.is_transport());
        assert!(!is_transport_error(&anyhow::Error::new(err)));
    }
}
