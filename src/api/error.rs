use reqwest::StatusCode;
use thiserror::Error;

/// Substrings the backend uses when a bearer token is genuinely dead.
/// Matching is deliberately narrow: a transient 401 must not purge the
/// stored token. If the backend grows a structured code for this, only
/// `is_token_invalid` changes.
const TOKEN_INVALID_MARKERS: &[&str] = &["invalid token", "expired"];

/// Maximum length of a response body carried into an error message.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Structured transport errors. Expected failure modes (network, timeout,
/// non-2xx) come back through this type and are never panicked; the
/// precondition variants at the bottom signal caller bugs on mutations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("token rejected by server")]
    AuthInvalid,

    #[error("authentication failed: {0}")]
    AuthDenied(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limited by server")]
    RateLimited,

    #[error("api error: {0}")]
    Api(String),

    #[error("client error (HTTP {status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid request body: {0}")]
    InvalidBody(&'static str),
}

impl ApiError {
    /// Truncate a response body to avoid dragging large payloads into logs
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        // Back off to a char boundary so multi-byte text cannot split
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        )
    }

    /// True when a 401/403 body explicitly signals the token is dead.
    /// Anything short of these markers is treated as a transient blip and
    /// leaves the stored token alone.
    pub fn is_token_invalid(body: &str) -> bool {
        let lower = body.to_lowercase();
        TOKEN_INVALID_MARKERS.iter().any(|m| lower.contains(m))
    }

    /// Pull the server-provided message out of a JSON error body, falling
    /// back to the raw (truncated) text or a synthesized status line.
    pub fn message_from_body(status: StatusCode, body: &str) -> String {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            for field in ["error", "message"] {
                if let Some(msg) = value.get(field).and_then(|v| v.as_str()) {
                    if !msg.is_empty() {
                        return msg.to_string();
                    }
                }
            }
        }
        if body.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            Self::truncate_body(body)
        }
    }

    /// Classify a non-2xx response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::message_from_body(status, body);
        match status.as_u16() {
            401 | 403 => {
                if Self::is_token_invalid(body) {
                    ApiError::AuthInvalid
                } else {
                    ApiError::AuthDenied(message)
                }
            }
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError {
                status: status.as_u16(),
                message,
            },
            _ => ApiError::ClientError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_invalid_markers() {
        assert!(ApiError::is_token_invalid("Invalid token"));
        assert!(ApiError::is_token_invalid(r#"{"error":"token expired"}"#));
        assert!(ApiError::is_token_invalid("Session EXPIRED, log in again"));

        assert!(!ApiError::is_token_invalid("access denied"));
        assert!(!ApiError::is_token_invalid("forbidden"));
        assert!(!ApiError::is_token_invalid(""));
    }

    #[test]
    fn test_from_status_auth_asymmetry() {
        let unauthorized = StatusCode::UNAUTHORIZED;
        assert_eq!(
            ApiError::from_status(unauthorized, r#"{"error":"invalid token"}"#),
            ApiError::AuthInvalid
        );
        assert_eq!(
            ApiError::from_status(unauthorized, r#"{"error":"nope"}"#),
            ApiError::AuthDenied("nope".to_string())
        );
    }

    #[test]
    fn test_from_status_classification() {
        assert_eq!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound("HTTP 404".to_string())
        );
        assert_eq!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            ApiError::RateLimited
        );
        assert_eq!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError {
                status: 502,
                message: "HTTP 502".to_string()
            }
        );
        assert_eq!(
            ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"message":"bad input"}"#),
            ApiError::ClientError {
                status: 400,
                message: "bad input".to_string()
            }
        );
    }

    #[test]
    fn test_message_from_body_prefers_error_field() {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        assert_eq!(
            ApiError::message_from_body(status, r#"{"error":"db down","message":"other"}"#),
            "db down"
        );
        assert_eq!(
            ApiError::message_from_body(status, r#"{"message":"only message"}"#),
            "only message"
        );
        assert_eq!(ApiError::message_from_body(status, "plain text"), "plain text");
        assert_eq!(ApiError::message_from_body(status, "  "), "HTTP 500");
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.contains("600 total bytes"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        // A multi-byte char straddling the cutoff must not split
        let body = format!("{}é{}", "x".repeat(499), "y".repeat(100));
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(499)));
        assert!(truncated.contains("601 total bytes"));

        // Reachable through classification of an oversized plain-text body
        let error = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(matches!(error, ApiError::ServerError { status: 500, .. }));
    }
}
