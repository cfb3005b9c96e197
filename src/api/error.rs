use thiserror::Error;

/// Errors raised by the remote login API. Each renders as one user-facing
/// line.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Invalid response from server")]
    InvalidResponse,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decoding(String),

    /// Message reported by the server, shown verbatim.
    #[error("{0}")]
    Server(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidUrl
        } else if err.is_decode() {
            ApiError::Decoding(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(ApiError::InvalidUrl.to_string(), "Invalid URL");
        assert_eq!(
            ApiError::InvalidResponse.to_string(),
            "Invalid response from server"
        );
        assert_eq!(
            ApiError::Server("Invalid credentials".into()).to_string(),
            "Invalid credentials"
        );
        assert_eq!(
            ApiError::Network("refused".into()).to_string(),
            "Network error: refused"
        );
    }
}
