use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagDeskError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("export error: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, RagDeskError>;

impl From<serde_json::Error> for RagDeskError {
    fn from(err: serde_json::Error) -> Self {
        RagDeskError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_error_kind_prefix() {
        let err = RagDeskError::Config("x".to_string());
        assert!(format!("{err}").contains("configuration error"));

        let err = RagDeskError::NotFound("chat abc".to_string());
        assert_eq!(err.to_string(), "not found: chat abc");
    }

    #[test]
    fn converts_json_errors() {
        let err: RagDeskError = serde_json::from_str::<serde_json::Value>("{bad")
            .unwrap_err()
            .into();
        assert!(matches!(err, RagDeskError::Serialization(_)));
    }
}
