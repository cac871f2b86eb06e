//! Error types for the legal graph RAG pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph store error: {0}")]
    Graph(String),

    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<neo4rs::Error> for Error {
    fn from(err: neo4rs::Error) -> Self {
        Error::Graph(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("NEO4J_URI not set".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("NEO4J_URI"));
    }

    #[test]
    fn test_error_display_graph() {
        let err = Error::Graph("constraint violation".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Graph store error"));
        assert!(msg.contains("constraint violation"));
    }

    #[test]
    fn test_error_display_llm() {
        let err = Error::Llm("rate limit exceeded".to_string());
        assert!(err.to_string().contains("Language model"));
        assert!(err.to_string().contains("rate limit"));
    }

    #[test]
    fn test_error_display_retrieval() {
        let err = Error::Retrieval("no offenses in graph".to_string());
        assert!(err.to_string().starts_with("Retrieval error"));
    }

    #[test]
    fn test_error_display_invalid_argument() {
        let err = Error::InvalidArgument("Query cannot be empty".to_string());
        assert!(err.to_string().contains("Invalid argument"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<Vec<String>>("[1, 2,]").unwrap_err();
        let err: Error = json_err.into();

        assert!(matches!(err, Error::SerializationError(_)));
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_error_from_serde_yaml_is_config() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("a: [").unwrap_err();
        let err: Error = yaml_err.into();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_error_all_variants_debug() {
        let variants: Vec<Error> = vec![
            Error::Config("config".to_string()),
            Error::Graph("graph".to_string()),
            Error::Embedding("embed".to_string()),
            Error::Llm("llm".to_string()),
            Error::Retrieval("retrieval".to_string()),
            Error::SerializationError("serial".to_string()),
            Error::InvalidArgument("arg".to_string()),
            Error::ConnectionError("conn".to_string()),
            Error::Unknown("unknown".to_string()),
        ];

        for err in variants {
            let debug_str = format!("{:?}", err);
            assert!(!debug_str.is_empty());
        }
    }
}
