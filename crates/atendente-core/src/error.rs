// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Atendente service.

use thiserror::Error;

/// The primary error type used across all Atendente adapter traits and core operations.
#[derive(Debug, Error)]
pub enum AtendenteError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Messaging transport errors (socket failure, rejected send, bridge protocol).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generative, embedding or media provider errors.
    ///
    /// `status` carries the HTTP status when the provider answered at all.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No connected transport socket exists for the session.
    #[error("session not found or not connected: {0}")]
    SessionNotFound(String),

    /// The referenced conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// A tool invoked by the model could not be executed.
    #[error("tool {tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// Document ingestion (chunking or embedding) failed.
    #[error("ingestion of document {document_id} failed: {message}")]
    Ingestion {
        document_id: String,
        message: String,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AtendenteError {
    /// Builds a provider error from an HTTP status and response body.
    pub fn provider_status(status: u16, body: impl Into<String>) -> Self {
        AtendenteError::Provider {
            message: format!("HTTP {status}: {}", body.into()),
            status: Some(status),
            source: None,
        }
    }

    /// Builds a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        AtendenteError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for transient provider failures worth retrying.
    ///
    /// Rate limits (429), server errors (5xx, including the 529 overload
    /// status) and failures where no response was received at all are
    /// transient. Everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            AtendenteError::Provider { status: None, .. } => true,
            AtendenteError::Provider {
                status: Some(code),
                ..
            } => is_transient_status(*code),
            _ => false,
        }
    }
}

/// Whether an HTTP status code signals a transient provider condition.
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        for code in [429u16, 500, 502, 503, 529] {
            assert!(
                AtendenteError::provider_status(code, "x").is_retryable(),
                "{code} should be retryable"
            );
        }
    }

    #[test]
    fn client_errors_are_terminal() {
        for code in [400u16, 401, 403, 404, 422] {
            assert!(!AtendenteError::provider_status(code, "x").is_retryable());
        }
    }

    #[test]
    fn connection_failures_are_retryable() {
        let err = AtendenteError::Provider {
            message: "connection reset".into(),
            status: None,
            source: None,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn non_provider_errors_are_terminal() {
        assert!(!AtendenteError::SessionNotFound("s1".into()).is_retryable());
        assert!(!AtendenteError::Internal("boom".into()).is_retryable());
        assert!(!AtendenteError::transport("closed").is_retryable());
        assert!(
            !AtendenteError::Timeout {
                duration: std::time::Duration::from_secs(30),
            }
            .is_retryable()
        );
    }

    #[test]
    fn provider_status_message_contains_code() {
        let err = AtendenteError::provider_status(503, "overloaded");
        assert_eq!(err.to_string(), "provider error: HTTP 503: overloaded");
    }
}
