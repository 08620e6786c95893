//! Error handling for the CommitCast broadcast service
//!
//! Every failure on the synchronous webhook path is a [`BroadcastError`] and
//! renders itself as a JSON error body. Failures inside dispatch workers use
//! the same type but only ever reach the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use commitcast_database::DatabaseError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for broadcast operations
pub type BroadcastResult<T> = Result<T, BroadcastError>;

#[derive(Error, Debug)]
pub enum BroadcastError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Persistence errors
    #[error("Database error: {source}")]
    Database {
        #[from]
        source: DatabaseError,
    },

    /// Transport errors talking to an outbound API
    #[error("HTTP client error: {source}")]
    HttpClient {
        #[from]
        source: reqwest::Error,
    },

    /// Unreadable body or malformed JSON
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// Missing or mismatching webhook signature
    #[error("Webhook signature verification failed: {reason}")]
    SignatureVerification { reason: String },

    /// Unknown webhook token or a tenant without settings
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Tenant exists but is not allowed to broadcast yet
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Outbound API answered with a non-success status
    #[error("External API error for {service}: {status_code} - {message}")]
    ExternalApi {
        service: String,
        status_code: u16,
        message: String,
    },

    /// Chat completion came back without usable text
    #[error("{service} returned an empty completion")]
    EmptyCompletion { service: String },

    /// A dispatch step ran past its deadline
    #[error("{step} timed out after {seconds} seconds")]
    Timeout { step: String, seconds: u64 },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl BroadcastError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_payload<S: Into<String>>(reason: S) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }

    pub fn signature_verification<S: Into<String>>(reason: S) -> Self {
        Self::SignatureVerification {
            reason: reason.into(),
        }
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn external_api<S1: Into<String>, S2: Into<String>>(
        service: S1,
        status_code: u16,
        message: S2,
    ) -> Self {
        Self::ExternalApi {
            service: service.into(),
            status_code,
            message: message.into(),
        }
    }

    pub fn empty_completion<S: Into<String>>(service: S) -> Self {
        Self::EmptyCompletion {
            service: service.into(),
        }
    }

    pub fn timeout<S: Into<String>>(step: S, seconds: u64) -> Self {
        Self::Timeout {
            step: step.into(),
            seconds,
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            BroadcastError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            BroadcastError::SignatureVerification { .. } => StatusCode::UNAUTHORIZED,
            BroadcastError::NotFound { .. } => StatusCode::NOT_FOUND,
            BroadcastError::Forbidden { .. } => StatusCode::FORBIDDEN,
            BroadcastError::ExternalApi { .. } | BroadcastError::EmptyCompletion { .. } => {
                StatusCode::BAD_GATEWAY
            }
            BroadcastError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            BroadcastError::Configuration { .. }
            | BroadcastError::Database { .. }
            | BroadcastError::HttpClient { .. }
            | BroadcastError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error (for API responses)
    pub fn error_code(&self) -> &'static str {
        match self {
            BroadcastError::Configuration { .. } => "CONFIGURATION_ERROR",
            BroadcastError::Database { .. } => "DATABASE_ERROR",
            BroadcastError::HttpClient { .. } => "HTTP_CLIENT_ERROR",
            BroadcastError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            BroadcastError::SignatureVerification { .. } => "SIGNATURE_VERIFICATION_FAILED",
            BroadcastError::NotFound { .. } => "NOT_FOUND",
            BroadcastError::Forbidden { .. } => "FORBIDDEN",
            BroadcastError::ExternalApi { .. } => "EXTERNAL_API_ERROR",
            BroadcastError::EmptyCompletion { .. } => "EMPTY_COMPLETION",
            BroadcastError::Timeout { .. } => "TIMEOUT",
            BroadcastError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand back to a webhook sender.
    ///
    /// Server-side failures are reported generically; the details stay in logs.
    fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for BroadcastError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_code = self.error_code();

        if status_code.is_server_error() {
            tracing::error!(
                error_code = error_code,
                error_message = %self,
                "Broadcast service error"
            );
        } else {
            tracing::warn!(
                error_code = error_code,
                error_message = %self,
                "Webhook rejected"
            );
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.public_message(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status_code, body).into_response()
    }
}
