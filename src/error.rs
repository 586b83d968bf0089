//! Error handling and custom error types
//!
//! Provides unified error handling across the pipeline using thiserror. Provider
//! failures are split by kind so the fallback loop and the response boundary can
//! dispatch on the variant instead of inspecting loose fields.

use crate::ai::classify::CHANNEL_UNAVAILABLE_MESSAGE;
use crate::models::ProductView;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a successful (2xx) provider response yielded nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyResponseKind {
    /// The top-level `candidates` field was missing.
    NoCandidates,
    /// Candidates were present but none carried inline image data.
    NoImageData,
}

impl fmt::Display for EmptyResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCandidates => f.write_str("response did not include any candidates"),
            Self::NoImageData => f.write_str("response did not include any image data"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required input: {}", .fields.join(", "))]
    Validation { fields: Vec<String> },

    #[error("Model {model} has no available channels (status {status})")]
    ChannelUnavailable {
        model: String,
        status: u16,
        body: String,
    },

    #[error("Provider request to {model} failed (status {status}): {body}")]
    ProviderRequest {
        model: String,
        status: u16,
        body: String,
    },

    #[error("Model {model} returned an empty result: {kind}")]
    EmptyResponse {
        model: String,
        kind: EmptyResponseKind,
    },

    #[error("Failed to decode response from {model}: {message}")]
    ResponseDecode { model: String, message: String },

    #[error("Refinement of {view} failed: {source}")]
    Refinement {
        view: ProductView,
        #[source]
        source: Box<Error>,
    },

    #[error("Composition failed: {source}")]
    Composition {
        #[source]
        source: Box<Error>,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this failure may be recovered by substituting another model.
    pub fn is_channel_unavailable(&self) -> bool {
        match self {
            Self::ChannelUnavailable { .. } => true,
            Self::Refinement { source, .. } | Self::Composition { source } => {
                source.is_channel_unavailable()
            }
            _ => false,
        }
    }

    /// Suggested HTTP status for the response boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::ChannelUnavailable { status, .. } if *status >= 400 => *status,
            Self::ChannelUnavailable { .. } => 503,
            Self::ProviderRequest { status, .. } if (400..=599).contains(status) => *status,
            Self::Refinement { source, .. } | Self::Composition { source } => source.status_code(),
            _ => 500,
        }
    }

    /// Human-readable message that is safe to show to end users.
    ///
    /// Channel-unavailable failures are replaced by a fixed message; other
    /// provider failures keep their upstream status and body for diagnostics.
    pub fn user_message(&self) -> String {
        match self {
            Self::ChannelUnavailable { .. } => CHANNEL_UNAVAILABLE_MESSAGE.to_string(),
            Self::ProviderRequest { status, body, .. } => {
                format!("Provider request failed ({}): {}", status, body)
            }
            Self::Refinement { view, source } => {
                format!("Refinement of {} failed: {}", view, source.user_message())
            }
            Self::Composition { source } => {
                format!("Composition failed: {}", source.user_message())
            }
            other => other.to_string(),
        }
    }
}

/// Error body handed to the response boundary.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            error: err.user_message(),
            status: err.status_code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
