//! # oots-codec: Envelope engine for the exchange data model
//!
//! Turns [`Envelope`]s and typed [`Message`]s into bytes and back. Documents
//! are JSON; slot order and child order are preserved exactly, so writing
//! the same message twice yields identical bytes.
//!
//! Reading never panics and never returns a partially built message: any
//! structural mismatch, classification failure, or oversized input yields
//! `None` and is logged at `debug` (or `warn` for size).

pub mod config;

use oots_edm::{EdmError, EdmResult, Envelope, ErrorResponse, Message, Request, Response};
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use config::{CodecConfig, DEFAULT_MAX_DOCUMENT_BYTES};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("document of {size} bytes exceeds the {limit} byte limit")]
    DocumentTooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Model(#[from] EdmError),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Reads and writes exchange documents under a [`CodecConfig`].
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec {
    config: CodecConfig,
}

impl EnvelopeCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    #[instrument(skip_all)]
    pub fn write(&self, envelope: &Envelope) -> CodecResult<Vec<u8>> {
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(envelope)?
        } else {
            serde_json::to_vec(envelope)?
        };
        if bytes.len() > self.config.max_document_bytes {
            return Err(CodecError::DocumentTooLarge {
                size: bytes.len(),
                limit: self.config.max_document_bytes,
            });
        }
        debug!(bytes = bytes.len(), "envelope written");
        Ok(bytes)
    }

    /// Serialize a message through its envelope.
    #[instrument(skip_all, fields(kind = message.kind().name()))]
    pub fn write_message(&self, message: &Message) -> CodecResult<Vec<u8>> {
        let envelope = message.to_envelope()?;
        self.write(&envelope)
    }

    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn parse(&self, bytes: &[u8]) -> Option<Envelope> {
        if bytes.len() > self.config.max_document_bytes {
            warn!(
                limit = self.config.max_document_bytes,
                "document exceeds size limit, not parsed"
            );
            return None;
        }
        match serde_json::from_slice(bytes) {
            Ok(envelope) => Some(envelope),
            Err(error) => {
                debug!(%error, "document is not an envelope");
                None
            }
        }
    }

    pub fn parse_request(&self, bytes: &[u8]) -> Option<Request> {
        let envelope = self.parse(bytes)?;
        read_as("request", Request::from_envelope(&envelope))
    }

    pub fn parse_response(&self, bytes: &[u8]) -> Option<Response> {
        let envelope = self.parse(bytes)?;
        read_as("response", Response::from_envelope(&envelope))
    }

    pub fn parse_error_response(&self, bytes: &[u8]) -> Option<ErrorResponse> {
        let envelope = self.parse(bytes)?;
        read_as("error response", ErrorResponse::from_envelope(&envelope))
    }

    /// Parse a document of unknown kind, trying request, response, then
    /// error response. The first kind that reads cleanly wins.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn classify_and_parse(&self, bytes: &[u8]) -> Option<Message> {
        let envelope = self.parse(bytes)?;
        read_as("request", Request::from_envelope(&envelope))
            .map(Message::Request)
            .or_else(|| {
                read_as("response", Response::from_envelope(&envelope)).map(Message::Response)
            })
            .or_else(|| {
                read_as("error response", ErrorResponse::from_envelope(&envelope))
                    .map(Message::ErrorResponse)
            })
    }
}

fn read_as<T>(kind: &'static str, result: EdmResult<T>) -> Option<T> {
    match result {
        Ok(message) => Some(message),
        Err(error) => {
            debug!(kind, %error, "envelope rejected");
            None
        }
    }
}

/// [`EnvelopeCodec::classify_and_parse`] with the default configuration.
pub fn classify_and_parse(bytes: &[u8]) -> Option<Message> {
    EnvelopeCodec::default().classify_and_parse(bytes)
}
