//! The closed set of exchange messages.

use crate::discriminator;
use crate::envelope::Envelope;
use crate::error::EdmResult;
use crate::error_response::ErrorResponse;
use crate::request::{QueryKind, Request};
use crate::response::{Response, ResponsePayloadKind};

/// A message kind together with its sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request(QueryKind),
    Response(ResponsePayloadKind),
    ErrorResponse,
}

impl MessageKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::ErrorResponse => "error response",
        }
    }
}

/// Any built exchange message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    ErrorResponse(ErrorResponse),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Request(request) => MessageKind::Request(request.query_kind()),
            Self::Response(response) => MessageKind::Response(response.payload_kind()),
            Self::ErrorResponse(_) => MessageKind::ErrorResponse,
        }
    }

    pub fn to_envelope(&self) -> EdmResult<Envelope> {
        to_envelope(self)
    }

    /// Classify an envelope and read it back into the matching message.
    pub fn from_envelope(envelope: &Envelope) -> EdmResult<Self> {
        match discriminator::classify(envelope)? {
            MessageKind::Request(_) => Request::from_envelope(envelope).map(Self::Request),
            MessageKind::Response(_) => Response::from_envelope(envelope).map(Self::Response),
            MessageKind::ErrorResponse => {
                ErrorResponse::from_envelope(envelope).map(Self::ErrorResponse)
            }
        }
    }
}

/// Serialize any message into its envelope.
pub fn to_envelope(message: &Message) -> EdmResult<Envelope> {
    match message {
        Message::Request(request) => request.to_envelope(),
        Message::Response(response) => response.to_envelope(),
        Message::ErrorResponse(error_response) => error_response.to_envelope(),
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<ErrorResponse> for Message {
    fn from(error_response: ErrorResponse) -> Self {
        Self::ErrorResponse(error_response)
    }
}
