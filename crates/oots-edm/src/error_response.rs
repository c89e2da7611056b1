//! Error responses: a response envelope carrying exceptions instead of payloads.

use crate::common::{DEFAULT_SPECIFICATION_IDENTIFIER, require, require_text};
use crate::discriminator;
use crate::envelope::{Envelope, QueryResponse, ResponseStatus};
use crate::error::{EdmError, EdmResult};
use crate::exception::ExceptionRecord;
use crate::ids::RequestId;
use crate::party::Agent;
use crate::slot::{
    ERROR_RESPONSE_TOP_LEVEL, FragmentSlot, SlotComposer, SlotLevel, SlotName, StringSlot,
};

const MESSAGE_KIND: &str = "error response";

/// An immutable, validated error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    status: ResponseStatus,
    request_id: RequestId,
    specification_identifier: String,
    error_provider: Option<Agent>,
    exceptions: Vec<ExceptionRecord>,
}

impl ErrorResponse {
    pub fn builder() -> ErrorResponseBuilder {
        ErrorResponseBuilder::default()
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn specification_identifier(&self) -> &str {
        &self.specification_identifier
    }

    pub fn error_provider(&self) -> Option<&Agent> {
        self.error_provider.as_ref()
    }

    pub fn exceptions(&self) -> &[ExceptionRecord] {
        &self.exceptions
    }

    pub fn to_envelope(&self) -> EdmResult<Envelope> {
        let mut composer = SlotComposer::new(ERROR_RESPONSE_TOP_LEVEL);
        composer.add(&StringSlot {
            name: SlotName::SpecificationIdentifier,
            value: &self.specification_identifier,
        })?;
        if let Some(provider) = &self.error_provider {
            composer.add(&FragmentSlot {
                name: SlotName::ErrorProvider,
                value: provider,
            })?;
        }
        let (slots, _) = composer.finish();

        let exceptions = self
            .exceptions
            .iter()
            .map(ExceptionRecord::to_raw)
            .collect::<EdmResult<Vec<_>>>()?;

        Ok(Envelope::QueryResponse(QueryResponse {
            request_id: self.request_id.clone(),
            status: self.status,
            slots,
            registry_objects: None,
            object_refs: None,
            exceptions,
        }))
    }

    pub fn from_envelope(envelope: &Envelope) -> EdmResult<Self> {
        let response = envelope
            .as_response()
            .ok_or_else(|| EdmError::Unclassifiable("not a query response envelope".into()))?;
        discriminator::ensure_error_response(response)?;

        let mut builder = Self::builder();
        builder
            .status(response.status)
            .request_id(response.request_id.clone());

        let level = SlotLevel::ErrorTop;
        for (raw_name, value) in response.slots.iter() {
            match level.resolve(raw_name)? {
                name @ SlotName::SpecificationIdentifier => {
                    builder.specification_identifier(value.expect_str(name)?);
                }
                name @ SlotName::ErrorProvider => {
                    builder.error_provider(value.decode_fragment(name)?);
                }
                other => return Err(level.unexpected(other)),
            }
        }

        for raw in &response.exceptions {
            builder.add_exception(ExceptionRecord::from_raw(raw)?);
        }
        builder.build()
    }
}

/// Mutable, reusable staging area for an [`ErrorResponse`].
#[derive(Debug, Clone, Default)]
pub struct ErrorResponseBuilder {
    status: Option<ResponseStatus>,
    request_id: Option<RequestId>,
    specification_identifier: Option<String>,
    error_provider: Option<Agent>,
    exceptions: Vec<ExceptionRecord>,
}

impl ErrorResponseBuilder {
    pub fn status(&mut self, status: ResponseStatus) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn request_id(&mut self, request_id: impl Into<RequestId>) -> &mut Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn specification_identifier(&mut self, value: impl Into<String>) -> &mut Self {
        self.specification_identifier = Some(value.into());
        self
    }

    pub fn default_specification_identifier(&mut self) -> &mut Self {
        self.specification_identifier(DEFAULT_SPECIFICATION_IDENTIFIER)
    }

    pub fn error_provider(&mut self, agent: Agent) -> &mut Self {
        self.error_provider = Some(agent);
        self
    }

    pub fn add_exception(&mut self, exception: ExceptionRecord) -> &mut Self {
        self.exceptions.push(exception);
        self
    }

    pub fn check_consistency(&self) -> EdmResult<()> {
        self.build().map(|_| ())
    }

    pub fn build(&self) -> EdmResult<ErrorResponse> {
        let status = require(MESSAGE_KIND, "response status", self.status)?;
        let request_id = require(MESSAGE_KIND, "request id", self.request_id.clone())?;
        if request_id.is_blank() {
            return Err(EdmError::inconsistent(MESSAGE_KIND, "request id is blank"));
        }
        let specification_identifier = require_text(
            MESSAGE_KIND,
            "specification identifier",
            self.specification_identifier.as_deref(),
        )?;
        if self.exceptions.is_empty() {
            return Err(EdmError::inconsistent(
                MESSAGE_KIND,
                "at least one exception is required",
            ));
        }
        Ok(ErrorResponse {
            status,
            request_id,
            specification_identifier: specification_identifier.to_owned(),
            error_provider: self.error_provider.clone(),
            exceptions: self.exceptions.clone(),
        })
    }
}
