//! # oots-edm: Cross-border evidence exchange data model
//!
//! This crate defines the messages exchanged between an evidence requester
//! and an evidence provider, the slot protocol they are encoded with, and
//! the discriminator that reads a generic envelope back into a typed message.
//!
//! It is a pure data-model crate without I/O or an async runtime.
//! Byte-level encoding lives in `oots-codec`.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (RequestId, PayloadId, DocumentId)
//! - [`slot`]: SlotName, SlotValue, SlotMap, SlotProvider, SlotComposer
//! - [`envelope`]: The generic query request/response envelope
//! - [`concept`]: ConceptNode tree with traversal and editing
//! - [`party`]: Agents, legal and natural persons
//! - [`dataset`]: Dataset, Distribution, RepositoryItemRef
//! - [`common`]: Fields and validation helpers shared by every builder
//! - [`request`]: Request + RequestBuilder (three query kinds)
//! - [`response`]: Response + ResponseBuilder (three payload kinds)
//! - [`exception`]: Exception kind registry and ExceptionRecord
//! - [`error_response`]: ErrorResponse + ErrorResponseBuilder
//! - [`discriminator`]: Envelope classification
//! - [`message`]: Message sum type and MessageKind
//! - [`error`]: EdmError, EdmResult

pub mod common;
pub mod concept;
pub mod dataset;
pub mod discriminator;
pub mod envelope;
pub mod error;
pub mod error_response;
pub mod exception;
pub mod ids;
pub mod message;
pub mod party;
pub mod request;
pub mod response;
pub mod slot;

// Re-export the most commonly used types at the crate root.
pub use common::{CommonFields, DEFAULT_SPECIFICATION_IDENTIFIER, LocalizedText, Requirement};
pub use concept::{ConceptNode, ConceptValue, QName};
pub use dataset::{Dataset, Distribution, RepositoryItemRef};
pub use envelope::{
    Envelope, ErrorSeverity, ObjectRef, Query, QueryDefinition, QueryRequest, QueryResponse,
    RawException, RegistryObject, ResponseOption, ResponseStatus,
};
pub use error::{EdmError, EdmResult};
pub use error_response::{ErrorResponse, ErrorResponseBuilder};
pub use exception::{
    ErrorOrigin, ExceptionKind, ExceptionRecord, ExceptionRecordBuilder, lookup_by_type,
};
pub use ids::{DocumentId, PayloadId, RequestId};
pub use message::{Message, MessageKind};
pub use party::{Address, Agent, DataSubject, LegalPerson, NaturalPerson};
pub use request::{QueryKind, Request, RequestBuilder, RequestPayload};
pub use response::{
    ConceptPayload, DocumentPayload, DocumentReferencePayload, Response, ResponseBuilder,
    ResponsePayload, ResponsePayloadDraft, ResponsePayloadKind,
};
pub use slot::{Slot, SlotComposer, SlotLevel, SlotMap, SlotName, SlotProvider, SlotValue};
