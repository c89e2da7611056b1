//! The generic envelope: a query request or a query response carrying slots.
//!
//! Envelopes know nothing about concrete message kinds. Messages are laid
//! onto them by `to_envelope` and recovered by the discriminator.

use crate::dataset::RepositoryItemRef;
use crate::ids::{PayloadId, RequestId};
use crate::slot::SlotMap;
use serde::{Deserialize, Serialize};

/// How the requester wants documents returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseOption {
    /// Payloads are embedded in the response.
    #[serde(rename = "LeafClassWithRepositoryItem")]
    Inline,
    /// Only references to the payloads are returned.
    #[serde(rename = "ObjectRef")]
    Reference,
}

/// Overall outcome reported by a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Success")]
    Success,
    #[serde(rename = "urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Failure")]
    Failure,
}

/// Severity of a single exception carried by an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    #[serde(rename = "urn:oasis:names:tc:ebxml-regrep:ErrorSeverityType:Warning")]
    Warning,
    #[serde(rename = "urn:oasis:names:tc:ebxml-regrep:ErrorSeverityType:Error")]
    Failure,
}

/// The stored query a request envelope asks the responder to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryDefinition {
    ConceptQuery,
    DocumentQuery,
    DocumentByIdQuery,
}

/// Query element of a request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub definition: QueryDefinition,
    #[serde(default)]
    pub slots: SlotMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub id: RequestId,
    pub response_option: ResponseOption,
    #[serde(default)]
    pub slots: SlotMap,
    pub query: Query,
}

/// An object returned by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryObject {
    pub id: PayloadId,
    #[serde(default)]
    pub slots: SlotMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_item_ref: Option<RepositoryItemRef>,
}

/// An object returned by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: PayloadId,
    #[serde(default)]
    pub slots: SlotMap,
}

/// A generic registry exception as it travels inside a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawException {
    /// Registered type name, e.g. `rs:ObjectNotFoundExceptionType`.
    pub type_name: String,
    pub severity: ErrorSeverity,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub slots: SlotMap,
}

impl RawException {
    /// An empty exception record of the given type.
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            severity: ErrorSeverity::Failure,
            message: String::new(),
            detail: None,
            code: None,
            slots: SlotMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub request_id: RequestId,
    pub status: ResponseStatus,
    #[serde(default)]
    pub slots: SlotMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_objects: Option<Vec<RegistryObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_refs: Option<Vec<ObjectRef>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<RawException>,
}

/// Top-level envelope shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "envelope", rename_all = "snake_case")]
pub enum Envelope {
    QueryRequest(QueryRequest),
    QueryResponse(QueryResponse),
}

impl Envelope {
    pub fn as_request(&self) -> Option<&QueryRequest> {
        match self {
            Self::QueryRequest(request) => Some(request),
            Self::QueryResponse(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&QueryResponse> {
        match self {
            Self::QueryResponse(response) => Some(response),
            Self::QueryRequest(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{Slot, SlotName, SlotValue};

    #[test]
    fn response_option_wire_names() {
        assert_eq!(
            serde_json::to_string(&ResponseOption::Inline).unwrap(),
            "\"LeafClassWithRepositoryItem\""
        );
        assert_eq!(
            serde_json::to_string(&ResponseOption::Reference).unwrap(),
            "\"ObjectRef\""
        );
    }

    #[test]
    fn status_and_severity_use_registry_urns() {
        let json = serde_json::to_string(&ResponseStatus::Failure).unwrap();
        assert!(json.ends_with("ResponseStatusType:Failure\""));
        let json = serde_json::to_string(&ErrorSeverity::Failure).unwrap();
        assert!(json.ends_with("ErrorSeverityType:Error\""));
    }

    #[test]
    fn request_envelope_serde_roundtrip() {
        let mut slots = SlotMap::new();
        slots
            .insert(Slot::new(
                SlotName::SpecificationIdentifier,
                SlotValue::String("oots-edm:v1.0".into()),
            ))
            .unwrap();
        let envelope = Envelope::QueryRequest(QueryRequest {
            id: RequestId::from_string("r1"),
            response_option: ResponseOption::Inline,
            slots,
            query: Query {
                definition: QueryDefinition::DocumentByIdQuery,
                slots: SlotMap::new(),
            },
        });
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"envelope\":\"query_request\""));
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn empty_response_lists_are_omitted() {
        let envelope = Envelope::QueryResponse(QueryResponse {
            request_id: RequestId::from_string("r1"),
            status: ResponseStatus::Success,
            slots: SlotMap::new(),
            registry_objects: None,
            object_refs: None,
            exceptions: vec![],
        });
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("registry_objects"));
        assert!(!json.contains("exceptions"));
        assert!(envelope.as_request().is_none());
        assert!(envelope.as_response().is_some());
    }
}
