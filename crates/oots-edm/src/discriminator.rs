//! Reverse discrimination: decide which message an envelope encodes.
//!
//! Classification looks only at envelope shape and slot names. Replaying
//! slot values into a builder happens afterwards, in each message's
//! `from_envelope`.

use crate::envelope::{Envelope, QueryRequest, QueryResponse, RegistryObject};
use crate::error::{EdmError, EdmResult};
use crate::message::MessageKind;
use crate::request::QueryKind;
use crate::response::ResponsePayloadKind;
use crate::slot::SlotName;
use tracing::debug;

const QUERY_KINDS: [QueryKind; 3] = [
    QueryKind::Concept,
    QueryKind::DocumentsByDistribution,
    QueryKind::DocumentById,
];

/// Classify an envelope into a concrete message kind and sub-kind.
pub fn classify(envelope: &Envelope) -> EdmResult<MessageKind> {
    let result = match envelope {
        Envelope::QueryRequest(request) => classify_query(request).map(MessageKind::Request),
        Envelope::QueryResponse(response) => classify_query_response(response),
    };
    match &result {
        Ok(kind) => debug!(?kind, "envelope classified"),
        Err(error) => debug!(%error, "envelope not classifiable"),
    }
    result
}

fn classify_query_response(response: &QueryResponse) -> EdmResult<MessageKind> {
    match (
        &response.registry_objects,
        &response.object_refs,
        response.exceptions.is_empty(),
    ) {
        (None, None, false) => Ok(MessageKind::ErrorResponse),
        _ => classify_response(response).map(MessageKind::Response),
    }
}

/// Decide the query kind from the one payload slot present on the query.
pub fn classify_query(request: &QueryRequest) -> EdmResult<QueryKind> {
    let present: Vec<QueryKind> = QUERY_KINDS
        .into_iter()
        .filter(|kind| request.query.slots.contains(kind.payload_slot()))
        .collect();

    let kind = match present.as_slice() {
        [kind] => *kind,
        [] => {
            return Err(EdmError::Unclassifiable(format!(
                "request {} carries none of {}, {}, {}",
                request.id,
                SlotName::ConceptRequestList,
                SlotName::DistributionRequestList,
                SlotName::Id
            )));
        }
        several => {
            let names: Vec<_> = several.iter().map(|k| k.payload_slot().as_str()).collect();
            return Err(EdmError::Unclassifiable(format!(
                "request {} carries mutually exclusive slots {}",
                request.id,
                names.join(", ")
            )));
        }
    };

    if kind.definition() != request.query.definition {
        return Err(EdmError::Unclassifiable(format!(
            "request {} declares {:?} but carries a {:?} payload",
            request.id, request.query.definition, kind
        )));
    }
    Ok(kind)
}

/// Decide the payload kind of a (non-error) response.
///
/// Every object is classified on its own and all must agree; a response
/// mixing payload kinds is rejected rather than decided by its first object.
pub fn classify_response(response: &QueryResponse) -> EdmResult<ResponsePayloadKind> {
    if !response.exceptions.is_empty() {
        return Err(EdmError::Unclassifiable(format!(
            "response to {} mixes payload lists with exceptions",
            response.request_id
        )));
    }
    match (&response.registry_objects, &response.object_refs) {
        (Some(objects), None) => classify_inline(objects),
        (None, Some(refs)) if !refs.is_empty() => Ok(ResponsePayloadKind::DocumentReference),
        (None, Some(_)) => Err(EdmError::Unclassifiable(format!(
            "response to {} has an empty object reference list",
            response.request_id
        ))),
        (Some(_), Some(_)) => Err(EdmError::Unclassifiable(format!(
            "response to {} carries both registry objects and object references",
            response.request_id
        ))),
        (None, None) => Err(EdmError::Unclassifiable(format!(
            "response to {} carries no payload list and no exceptions",
            response.request_id
        ))),
    }
}

fn classify_inline(objects: &[RegistryObject]) -> EdmResult<ResponsePayloadKind> {
    let mut kinds = objects.iter().map(classify_object);
    let first = kinds
        .next()
        .ok_or_else(|| EdmError::Unclassifiable("empty registry object list".into()))??;
    for (object, kind) in objects.iter().zip(std::iter::once(Ok(first)).chain(kinds)) {
        let kind = kind?;
        if kind != first {
            return Err(EdmError::Unclassifiable(format!(
                "registry object {} is {:?} but the first object is {:?}",
                object.id, kind, first
            )));
        }
    }
    Ok(first)
}

fn classify_object(object: &RegistryObject) -> EdmResult<ResponsePayloadKind> {
    let has_concepts = object.slots.contains(SlotName::ConceptValues);
    match (has_concepts, object.repository_item_ref.is_some()) {
        (true, false) => Ok(ResponsePayloadKind::Concept),
        (false, true) => Ok(ResponsePayloadKind::Document),
        (true, true) => Err(EdmError::Unclassifiable(format!(
            "registry object {} carries concept values and a repository item",
            object.id
        ))),
        (false, false) => Err(EdmError::Unclassifiable(format!(
            "registry object {} carries neither concept values nor a repository item",
            object.id
        ))),
    }
}

/// Check that a response envelope has the error response shape.
pub fn ensure_error_response(response: &QueryResponse) -> EdmResult<()> {
    match classify_query_response(response)? {
        MessageKind::ErrorResponse => Ok(()),
        other => Err(EdmError::Unclassifiable(format!(
            "response to {} is {:?}, not an error response",
            response.request_id, other
        ))),
    }
}
