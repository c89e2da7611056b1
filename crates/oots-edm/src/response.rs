//! Responses with information.
//!
//! A response carries a non-empty, ordered list of payloads of one kind:
//! concept payloads or documents (inline), or document references.

use crate::common::{CommonFields, Stamp, require};
use crate::concept::ConceptNode;
use crate::dataset::{Dataset, RepositoryItemRef};
use crate::discriminator;
use crate::envelope::{
    Envelope, ObjectRef, QueryResponse, RegistryObject, ResponseOption, ResponseStatus,
};
use crate::error::{EdmError, EdmResult};
use crate::ids::{PayloadId, RequestId};
use crate::party::Agent;
use crate::slot::{
    FragmentListSlot, FragmentSlot, RESPONSE_TOP_LEVEL, Slot, SlotComposer, SlotLevel, SlotMap,
    SlotName, SlotProvider,
};
use chrono::{DateTime, Utc};

const MESSAGE_KIND: &str = "response";

/// The kind of payload a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponsePayloadKind {
    Concept,
    Document,
    DocumentReference,
}

impl ResponsePayloadKind {
    /// The response option this payload kind is returned under.
    pub fn response_option(self) -> ResponseOption {
        match self {
            Self::Concept | Self::Document => ResponseOption::Inline,
            Self::DocumentReference => ResponseOption::Reference,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConceptPayload {
    pub id: PayloadId,
    pub concepts: Vec<ConceptNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    pub id: PayloadId,
    pub dataset: Dataset,
    pub repository_item_ref: RepositoryItemRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReferencePayload {
    pub id: PayloadId,
    pub dataset: Dataset,
}

/// One validated response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Concept(ConceptPayload),
    Document(DocumentPayload),
    DocumentReference(DocumentReferencePayload),
}

impl ResponsePayload {
    pub fn kind(&self) -> ResponsePayloadKind {
        match self {
            Self::Concept(_) => ResponsePayloadKind::Concept,
            Self::Document(_) => ResponsePayloadKind::Document,
            Self::DocumentReference(_) => ResponsePayloadKind::DocumentReference,
        }
    }

    pub fn id(&self) -> &PayloadId {
        match self {
            Self::Concept(payload) => &payload.id,
            Self::Document(payload) => &payload.id,
            Self::DocumentReference(payload) => &payload.id,
        }
    }

    fn to_registry_object(&self) -> EdmResult<RegistryObject> {
        let mut slots = SlotMap::new();
        let repository_item_ref = match self {
            Self::Concept(payload) => {
                slots.insert(
                    FragmentListSlot {
                        name: SlotName::ConceptValues,
                        values: &payload.concepts,
                    }
                    .to_slot()?,
                )?;
                None
            }
            Self::Document(payload) => {
                slots.insert(metadata_slot(&payload.dataset)?)?;
                Some(payload.repository_item_ref.clone())
            }
            Self::DocumentReference(_) => {
                return Err(EdmError::inconsistent(
                    MESSAGE_KIND,
                    "a document reference cannot be returned inline",
                ));
            }
        };
        Ok(RegistryObject {
            id: self.id().clone(),
            slots,
            repository_item_ref,
        })
    }

    fn to_object_ref(&self) -> EdmResult<ObjectRef> {
        match self {
            Self::DocumentReference(payload) => {
                let mut slots = SlotMap::new();
                slots.insert(metadata_slot(&payload.dataset)?)?;
                Ok(ObjectRef {
                    id: payload.id.clone(),
                    slots,
                })
            }
            Self::Concept(_) | Self::Document(_) => Err(EdmError::inconsistent(
                MESSAGE_KIND,
                "only document references can be returned by reference",
            )),
        }
    }
}

fn metadata_slot(dataset: &Dataset) -> EdmResult<Slot> {
    FragmentSlot {
        name: SlotName::DocumentMetadata,
        value: dataset,
    }
    .to_slot()
}

/// Staging value for one response payload.
///
/// The payload kind follows from what is set: concepts make a concept
/// payload, a dataset with a repository item reference makes a document,
/// a dataset alone makes a document reference.
#[derive(Debug, Clone, Default)]
pub struct ResponsePayloadDraft {
    id: Option<PayloadId>,
    concepts: Vec<ConceptNode>,
    dataset: Option<Dataset>,
    repository_item_ref: Option<RepositoryItemRef>,
}

impl ResponsePayloadDraft {
    pub fn new(id: impl Into<PayloadId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// A draft with a random UUID v4 id.
    pub fn with_random_id() -> Self {
        Self::new(PayloadId::new_uuid())
    }

    pub fn concept(mut self, concept: ConceptNode) -> Self {
        self.concepts.push(concept);
        self
    }

    pub fn concepts(mut self, concepts: impl IntoIterator<Item = ConceptNode>) -> Self {
        self.concepts.extend(concepts);
        self
    }

    pub fn dataset(mut self, dataset: Dataset) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn repository_item_ref(mut self, item: RepositoryItemRef) -> Self {
        self.repository_item_ref = Some(item);
        self
    }

    /// Validate against the response option and produce a payload.
    pub fn build(&self, response_option: ResponseOption) -> EdmResult<ResponsePayload> {
        let id = require(MESSAGE_KIND, "payload id", self.id.clone())?;
        if id.is_blank() {
            return Err(EdmError::inconsistent(MESSAGE_KIND, "payload id is blank"));
        }

        if !self.concepts.is_empty() {
            for concept in &self.concepts {
                concept.check()?;
            }
            if self.dataset.is_some() {
                return Err(EdmError::inconsistent(
                    MESSAGE_KIND,
                    "a payload must not combine concepts with a dataset",
                ));
            }
            if self.repository_item_ref.is_some() {
                return Err(EdmError::inconsistent(
                    MESSAGE_KIND,
                    "a repository item reference must not accompany concepts",
                ));
            }
            if response_option != ResponseOption::Inline {
                return Err(EdmError::inconsistent(
                    MESSAGE_KIND,
                    "concept payloads require the inline response option",
                ));
            }
            return Ok(ResponsePayload::Concept(ConceptPayload {
                id,
                concepts: self.concepts.clone(),
            }));
        }

        let dataset = self.dataset.clone().ok_or_else(|| {
            EdmError::inconsistent(MESSAGE_KIND, "a payload needs concepts or a dataset")
        })?;
        match (response_option, &self.repository_item_ref) {
            (ResponseOption::Inline, Some(item)) => Ok(ResponsePayload::Document(DocumentPayload {
                id,
                dataset,
                repository_item_ref: item.clone(),
            })),
            (ResponseOption::Inline, None) => Err(EdmError::inconsistent(
                MESSAGE_KIND,
                "an inline document needs a repository item reference",
            )),
            (ResponseOption::Reference, None) => Ok(ResponsePayload::DocumentReference(
                DocumentReferencePayload { id, dataset },
            )),
            (ResponseOption::Reference, Some(_)) => Err(EdmError::inconsistent(
                MESSAGE_KIND,
                "a document reference must not carry a repository item reference",
            )),
        }
    }
}

/// An immutable, validated response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    response_option: ResponseOption,
    status: ResponseStatus,
    request_id: RequestId,
    stamp: Stamp,
    data_provider: Agent,
    payload_kind: ResponsePayloadKind,
    payloads: Vec<ResponsePayload>,
}

impl Response {
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    pub fn response_option(&self) -> ResponseOption {
        self.response_option
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn specification_identifier(&self) -> &str {
        &self.stamp.specification_identifier
    }

    pub fn issue_date_time(&self) -> DateTime<Utc> {
        self.stamp.issue_date_time
    }

    pub fn data_provider(&self) -> &Agent {
        &self.data_provider
    }

    pub fn payloads(&self) -> &[ResponsePayload] {
        &self.payloads
    }

    /// The kind shared by every payload.
    pub fn payload_kind(&self) -> ResponsePayloadKind {
        self.payload_kind
    }

    /// Lay this response onto a fresh query response envelope.
    pub fn to_envelope(&self) -> EdmResult<Envelope> {
        let mut composer = SlotComposer::new(RESPONSE_TOP_LEVEL);
        self.stamp.add_slots(&mut composer)?;
        composer.add(&FragmentSlot {
            name: SlotName::DataProvider,
            value: &self.data_provider,
        })?;
        let (slots, _) = composer.finish();

        let (registry_objects, object_refs) = match self.response_option {
            ResponseOption::Inline => (
                Some(
                    self.payloads
                        .iter()
                        .map(ResponsePayload::to_registry_object)
                        .collect::<EdmResult<Vec<_>>>()?,
                ),
                None,
            ),
            ResponseOption::Reference => (
                None,
                Some(
                    self.payloads
                        .iter()
                        .map(ResponsePayload::to_object_ref)
                        .collect::<EdmResult<Vec<_>>>()?,
                ),
            ),
        };

        Ok(Envelope::QueryResponse(QueryResponse {
            request_id: self.request_id.clone(),
            status: self.status,
            slots,
            registry_objects,
            object_refs,
            exceptions: Vec::new(),
        }))
    }

    /// Recover a response from an envelope, replaying every slot.
    pub fn from_envelope(envelope: &Envelope) -> EdmResult<Self> {
        let response = envelope
            .as_response()
            .ok_or_else(|| EdmError::Unclassifiable("not a query response envelope".into()))?;
        let payload_kind = discriminator::classify_response(response)?;

        let mut builder = Self::builder();
        builder
            .response_option(payload_kind.response_option())
            .status(response.status)
            .request_id(response.request_id.clone());

        for (raw_name, value) in response.slots.iter() {
            let level = SlotLevel::ResponseTop;
            match level.resolve(raw_name)? {
                name @ SlotName::SpecificationIdentifier => {
                    builder.specification_identifier(value.expect_str(name)?);
                }
                name @ SlotName::IssueDateTime => {
                    builder.issue_date_time(value.expect_date_time(name)?);
                }
                name @ SlotName::DataProvider => {
                    builder.data_provider(value.decode_fragment(name)?);
                }
                other => return Err(level.unexpected(other)),
            }
        }

        for object in response.registry_objects.iter().flatten() {
            let draft = ResponsePayloadDraft::new(object.id.clone());
            let mut draft = replay_object_slots(draft, &object.slots)?;
            if let Some(item) = &object.repository_item_ref {
                draft = draft.repository_item_ref(item.clone());
            }
            builder.add_payload(draft);
        }
        for object in response.object_refs.iter().flatten() {
            let draft = ResponsePayloadDraft::new(object.id.clone());
            builder.add_payload(replay_object_slots(draft, &object.slots)?);
        }

        builder.build()
    }
}

fn replay_object_slots(
    mut draft: ResponsePayloadDraft,
    slots: &SlotMap,
) -> EdmResult<ResponsePayloadDraft> {
    let level = SlotLevel::RegistryObject;
    for (raw_name, value) in slots.iter() {
        match level.resolve(raw_name)? {
            name @ SlotName::ConceptValues => {
                draft = draft.concepts(value.decode_fragment_list::<ConceptNode>(name)?);
            }
            name @ SlotName::DocumentMetadata => {
                draft = draft.dataset(value.decode_fragment(name)?);
            }
            other => return Err(level.unexpected(other)),
        }
    }
    Ok(draft)
}

/// Mutable, reusable staging area for a [`Response`].
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    common: CommonFields,
    response_option: Option<ResponseOption>,
    status: Option<ResponseStatus>,
    request_id: Option<RequestId>,
    data_provider: Option<Agent>,
    payloads: Vec<ResponsePayloadDraft>,
}

impl ResponseBuilder {
    pub fn response_option(&mut self, response_option: ResponseOption) -> &mut Self {
        self.response_option = Some(response_option);
        self
    }

    pub fn status(&mut self, status: ResponseStatus) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn request_id(&mut self, request_id: impl Into<RequestId>) -> &mut Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn specification_identifier(&mut self, value: impl Into<String>) -> &mut Self {
        self.common.specification_identifier = Some(value.into());
        self
    }

    pub fn default_specification_identifier(&mut self) -> &mut Self {
        self.common.set_default_specification_identifier();
        self
    }

    pub fn issue_date_time(&mut self, value: DateTime<Utc>) -> &mut Self {
        self.common.issue_date_time = Some(value);
        self
    }

    pub fn issue_date_time_now(&mut self) -> &mut Self {
        self.common.set_issue_date_time_now();
        self
    }

    pub fn data_provider(&mut self, agent: Agent) -> &mut Self {
        self.data_provider = Some(agent);
        self
    }

    pub fn add_payload(&mut self, payload: ResponsePayloadDraft) -> &mut Self {
        self.payloads.push(payload);
        self
    }

    pub fn clear_payloads(&mut self) -> &mut Self {
        self.payloads.clear();
        self
    }

    /// Fail on the first violated invariant.
    pub fn check_consistency(&self) -> EdmResult<()> {
        self.build().map(|_| ())
    }

    /// Build an immutable response. The builder is left untouched.
    pub fn build(&self) -> EdmResult<Response> {
        let response_option = require(MESSAGE_KIND, "response option", self.response_option)?;
        let status = require(MESSAGE_KIND, "response status", self.status)?;
        let request_id = require(MESSAGE_KIND, "request id", self.request_id.clone())?;
        if request_id.is_blank() {
            return Err(EdmError::inconsistent(MESSAGE_KIND, "request id is blank"));
        }
        let stamp = Stamp {
            specification_identifier: self.common.require_specification_identifier(MESSAGE_KIND)?,
            issue_date_time: self.common.require_issue_date_time(MESSAGE_KIND)?,
        };
        let data_provider = require(MESSAGE_KIND, "data provider", self.data_provider.clone())?;

        let payloads = self
            .payloads
            .iter()
            .map(|draft| draft.build(response_option))
            .collect::<EdmResult<Vec<_>>>()?;
        let payload_kind = payloads.first().map(ResponsePayload::kind).ok_or_else(|| {
            EdmError::inconsistent(MESSAGE_KIND, "at least one payload is required")
        })?;
        if let Some(odd) = payloads.iter().find(|p| p.kind() != payload_kind) {
            return Err(EdmError::inconsistent(
                MESSAGE_KIND,
                format!(
                    "payload {} is {:?} but the response carries {:?} payloads",
                    odd.id(),
                    odd.kind(),
                    payload_kind
                ),
            ));
        }

        Ok(Response {
            response_option,
            status,
            request_id,
            stamp,
            data_provider,
            payload_kind,
            payloads,
        })
    }
}
