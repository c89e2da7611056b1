//! Requests for information.
//!
//! A request asks one of three query kinds. The payload determines the
//! kind: a concept list, a distribution list, or a single document id.

use crate::common::{
    CommonFields, LocalizedText, Requirement, Stamp, require, require_non_empty, require_text,
};
use crate::concept::ConceptNode;
use crate::dataset::Distribution;
use crate::discriminator;
use crate::envelope::{Envelope, Query, QueryDefinition, QueryRequest, ResponseOption};
use crate::error::{EdmError, EdmResult};
use crate::ids::{DocumentId, RequestId};
use crate::party::{Agent, DataSubject, LegalPerson, NaturalPerson};
use crate::slot::{
    FragmentListSlot, FragmentSlot, REQUEST_TOP_LEVEL, SlotComposer, SlotLevel, SlotName,
    StringSlot,
};
use chrono::{DateTime, Utc};

const MESSAGE_KIND: &str = "request";

/// The three kinds of query a request can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Concept,
    DocumentsByDistribution,
    DocumentById,
}

impl QueryKind {
    pub fn definition(self) -> QueryDefinition {
        match self {
            Self::Concept => QueryDefinition::ConceptQuery,
            Self::DocumentsByDistribution => QueryDefinition::DocumentQuery,
            Self::DocumentById => QueryDefinition::DocumentByIdQuery,
        }
    }

    /// The query-level slot that carries this kind's payload.
    pub fn payload_slot(self) -> SlotName {
        match self {
            Self::Concept => SlotName::ConceptRequestList,
            Self::DocumentsByDistribution => SlotName::DistributionRequestList,
            Self::DocumentById => SlotName::Id,
        }
    }
}

/// What a request asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Concepts(Vec<ConceptNode>),
    Distributions(Vec<Distribution>),
    DocumentId(DocumentId),
}

impl RequestPayload {
    pub fn query_kind(&self) -> QueryKind {
        match self {
            Self::Concepts(_) => QueryKind::Concept,
            Self::Distributions(_) => QueryKind::DocumentsByDistribution,
            Self::DocumentId(_) => QueryKind::DocumentById,
        }
    }
}

/// An immutable, validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: RequestId,
    response_option: ResponseOption,
    stamp: Stamp,
    procedure: Vec<LocalizedText>,
    requirements: Vec<Requirement>,
    consent_token: Option<String>,
    dataset_identifier: Option<String>,
    data_consumer: Agent,
    subject: Option<DataSubject>,
    authorized_representative: Option<NaturalPerson>,
    payload: RequestPayload,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Builder pre-filled with a random id, the default specification
    /// identifier and the current time.
    pub fn builder_with_defaults() -> RequestBuilder {
        let mut builder = RequestBuilder::default();
        builder
            .random_id()
            .default_specification_identifier()
            .issue_date_time_now();
        builder
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn query_kind(&self) -> QueryKind {
        self.payload.query_kind()
    }

    pub fn response_option(&self) -> ResponseOption {
        self.response_option
    }

    pub fn specification_identifier(&self) -> &str {
        &self.stamp.specification_identifier
    }

    pub fn issue_date_time(&self) -> DateTime<Utc> {
        self.stamp.issue_date_time
    }

    pub fn procedure(&self) -> &[LocalizedText] {
        &self.procedure
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn consent_token(&self) -> Option<&str> {
        self.consent_token.as_deref()
    }

    pub fn dataset_identifier(&self) -> Option<&str> {
        self.dataset_identifier.as_deref()
    }

    pub fn data_consumer(&self) -> &Agent {
        &self.data_consumer
    }

    pub fn subject(&self) -> Option<&DataSubject> {
        self.subject.as_ref()
    }

    pub fn authorized_representative(&self) -> Option<&NaturalPerson> {
        self.authorized_representative.as_ref()
    }

    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    /// Lay this request onto a fresh query request envelope.
    pub fn to_envelope(&self) -> EdmResult<Envelope> {
        let mut composer = SlotComposer::new(REQUEST_TOP_LEVEL);
        self.stamp.add_slots(&mut composer)?;
        if !self.procedure.is_empty() {
            composer.add(&FragmentListSlot {
                name: SlotName::Procedure,
                values: &self.procedure,
            })?;
        }
        if !self.requirements.is_empty() {
            composer.add(&FragmentListSlot {
                name: SlotName::FullfillingOfRequirement,
                values: &self.requirements,
            })?;
        }
        if let Some(token) = &self.consent_token {
            composer.add(&StringSlot {
                name: SlotName::ConsentToken,
                value: token,
            })?;
        }
        if let Some(dataset_identifier) = &self.dataset_identifier {
            composer.add(&StringSlot {
                name: SlotName::DatasetIdentifier,
                value: dataset_identifier,
            })?;
        }

        composer.add(&FragmentSlot {
            name: SlotName::DataConsumer,
            value: &self.data_consumer,
        })?;
        match &self.subject {
            Some(DataSubject::LegalPerson(person)) => {
                composer.add(&FragmentSlot {
                    name: SlotName::LegalPerson,
                    value: person,
                })?;
            }
            Some(DataSubject::NaturalPerson(person)) => {
                composer.add(&FragmentSlot {
                    name: SlotName::NaturalPerson,
                    value: person,
                })?;
            }
            None => {}
        }
        if let Some(representative) = &self.authorized_representative {
            composer.add(&FragmentSlot {
                name: SlotName::AuthorizedRepresentative,
                value: representative,
            })?;
        }

        match &self.payload {
            RequestPayload::Concepts(concepts) => composer.add(&FragmentListSlot {
                name: SlotName::ConceptRequestList,
                values: concepts,
            })?,
            RequestPayload::Distributions(distributions) => composer.add(&FragmentListSlot {
                name: SlotName::DistributionRequestList,
                values: distributions,
            })?,
            RequestPayload::DocumentId(document_id) => composer.add(&StringSlot {
                name: SlotName::Id,
                value: document_id.as_str(),
            })?,
        };

        let (top_level, query_level) = composer.finish();
        Ok(Envelope::QueryRequest(QueryRequest {
            id: self.id.clone(),
            response_option: self.response_option,
            slots: top_level,
            query: Query {
                definition: self.query_kind().definition(),
                slots: query_level,
            },
        }))
    }

    /// Recover a request from an envelope, replaying every slot.
    pub fn from_envelope(envelope: &Envelope) -> EdmResult<Self> {
        let request = envelope
            .as_request()
            .ok_or_else(|| EdmError::Unclassifiable("not a query request envelope".into()))?;
        let query_kind = discriminator::classify_query(request)?;

        let mut builder = Self::builder();
        builder
            .query_kind(query_kind)
            .id(request.id.clone())
            .response_option(request.response_option);

        for (raw_name, value) in request.slots.iter() {
            let level = SlotLevel::RequestTop;
            match level.resolve(raw_name)? {
                name @ SlotName::SpecificationIdentifier => {
                    builder.specification_identifier(value.expect_str(name)?);
                }
                name @ SlotName::IssueDateTime => {
                    builder.issue_date_time(value.expect_date_time(name)?);
                }
                name @ SlotName::Procedure => {
                    builder.procedure = value.decode_fragment_list(name)?;
                }
                name @ SlotName::FullfillingOfRequirement => {
                    builder.requirements = value.decode_fragment_list(name)?;
                }
                name @ SlotName::ConsentToken => {
                    builder.consent_token(value.expect_str(name)?);
                }
                name @ SlotName::DatasetIdentifier => {
                    builder.dataset_identifier(value.expect_str(name)?);
                }
                other => return Err(level.unexpected(other)),
            }
        }

        for (raw_name, value) in request.query.slots.iter() {
            let level = SlotLevel::Query;
            match level.resolve(raw_name)? {
                name @ SlotName::DataConsumer => {
                    builder.data_consumer(value.decode_fragment(name)?);
                }
                name @ SlotName::LegalPerson => {
                    builder.legal_person(value.decode_fragment(name)?);
                }
                name @ SlotName::NaturalPerson => {
                    builder.natural_person(value.decode_fragment(name)?);
                }
                name @ SlotName::AuthorizedRepresentative => {
                    builder.authorized_representative(value.decode_fragment(name)?);
                }
                name @ SlotName::ConceptRequestList => {
                    builder.concepts(value.decode_fragment_list(name)?);
                }
                name @ SlotName::DistributionRequestList => {
                    builder.distributions(value.decode_fragment_list(name)?);
                }
                name @ SlotName::Id => {
                    builder.document_id(DocumentId::from(value.expect_str(name)?));
                }
                other => return Err(level.unexpected(other)),
            }
        }

        builder.build()
    }
}

/// Mutable, reusable staging area for a [`Request`].
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    common: CommonFields,
    query_kind: Option<QueryKind>,
    id: Option<RequestId>,
    response_option: Option<ResponseOption>,
    procedure: Vec<LocalizedText>,
    requirements: Vec<Requirement>,
    consent_token: Option<String>,
    dataset_identifier: Option<String>,
    data_consumer: Option<Agent>,
    legal_person: Option<LegalPerson>,
    natural_person: Option<NaturalPerson>,
    authorized_representative: Option<NaturalPerson>,
    concepts: Vec<ConceptNode>,
    distributions: Vec<Distribution>,
    document_id: Option<DocumentId>,
}

impl RequestBuilder {
    pub fn query_kind(&mut self, query_kind: QueryKind) -> &mut Self {
        self.query_kind = Some(query_kind);
        self
    }

    pub fn id(&mut self, id: impl Into<RequestId>) -> &mut Self {
        self.id = Some(id.into());
        self
    }

    pub fn random_id(&mut self) -> &mut Self {
        self.id = Some(RequestId::new_uuid());
        self
    }

    pub fn response_option(&mut self, response_option: ResponseOption) -> &mut Self {
        self.response_option = Some(response_option);
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

    pub fn add_procedure(&mut self, text: LocalizedText) -> &mut Self {
        self.procedure.push(text);
        self
    }

    pub fn add_requirement(&mut self, requirement: Requirement) -> &mut Self {
        self.requirements.push(requirement);
        self
    }

    pub fn consent_token(&mut self, token: impl Into<String>) -> &mut Self {
        self.consent_token = Some(token.into());
        self
    }

    pub fn dataset_identifier(&mut self, value: impl Into<String>) -> &mut Self {
        self.dataset_identifier = Some(value.into());
        self
    }

    pub fn data_consumer(&mut self, agent: Agent) -> &mut Self {
        self.data_consumer = Some(agent);
        self
    }

    pub fn legal_person(&mut self, person: LegalPerson) -> &mut Self {
        self.legal_person = Some(person);
        self
    }

    pub fn natural_person(&mut self, person: NaturalPerson) -> &mut Self {
        self.natural_person = Some(person);
        self
    }

    pub fn clear_subject(&mut self) -> &mut Self {
        self.legal_person = None;
        self.natural_person = None;
        self
    }

    pub fn authorized_representative(&mut self, person: NaturalPerson) -> &mut Self {
        self.authorized_representative = Some(person);
        self
    }

    pub fn add_concept(&mut self, concept: ConceptNode) -> &mut Self {
        self.concepts.push(concept);
        self
    }

    /// Replace all requested concepts.
    pub fn concepts(&mut self, concepts: impl IntoIterator<Item = ConceptNode>) -> &mut Self {
        self.concepts = concepts.into_iter().collect();
        self
    }

    pub fn add_distribution(&mut self, distribution: Distribution) -> &mut Self {
        self.distributions.push(distribution);
        self
    }

    /// Replace all requested distributions.
    pub fn distributions(
        &mut self,
        distributions: impl IntoIterator<Item = Distribution>,
    ) -> &mut Self {
        self.distributions = distributions.into_iter().collect();
        self
    }

    pub fn document_id(&mut self, document_id: impl Into<DocumentId>) -> &mut Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Fail on the first violated invariant.
    pub fn check_consistency(&self) -> EdmResult<()> {
        self.checked_parts().map(|_| ())
    }

    /// Build an immutable request. The builder is left untouched.
    pub fn build(&self) -> EdmResult<Request> {
        let parts = self.checked_parts()?;
        Ok(Request {
            id: parts.id,
            response_option: parts.response_option,
            stamp: parts.stamp,
            procedure: self.procedure.clone(),
            requirements: self.requirements.clone(),
            consent_token: self.consent_token.clone(),
            dataset_identifier: self.dataset_identifier.clone(),
            data_consumer: parts.data_consumer,
            subject: parts.subject,
            authorized_representative: self.authorized_representative.clone(),
            payload: parts.payload,
        })
    }

    fn checked_parts(&self) -> EdmResult<CheckedParts> {
        let id = require(MESSAGE_KIND, "request id", self.id.clone())?;
        if id.is_blank() {
            return Err(EdmError::inconsistent(MESSAGE_KIND, "request id is blank"));
        }
        let response_option = require(MESSAGE_KIND, "response option", self.response_option)?;
        let stamp = Stamp {
            specification_identifier: self.common.require_specification_identifier(MESSAGE_KIND)?,
            issue_date_time: self.common.require_issue_date_time(MESSAGE_KIND)?,
        };
        let data_consumer = require(MESSAGE_KIND, "data consumer", self.data_consumer.clone())?;
        let query_kind = require(MESSAGE_KIND, "query kind", self.query_kind)?;

        let subject = match (&self.legal_person, &self.natural_person) {
            (Some(_), Some(_)) => {
                return Err(EdmError::inconsistent(
                    MESSAGE_KIND,
                    "legal person and natural person subjects are mutually exclusive",
                ));
            }
            (Some(legal), None) => Some(DataSubject::LegalPerson(legal.clone())),
            (None, Some(natural)) => Some(DataSubject::NaturalPerson(natural.clone())),
            (None, None) if query_kind == QueryKind::DocumentById => None,
            (None, None) => {
                return Err(EdmError::inconsistent(
                    MESSAGE_KIND,
                    "a legal person or natural person subject is required",
                ));
            }
        };

        let payload = self.checked_payload(query_kind)?;
        Ok(CheckedParts {
            id,
            response_option,
            stamp,
            data_consumer,
            subject,
            payload,
        })
    }

    fn checked_payload(&self, query_kind: QueryKind) -> EdmResult<RequestPayload> {
        let foreign = |field: &str| {
            EdmError::inconsistent(
                MESSAGE_KIND,
                format!("{field} must not be set for a {query_kind:?} query"),
            )
        };
        match query_kind {
            QueryKind::Concept => {
                require_non_empty(MESSAGE_KIND, "concept", &self.concepts)?;
                for concept in &self.concepts {
                    concept.check()?;
                }
                if !self.distributions.is_empty() {
                    return Err(foreign("distributions"));
                }
                if self.document_id.is_some() {
                    return Err(foreign("document id"));
                }
                Ok(RequestPayload::Concepts(self.concepts.clone()))
            }
            QueryKind::DocumentsByDistribution => {
                require_non_empty(MESSAGE_KIND, "distribution", &self.distributions)?;
                if !self.concepts.is_empty() {
                    return Err(foreign("concepts"));
                }
                if self.document_id.is_some() {
                    return Err(foreign("document id"));
                }
                Ok(RequestPayload::Distributions(self.distributions.clone()))
            }
            QueryKind::DocumentById => {
                let document_id = require_text(
                    MESSAGE_KIND,
                    "document id",
                    self.document_id.as_ref().map(DocumentId::as_str),
                )?;
                if !self.concepts.is_empty() {
                    return Err(foreign("concepts"));
                }
                if !self.distributions.is_empty() {
                    return Err(foreign("distributions"));
                }
                Ok(RequestPayload::DocumentId(DocumentId::from(document_id)))
            }
        }
    }
}

struct CheckedParts {
    id: RequestId,
    response_option: ResponseOption,
    stamp: Stamp,
    data_consumer: Agent,
    subject: Option<DataSubject>,
    payload: RequestPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::{ConceptValue, MAX_CONCEPT_DEPTH};
    use crate::slot::{Slot, SlotValue};
    use chrono::TimeZone;

    fn base_builder(query_kind: QueryKind) -> RequestBuilder {
        let mut builder = Request::builder();
        builder
            .query_kind(query_kind)
            .id("c4369c4d-740e-4b64-80f0-7b209a66d629")
            .response_option(ResponseOption::Inline)
            .default_specification_identifier()
            .issue_date_time(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
            .data_consumer(Agent::new("9914:ATU12345678", "iso6523-actorid-upis", "DC"));
        builder
    }

    fn concept_request_builder() -> RequestBuilder {
        let mut builder = base_builder(QueryKind::Concept);
        builder
            .legal_person(LegalPerson::new("AT/DE/1234").with_name("ACME"))
            .add_concept(
                ConceptNode::named("urn:bla", "CompanyType")
                    .with_value(ConceptValue::text("SME"))
                    .with_child(ConceptNode::new().with_value(ConceptValue::numeric(42))),
            );
        builder
    }

    #[test]
    fn concept_request_roundtrips_through_envelope() {
        let request = concept_request_builder()
            .add_procedure(LocalizedText::new("en", "GBM_1"))
            .add_requirement(Requirement::new("https://sr.example/req/1"))
            .consent_token("consent")
            .dataset_identifier("ds")
            .authorized_representative(NaturalPerson::new("Doe", "Jane"))
            .build()
            .unwrap();

        let envelope = request.to_envelope().unwrap();
        let back = Request::from_envelope(&envelope).unwrap();
        assert_eq!(back, request);
        assert_eq!(back.query_kind(), QueryKind::Concept);
    }

    #[test]
    fn envelope_slot_order_is_deterministic() {
        let request = concept_request_builder()
            .consent_token("consent")
            .build()
            .unwrap();
        let envelope = request.to_envelope().unwrap();
        let query = envelope.as_request().unwrap();
        assert_eq!(
            query.slots.names().collect::<Vec<_>>(),
            vec!["SpecificationIdentifier", "IssueDateTime", "ConsentToken"]
        );
        assert_eq!(
            query.query.slots.names().collect::<Vec<_>>(),
            vec!["DataConsumer", "LegalPerson", "ConceptRequestList"]
        );
        assert_eq!(query.query.definition, QueryDefinition::ConceptQuery);
        assert_eq!(request.to_envelope().unwrap(), envelope);
    }

    #[test]
    fn concept_request_without_concepts_fails() {
        let mut builder = base_builder(QueryKind::Concept);
        builder.legal_person(LegalPerson::new("AT/DE/1234"));
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("at least one concept"));
    }

    #[test]
    fn unreadable_concepts_fail() {
        let mut builder = concept_request_builder();
        let capital = ConceptValue::amount(f64::NAN, "EUR");
        builder.add_concept(ConceptNode::named("urn:bla", "Capital").with_value(capital));
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("is not finite"), "{err}");

        let mut deep = ConceptNode::named("urn:bla", "Leaf");
        for _ in 0..=MAX_CONCEPT_DEPTH {
            deep = ConceptNode::named("urn:bla", "Link").with_child(deep);
        }
        builder.concepts(vec![deep]);
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("deeper than"), "{err}");
    }

    #[test]
    fn both_subjects_fail() {
        let mut builder = concept_request_builder();
        builder.natural_person(NaturalPerson::new("Doe", "John"));
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn missing_subject_fails_unless_document_by_id() {
        let mut builder = concept_request_builder();
        builder.clear_subject();
        assert!(builder.build().is_err());

        let mut by_id = base_builder(QueryKind::DocumentById);
        by_id.document_id("doc-42");
        let request = by_id.build().unwrap();
        assert!(request.subject().is_none());
        let back = Request::from_envelope(&request.to_envelope().unwrap()).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn document_by_id_requires_id() {
        let builder = base_builder(QueryKind::DocumentById);
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("document id is missing"));
    }

    #[test]
    fn payload_must_match_query_kind() {
        let mut builder = base_builder(QueryKind::DocumentsByDistribution);
        builder
            .natural_person(NaturalPerson::new("Doe", "John"))
            .add_distribution(Distribution::new("application/pdf"))
            .add_concept(ConceptNode::named("urn:bla", "X"));
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("concepts must not be set"));

        builder.concepts(Vec::new());
        let request = builder.build().unwrap();
        assert_eq!(request.query_kind(), QueryKind::DocumentsByDistribution);
        let back = Request::from_envelope(&request.to_envelope().unwrap()).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn builder_is_reusable() {
        let mut builder = concept_request_builder();
        let first = builder.build().unwrap();
        builder.id("second");
        let second = builder.build().unwrap();
        assert_eq!(first.id().as_str(), "c4369c4d-740e-4b64-80f0-7b209a66d629");
        assert_eq!(second.id().as_str(), "second");
        assert_eq!(first.payload(), second.payload());
    }

    #[test]
    fn builder_with_defaults_fills_common_fields() {
        let mut builder = Request::builder_with_defaults();
        builder
            .query_kind(QueryKind::DocumentById)
            .response_option(ResponseOption::Reference)
            .data_consumer(Agent::new("a", "b", "c"))
            .document_id("doc");
        let request = builder.build().unwrap();
        assert_eq!(request.id().as_str().len(), 36);
        assert_eq!(request.specification_identifier(), "oots-edm:v1.0");
    }

    #[test]
    fn unknown_query_slot_is_rejected() {
        let request = concept_request_builder().build().unwrap();
        let mut envelope = request.to_envelope().unwrap();
        if let Envelope::QueryRequest(query) = &mut envelope {
            query
                .query
                .slots
                .insert(Slot {
                    name: "Surprise".into(),
                    value: SlotValue::String("x".into()),
                })
                .unwrap();
        }
        let err = Request::from_envelope(&envelope).unwrap_err();
        assert!(matches!(err, EdmError::UnexpectedSlot { level: "query", .. }));
    }
}
