use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use oots_codec::{CodecConfig, CodecError, EnvelopeCodec, classify_and_parse};
use oots_edm::{
    Agent, ConceptNode, ConceptValue, Dataset, Distribution, ErrorOrigin, ErrorResponse,
    ErrorSeverity, ExceptionKind, ExceptionRecord, LegalPerson, Message, MessageKind,
    NaturalPerson, QueryKind, RepositoryItemRef, Request, RequestBuilder, RequestPayload, Response,
    ResponseOption, ResponsePayloadDraft, ResponsePayloadKind, ResponseStatus,
    concept::MAX_CONCEPT_DEPTH,
};

fn concept_request_builder() -> RequestBuilder {
    let mut builder = Request::builder();
    builder
        .query_kind(QueryKind::Concept)
        .id("c4369c4d-740e-4b64-80f0-7b209a66d629")
        .response_option(ResponseOption::Inline)
        .default_specification_identifier()
        .issue_date_time(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
        .data_consumer(Agent::new("9914:ATU12345678", "iso6523-actorid-upis", "DC"))
        .legal_person(LegalPerson::new("AT/DE/1234").with_name("ACME"))
        .add_concept(
            ConceptNode::named("urn:bla", "CompanyType")
                .with_value(ConceptValue::text("SME"))
                .with_child(ConceptNode::new().with_value(ConceptValue::numeric(42))),
        );
    builder
}

fn concept_request() -> Result<Request> {
    Ok(concept_request_builder().build()?)
}

fn exception(kind: ExceptionKind, message: &str) -> Result<ExceptionRecord> {
    Ok(ExceptionRecord::builder()
        .kind(kind)
        .severity(ErrorSeverity::Failure)
        .message(message)
        .timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 7).unwrap())
        .origin(ErrorOrigin::ResponseCreation)
        .build()?)
}

fn document_response() -> Result<Response> {
    Ok(Response::builder()
        .response_option(ResponseOption::Inline)
        .status(ResponseStatus::Success)
        .request_id("c4369c4d-740e-4b64-80f0-7b209a66d629")
        .default_specification_identifier()
        .issue_date_time(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 5).unwrap())
        .data_provider(Agent::new("9914:DE999", "iso6523-actorid-upis", "DP"))
        .add_payload(
            ResponsePayloadDraft::new("p-1")
                .dataset(
                    Dataset::new("ds-1", "Certificate of incorporation")
                        .with_distribution(Distribution::new("application/pdf")),
                )
                .repository_item_ref(RepositoryItemRef::new("Certificate", "cid:p-1")),
        )
        .add_payload(
            ResponsePayloadDraft::new("p-2")
                .dataset(Dataset::new("ds-2", "Annual accounts"))
                .repository_item_ref(RepositoryItemRef::new("Accounts", "cid:p-2")),
        )
        .build()?)
}

#[test]
fn concept_request_survives_bytes() -> Result<()> {
    let request = concept_request()?;
    let codec = EnvelopeCodec::default();
    let bytes = codec.write_message(&Message::from(request.clone()))?;

    let back = codec.parse_request(&bytes).context("request did not parse")?;
    assert_eq!(back, request);
    let RequestPayload::Concepts(roots) = back.payload() else {
        anyhow::bail!("expected a concept payload");
    };
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].node_count(), 2);
    assert_eq!(roots[0].children[0].value, Some(ConceptValue::numeric(42)));
    Ok(())
}

#[test]
fn decimal_amounts_survive_bytes() -> Result<()> {
    let codec = EnvelopeCodec::default();
    let values: Vec<f64> = (1..200).map(|n| f64::from(n) * 1.000000007 / 3.0).collect();
    let mut builder = concept_request_builder();
    for (i, value) in values.iter().enumerate() {
        builder.add_concept(
            ConceptNode::named("urn:bla", format!("Capital{i}"))
                .with_value(ConceptValue::amount(*value, "EUR")),
        );
    }
    let request = builder.build()?;
    let bytes = codec.write_message(&Message::from(request.clone()))?;

    let back = codec.parse_request(&bytes).context("request did not parse")?;
    assert_eq!(back, request);
    let RequestPayload::Concepts(roots) = back.payload() else {
        anyhow::bail!("expected a concept payload");
    };
    let read: Vec<f64> = roots[1..]
        .iter()
        .filter_map(|root| match &root.value {
            Some(ConceptValue::Amount { value, .. }) => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(read, values);
    Ok(())
}

#[test]
fn distribution_request_survives_bytes() -> Result<()> {
    let request = Request::builder()
        .query_kind(QueryKind::DocumentsByDistribution)
        .id("5af62cce-debe-11ec-9d64-0242ac120002")
        .response_option(ResponseOption::Reference)
        .default_specification_identifier()
        .issue_date_time(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
        .data_consumer(Agent::new("9914:ATU12345678", "iso6523-actorid-upis", "DC"))
        .natural_person(NaturalPerson::new("Doe", "Jane").with_person_id("DE/AT/1"))
        .consent_token("consent")
        .add_distribution(Distribution::new("application/pdf").with_document_type("Diploma"))
        .add_distribution(Distribution::new("application/xml"))
        .build()?;

    let codec = EnvelopeCodec::default();
    let bytes = codec.write_message(&Message::from(request.clone()))?;
    let message = classify_and_parse(&bytes).context("request did not classify")?;
    assert_eq!(
        message.kind(),
        MessageKind::Request(QueryKind::DocumentsByDistribution)
    );
    assert_eq!(message, Message::Request(request));
    Ok(())
}

#[test]
fn concept_response_survives_bytes() -> Result<()> {
    let mut deepest =
        ConceptNode::named("urn:bla", "Leaf").with_value(ConceptValue::measure(0.1 + 0.2, "m"));
    for level in 0..MAX_CONCEPT_DEPTH {
        deepest = ConceptNode::named("urn:bla", format!("Level{level}"))
            .with_value(ConceptValue::amount(level as f64 / 7.0, "EUR"))
            .with_child(deepest);
    }
    assert_eq!(deepest.max_depth(), MAX_CONCEPT_DEPTH);

    let response = Response::builder()
        .response_option(ResponseOption::Inline)
        .status(ResponseStatus::Success)
        .request_id("c4369c4d-740e-4b64-80f0-7b209a66d629")
        .default_specification_identifier()
        .issue_date_time(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 5).unwrap())
        .data_provider(Agent::new("9914:DE999", "iso6523-actorid-upis", "DP"))
        .add_payload(
            ResponsePayloadDraft::new("p-1")
                .concept(
                    ConceptNode::named("urn:bla", "CompanyType")
                        .with_value(ConceptValue::text("SME")),
                )
                .concept(deepest),
        )
        .build()?;

    let codec = EnvelopeCodec::default();
    let bytes = codec.write_message(&Message::from(response.clone()))?;
    let message = codec.classify_and_parse(&bytes).context("response did not classify")?;
    assert_eq!(
        message.kind(),
        MessageKind::Response(ResponsePayloadKind::Concept)
    );
    assert_eq!(message, Message::Response(response));
    Ok(())
}

#[test]
fn error_response_keeps_exception_order() -> Result<()> {
    let error_response = ErrorResponse::builder()
        .status(ResponseStatus::Failure)
        .request_id("r1")
        .default_specification_identifier()
        .add_exception(exception(ExceptionKind::ObjectNotFound, "no such company")?)
        .add_exception(exception(ExceptionKind::Timeout, "registry timed out")?)
        .build()?;

    let codec = EnvelopeCodec::default();
    let bytes = codec.write_message(&Message::from(error_response.clone()))?;
    let back = codec
        .parse_error_response(&bytes)
        .context("error response did not parse")?;
    assert_eq!(back, error_response);
    let kinds: Vec<_> = back.exceptions().iter().map(ExceptionRecord::kind).collect();
    assert_eq!(kinds, vec![ExceptionKind::ObjectNotFound, ExceptionKind::Timeout]);
    Ok(())
}

#[test]
fn classify_and_parse_picks_the_right_kind() -> Result<()> {
    let codec = EnvelopeCodec::new(CodecConfig::default().with_pretty(true));
    let response = document_response()?;
    let bytes = codec.write_message(&Message::from(response.clone()))?;

    let message = classify_and_parse(&bytes).context("response did not classify")?;
    assert_eq!(
        message.kind(),
        MessageKind::Response(ResponsePayloadKind::Document)
    );
    assert_eq!(message, Message::Response(response));

    assert!(codec.parse_request(&bytes).is_none());
    assert!(codec.parse_error_response(&bytes).is_none());
    Ok(())
}

#[test]
fn writing_twice_yields_identical_bytes() -> Result<()> {
    let codec = EnvelopeCodec::default();
    let message = Message::from(document_response()?);
    let first = codec.write_message(&message)?;
    let second = codec.write_message(&message)?;
    assert_eq!(first, second);

    let reparsed = classify_and_parse(&first).context("did not parse")?;
    assert_eq!(codec.write_message(&reparsed)?, first);
    Ok(())
}

#[test]
fn unknown_and_tampered_documents_yield_none() -> Result<()> {
    let codec = EnvelopeCodec::default();
    assert!(codec.classify_and_parse(b"not a document").is_none());

    let bytes = codec.write_message(&Message::from(concept_request()?))?;
    let text = String::from_utf8(bytes)?;

    let unknown_slot = text.replacen("\"SpecificationIdentifier\"", "\"MadeUpSlot\"", 1);
    assert!(codec.classify_and_parse(unknown_slot.as_bytes()).is_none());
    assert!(codec.classify_and_parse(text.as_bytes()).is_some());
    Ok(())
}

#[test]
fn size_limit_applies_both_ways() -> Result<()> {
    let small = EnvelopeCodec::new(CodecConfig::default().with_max_document_bytes(64));
    let message = Message::from(concept_request()?);

    let err = small.write_message(&message).unwrap_err();
    assert!(matches!(err, CodecError::DocumentTooLarge { limit: 64, .. }));

    let bytes = EnvelopeCodec::default().write_message(&message)?;
    assert!(small.parse(&bytes).is_none());
    assert!(EnvelopeCodec::default().parse(&bytes).is_some());
    Ok(())
}
