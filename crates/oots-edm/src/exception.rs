//! Exception registry and the exception records carried by error responses.
//!
//! The registry is a closed, static table. Writing goes kind → constructor,
//! reading goes registered type name → kind. A type name that matches no
//! entry is an error and is never mapped to a default kind.

use crate::common::{require, require_text};
use crate::envelope::{ErrorSeverity, RawException};
use crate::error::{EdmError, EdmResult};
use crate::slot::{DateTimeSlot, SlotLevel, SlotName, SlotProvider, StringSlot};
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;

/// The kind of a registry exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Authentication,
    Authorization,
    InvalidRequest,
    ObjectExists,
    ObjectNotFound,
    QuotaExceeded,
    ReferencesExist,
    Timeout,
    UnresolvedReference,
    UnsupportedCapability,
    /// The plain registry exception with no more specific kind.
    Generic,
}

/// One row of the exception registry.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionRegistration {
    pub kind: ExceptionKind,
    pub type_name: &'static str,
    pub construct: fn() -> RawException,
}

macro_rules! registration {
    ($kind:ident, $type_name:literal) => {
        ExceptionRegistration {
            kind: ExceptionKind::$kind,
            type_name: $type_name,
            construct: || RawException::of_type($type_name),
        }
    };
}

/// Every registered exception kind, in declaration order.
pub static REGISTRY: [ExceptionRegistration; 11] = [
    registration!(Authentication, "rs:AuthenticationExceptionType"),
    registration!(Authorization, "rs:AuthorizationExceptionType"),
    registration!(InvalidRequest, "rs:InvalidRequestExceptionType"),
    registration!(ObjectExists, "rs:ObjectExistsExceptionType"),
    registration!(ObjectNotFound, "rs:ObjectNotFoundExceptionType"),
    registration!(QuotaExceeded, "rs:QuotaExceededExceptionType"),
    registration!(ReferencesExist, "rs:ReferencesExistExceptionType"),
    registration!(Timeout, "rs:TimeoutExceptionType"),
    registration!(UnresolvedReference, "rs:UnresolvedReferenceExceptionType"),
    registration!(UnsupportedCapability, "rs:UnsupportedCapabilityExceptionType"),
    registration!(Generic, "rs:RegistryExceptionType"),
];

impl ExceptionKind {
    // Rows are declared in variant order.
    fn registration(self) -> &'static ExceptionRegistration {
        &REGISTRY[self as usize]
    }

    pub fn type_name(self) -> &'static str {
        self.registration().type_name
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Kind registered for `type_name`; first match in declaration order.
pub fn lookup_by_type(type_name: &str) -> Option<ExceptionKind> {
    REGISTRY
        .iter()
        .find(|row| row.type_name == type_name)
        .map(|row| row.kind)
}

/// A fresh generic exception record of the given kind.
pub fn construct(kind: ExceptionKind) -> RawException {
    (kind.registration().construct)()
}

/// Where in the exchange an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    RequestSubmission,
    RequestReception,
    ResponseCreation,
    ResponseReception,
}

impl ErrorOrigin {
    pub const ALL: [ErrorOrigin; 4] = [
        Self::RequestSubmission,
        Self::RequestReception,
        Self::ResponseCreation,
        Self::ResponseReception,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestSubmission => "REQUEST_SUBMISSION",
            Self::RequestReception => "REQUEST_RECEPTION",
            Self::ResponseCreation => "RESPONSE_CREATION",
            Self::ResponseReception => "RESPONSE_RECEPTION",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|origin| origin.as_str() == name)
    }
}

/// A single exception reported by an error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    kind: ExceptionKind,
    severity: ErrorSeverity,
    message: String,
    detail: Option<String>,
    code: Option<String>,
    timestamp: DateTime<Utc>,
    origin: Option<ErrorOrigin>,
}

impl ExceptionRecord {
    pub fn builder() -> ExceptionRecordBuilder {
        ExceptionRecordBuilder::default()
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn origin(&self) -> Option<ErrorOrigin> {
        self.origin
    }

    /// Lay this record onto a fresh generic exception.
    pub fn to_raw(&self) -> EdmResult<RawException> {
        let mut raw = construct(self.kind);
        raw.severity = self.severity;
        raw.message = self.message.clone();
        raw.detail = self.detail.clone();
        raw.code = self.code.clone();
        raw.slots.insert(
            DateTimeSlot {
                name: SlotName::Timestamp,
                value: self.timestamp,
            }
            .to_slot()?,
        )?;
        if let Some(origin) = self.origin {
            raw.slots.insert(
                StringSlot {
                    name: SlotName::ErrorOrigin,
                    value: origin.as_str(),
                }
                .to_slot()?,
            )?;
        }
        Ok(raw)
    }

    /// Recover a record from a generic exception.
    pub fn from_raw(raw: &RawException) -> EdmResult<Self> {
        let kind = lookup_by_type(&raw.type_name)
            .ok_or_else(|| EdmError::ExceptionTagLookupMiss(raw.type_name.clone()))?;

        let mut builder = Self::builder();
        builder
            .kind(kind)
            .severity(raw.severity)
            .message(raw.message.clone());
        if let Some(detail) = &raw.detail {
            builder.detail(detail.clone());
        }
        if let Some(code) = &raw.code {
            builder.code(code.clone());
        }

        for (raw_name, value) in raw.slots.iter() {
            match SlotLevel::Exception.resolve(raw_name)? {
                SlotName::Timestamp => {
                    builder.timestamp(value.expect_date_time(SlotName::Timestamp)?);
                }
                SlotName::ErrorOrigin => {
                    let name = value.expect_str(SlotName::ErrorOrigin)?;
                    let origin = ErrorOrigin::from_name(&name).ok_or_else(|| {
                        EdmError::malformed(SlotName::ErrorOrigin.as_str(), name.clone())
                    })?;
                    builder.origin(origin);
                }
                other => return Err(SlotLevel::Exception.unexpected(other)),
            }
        }
        builder.build()
    }
}

/// Staging area for an [`ExceptionRecord`].
#[derive(Debug, Clone, Default)]
pub struct ExceptionRecordBuilder {
    kind: Option<ExceptionKind>,
    severity: Option<ErrorSeverity>,
    message: Option<String>,
    detail: Option<String>,
    code: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    origin: Option<ErrorOrigin>,
}

impl ExceptionRecordBuilder {
    pub fn kind(&mut self, kind: ExceptionKind) -> &mut Self {
        self.kind = Some(kind);
        self
    }

    pub fn severity(&mut self, severity: ErrorSeverity) -> &mut Self {
        self.severity = Some(severity);
        self
    }

    pub fn message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }

    pub fn detail(&mut self, detail: impl Into<String>) -> &mut Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn code(&mut self, code: impl Into<String>) -> &mut Self {
        self.code = Some(code.into());
        self
    }

    pub fn timestamp(&mut self, timestamp: DateTime<Utc>) -> &mut Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Current UTC time with millisecond precision.
    pub fn timestamp_now(&mut self) -> &mut Self {
        self.timestamp(Utc::now().trunc_subsecs(3))
    }

    pub fn origin(&mut self, origin: ErrorOrigin) -> &mut Self {
        self.origin = Some(origin);
        self
    }

    pub fn check_consistency(&self) -> EdmResult<()> {
        self.build().map(|_| ())
    }

    pub fn build(&self) -> EdmResult<ExceptionRecord> {
        const KIND: &str = "exception";
        Ok(ExceptionRecord {
            kind: require(KIND, "exception kind", self.kind)?,
            severity: require(KIND, "severity", self.severity)?,
            message: require_text(KIND, "error message", self.message.as_deref())?.to_owned(),
            detail: self.detail.clone(),
            code: self.code.clone(),
            timestamp: require(KIND, "timestamp", self.timestamp)?,
            origin: self.origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn every_kind_roundtrips_through_its_type_name() {
        for row in &REGISTRY {
            assert_eq!(lookup_by_type(row.type_name), Some(row.kind));
            assert_eq!(row.kind.type_name(), row.type_name);
            assert_eq!(construct(row.kind).type_name, row.type_name);
        }
    }

    #[test]
    fn registry_rows_follow_variant_order() {
        for (index, row) in REGISTRY.iter().enumerate() {
            assert_eq!(row.kind as usize, index);
        }
    }

    #[test]
    fn registered_type_names_do_not_overlap() {
        let mut names: Vec<_> = REGISTRY.iter().map(|row| row.type_name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), REGISTRY.len());
    }

    #[test]
    fn unknown_type_name_is_a_lookup_miss() {
        assert_eq!(lookup_by_type("rs:SomethingElseType"), None);
        let raw = RawException::of_type("rs:SomethingElseType");
        let err = ExceptionRecord::from_raw(&raw).unwrap_err();
        assert_eq!(
            err,
            EdmError::ExceptionTagLookupMiss("rs:SomethingElseType".into())
        );
    }

    #[test]
    fn record_roundtrips_through_raw_exception() {
        let record = ExceptionRecord::builder()
            .kind(ExceptionKind::Timeout)
            .severity(ErrorSeverity::Failure)
            .message("provider did not answer")
            .detail("waited 30s")
            .code("DP_ELE_01")
            .timestamp(fixed_time())
            .origin(ErrorOrigin::ResponseCreation)
            .build()
            .unwrap();

        let raw = record.to_raw().unwrap();
        assert_eq!(raw.type_name, "rs:TimeoutExceptionType");
        assert_eq!(raw.slots.names().collect::<Vec<_>>(), vec!["Timestamp", "ErrorOrigin"]);
        assert_eq!(ExceptionRecord::from_raw(&raw).unwrap(), record);
    }

    #[test]
    fn builder_requires_timestamp_and_message() {
        let mut builder = ExceptionRecord::builder();
        builder
            .kind(ExceptionKind::ObjectNotFound)
            .severity(ErrorSeverity::Warning);
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("error message"));

        builder.message("   ");
        let err = builder.check_consistency().unwrap_err();
        assert_eq!(
            err,
            EdmError::inconsistent("exception", "error message is missing")
        );

        builder.message("not found");
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("timestamp"));

        builder.timestamp_now();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn misplaced_slot_on_exception_is_rejected() {
        let mut raw = construct(ExceptionKind::Generic);
        raw.message = "boom".into();
        raw.slots
            .insert(
                StringSlot {
                    name: SlotName::ConsentToken,
                    value: "x",
                }
                .to_slot()
                .unwrap(),
            )
            .unwrap();
        let err = ExceptionRecord::from_raw(&raw).unwrap_err();
        assert!(matches!(err, EdmError::UnexpectedSlot { .. }));
    }
}
