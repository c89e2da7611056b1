//! Fields and checks shared by every message builder.

use crate::error::{EdmError, EdmResult};
use crate::slot::{DateTimeSlot, SlotComposer, SlotName, StringSlot};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Specification identifier stamped on messages unless the caller sets another.
pub const DEFAULT_SPECIFICATION_IDENTIFIER: &str = "oots-edm:v1.0";

/// Text in a given language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub lang: String,
    pub text: String,
}

impl LocalizedText {
    pub fn new(lang: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            text: text.into(),
        }
    }
}

/// A legal requirement the requested evidence fulfils.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<LocalizedText>,
}

impl Requirement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            names: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: LocalizedText) -> Self {
        self.names.push(name);
        self
    }
}

/// Envelope-level fields every builder carries.
#[derive(Debug, Clone, Default)]
pub struct CommonFields {
    pub specification_identifier: Option<String>,
    pub issue_date_time: Option<DateTime<Utc>>,
}

impl CommonFields {
    pub fn set_default_specification_identifier(&mut self) {
        self.specification_identifier = Some(DEFAULT_SPECIFICATION_IDENTIFIER.to_owned());
    }

    /// Current UTC time with millisecond precision.
    pub fn set_issue_date_time_now(&mut self) {
        self.issue_date_time = Some(Utc::now().trunc_subsecs(3));
    }

    pub(crate) fn require_specification_identifier(
        &self,
        message_kind: &'static str,
    ) -> EdmResult<String> {
        require_text(
            message_kind,
            "specification identifier",
            self.specification_identifier.as_deref(),
        )
        .map(str::to_owned)
    }

    pub(crate) fn require_issue_date_time(
        &self,
        message_kind: &'static str,
    ) -> EdmResult<DateTime<Utc>> {
        require(message_kind, "issue date time", self.issue_date_time)
    }
}

/// The checked common fields of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Stamp {
    pub specification_identifier: String,
    pub issue_date_time: DateTime<Utc>,
}

impl Stamp {
    pub(crate) fn add_slots(&self, composer: &mut SlotComposer) -> EdmResult<()> {
        composer
            .add(&StringSlot {
                name: SlotName::SpecificationIdentifier,
                value: &self.specification_identifier,
            })?
            .add(&DateTimeSlot {
                name: SlotName::IssueDateTime,
                value: self.issue_date_time,
            })?;
        Ok(())
    }
}

/// Fail with a consistency error if `value` is absent.
pub(crate) fn require<T>(
    message_kind: &'static str,
    field: &str,
    value: Option<T>,
) -> EdmResult<T> {
    value.ok_or_else(|| EdmError::inconsistent(message_kind, format!("{field} is missing")))
}

/// Like [`require`], also rejecting blank strings.
pub(crate) fn require_text<'a>(
    message_kind: &'static str,
    field: &str,
    value: Option<&'a str>,
) -> EdmResult<&'a str> {
    require(message_kind, field, value.filter(|v| !v.trim().is_empty()))
}

/// Fail with a consistency error if `items` is empty.
pub(crate) fn require_non_empty<T>(
    message_kind: &'static str,
    field: &str,
    items: &[T],
) -> EdmResult<()> {
    if items.is_empty() {
        return Err(EdmError::inconsistent(
            message_kind,
            format!("at least one {field} is required"),
        ));
    }
    Ok(())
}
