//! Slot protocol: named, typed extension values attached to envelopes.
//!
//! Every registered slot name is a [`SlotName`] variant. Writers compose
//! slots through a [`SlotComposer`], which rejects duplicate names and emits
//! top-level slots in allow-list order followed by the remaining slots in
//! insertion order. Readers resolve raw names per [`SlotLevel`], so a name
//! that is unknown, or known but misplaced, is rejected.

use crate::error::{EdmError, EdmResult};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every slot name the exchange data model knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotName {
    SpecificationIdentifier,
    IssueDateTime,
    Procedure,
    FullfillingOfRequirement,
    ConsentToken,
    DatasetIdentifier,
    DataConsumer,
    LegalPerson,
    NaturalPerson,
    AuthorizedRepresentative,
    ConceptRequestList,
    DistributionRequestList,
    Id,
    DataProvider,
    ConceptValues,
    DocumentMetadata,
    ErrorProvider,
    Timestamp,
    ErrorOrigin,
}

impl SlotName {
    pub const ALL: [SlotName; 19] = [
        Self::SpecificationIdentifier,
        Self::IssueDateTime,
        Self::Procedure,
        Self::FullfillingOfRequirement,
        Self::ConsentToken,
        Self::DatasetIdentifier,
        Self::DataConsumer,
        Self::LegalPerson,
        Self::NaturalPerson,
        Self::AuthorizedRepresentative,
        Self::ConceptRequestList,
        Self::DistributionRequestList,
        Self::Id,
        Self::DataProvider,
        Self::ConceptValues,
        Self::DocumentMetadata,
        Self::ErrorProvider,
        Self::Timestamp,
        Self::ErrorOrigin,
    ];

    /// The name as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SpecificationIdentifier => "SpecificationIdentifier",
            Self::IssueDateTime => "IssueDateTime",
            Self::Procedure => "Procedure",
            Self::FullfillingOfRequirement => "FullfillingOfRequirement",
            Self::ConsentToken => "ConsentToken",
            Self::DatasetIdentifier => "DatasetIdentifier",
            Self::DataConsumer => "DataConsumer",
            Self::LegalPerson => "LegalPerson",
            Self::NaturalPerson => "NaturalPerson",
            Self::AuthorizedRepresentative => "AuthorizedRepresentative",
            Self::ConceptRequestList => "ConceptRequestList",
            Self::DistributionRequestList => "DistributionRequestList",
            Self::Id => "id",
            Self::DataProvider => "DataProvider",
            Self::ConceptValues => "ConceptValues",
            Self::DocumentMetadata => "DocumentMetadata",
            Self::ErrorProvider => "ErrorProvider",
            Self::Timestamp => "Timestamp",
            Self::ErrorOrigin => "ErrorOrigin",
        }
    }

    /// Resolve a wire name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == name)
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotName {
    type Err = EdmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| EdmError::MalformedSlot {
            name: s.to_owned(),
            reason: "unregistered slot name".into(),
        })
    }
}

/// Slots that sit directly on a request envelope. Order is the emission order.
pub const REQUEST_TOP_LEVEL: &[SlotName] = &[
    SlotName::SpecificationIdentifier,
    SlotName::IssueDateTime,
    SlotName::Procedure,
    SlotName::FullfillingOfRequirement,
    SlotName::ConsentToken,
    SlotName::DatasetIdentifier,
];

/// Slots that sit directly on a response envelope.
pub const RESPONSE_TOP_LEVEL: &[SlotName] = &[
    SlotName::SpecificationIdentifier,
    SlotName::IssueDateTime,
    SlotName::DataProvider,
];

/// Slots that sit directly on an error response envelope.
pub const ERROR_RESPONSE_TOP_LEVEL: &[SlotName] =
    &[SlotName::SpecificationIdentifier, SlotName::ErrorProvider];

/// The place in an envelope a slot is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLevel {
    RequestTop,
    Query,
    ResponseTop,
    ErrorTop,
    RegistryObject,
    Exception,
}

impl SlotLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestTop => "request",
            Self::Query => "query",
            Self::ResponseTop => "response",
            Self::ErrorTop => "error response",
            Self::RegistryObject => "registry object",
            Self::Exception => "exception",
        }
    }

    /// Whether `name` may appear at this level.
    pub fn accepts(self, name: SlotName) -> bool {
        use SlotName::*;
        match self {
            Self::RequestTop => matches!(
                name,
                SpecificationIdentifier
                    | IssueDateTime
                    | Procedure
                    | FullfillingOfRequirement
                    | ConsentToken
                    | DatasetIdentifier
            ),
            Self::Query => matches!(
                name,
                DataConsumer
                    | LegalPerson
                    | NaturalPerson
                    | AuthorizedRepresentative
                    | ConceptRequestList
                    | DistributionRequestList
                    | Id
            ),
            Self::ResponseTop => {
                matches!(name, SpecificationIdentifier | IssueDateTime | DataProvider)
            }
            Self::ErrorTop => matches!(name, SpecificationIdentifier | ErrorProvider),
            Self::RegistryObject => matches!(name, ConceptValues | DocumentMetadata),
            Self::Exception => matches!(name, Timestamp | ErrorOrigin),
        }
    }

    /// Error for a registered name that a reader did not expect here.
    pub(crate) fn unexpected(self, name: SlotName) -> EdmError {
        EdmError::UnexpectedSlot {
            level: self.as_str(),
            name: name.as_str().to_owned(),
        }
    }

    /// Resolve a raw slot name read from an envelope at this level.
    pub fn resolve(self, raw: &str) -> EdmResult<SlotName> {
        SlotName::from_name(raw)
            .filter(|name| self.accepts(*name))
            .ok_or_else(|| EdmError::UnexpectedSlot {
                level: self.as_str(),
                name: raw.to_owned(),
            })
    }
}

/// The typed value carried by a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    String(String),
    DateTime(DateTime<Utc>),
    /// A nested, self-describing document fragment.
    Fragment(serde_json::Value),
    Collection(Vec<SlotValue>),
}

impl SlotValue {
    /// Serialize a sub-model into a fragment value.
    pub fn fragment_of<T: Serialize>(value: &T) -> EdmResult<Self> {
        serde_json::to_value(value)
            .map(Self::Fragment)
            .map_err(|e| EdmError::Fragment(e.to_string()))
    }

    /// Serialize a list of sub-models into a collection of fragments.
    pub fn fragment_list_of<T: Serialize>(values: &[T]) -> EdmResult<Self> {
        values
            .iter()
            .map(Self::fragment_of)
            .collect::<EdmResult<Vec<_>>>()
            .map(Self::Collection)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_fragment(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Fragment(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[SlotValue]> {
        match self {
            Self::Collection(items) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn expect_str(&self, name: SlotName) -> EdmResult<String> {
        self.as_str()
            .map(str::to_owned)
            .ok_or_else(|| EdmError::malformed(name.as_str(), "expected a string value"))
    }

    pub(crate) fn expect_date_time(&self, name: SlotName) -> EdmResult<DateTime<Utc>> {
        self.as_date_time()
            .ok_or_else(|| EdmError::malformed(name.as_str(), "expected a date time value"))
    }

    /// Decode a fragment slot back into a sub-model.
    pub fn decode_fragment<T: DeserializeOwned>(&self, name: SlotName) -> EdmResult<T> {
        let fragment = self
            .as_fragment()
            .ok_or_else(|| EdmError::malformed(name.as_str(), "expected a fragment value"))?;
        serde_json::from_value(fragment.clone())
            .map_err(|e| EdmError::malformed(name.as_str(), e.to_string()))
    }

    /// Decode a collection of fragments back into sub-models, keeping order.
    pub fn decode_fragment_list<T: DeserializeOwned>(&self, name: SlotName) -> EdmResult<Vec<T>> {
        self.as_collection()
            .ok_or_else(|| EdmError::malformed(name.as_str(), "expected a collection value"))?
            .iter()
            .map(|item| item.decode_fragment(name))
            .collect()
    }
}

/// A single named slot as it appears in an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    pub value: SlotValue,
}

impl Slot {
    pub fn new(name: SlotName, value: SlotValue) -> Self {
        Self {
            name: name.as_str().to_owned(),
            value,
        }
    }
}

/// Ordered set of slots with unique names.
///
/// Equality is order-sensitive. Serialized as a list so duplicate names in a
/// parsed document are detected instead of silently overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Slot>", into = "Vec<Slot>")]
pub struct SlotMap(IndexMap<String, SlotValue>);

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slot, failing if its name is already present.
    pub fn insert(&mut self, slot: Slot) -> EdmResult<()> {
        if self.0.contains_key(&slot.name) {
            return Err(EdmError::SlotCollision(slot.name));
        }
        self.0.insert(slot.name, slot.value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SlotValue> {
        self.0.get(name)
    }

    pub fn get_named(&self, name: SlotName) -> Option<&SlotValue> {
        self.0.get(name.as_str())
    }

    pub fn contains(&self, name: SlotName) -> bool {
        self.0.contains_key(name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl PartialEq for SlotMap {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().eq(other.0.iter())
    }
}

impl TryFrom<Vec<Slot>> for SlotMap {
    type Error = EdmError;

    fn try_from(slots: Vec<Slot>) -> Result<Self, Self::Error> {
        let mut map = Self::new();
        for slot in slots {
            map.insert(slot)?;
        }
        Ok(map)
    }
}

impl From<SlotMap> for Vec<Slot> {
    fn from(map: SlotMap) -> Self {
        map.0
            .into_iter()
            .map(|(name, value)| Slot { name, value })
            .collect()
    }
}

/// Anything that can contribute one named slot to an envelope.
pub trait SlotProvider {
    /// Stable unique key of the produced slot.
    fn name(&self) -> SlotName;

    fn to_value(&self) -> EdmResult<SlotValue>;

    fn to_slot(&self) -> EdmResult<Slot> {
        Ok(Slot::new(self.name(), self.to_value()?))
    }
}

/// A plain string slot.
#[derive(Debug, Clone)]
pub struct StringSlot<'a> {
    pub name: SlotName,
    pub value: &'a str,
}

impl SlotProvider for StringSlot<'_> {
    fn name(&self) -> SlotName {
        self.name
    }

    fn to_value(&self) -> EdmResult<SlotValue> {
        Ok(SlotValue::String(self.value.to_owned()))
    }
}

/// A timestamp slot.
#[derive(Debug, Clone)]
pub struct DateTimeSlot {
    pub name: SlotName,
    pub value: DateTime<Utc>,
}

impl SlotProvider for DateTimeSlot {
    fn name(&self) -> SlotName {
        self.name
    }

    fn to_value(&self) -> EdmResult<SlotValue> {
        Ok(SlotValue::DateTime(self.value))
    }
}

/// A single sub-model carried as a fragment.
#[derive(Debug, Clone)]
pub struct FragmentSlot<'a, T> {
    pub name: SlotName,
    pub value: &'a T,
}

impl<T: Serialize> SlotProvider for FragmentSlot<'_, T> {
    fn name(&self) -> SlotName {
        self.name
    }

    fn to_value(&self) -> EdmResult<SlotValue> {
        SlotValue::fragment_of(self.value)
    }
}

/// An ordered list of sub-models carried as a collection of fragments.
#[derive(Debug, Clone)]
pub struct FragmentListSlot<'a, T> {
    pub name: SlotName,
    pub values: &'a [T],
}

impl<T: Serialize> SlotProvider for FragmentListSlot<'_, T> {
    fn name(&self) -> SlotName {
        self.name
    }

    fn to_value(&self) -> EdmResult<SlotValue> {
        SlotValue::fragment_list_of(self.values)
    }
}

/// Collects slot providers for one envelope and splits them into levels.
#[derive(Debug)]
pub struct SlotComposer {
    top_level: &'static [SlotName],
    slots: IndexMap<SlotName, SlotValue>,
}

impl SlotComposer {
    pub fn new(top_level: &'static [SlotName]) -> Self {
        Self {
            top_level,
            slots: IndexMap::new(),
        }
    }

    /// Add a provider. A name that was already added is a caller error.
    pub fn add(&mut self, provider: &dyn SlotProvider) -> EdmResult<&mut Self> {
        let name = provider.name();
        if self.slots.contains_key(&name) {
            return Err(EdmError::SlotCollision(name.as_str().to_owned()));
        }
        let value = provider.to_value()?;
        self.slots.insert(name, value);
        Ok(self)
    }

    /// Add a provider only when one is present.
    pub fn add_opt(&mut self, provider: Option<&dyn SlotProvider>) -> EdmResult<&mut Self> {
        match provider {
            Some(provider) => self.add(provider),
            None => Ok(self),
        }
    }

    /// Split into `(top_level, rest)`: top-level slots in allow-list order,
    /// the rest in insertion order.
    pub fn finish(mut self) -> (SlotMap, SlotMap) {
        let mut top = IndexMap::new();
        for name in self.top_level {
            if let Some(value) = self.slots.shift_remove(name) {
                top.insert(name.as_str().to_owned(), value);
            }
        }
        let rest = self
            .slots
            .into_iter()
            .map(|(name, value)| (name.as_str().to_owned(), value))
            .collect();
        (SlotMap(top), SlotMap(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_resolves_back() {
        for name in SlotName::ALL {
            assert_eq!(SlotName::from_name(name.as_str()), Some(name));
        }
        assert_eq!(SlotName::from_name("NoSuchSlot"), None);
        assert_eq!("id".parse::<SlotName>(), Ok(SlotName::Id));
        assert!(matches!(
            "Id".parse::<SlotName>(),
            Err(EdmError::MalformedSlot { .. })
        ));
    }

    #[test]
    fn allow_lists_match_level_dispatch() {
        for name in SlotName::ALL {
            assert_eq!(
                REQUEST_TOP_LEVEL.contains(&name),
                SlotLevel::RequestTop.accepts(name)
            );
            assert_eq!(
                RESPONSE_TOP_LEVEL.contains(&name),
                SlotLevel::ResponseTop.accepts(name)
            );
            assert_eq!(
                ERROR_RESPONSE_TOP_LEVEL.contains(&name),
                SlotLevel::ErrorTop.accepts(name)
            );
        }
    }

    #[test]
    fn resolve_rejects_misplaced_and_unknown_names() {
        assert_eq!(
            SlotLevel::Query.resolve("ConceptRequestList"),
            Ok(SlotName::ConceptRequestList)
        );
        let misplaced = SlotLevel::RequestTop.resolve("DataConsumer").unwrap_err();
        assert!(matches!(misplaced, EdmError::UnexpectedSlot { level: "request", .. }));
        assert!(SlotLevel::Exception.resolve("Whatever").is_err());
    }

    #[test]
    fn composer_orders_top_level_by_allow_list() {
        let mut composer = SlotComposer::new(REQUEST_TOP_LEVEL);
        composer
            .add(&StringSlot {
                name: SlotName::Id,
                value: "doc-1",
            })
            .unwrap()
            .add(&StringSlot {
                name: SlotName::ConsentToken,
                value: "token",
            })
            .unwrap()
            .add(&StringSlot {
                name: SlotName::SpecificationIdentifier,
                value: "spec",
            })
            .unwrap()
            .add(&StringSlot {
                name: SlotName::DataConsumer,
                value: "consumer",
            })
            .unwrap();

        let (top, query) = composer.finish();
        assert_eq!(
            top.names().collect::<Vec<_>>(),
            vec!["SpecificationIdentifier", "ConsentToken"]
        );
        assert_eq!(query.names().collect::<Vec<_>>(), vec!["id", "DataConsumer"]);
    }

    #[test]
    fn composer_rejects_duplicate_names() {
        let mut composer = SlotComposer::new(REQUEST_TOP_LEVEL);
        let slot = StringSlot {
            name: SlotName::ConsentToken,
            value: "a",
        };
        composer.add(&slot).unwrap();
        let err = composer.add(&slot).unwrap_err();
        assert_eq!(err, EdmError::SlotCollision("ConsentToken".into()));
    }

    #[test]
    fn slot_map_equality_is_order_sensitive() {
        let a = SlotMap::try_from(vec![
            Slot::new(SlotName::Id, SlotValue::String("1".into())),
            Slot::new(SlotName::ConsentToken, SlotValue::String("2".into())),
        ])
        .unwrap();
        let b = SlotMap::try_from(vec![
            Slot::new(SlotName::ConsentToken, SlotValue::String("2".into())),
            Slot::new(SlotName::Id, SlotValue::String("1".into())),
        ])
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn slot_map_deserialization_rejects_duplicates() {
        let json = r#"[
            {"name":"id","value":{"type":"string","value":"a"}},
            {"name":"id","value":{"type":"string","value":"b"}}
        ]"#;
        assert!(serde_json::from_str::<SlotMap>(json).is_err());
    }

    #[test]
    fn fragment_list_decodes_in_order() {
        let value = SlotValue::fragment_list_of(&["a".to_owned(), "b".to_owned()]).unwrap();
        let back: Vec<String> = value
            .decode_fragment_list(SlotName::ConceptRequestList)
            .unwrap();
        assert_eq!(back, vec!["a", "b"]);
    }

    #[test]
    fn wrong_value_type_is_malformed() {
        let err = SlotValue::String("x".into())
            .expect_date_time(SlotName::IssueDateTime)
            .unwrap_err();
        assert!(matches!(err, EdmError::MalformedSlot { .. }));
    }
}
