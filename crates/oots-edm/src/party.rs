//! Parties taking part in an exchange: agents, data subjects and their addresses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub town: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// ISO 3166-1 alpha-2 code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// An organisation acting as data consumer, data provider or error provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub id_scheme: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        id_scheme: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            id_scheme: id_scheme.into(),
            name: name.into(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }
}

/// A company or other legal entity the request is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalPerson {
    pub legal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_id_scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl LegalPerson {
    pub fn new(legal_id: impl Into<String>) -> Self {
        Self {
            legal_id: legal_id.into(),
            legal_id_scheme: None,
            legal_name: None,
            address: None,
        }
    }

    pub fn with_name(mut self, legal_name: impl Into<String>) -> Self {
        self.legal_name = Some(legal_name.into());
        self
    }
}

/// A human being the request is about, or who represents the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NaturalPerson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    pub family_name: String,
    pub given_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl NaturalPerson {
    pub fn new(family_name: impl Into<String>, given_name: impl Into<String>) -> Self {
        Self {
            person_id: None,
            family_name: family_name.into(),
            given_name: given_name.into(),
            birth_date: None,
            address: None,
        }
    }

    pub fn with_person_id(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }
}

/// The entity a request asks information about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSubject {
    LegalPerson(LegalPerson),
    NaturalPerson(NaturalPerson),
}
