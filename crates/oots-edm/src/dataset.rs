//! Document metadata: datasets, distributions and repository item references.

use crate::party::Agent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A requested or returned representation of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Media type or format code, e.g. `application/pdf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
}

impl Distribution {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            document_type: None,
        }
    }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }
}

/// Metadata describing a returned document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Agent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            titles: vec![title.into()],
            descriptions: Vec::new(),
            distribution: None,
            creator: None,
            issued: None,
            last_modified: None,
        }
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = Some(distribution);
        self
    }

    pub fn with_creator(mut self, creator: Agent) -> Self {
        self.creator = Some(creator);
        self
    }
}

/// Pointer to the attachment holding the document bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryItemRef {
    pub title: String,
    pub link: String,
}

impl RepositoryItemRef {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}
