//! Concept tree: recursive named values carrying arbitrary structured facts.
//!
//! A request lists the concepts it wants; a concept response returns the
//! same shape with values filled in. Nodes own their children, so a tree is
//! always finite and acyclic. Traversal and editing are iterative.
//!
//! Builders accept a tree only if [`ConceptNode::check`] passes: numbers must
//! be finite, periods must not end before they start, and no node may sit
//! deeper than [`MAX_CONCEPT_DEPTH`].

use crate::error::{EdmError, EdmResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest node depth a carried tree may have; the root is depth 0.
///
/// A concept sits several levels inside its envelope and every tree level
/// adds two levels of document nesting, which the document parser caps at 128.
pub const MAX_CONCEPT_DEPTH: usize = 48;

const MESSAGE_KIND: &str = "concept";

/// Namespace-qualified concept name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local)
    }
}

/// The value of a concept. Exactly one kind at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConceptValue {
    Identifier(String),
    Amount { value: f64, currency: String },
    Code(String),
    Date(NaiveDate),
    Indicator(bool),
    Measure { value: f64, unit: String },
    Numeric(f64),
    Period { start: NaiveDateTime, end: NaiveDateTime },
    Quantity { value: f64, unit: String },
    Text(Vec<String>),
    Time(NaiveTime),
    Uri(String),
    ErrorCode(String),
}

impl ConceptValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(vec![value.into()])
    }

    pub fn numeric(value: impl Into<f64>) -> Self {
        Self::Numeric(value.into())
    }

    pub fn amount(value: f64, currency: impl Into<String>) -> Self {
        Self::Amount {
            value,
            currency: currency.into(),
        }
    }

    pub fn measure(value: f64, unit: impl Into<String>) -> Self {
        Self::Measure {
            value,
            unit: unit.into(),
        }
    }

    pub fn quantity(value: f64, unit: impl Into<String>) -> Self {
        Self::Quantity {
            value,
            unit: unit.into(),
        }
    }

    /// Reject values that cannot be written and read back unchanged.
    pub fn check(&self) -> EdmResult<()> {
        match self {
            Self::Amount { value, .. }
            | Self::Measure { value, .. }
            | Self::Numeric(value)
            | Self::Quantity { value, .. }
                if !value.is_finite() =>
            {
                Err(EdmError::inconsistent(
                    MESSAGE_KIND,
                    format!("{} value {value} is not finite", self.kind_name()),
                ))
            }
            Self::Period { start, end } if start > end => Err(EdmError::inconsistent(
                MESSAGE_KIND,
                format!("period ends at {end}, before it starts at {start}"),
            )),
            _ => Ok(()),
        }
    }

    /// Short name of the value kind, as used on the wire.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Identifier(_) => "identifier",
            Self::Amount { .. } => "amount",
            Self::Code(_) => "code",
            Self::Date(_) => "date",
            Self::Indicator(_) => "indicator",
            Self::Measure { .. } => "measure",
            Self::Numeric(_) => "numeric",
            Self::Period { .. } => "period",
            Self::Quantity { .. } => "quantity",
            Self::Text(_) => "text",
            Self::Time(_) => "time",
            Self::Uri(_) => "uri",
            Self::ErrorCode(_) => "error_code",
        }
    }
}

/// A node of the concept tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<QName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConceptValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ConceptNode>,
}

impl ConceptNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            name: Some(QName::new(namespace, local)),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, value: ConceptValue) -> Self {
        self.set_value(value);
        self
    }

    pub fn with_child(mut self, child: ConceptNode) -> Self {
        self.children.push(child);
        self
    }

    /// Replace the current value, whatever kind it was.
    pub fn set_value(&mut self, value: ConceptValue) {
        self.value = Some(value);
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    pub fn add_child(&mut self, child: ConceptNode) {
        self.children.push(child);
    }

    /// Pre-order depth-first iterator yielding `(depth, node)`; the root is depth 0.
    pub fn iter(&self) -> ConceptIter<'_> {
        ConceptIter {
            stack: vec![(0, self)],
        }
    }

    /// Visit every node once in pre-order.
    pub fn visit<F>(&self, mut callback: F)
    where
        F: FnMut(usize, &ConceptNode),
    {
        for (depth, node) in self.iter() {
            callback(depth, node);
        }
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Depth of the deepest node; a leaf root has depth 0.
    pub fn max_depth(&self) -> usize {
        self.iter().map(|(depth, _)| depth).max().unwrap_or(0)
    }

    /// Check every value in the tree and the tree depth.
    pub fn check(&self) -> EdmResult<()> {
        for (depth, node) in self.iter() {
            if depth > MAX_CONCEPT_DEPTH {
                return Err(EdmError::inconsistent(
                    MESSAGE_KIND,
                    format!("tree is deeper than {MAX_CONCEPT_DEPTH} levels"),
                ));
            }
            if let Some(value) = &node.value {
                value.check()?;
            }
        }
        Ok(())
    }

    /// Build a new tree, calling `editor` on every copied node bottom-up.
    ///
    /// Children are rebuilt and edited before their parent, so the editor
    /// sees already-edited children when it reaches a parent.
    pub fn clone_with_edits<F>(&self, mut editor: F) -> ConceptNode
    where
        F: FnMut(&mut ConceptNode),
    {
        // Each frame is a source node and its already edited children.
        let mut stack: Vec<(&ConceptNode, Vec<ConceptNode>)> = vec![(self, Vec::new())];
        let mut edited_root = None;
        while let Some(&(source, ref built)) = stack.last() {
            if let Some(child) = source.children.get(built.len()) {
                stack.push((child, Vec::with_capacity(child.children.len())));
                continue;
            }
            let children = stack.pop().map(|(_, built)| built).unwrap_or_default();
            let mut node = ConceptNode {
                id: source.id.clone(),
                name: source.name.clone(),
                value: source.value.clone(),
                children,
            };
            editor(&mut node);
            match stack.last_mut() {
                Some((_, siblings)) => siblings.push(node),
                None => edited_root = Some(node),
            }
        }
        edited_root.unwrap_or_default()
    }
}

/// Iterator returned by [`ConceptNode::iter`].
#[derive(Debug)]
pub struct ConceptIter<'a> {
    stack: Vec<(usize, &'a ConceptNode)>,
}

impl<'a> Iterator for ConceptIter<'a> {
    type Item = (usize, &'a ConceptNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}
