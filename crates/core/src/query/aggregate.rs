//! Typed aggregation pipelines.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::criteria::FilterCriteria;
use super::pagination::{sort_document, SortKey};
use crate::entity::Document;

/// A group accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "field", rename_all = "camelCase")]
pub enum Accumulator {
    /// Number of documents in the group.
    Count,
    /// Sum of a numeric field.
    Sum(String),
}

impl Accumulator {
    fn to_value(&self) -> Value {
        match self {
            Accumulator::Count => json!({ "$sum": 1 }),
            Accumulator::Sum(field) => json!({ "$sum": format!("${field}") }),
        }
    }
}

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Match(FilterCriteria),
    Sort(Vec<SortKey>),
    Skip(u64),
    Limit(u64),
    /// Replaces the stream with `{ <name>: n }`.
    Count(String),
    /// Groups by a field (or everything when `by` is `None`).
    Group {
        by: Option<String>,
        accumulators: Vec<(String, Accumulator)>,
    },
}

impl Stage {
    fn to_document(&self) -> Document {
        let (name, body) = match self {
            Stage::Match(criteria) => ("$match", Value::Object(criteria.to_document())),
            Stage::Sort(keys) => ("$sort", Value::Object(sort_document(keys))),
            Stage::Skip(n) => ("$skip", Value::from(*n)),
            Stage::Limit(n) => ("$limit", Value::from(*n)),
            Stage::Count(output) => ("$count", Value::String(output.clone())),
            Stage::Group { by, accumulators } => {
                let mut group = Document::new();
                let id = match by {
                    Some(field) => Value::String(format!("${field}")),
                    None => Value::Null,
                };
                group.insert("_id".to_string(), id);
                for (output, accumulator) in accumulators {
                    group.insert(output.clone(), accumulator.to_value());
                }
                ("$group", Value::Object(group))
            }
        };

        let mut document = Document::new();
        document.insert(name.to_string(), body);
        document
    }

    fn reshapes(&self) -> bool {
        matches!(self, Stage::Count(_) | Stage::Group { .. })
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, criteria: FilterCriteria) -> Self {
        self.stages.push(Stage::Match(criteria));
        self
    }

    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.stages.push(Stage::Sort(keys));
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.stages.push(Stage::Skip(n));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    pub fn count(mut self, output: impl Into<String>) -> Self {
        self.stages.push(Stage::Count(output.into()));
        self
    }

    pub fn group<I, K>(mut self, by: Option<&str>, accumulators: I) -> Self
    where
        I: IntoIterator<Item = (K, Accumulator)>,
        K: Into<String>,
    {
        self.stages.push(Stage::Group {
            by: by.map(str::to_string),
            accumulators: accumulators
                .into_iter()
                .map(|(name, acc)| (name.into(), acc))
                .collect(),
        });
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Compiles every stage to the store's native stage document.
    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_document).collect()
    }

    /// Entity fields the pipeline reads.
    ///
    /// Only stages up to and including the first reshaping stage (`count` or
    /// `group`) see entity documents; names after that refer to outputs.
    pub fn entity_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        for stage in &self.stages {
            match stage {
                Stage::Match(criteria) => fields.extend(criteria.field_names()),
                Stage::Sort(keys) => fields.extend(keys.iter().map(|key| key.field.as_str())),
                Stage::Group { by, accumulators } => {
                    fields.extend(by.as_deref());
                    fields.extend(accumulators.iter().filter_map(|(_, acc)| match acc {
                        Accumulator::Sum(field) => Some(field.as_str()),
                        Accumulator::Count => None,
                    }));
                }
                Stage::Skip(_) | Stage::Limit(_) | Stage::Count(_) => {}
            }
            if stage.reshapes() {
                break;
            }
        }
        fields
    }

    /// Match-stage criteria that still apply to entity documents.
    pub fn entity_criteria(&self) -> impl Iterator<Item = &FilterCriteria> {
        self.stages
            .iter()
            .take_while(|stage| !stage.reshapes())
            .filter_map(|stage| match stage {
                Stage::Match(criteria) => Some(criteria),
                _ => None,
            })
    }
}
