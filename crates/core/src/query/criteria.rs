//! Filter criteria and their compilation to the store's native filter shape.
//!
//! Criteria hold at most one predicate per `(field, predicate kind)` pair.
//! Inserting a predicate of a kind the field already has replaces it in
//! place, so repeated builder calls never AND-stack contradictory filters.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::entity::Document;

/// Bounds of a range predicate. Each bound is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl Range {
    /// Inclusive range `[from, to]`.
    pub fn between(from: Value, to: Value) -> Self {
        Self {
            gte: Some(from),
            lte: Some(to),
            ..Self::default()
        }
    }

    /// Overwrites the bounds present in `other`, keeping the rest.
    pub fn merge(&mut self, other: Range) {
        if other.gt.is_some() {
            self.gt = other.gt;
        }
        if other.gte.is_some() {
            self.gte = other.gte;
        }
        if other.lt.is_some() {
            self.lt = other.lt;
        }
        if other.lte.is_some() {
            self.lte = other.lte;
        }
    }

    fn write_operators(&self, target: &mut Document) {
        for (operator, bound) in [
            ("$gt", &self.gt),
            ("$gte", &self.gte),
            ("$lt", &self.lt),
            ("$lte", &self.lte),
        ] {
            if let Some(value) = bound {
                target.insert(operator.to_string(), value.clone());
            }
        }
    }
}

/// A single condition on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Range(Range),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Regex {
        pattern: String,
        case_insensitive: bool,
    },
    Exists(bool),
}

/// Discriminant of [`Predicate`], the unit of last-write-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    Eq,
    Ne,
    Range,
    In,
    NotIn,
    Regex,
    Exists,
}

impl Predicate {
    pub fn kind(&self) -> PredicateKind {
        match self {
            Predicate::Eq(_) => PredicateKind::Eq,
            Predicate::Ne(_) => PredicateKind::Ne,
            Predicate::Range(_) => PredicateKind::Range,
            Predicate::In(_) => PredicateKind::In,
            Predicate::NotIn(_) => PredicateKind::NotIn,
            Predicate::Regex { .. } => PredicateKind::Regex,
            Predicate::Exists(_) => PredicateKind::Exists,
        }
    }

    fn write_operators(&self, target: &mut Document) {
        match self {
            Predicate::Eq(value) => {
                target.insert("$eq".to_string(), value.clone());
            }
            Predicate::Ne(value) => {
                target.insert("$ne".to_string(), value.clone());
            }
            Predicate::Range(range) => range.write_operators(target),
            Predicate::In(values) => {
                target.insert("$in".to_string(), Value::Array(values.clone()));
            }
            Predicate::NotIn(values) => {
                target.insert("$nin".to_string(), Value::Array(values.clone()));
            }
            Predicate::Regex {
                pattern,
                case_insensitive,
            } => {
                target.insert("$regex".to_string(), Value::String(pattern.clone()));
                if *case_insensitive {
                    target.insert("$options".to_string(), Value::String("i".to_string()));
                }
            }
            Predicate::Exists(exists) => {
                target.insert("$exists".to_string(), Value::Bool(*exists));
            }
        }
    }
}

/// A predicate bound to a field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub field: String,
    pub predicate: Predicate,
}

/// Ordered, AND-composed set of field predicates plus optional OR-groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    clauses: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    any_of: Vec<Vec<Clause>>,
}

impl FilterCriteria {
    /// Criteria matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality criteria from untyped `(field, value)` pairs.
    ///
    /// Field names are not checked here; repositories validate them against
    /// the entity before the store is touched.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut criteria = Self::new();
        for (field, value) in pairs {
            criteria.set(field, Predicate::Eq(value));
        }
        criteria
    }

    /// Sets `predicate` on `field`, replacing a predicate of the same kind.
    pub fn set(&mut self, field: impl Into<String>, predicate: Predicate) {
        let field = field.into();
        let kind = predicate.kind();
        match self
            .clauses
            .iter_mut()
            .find(|clause| clause.field == field && clause.predicate.kind() == kind)
        {
            Some(existing) => existing.predicate = predicate,
            None => self.clauses.push(Clause { field, predicate }),
        }
    }

    /// Merges range bounds into the field's range predicate.
    pub fn merge_range(&mut self, field: impl Into<String>, range: Range) {
        let field = field.into();
        let existing = self
            .clauses
            .iter_mut()
            .find_map(|clause| match &mut clause.predicate {
                Predicate::Range(current) if clause.field == field => Some(current),
                _ => None,
            });
        match existing {
            Some(current) => current.merge(range),
            None => self.clauses.push(Clause {
                field,
                predicate: Predicate::Range(range),
            }),
        }
    }

    /// Adds an OR-group. A group over the same fields as an existing group
    /// replaces it.
    pub fn set_any_of(&mut self, group: Vec<Clause>) {
        if group.is_empty() {
            return;
        }
        let fields: Vec<&str> = group.iter().map(|c| c.field.as_str()).collect();
        let position = self.any_of.iter().position(|existing| {
            existing.len() == fields.len()
                && existing
                    .iter()
                    .zip(fields.iter())
                    .all(|(clause, field)| clause.field == *field)
        });
        match position {
            Some(index) => self.any_of[index] = group,
            None => self.any_of.push(group),
        }
    }

    /// Removes every predicate on `field`.
    pub fn remove(&mut self, field: &str) {
        self.clauses.retain(|clause| clause.field != field);
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn any_of(&self) -> &[Vec<Clause>] {
        &self.any_of
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.any_of.is_empty()
    }

    /// Every field name referenced, OR-groups included.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.clauses
            .iter()
            .chain(self.any_of.iter().flatten())
            .map(|clause| clause.field.as_str())
    }

    /// Every clause, OR-groups included.
    pub fn all_clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().chain(self.any_of.iter().flatten())
    }

    /// Compiles to the store's native filter document.
    ///
    /// A field whose only predicate is equality compiles to the bare value;
    /// anything else compiles to an operator object (`$gte`, `$in`, ...).
    /// One OR-group becomes `$or`, several become `$and` of `$or`s.
    pub fn to_document(&self) -> Document {
        let mut document = compile_clauses(&self.clauses);

        let mut groups: Vec<Value> = self
            .any_of
            .iter()
            .map(|group| {
                let alternatives: Vec<Value> = group
                    .iter()
                    .map(|clause| Value::Object(compile_clauses(std::slice::from_ref(clause))))
                    .collect();
                json!({ "$or": alternatives })
            })
            .collect();

        match groups.len() {
            0 => {}
            1 => {
                if let Some(Value::Object(group)) = groups.pop() {
                    document.extend(group);
                }
            }
            _ => {
                document.insert("$and".to_string(), Value::Array(groups));
            }
        }

        document
    }
}

fn compile_clauses(clauses: &[Clause]) -> Document {
    let mut document = Document::new();
    let mut fields: Vec<&str> = Vec::new();
    for clause in clauses {
        if !fields.contains(&clause.field.as_str()) {
            fields.push(clause.field.as_str());
        }
    }

    for field in fields {
        let predicates: Vec<&Predicate> = clauses
            .iter()
            .filter(|clause| clause.field == field)
            .map(|clause| &clause.predicate)
            .collect();

        let compiled = match predicates.as_slice() {
            [Predicate::Eq(value)] => value.clone(),
            _ => {
                let mut operators = Document::new();
                for predicate in predicates {
                    predicate.write_operators(&mut operators);
                }
                Value::Object(operators)
            }
        };
        document.insert(field.to_string(), compiled);
    }

    document
}
