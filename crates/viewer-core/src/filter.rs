//! Structured metadata and document predicates.
//!
//! Filters arrive as free-form JSON text. They are validated here into
//! closed types so that a malformed filter is rejected before any store
//! call, and so the local connector can evaluate them in-process.

use serde_json::{Map, Value, json};

use crate::error::{Result, ViewerError};
use crate::types::Metadata;

const WHERE_FIELD: &str = "metadata filter";
const DOCUMENT_FIELD: &str = "document filter";

/// A metadata value a predicate can compare against.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Scalar::Int(i)),
                None => n.as_f64().map(Scalar::Float),
            },
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Scalar::Str(s) => json!(s),
            Scalar::Int(i) => json!(i),
            Scalar::Float(f) => json!(f),
            Scalar::Bool(b) => json!(b),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Scalar::Str(a), Value::String(b)) => a == b,
            (Scalar::Bool(a), Value::Bool(b)) => a == b,
            (Scalar::Int(_) | Scalar::Float(_), Value::Number(n)) => {
                self.as_f64() == n.as_f64()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Scalar),
    Ne(Scalar),
    Gt(Scalar),
    Gte(Scalar),
    Lt(Scalar),
    Lte(Scalar),
    In(Vec<Scalar>),
    Nin(Vec<Scalar>),
}

impl Predicate {
    fn parse(operator: &str, operand: &Value) -> Result<Self> {
        let scalar = || -> Result<Scalar> {
            Scalar::from_json(operand).ok_or_else(|| {
                ViewerError::parse(
                    WHERE_FIELD,
                    format!("operand of {operator} must be a string, number or boolean"),
                )
            })
        };
        let number = || -> Result<Scalar> {
            let s = scalar()?;
            match s.as_f64() {
                Some(_) => Ok(s),
                None => Err(ViewerError::parse(
                    WHERE_FIELD,
                    format!("operand of {operator} must be a number"),
                )),
            }
        };
        let list = || -> Result<Vec<Scalar>> {
            let items = operand.as_array().ok_or_else(|| {
                ViewerError::parse(WHERE_FIELD, format!("operand of {operator} must be a list"))
            })?;
            items
                .iter()
                .map(|item| {
                    Scalar::from_json(item).ok_or_else(|| {
                        ViewerError::parse(
                            WHERE_FIELD,
                            format!("items of {operator} must be strings, numbers or booleans"),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()
        };

        Ok(match operator {
            "$eq" => Predicate::Eq(scalar()?),
            "$ne" => Predicate::Ne(scalar()?),
            "$gt" => Predicate::Gt(number()?),
            "$gte" => Predicate::Gte(number()?),
            "$lt" => Predicate::Lt(number()?),
            "$lte" => Predicate::Lte(number()?),
            "$in" => Predicate::In(list()?),
            "$nin" => Predicate::Nin(list()?),
            other => {
                return Err(ViewerError::parse(
                    WHERE_FIELD,
                    format!("unknown operator {other}"),
                ));
            }
        })
    }

    fn operator(&self) -> &'static str {
        match self {
            Predicate::Eq(_) => "$eq",
            Predicate::Ne(_) => "$ne",
            Predicate::Gt(_) => "$gt",
            Predicate::Gte(_) => "$gte",
            Predicate::Lt(_) => "$lt",
            Predicate::Lte(_) => "$lte",
            Predicate::In(_) => "$in",
            Predicate::Nin(_) => "$nin",
        }
    }

    fn operand_json(&self) -> Value {
        match self {
            Predicate::Eq(s)
            | Predicate::Ne(s)
            | Predicate::Gt(s)
            | Predicate::Gte(s)
            | Predicate::Lt(s)
            | Predicate::Lte(s) => s.to_json(),
            Predicate::In(items) | Predicate::Nin(items) => {
                Value::Array(items.iter().map(Scalar::to_json).collect())
            }
        }
    }

    /// A missing key never matches, negations included.
    fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let compare = |operand: &Scalar, test: fn(f64, f64) -> bool| {
            match (value.as_f64(), operand.as_f64()) {
                (Some(v), Some(o)) => test(v, o),
                _ => false,
            }
        };
        match self {
            Predicate::Eq(s) => s.matches(value),
            Predicate::Ne(s) => !s.matches(value),
            Predicate::Gt(s) => compare(s, |v, o| v > o),
            Predicate::Gte(s) => compare(s, |v, o| v >= o),
            Predicate::Lt(s) => compare(s, |v, o| v < o),
            Predicate::Lte(s) => compare(s, |v, o| v <= o),
            Predicate::In(items) => items.iter().any(|s| s.matches(value)),
            Predicate::Nin(items) => !items.iter().any(|s| s.matches(value)),
        }
    }
}

/// Predicate over an item's metadata (`where`).
#[derive(Debug, Clone, PartialEq)]
pub enum WhereFilter {
    And(Vec<WhereFilter>),
    Or(Vec<WhereFilter>),
    Field { key: String, predicate: Predicate },
}

impl WhereFilter {
    pub fn parse(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input.trim())
            .map_err(|e| ViewerError::parse(WHERE_FIELD, format!("not valid JSON ({e})")))?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let (key, inner) = single_entry(value, WHERE_FIELD)?;
        match key.as_str() {
            "$and" | "$or" => {
                let clauses = logical_operands(key, inner, WHERE_FIELD)?
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>>>()?;
                Ok(if key == "$and" {
                    WhereFilter::And(clauses)
                } else {
                    WhereFilter::Or(clauses)
                })
            }
            k if k.starts_with('$') => Err(ViewerError::parse(
                WHERE_FIELD,
                format!("unknown operator {k}"),
            )),
            _ => {
                let predicate = match inner {
                    Value::Object(_) => {
                        let (operator, operand) = single_entry(inner, WHERE_FIELD)?;
                        Predicate::parse(operator, operand)?
                    }
                    other => Predicate::Eq(Scalar::from_json(other).ok_or_else(|| {
                        ViewerError::parse(
                            WHERE_FIELD,
                            format!("value for '{key}' must be a string, number, boolean or operator"),
                        )
                    })?),
                };
                Ok(WhereFilter::Field {
                    key: key.clone(),
                    predicate,
                })
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            WhereFilter::And(clauses) => {
                json!({ "$and": clauses.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            WhereFilter::Or(clauses) => {
                json!({ "$or": clauses.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            WhereFilter::Field { key, predicate } => {
                let mut op = Map::new();
                op.insert(predicate.operator().to_string(), predicate.operand_json());
                let mut field = Map::new();
                field.insert(key.clone(), Value::Object(op));
                Value::Object(field)
            }
        }
    }

    pub fn matches(&self, metadata: Option<&Metadata>) -> bool {
        match self {
            WhereFilter::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
            WhereFilter::Or(clauses) => clauses.iter().any(|c| c.matches(metadata)),
            WhereFilter::Field { key, predicate } => {
                predicate.matches(metadata.and_then(|m| m.get(key)))
            }
        }
    }
}

/// Predicate over an item's document text (`where_document`).
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentFilter {
    Contains(String),
    NotContains(String),
    And(Vec<DocumentFilter>),
    Or(Vec<DocumentFilter>),
}

impl DocumentFilter {
    pub fn parse(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input.trim())
            .map_err(|e| ViewerError::parse(DOCUMENT_FIELD, format!("not valid JSON ({e})")))?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let (key, inner) = single_entry(value, DOCUMENT_FIELD)?;
        let text = || -> Result<String> {
            inner.as_str().map(str::to_string).ok_or_else(|| {
                ViewerError::parse(DOCUMENT_FIELD, format!("operand of {key} must be a string"))
            })
        };
        match key.as_str() {
            "$contains" => Ok(DocumentFilter::Contains(text()?)),
            "$not_contains" => Ok(DocumentFilter::NotContains(text()?)),
            "$and" | "$or" => {
                let clauses = logical_operands(key, inner, DOCUMENT_FIELD)?
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>>>()?;
                Ok(if key == "$and" {
                    DocumentFilter::And(clauses)
                } else {
                    DocumentFilter::Or(clauses)
                })
            }
            other => Err(ViewerError::parse(
                DOCUMENT_FIELD,
                format!("unknown operator {other}"),
            )),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            DocumentFilter::Contains(s) => json!({ "$contains": s }),
            DocumentFilter::NotContains(s) => json!({ "$not_contains": s }),
            DocumentFilter::And(clauses) => {
                json!({ "$and": clauses.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            DocumentFilter::Or(clauses) => {
                json!({ "$or": clauses.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
        }
    }

    /// Items without a document only satisfy negative predicates.
    pub fn matches(&self, document: Option<&str>) -> bool {
        match self {
            DocumentFilter::Contains(s) => document.is_some_and(|d| d.contains(s.as_str())),
            DocumentFilter::NotContains(s) => !document.is_some_and(|d| d.contains(s.as_str())),
            DocumentFilter::And(clauses) => clauses.iter().all(|c| c.matches(document)),
            DocumentFilter::Or(clauses) => clauses.iter().any(|c| c.matches(document)),
        }
    }
}

fn single_entry<'a>(value: &'a Value, field: &'static str) -> Result<(&'a String, &'a Value)> {
    let object = value
        .as_object()
        .ok_or_else(|| ViewerError::parse(field, "expected a JSON object"))?;
    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        (None, _) => Err(ViewerError::parse(field, "expected exactly one key, got none")),
        (Some(_), Some(_)) => Err(ViewerError::parse(
            field,
            format!(
                "expected exactly one key, got {}; combine clauses with $and or $or",
                object.len()
            ),
        )),
    }
}

fn logical_operands<'a>(
    operator: &str,
    value: &'a Value,
    field: &'static str,
) -> Result<&'a Vec<Value>> {
    match value.as_array() {
        Some(items) if !items.is_empty() => Ok(items),
        Some(_) => Err(ViewerError::parse(
            field,
            format!("{operator} needs at least one clause"),
        )),
        None => Err(ViewerError::parse(
            field,
            format!("operand of {operator} must be a list"),
        )),
    }
}
