//! Condition operators and their type-aware comparison semantics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The fixed set of comparison operators a condition can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Contains,
    #[serde(rename = "icontains")]
    IContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    ChangedTo,
    ChangedFrom,
}

/// Outcome of applying an operator, with an optional diagnostic note
/// (type mismatches, wrong literal shape) for the evaluation trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub note: Option<String>,
}

impl Verdict {
    #[must_use]
    pub fn of(passed: bool) -> Self {
        Self { passed, note: None }
    }

    #[must_use]
    pub fn rejected(note: impl Into<String>) -> Self {
        Self {
            passed: false,
            note: Some(note.into()),
        }
    }
}

impl Operator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::Greater => "greater",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::Less => "less",
            Self::LessOrEqual => "less_or_equal",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
            Self::ChangedTo => "changed_to",
            Self::ChangedFrom => "changed_from",
        }
    }

    /// `in` / `not_in` need a list literal.
    #[must_use]
    pub fn requires_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// `changed_to` / `changed_from` compare before/after snapshots.
    #[must_use]
    pub fn is_change(self) -> bool {
        matches!(self, Self::ChangedTo | Self::ChangedFrom)
    }

    /// Apply the operator to a resolved value and the condition literal.
    ///
    /// Numeric operators never coerce: a non-number on either side is a
    /// mismatch and fails. String operators render both sides. Change
    /// operators reduce to equality here; picking the right snapshot side is
    /// the evaluator's job.
    #[must_use]
    pub fn apply(self, actual: &Value, literal: &Value) -> Verdict {
        match self {
            Self::Equal | Self::ChangedTo | Self::ChangedFrom => Verdict::of(actual == literal),
            Self::NotEqual => Verdict::of(actual != literal),
            Self::Greater | Self::GreaterOrEqual | Self::Less | Self::LessOrEqual => {
                self.compare_numbers(actual, literal)
            }
            Self::Contains => Verdict::of(match actual {
                Value::List(items) => items.contains(literal),
                _ => actual.to_string().contains(&literal.to_string()),
            }),
            Self::IContains => {
                let needle = literal.to_string().to_lowercase();
                Verdict::of(match actual {
                    Value::List(items) => items
                        .iter()
                        .any(|item| item.to_string().to_lowercase() == needle),
                    _ => actual.to_string().to_lowercase().contains(&needle),
                })
            }
            Self::StartsWith => Verdict::of(actual.to_string().starts_with(&literal.to_string())),
            Self::EndsWith => Verdict::of(actual.to_string().ends_with(&literal.to_string())),
            Self::In | Self::NotIn => match literal.as_list() {
                Some(items) => {
                    let found = items.contains(actual);
                    Verdict::of(if self == Self::In { found } else { !found })
                }
                None => Verdict::rejected(format!(
                    "{self} requires a list literal, got {}",
                    literal.kind()
                )),
            },
            Self::IsNull => Verdict::of(actual.is_null()),
            Self::IsNotNull => Verdict::of(!actual.is_null()),
        }
    }

    fn compare_numbers(self, actual: &Value, literal: &Value) -> Verdict {
        let (Some(a), Some(b)) = (actual.as_f64(), literal.as_f64()) else {
            return Verdict::rejected(format!(
                "type mismatch: {self} needs numbers, got {} and {}",
                actual.kind(),
                literal.kind()
            ));
        };
        Verdict::of(match self {
            Self::Greater => a > b,
            Self::GreaterOrEqual => a >= b,
            Self::Less => a < b,
            _ => a <= b,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
