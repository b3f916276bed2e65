use crate::{Error, Result};
use std::fmt::{self, Display, Formatter};

/// How the criteria and sub-filters of a [`Filter`](crate::Filter) combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BooleanOperator {
    #[default]
    And,
    Or,
}

/// Closed set of comparison operators a criterion can carry.
///
/// Every backend translator dispatches on this enum with one exhaustive
/// match, so adding an operator is a compile-checked change in exactly the
/// translators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    NotEqualsOrIsNull,
    In,
    NotIn,
    IsNullOrIn,
    Like,
    NotLike,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Contains,
    NotContains,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    IsBlank,
    IsNotBlank,
    Between,
    NotBetween,
}

/// How many values an operator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Any,
}

impl Operator {
    pub fn arity(&self) -> Arity {
        match self {
            Operator::Equals
            | Operator::NotEquals
            | Operator::NotEqualsOrIsNull
            | Operator::Like
            | Operator::NotLike
            | Operator::StartsWith
            | Operator::NotStartsWith
            | Operator::EndsWith
            | Operator::NotEndsWith
            | Operator::Contains
            | Operator::NotContains
            | Operator::LessThan
            | Operator::LessThanOrEquals
            | Operator::GreaterThan
            | Operator::GreaterThanOrEquals => Arity::Exactly(1),
            Operator::In | Operator::NotIn | Operator::IsNullOrIn => Arity::Any,
            Operator::IsBlank | Operator::IsNotBlank => Arity::Exactly(0),
            Operator::Between | Operator::NotBetween => Arity::Exactly(2),
        }
    }

    /// Translation-time gate: the value count must match the operator's
    /// arity before any native statement is built.
    pub fn check_arity(&self, field: &str, count: usize) -> Result<()> {
        match self.arity() {
            Arity::Exactly(n) if n != count => Err(Error::translation(format!(
                "`{}` {} expects {} value(s), got {}",
                field, self, n, count
            ))),
            _ => Ok(()),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Equals => "EQUALS",
            Operator::NotEquals => "NOT_EQUALS",
            Operator::NotEqualsOrIsNull => "NOT_EQUALS_OR_IS_NULL",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::IsNullOrIn => "IS_NULL_OR_IN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT_LIKE",
            Operator::StartsWith => "STARTS_WITH",
            Operator::NotStartsWith => "NOT_STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::NotEndsWith => "NOT_ENDS_WITH",
            Operator::Contains => "CONTAINS",
            Operator::NotContains => "NOT_CONTAINS",
            Operator::LessThan => "LESS_THAN",
            Operator::LessThanOrEquals => "LESS_THAN_OR_EQUALS",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::GreaterThanOrEquals => "GREATER_THAN_OR_EQUALS",
            Operator::IsBlank => "IS_BLANK",
            Operator::IsNotBlank => "IS_NOT_BLANK",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT_BETWEEN",
        })
    }
}
