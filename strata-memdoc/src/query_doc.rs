use crate::{matcher::Pattern, store::Document};
use std::cmp::Ordering;
use strata_core::{
    BooleanOperator, Criterion, Error, Filter, Operator, Result, TableDescriptor, Value,
};
use uuid::Uuid;

/// The native filter document: a tree the store evaluates directly against
/// each document, the document-side counterpart of a SQL WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryDoc {
    /// Matches every document.
    All,
    /// Matches nothing; what an empty `IN` list becomes.
    Never,
    And(Vec<QueryDoc>),
    Or(Vec<QueryDoc>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    NotIn {
        field: String,
        values: Vec<Value>,
    },
    Regex {
        field: String,
        pattern: Pattern,
        negated: bool,
    },
    Between {
        field: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// Field missing or explicitly null; negated: present and non-null.
    Null {
        field: String,
        negated: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl QueryDoc {
    /// Evaluate against one document. Comparison nodes never match a
    /// missing or null field, mirroring SQL three-valued logic; only
    /// `Null` nodes see absent fields.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            QueryDoc::All => true,
            QueryDoc::Never => false,
            QueryDoc::And(nodes) => nodes.iter().all(|n| n.matches(document)),
            QueryDoc::Or(nodes) => nodes.iter().any(|n| n.matches(document)),
            QueryDoc::Compare { field, op, value } => match present(document, field) {
                Some(actual) => {
                    if *op == CompareOp::Eq {
                        return actual.matches(value);
                    }
                    if *op == CompareOp::Ne {
                        return !actual.matches(value);
                    }
                    let ordering = actual.compare(value);
                    match op {
                        CompareOp::Lt => ordering == Ordering::Less,
                        CompareOp::Lte => ordering != Ordering::Greater,
                        CompareOp::Gt => ordering == Ordering::Greater,
                        CompareOp::Gte => ordering != Ordering::Less,
                        CompareOp::Eq | CompareOp::Ne => unreachable!(),
                    }
                }
                None => false,
            },
            QueryDoc::In { field, values } => present(document, field)
                .is_some_and(|actual| values.iter().any(|v| actual.matches(v))),
            QueryDoc::NotIn { field, values } => present(document, field)
                .is_some_and(|actual| !values.iter().any(|v| actual.matches(v))),
            QueryDoc::Regex {
                field,
                pattern,
                negated,
            } => present(document, field)
                .is_some_and(|actual| pattern.matches(&actual.as_text()) != *negated),
            QueryDoc::Between {
                field,
                low,
                high,
                negated,
            } => present(document, field).is_some_and(|actual| {
                let inside = actual.compare(low) != Ordering::Less
                    && actual.compare(high) != Ordering::Greater;
                inside != *negated
            }),
            QueryDoc::Null { field, negated } => {
                (present(document, field).is_none()) != *negated
            }
        }
    }
}

fn present<'a>(document: &'a Document, field: &str) -> Option<&'a Value> {
    document.get(field).filter(|v| !v.is_null())
}

/// Translate a canonical filter into a query document. Fails on unknown or
/// join-chain fields, arity violations, and primary-key values that are not
/// valid ids; nothing is silently dropped.
pub fn translate(filter: &Filter, table: &TableDescriptor) -> Result<QueryDoc> {
    let mut nodes = Vec::new();
    for criterion in &filter.criteria {
        nodes.push(translate_criterion(criterion, table)?);
    }
    for sub in &filter.subfilters {
        if sub.is_empty() {
            // An empty branch of an OR matches everything.
            if filter.operator == BooleanOperator::Or {
                nodes.push(QueryDoc::All);
            }
            continue;
        }
        nodes.push(translate(sub, table)?);
    }
    Ok(match (nodes.len(), filter.operator) {
        (0, _) => QueryDoc::All,
        (1, _) => nodes.remove(0),
        (_, BooleanOperator::And) => QueryDoc::And(nodes),
        (_, BooleanOperator::Or) => QueryDoc::Or(nodes),
    })
}

fn translate_criterion(criterion: &Criterion, table: &TableDescriptor) -> Result<QueryDoc> {
    let Criterion {
        field,
        operator,
        values,
    } = criterion;
    operator.check_arity(field, values.len())?;
    let descriptor = table.field(field)?;
    let is_key = *field == table.primary_key;
    let convert = |value: &Value| -> Result<Value> {
        if is_key { key_value(value) } else { Ok(value.clone()) }
    };
    let column = descriptor.column.clone();
    let compare = |op: CompareOp, value: &Value| -> Result<QueryDoc> {
        Ok(QueryDoc::Compare {
            field: column.clone(),
            op,
            value: convert(value)?,
        })
    };
    let pattern = |pattern: Pattern, negated: bool| QueryDoc::Regex {
        field: column.clone(),
        pattern,
        negated,
    };
    Ok(match operator {
        Operator::Equals => compare(CompareOp::Eq, &values[0])?,
        Operator::NotEquals => compare(CompareOp::Ne, &values[0])?,
        Operator::NotEqualsOrIsNull => QueryDoc::Or(vec![
            compare(CompareOp::Ne, &values[0])?,
            QueryDoc::Null {
                field: column.clone(),
                negated: false,
            },
        ]),
        Operator::In => {
            if values.is_empty() {
                QueryDoc::Never
            } else {
                QueryDoc::In {
                    field: column.clone(),
                    values: values.iter().map(convert).collect::<Result<_>>()?,
                }
            }
        }
        Operator::NotIn => {
            if values.is_empty() {
                QueryDoc::All
            } else {
                QueryDoc::NotIn {
                    field: column.clone(),
                    values: values.iter().map(convert).collect::<Result<_>>()?,
                }
            }
        }
        Operator::IsNullOrIn => {
            let null = QueryDoc::Null {
                field: column.clone(),
                negated: false,
            };
            if values.is_empty() {
                null
            } else {
                QueryDoc::Or(vec![
                    null,
                    QueryDoc::In {
                        field: column.clone(),
                        values: values.iter().map(convert).collect::<Result<_>>()?,
                    },
                ])
            }
        }
        Operator::Like => pattern(Pattern::like(&values[0].as_text()), false),
        Operator::NotLike => pattern(Pattern::like(&values[0].as_text()), true),
        Operator::StartsWith => pattern(Pattern::starts_with(&values[0].as_text()), false),
        Operator::NotStartsWith => pattern(Pattern::starts_with(&values[0].as_text()), true),
        Operator::EndsWith => pattern(Pattern::ends_with(&values[0].as_text()), false),
        Operator::NotEndsWith => pattern(Pattern::ends_with(&values[0].as_text()), true),
        Operator::Contains => pattern(Pattern::contains(&values[0].as_text()), false),
        Operator::NotContains => pattern(Pattern::contains(&values[0].as_text()), true),
        Operator::LessThan => compare(CompareOp::Lt, &values[0])?,
        Operator::LessThanOrEquals => compare(CompareOp::Lte, &values[0])?,
        Operator::GreaterThan => compare(CompareOp::Gt, &values[0])?,
        Operator::GreaterThanOrEquals => compare(CompareOp::Gte, &values[0])?,
        Operator::IsBlank => QueryDoc::Null {
            field: column.clone(),
            negated: false,
        },
        Operator::IsNotBlank => QueryDoc::Null {
            field: column.clone(),
            negated: true,
        },
        Operator::Between => QueryDoc::Between {
            field: column.clone(),
            low: convert(&values[0])?,
            high: convert(&values[1])?,
            negated: false,
        },
        Operator::NotBetween => QueryDoc::Between {
            field: column.clone(),
            low: convert(&values[0])?,
            high: convert(&values[1])?,
            negated: true,
        },
    })
}

/// Convert a primary-key criterion value to the native id type.
pub(crate) fn key_value(value: &Value) -> Result<Value> {
    match value {
        Value::Uuid(..) => Ok(value.clone()),
        Value::Varchar(text) => Uuid::parse_str(text.trim())
            .map(Value::Uuid)
            .map_err(|_| Error::translation(format!("`{}` is not a valid document id", text))),
        other => Err(Error::translation(format!(
            "`{}` is not a valid document id",
            other
        ))),
    }
}
