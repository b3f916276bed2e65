use crate::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::str::FromStr;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// A single field value travelling between the caller and a backend.
///
/// The variants cover the declared field types of the metadata model plus
/// `Uuid`, the document backend's native id type. Unlike a native driver
/// value this is backend neutral; translators bind it as a parameter and row
/// mappers coerce native values back through [`FieldType::coerce`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Decimal(Decimal),
    Varchar(String),
    Date(Date),
    Time(Time),
    Timestamp(PrimitiveDateTime),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String form of the value, used by coercion fallback and diagnostics.
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int64(v) => Some(Decimal::from(*v)),
            Value::Decimal(v) => Some(*v),
            Value::Float64(v) => Decimal::from_f64_retain(*v),
            _ => None,
        }
    }

    /// Total order across values, used for document-side sorting, grouping
    /// and range predicates. `Null` sorts before everything; numeric
    /// variants compare by magnitude across representations; unrelated
    /// types fall back to a stable rank so sorting never panics.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
            (Value::Int64(l), Value::Int64(r)) => l.cmp(r),
            (Value::Float64(l), Value::Float64(r)) => l.total_cmp(r),
            (Value::Decimal(l), Value::Decimal(r)) => l.cmp(r),
            (Value::Varchar(l), Value::Varchar(r)) => l.cmp(r),
            (Value::Date(l), Value::Date(r)) => l.cmp(r),
            (Value::Time(l), Value::Time(r)) => l.cmp(r),
            (Value::Timestamp(l), Value::Timestamp(r)) => l.cmp(r),
            (Value::Uuid(l), Value::Uuid(r)) => l.cmp(r),
            (l, r) => match (l.to_decimal(), r.to_decimal()) {
                (Some(l), Some(r)) => l.cmp(&r),
                _ => l.type_rank().cmp(&r.type_rank()),
            },
        }
    }

    /// Loose equality matching what a storage engine would consider equal:
    /// `compare == Equal`, so `Int64(2)` equals `Decimal(2)`.
    pub fn matches(&self, other: &Value) -> bool {
        if self.is_null() || other.is_null() {
            return self.is_null() && other.is_null();
        }
        self.compare(other) == Ordering::Equal
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(..) => 1,
            Value::Int64(..) => 2,
            Value::Float64(..) => 3,
            Value::Decimal(..) => 4,
            Value::Varchar(..) => 5,
            Value::Date(..) => 6,
            Value::Time(..) => 7,
            Value::Timestamp(..) => 8,
            Value::Uuid(..) => 9,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Varchar(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v),
            Value::Uuid(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_from_value {
    ($source:ty, $into:path) => {
        impl From<$source> for Value {
            fn from(value: $source) -> Self {
                $into(value.into())
            }
        }
    };
}

impl_from_value!(bool, Value::Boolean);
impl_from_value!(i32, Value::Int64);
impl_from_value!(i64, Value::Int64);
impl_from_value!(f64, Value::Float64);
impl_from_value!(Decimal, Value::Decimal);
impl_from_value!(String, Value::Varchar);
impl_from_value!(&str, Value::Varchar);
impl_from_value!(Date, Value::Date);
impl_from_value!(Time, Value::Time);
impl_from_value!(PrimitiveDateTime, Value::Timestamp);
impl_from_value!(Uuid, Value::Uuid);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Declared type of a field in the table descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Date,
    Time,
    Timestamp,
    Boolean,
}

impl FieldType {
    /// Coerce a value coming back from a backend into this declared type.
    ///
    /// Unknown or mismatched native representations fall back to string
    /// coercion; only values that cannot be read as the declared type at
    /// all are an error.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let fail = |value: &Value| {
            Error::translation(format!("cannot read `{}` as {:?}", value, self))
        };
        Ok(match self {
            FieldType::Text => match value {
                Value::Varchar(..) => value,
                other => Value::Varchar(other.as_text()),
            },
            FieldType::Integer => match value {
                Value::Int64(..) => value,
                Value::Boolean(v) => Value::Int64(v as i64),
                Value::Float64(v) => Value::Int64(v as i64),
                Value::Decimal(v) => {
                    Value::Int64(v.trunc().to_i64().ok_or_else(|| fail(&Value::Decimal(v)))?)
                }
                Value::Varchar(v) => {
                    Value::Int64(v.trim().parse().map_err(|_| fail(&Value::Varchar(v.clone())))?)
                }
                other => return Err(fail(&other)),
            },
            FieldType::Decimal => match value {
                Value::Decimal(..) => value,
                Value::Int64(v) => Value::Decimal(Decimal::from(v)),
                Value::Float64(v) => Value::Decimal(
                    Decimal::from_f64_retain(v).ok_or_else(|| fail(&Value::Float64(v)))?,
                ),
                Value::Varchar(v) => Value::Decimal(
                    Decimal::from_str(v.trim()).map_err(|_| fail(&Value::Varchar(v.clone())))?,
                ),
                other => return Err(fail(&other)),
            },
            FieldType::Date => match value {
                Value::Date(..) => value,
                Value::Timestamp(v) => Value::Date(v.date()),
                Value::Varchar(v) => Value::Date(
                    Date::parse(v.trim(), format_description!("[year]-[month]-[day]"))
                        .map_err(|_| fail(&Value::Varchar(v.clone())))?,
                ),
                other => return Err(fail(&other)),
            },
            FieldType::Time => match value {
                Value::Time(..) => value,
                Value::Timestamp(v) => Value::Time(v.time()),
                Value::Varchar(v) => Value::Time(
                    Time::parse(v.trim(), format_description!("[hour]:[minute]:[second]"))
                        .map_err(|_| fail(&Value::Varchar(v.clone())))?,
                ),
                other => return Err(fail(&other)),
            },
            FieldType::Timestamp => match value {
                Value::Timestamp(..) => value,
                Value::Date(v) => Value::Timestamp(v.midnight()),
                Value::Varchar(v) => {
                    let text = v.trim().replacen(' ', "T", 1);
                    Value::Timestamp(
                        PrimitiveDateTime::parse(
                            &text,
                            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
                        )
                        .map_err(|_| fail(&Value::Varchar(v.clone())))?,
                    )
                }
                other => return Err(fail(&other)),
            },
            FieldType::Boolean => match value {
                Value::Boolean(..) => value,
                Value::Int64(v) => Value::Boolean(v != 0),
                Value::Varchar(v) => match v.trim() {
                    "true" | "1" => Value::Boolean(true),
                    "false" | "0" => Value::Boolean(false),
                    _ => return Err(fail(&Value::Varchar(v.clone()))),
                },
                other => return Err(fail(&other)),
            },
        })
    }
}
