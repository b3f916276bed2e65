use rusqlite::types::{Value as NativeValue, ValueRef};
use rust_decimal::prelude::ToPrimitive;
use strata_core::{Error, Result, Value};
use time::macros::format_description;

/// Map a canonical value to the native SQLite value it is bound as.
///
/// Temporal values travel as ISO text, decimals as REAL (SQLite has no
/// decimal storage class), booleans as 0/1.
pub(crate) fn to_native(value: &Value) -> Result<NativeValue> {
    let format_error =
        |v: &Value| Error::translation(format!("cannot format `{}` as a SQL parameter", v));
    Ok(match value {
        Value::Null => NativeValue::Null,
        Value::Boolean(v) => NativeValue::Integer(*v as i64),
        Value::Int64(v) => NativeValue::Integer(*v),
        Value::Float64(v) => NativeValue::Real(*v),
        Value::Decimal(v) => NativeValue::Real(v.to_f64().ok_or_else(|| format_error(value))?),
        Value::Varchar(v) => NativeValue::Text(v.clone()),
        Value::Date(v) => NativeValue::Text(
            v.format(format_description!("[year]-[month]-[day]"))
                .map_err(|_| format_error(value))?,
        ),
        Value::Time(v) => NativeValue::Text(
            v.format(format_description!("[hour]:[minute]:[second]"))
                .map_err(|_| format_error(value))?,
        ),
        Value::Timestamp(v) => NativeValue::Text(
            v.format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second]"
            ))
            .map_err(|_| format_error(value))?,
        ),
        Value::Uuid(v) => NativeValue::Text(v.to_string()),
    })
}

/// Read one native column value without a declared type; the caller runs
/// [`FieldType::coerce`] afterwards. Blobs fall back to lossy text, per the
/// unknown-native-type rule.
pub(crate) fn from_native(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int64(v),
        ValueRef::Real(v) => Value::Float64(v),
        ValueRef::Text(v) => Value::Varchar(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Varchar(String::from_utf8_lossy(v).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::FieldType;
    use time::macros::{date, datetime};

    #[test]
    fn temporals_bind_as_iso_text() {
        assert_eq!(
            to_native(&Value::Date(date!(2024 - 01 - 31))).unwrap(),
            NativeValue::Text("2024-01-31".into())
        );
        assert_eq!(
            to_native(&Value::Timestamp(datetime!(2024 - 01 - 31 12:00:05))).unwrap(),
            NativeValue::Text("2024-01-31T12:00:05".into())
        );
        assert_eq!(
            to_native(&Value::Boolean(true)).unwrap(),
            NativeValue::Integer(1)
        );
    }

    #[test]
    fn native_values_coerce_to_declared_types() {
        assert_eq!(
            FieldType::Integer
                .coerce(from_native(ValueRef::Integer(5)))
                .unwrap(),
            Value::Int64(5)
        );
        assert_eq!(
            FieldType::Text
                .coerce(from_native(ValueRef::Text(b"x")))
                .unwrap(),
            Value::Varchar("x".into())
        );
        assert_eq!(
            FieldType::Boolean
                .coerce(from_native(ValueRef::Integer(1)))
                .unwrap(),
            Value::Boolean(true)
        );
    }
}
