//! Conversions between `tokio_postgres` wire values and the JSON shapes the
//! rest of the gateway speaks.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use tokio_postgres::types::Type;
use tokio_postgres::Row;

use crate::types::JsonRow;

pub fn row_to_json(row: &Row) -> JsonRow {
    let mut out = JsonRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), column_value(row, idx, column.type_()));
    }
    out
}

fn column_value(row: &Row, idx: usize, ty: &Type) -> JsonValue {
    macro_rules! try_get {
        ($t:ty) => {
            row.try_get::<_, Option<$t>>(idx).ok().flatten()
        };
    }

    match *ty {
        Type::BOOL => try_get!(bool).map(JsonValue::from).unwrap_or(JsonValue::Null),
        Type::INT2 => try_get!(i16).map(JsonValue::from).unwrap_or(JsonValue::Null),
        Type::INT4 => try_get!(i32).map(JsonValue::from).unwrap_or(JsonValue::Null),
        Type::INT8 => try_get!(i64).map(JsonValue::from).unwrap_or(JsonValue::Null),
        Type::FLOAT4 => try_get!(f32).map(|v| v as f64).map(JsonValue::from).unwrap_or(JsonValue::Null),
        Type::FLOAT8 => try_get!(f64).map(JsonValue::from).unwrap_or(JsonValue::Null),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            try_get!(String).map(JsonValue::from).unwrap_or(JsonValue::Null)
        }
        Type::TIMESTAMP => try_get!(NaiveDateTime)
            .map(|v| JsonValue::from(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            .unwrap_or(JsonValue::Null),
        Type::TIMESTAMPTZ => try_get!(DateTime<Utc>)
            .map(|v| JsonValue::from(v.to_rfc3339()))
            .unwrap_or(JsonValue::Null),
        Type::DATE => try_get!(NaiveDate)
            .map(|v| JsonValue::from(v.format("%Y-%m-%d").to_string()))
            .unwrap_or(JsonValue::Null),
        Type::JSON | Type::JSONB => try_get!(JsonValue).unwrap_or(JsonValue::Null),
        _ => fallback_to_text(row, idx),
    }
}

/// Types without a dedicated arm above (UUID, NUMERIC, arrays, ...) are
/// pulled out as their textual representation rather than guessed at;
/// callers that need a typed value should add a dedicated arm instead of
/// relying on this fallback's formatting.
fn fallback_to_text(row: &Row, idx: usize) -> JsonValue {
    row.try_get::<_, Option<String>>(idx)
        .ok()
        .flatten()
        .map(JsonValue::from)
        .unwrap_or(JsonValue::Null)
}

/// Bridges a `serde_json::Value` into a `tokio_postgres` bind parameter.
/// `tokio_postgres` requires `ToSql + Sync` trait objects with a concrete
/// type per slot; this enum gives every JSON shape one.
#[derive(Debug, Clone)]
pub enum BoundValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&JsonValue> for BoundValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            JsonValue::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl tokio_postgres::types::ToSql for BoundValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Null => Ok(tokio_postgres::types::IsNull::Yes),
            Self::Bool(b) => b.to_sql(ty, out),
            Self::Int(i) => i.to_sql(ty, out),
            Self::Float(f) => f.to_sql(ty, out),
            Self::Text(s) => s.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}
