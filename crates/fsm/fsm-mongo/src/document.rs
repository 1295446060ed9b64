//! Conversion between [`StateRecord`] and the stored document
//! `{key, state, data, created_at, updated_at, expires_at}`.

use chrono::{DateTime, Utc};
use fsm_core::{state_from_persisted, DataMap, Result, StateRecord, StorageError};
use mongodb::bson::{self, Bson, Document};

pub(crate) fn to_bson_datetime(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

pub(crate) fn from_bson_datetime(at: &bson::DateTime) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).ok_or_else(|| {
        StorageError::Serialization(format!("Timestamp out of range: {}", at.timestamp_millis()))
    })
}

/// `expires_at` value to store: a date, or null for records without TTL.
pub(crate) fn expires_at_bson(at: Option<DateTime<Utc>>) -> Bson {
    match at {
        Some(at) => Bson::DateTime(to_bson_datetime(at)),
        None => Bson::Null,
    }
}

pub(crate) fn data_to_document(data: &DataMap) -> Result<Document> {
    bson::to_document(data)
        .map_err(|e| StorageError::Serialization(format!("Cannot encode data: {}", e)))
}

fn data_from_document(doc: &Document) -> Result<DataMap> {
    match doc.get("data") {
        Some(Bson::Document(data)) => bson::from_document(data.clone())
            .map_err(|e| StorageError::Serialization(format!("Cannot decode data: {}", e))),
        _ => Ok(DataMap::new()),
    }
}

fn required_datetime(doc: &Document, field: &str) -> Result<DateTime<Utc>> {
    let at = doc.get_datetime(field).map_err(|e| {
        StorageError::Serialization(format!("Invalid document structure: '{}': {}", field, e))
    })?;
    from_bson_datetime(at)
}

pub(crate) fn record_from_document(doc: &Document) -> Result<StateRecord> {
    let created_at = required_datetime(doc, "created_at")?;
    let updated_at = match doc.get("updated_at") {
        Some(Bson::DateTime(at)) => from_bson_datetime(at)?,
        _ => created_at,
    };
    let expires_at = match doc.get("expires_at") {
        Some(Bson::DateTime(at)) => Some(from_bson_datetime(at)?),
        _ => None,
    };
    Ok(StateRecord {
        state: doc.get_str("state").ok().and_then(state_from_persisted),
        data: data_from_document(doc)?,
        created_at,
        updated_at,
        expires_at,
    })
}
