use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub partition: String,
    pub sort: String,
}

impl Key {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Key,
    pub version: i64,
    pub data: Value,
}

impl Record {
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|e| StoreError::Corrupt {
            key: self.key.to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
}

impl Filter {
    /// A missing field compares as `null`.
    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => data.get(field).unwrap_or(&Value::Null) == expected,
            Filter::Ne(field, expected) => data.get(field).unwrap_or(&Value::Null) != expected,
        }
    }
}

/// Records of one partition whose sort key starts with `sort_prefix`, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    pub partition: String,
    pub sort_prefix: String,
    pub filters: Vec<Filter>,
}

impl PrefixQuery {
    pub fn new(partition: impl Into<String>, sort_prefix: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort_prefix: sort_prefix.into(),
            filters: Vec::new(),
        }
    }

    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn filter_ne(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Ne(field.to_string(), value.into()));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.key.partition == self.partition
            && record.key.sort.starts_with(&self.sort_prefix)
            && self.filters.iter().all(|f| f.matches(&record.data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Record),
    NotFound,
    VersionMismatch { current: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Unavailable(String),

    #[error("record {key} does not decode: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Persistence collaborator. `put_if_absent` and versioned `update` must be
/// atomic against every other writer of the same key, including writers in
/// other processes.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &Key) -> Result<Option<Record>, StoreError>;

    async fn query(&self, query: &PrefixQuery) -> Result<Vec<Record>, StoreError>;

    async fn put(&self, key: &Key, data: &Value) -> Result<(), StoreError>;

    async fn put_if_absent(&self, key: &Key, data: &Value) -> Result<PutOutcome, StoreError>;

    /// Merge `fields` into the record's top-level object. With
    /// `expected_version`, the write only happens if the stored version matches.
    async fn update(
        &self,
        key: &Key,
        fields: &Map<String, Value>,
        expected_version: Option<i64>,
    ) -> Result<UpdateOutcome, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(sort: &str, data: Value) -> Record {
        Record {
            key: Key::new("TENANT#t1", sort),
            version: 1,
            data,
        }
    }

    #[test]
    fn test_prefix_query_matches_partition_and_prefix() {
        let q = PrefixQuery::new("TENANT#t1", "SLOT#2030-06-17#");
        assert!(q.matches(&record("SLOT#2030-06-17#10:00", json!({}))));
        assert!(!q.matches(&record("SLOT#2030-06-18#10:00", json!({}))));
        assert!(!q.matches(&record("SERVICE#cut", json!({}))));

        let other_tenant = Record {
            key: Key::new("TENANT#t2", "SLOT#2030-06-17#10:00"),
            version: 1,
            data: json!({}),
        };
        assert!(!q.matches(&other_tenant));
    }

    #[test]
    fn test_filters_compose() {
        let q = PrefixQuery::new("TENANT#t1", "SLOT#")
            .filter_ne("status", "cancelled")
            .filter_eq("service_id", "cut");
        assert!(q.matches(&record("SLOT#a", json!({"status": "scheduled", "service_id": "cut"}))));
        assert!(!q.matches(&record("SLOT#b", json!({"status": "cancelled", "service_id": "cut"}))));
        assert!(!q.matches(&record("SLOT#c", json!({"status": "scheduled", "service_id": "dye"}))));
    }

    #[test]
    fn test_missing_field_is_null() {
        assert!(Filter::Eq("notes".into(), Value::Null).matches(&json!({})));
        assert!(Filter::Ne("status".into(), json!("cancelled")).matches(&json!({})));
    }
}
