use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};

use super::store::{Key, PrefixQuery, PutOutcome, Record, Store, StoreError, UpdateOutcome};

// put_if_absent relies on the (pk, sk) primary key, across connections too.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(super::init_db(path)?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn decode(key: &Key, raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn encode(value: &Value) -> String {
    value.to_string()
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, key: &Key) -> Result<Option<Record>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT version, data FROM records WHERE pk = ?1 AND sk = ?2",
                params![key.partition, key.sort],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(unavailable)?;

        match row {
            Some((version, raw)) => Ok(Some(Record {
                key: key.clone(),
                version,
                data: decode(key, &raw)?,
            })),
            None => Ok(None),
        }
    }

    async fn query(&self, query: &PrefixQuery) -> Result<Vec<Record>, StoreError> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(
                    "SELECT sk, version, data FROM records
                     WHERE pk = ?1 AND substr(sk, 1, length(?2)) = ?2
                     ORDER BY sk ASC",
                )
                .map_err(unavailable)?;

            let mapped = stmt
                .query_map(params![query.partition, query.sort_prefix], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(unavailable)?;

            let mut rows = vec![];
            for row in mapped {
                rows.push(row.map_err(unavailable)?);
            }
            rows
        };

        let mut records = vec![];
        for (sort, version, raw) in rows {
            let key = Key::new(query.partition.clone(), sort);
            let data = decode(&key, &raw)?;
            let record = Record { key, version, data };
            if query.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn put(&self, key: &Key, data: &Value) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO records (pk, sk, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(pk, sk) DO UPDATE SET
                data = excluded.data,
                version = version + 1,
                updated_at = datetime('now')",
            params![key.partition, key.sort, encode(data)],
        )
        .map_err(unavailable)?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &Key, data: &Value) -> Result<PutOutcome, StoreError> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT INTO records (pk, sk, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(pk, sk) DO NOTHING",
                params![key.partition, key.sort, encode(data)],
            )
            .map_err(unavailable)?;

        Ok(if inserted == 1 {
            PutOutcome::Created
        } else {
            PutOutcome::AlreadyExists
        })
    }

    async fn update(
        &self,
        key: &Key,
        fields: &Map<String, Value>,
        expected_version: Option<i64>,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front so the read below cannot go
        // stale before the write lands.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(unavailable)?;

        let row = tx
            .query_row(
                "SELECT version, data FROM records WHERE pk = ?1 AND sk = ?2",
                params![key.partition, key.sort],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(unavailable)?;

        let Some((current, raw)) = row else {
            return Ok(UpdateOutcome::NotFound);
        };
        if expected_version.is_some_and(|expected| expected != current) {
            return Ok(UpdateOutcome::VersionMismatch { current });
        }

        let mut data = decode(key, &raw)?;
        let Some(object) = data.as_object_mut() else {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: "record body is not an object".to_string(),
            });
        };
        for (field, value) in fields {
            object.insert(field.clone(), value.clone());
        }

        let version = current + 1;
        tx.execute(
            "UPDATE records SET data = ?3, version = ?4, updated_at = datetime('now')
             WHERE pk = ?1 AND sk = ?2",
            params![key.partition, key.sort, encode(&data), version],
        )
        .map_err(unavailable)?;
        tx.commit().map_err(unavailable)?;

        Ok(UpdateOutcome::Updated(Record {
            key: key.clone(),
            version,
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::open(":memory:").unwrap()
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = store();
        assert!(store.get(&Key::new("p", "s")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_if_absent_only_creates_once() {
        let store = store();
        let key = Key::new("TENANT#t1", "SLOT#2030-06-17#10:00");

        let first = store.put_if_absent(&key, &json!({"id": "a"})).await.unwrap();
        let second = store.put_if_absent(&key, &json!({"id": "b"})).await.unwrap();
        assert_eq!(first, PutOutcome::Created);
        assert_eq!(second, PutOutcome::AlreadyExists);

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.data["id"], "a");
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_put_overwrites_and_bumps_version() {
        let store = store();
        let key = Key::new("p", "s");
        store.put(&key, &json!({"n": 1})).await.unwrap();
        store.put(&key, &json!({"n": 2})).await.unwrap();

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.data, json!({"n": 2}));
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn test_query_by_prefix_is_ordered_and_scoped() {
        let store = store();
        for sort in ["SLOT#2030-06-17#11:00", "SLOT#2030-06-17#09:00", "SLOT#2030-06-18#09:00", "SERVICE#x"] {
            store.put(&Key::new("TENANT#t1", sort), &json!({"sk": sort})).await.unwrap();
        }
        store
            .put(&Key::new("TENANT#t2", "SLOT#2030-06-17#10:00"), &json!({}))
            .await
            .unwrap();

        let records = store
            .query(&PrefixQuery::new("TENANT#t1", "SLOT#2030-06-17#"))
            .await
            .unwrap();
        let sorts: Vec<_> = records.iter().map(|r| r.key.sort.as_str()).collect();
        assert_eq!(sorts, vec!["SLOT#2030-06-17#09:00", "SLOT#2030-06-17#11:00"]);
    }

    #[tokio::test]
    async fn test_query_prefix_has_no_wildcards() {
        let store = store();
        store.put(&Key::new("p", "A_B"), &json!({})).await.unwrap();
        store.put(&Key::new("p", "AxB"), &json!({})).await.unwrap();
        store.put(&Key::new("p", "A%C"), &json!({})).await.unwrap();

        let records = store.query(&PrefixQuery::new("p", "A_")).await.unwrap();
        assert_eq!(records.len(), 1);
        let records = store.query(&PrefixQuery::new("p", "A%")).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = store();
        for (sort, status) in [("a", "scheduled"), ("b", "cancelled"), ("c", "confirmed"), ("d", "scheduled")] {
            store.put(&Key::new("p", sort), &json!({"status": status})).await.unwrap();
        }

        let q = PrefixQuery::new("p", "").filter_ne("status", "cancelled");
        assert_eq!(store.query(&q).await.unwrap().len(), 3);

        let q = PrefixQuery::new("p", "").filter_eq("status", "scheduled");
        let sorts: Vec<String> = store
            .query(&q)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key.sort)
            .collect();
        assert_eq!(sorts, vec!["a", "d"]);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = store();
        let key = Key::new("p", "s");
        store.put_if_absent(&key, &json!({"status": "scheduled", "notes": "x"})).await.unwrap();

        let outcome = store
            .update(&key, &fields(json!({"status": "confirmed"})), None)
            .await
            .unwrap();
        let UpdateOutcome::Updated(record) = outcome else {
            panic!("expected update, got {outcome:?}");
        };
        assert_eq!(record.version, 2);
        assert_eq!(record.data, json!({"status": "confirmed", "notes": "x"}));
    }

    #[tokio::test]
    async fn test_update_with_stale_version_is_rejected() {
        let store = store();
        let key = Key::new("p", "s");
        store.put_if_absent(&key, &json!({"status": "scheduled"})).await.unwrap();
        store
            .update(&key, &fields(json!({"status": "confirmed"})), Some(1))
            .await
            .unwrap();

        let outcome = store
            .update(&key, &fields(json!({"status": "cancelled"})), Some(1))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::VersionMismatch { current: 2 });

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.data["status"], "confirmed");
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = store();
        let outcome = store
            .update(&Key::new("p", "nope"), &fields(json!({"a": 1})), None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }
}
