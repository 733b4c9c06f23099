use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use super::store::{Key, PrefixQuery, Record, Store, StoreError};
use crate::models::{Appointment, AppointmentStatus, DateRange, ServiceDefinition, WorkingHoursConfig};

// ── Key layout ──

const TENANT_REGISTRY: &str = "TENANTS";

pub fn tenant_partition(tenant_id: &str) -> String {
    format!("TENANT#{tenant_id}")
}

pub fn service_key(tenant_id: &str, service_id: &str) -> Key {
    Key::new(tenant_partition(tenant_id), format!("SERVICE#{service_id}"))
}

pub fn working_hours_key(tenant_id: &str) -> Key {
    Key::new(tenant_partition(tenant_id), "SETTINGS#WORKING_HOURS")
}

/// The mutual-exclusion key for a booking. At most one live appointment exists
/// per `(tenant, date, start_time)`.
pub fn slot_key(tenant_id: &str, date: NaiveDate, start_time: &str) -> Key {
    Key::new(
        tenant_partition(tenant_id),
        format!("SLOT#{}#{start_time}", date.format("%Y-%m-%d")),
    )
}

pub fn archive_key(tenant_id: &str, date: NaiveDate, start_time: &str, appointment_id: &str) -> Key {
    Key::new(
        tenant_partition(tenant_id),
        format!("CANCELLED#{}#{start_time}#{appointment_id}", date.format("%Y-%m-%d")),
    )
}

fn range_prefix(kind: &str, range: Option<DateRange>) -> String {
    match range {
        Some(r) => format!("{kind}#{}", r.key_prefix()),
        None => format!("{kind}#"),
    }
}

pub fn to_data<T: Serialize>(key: &Key, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub fn to_fields<T: Serialize>(key: &Key, value: &T) -> Result<Map<String, Value>, StoreError> {
    match to_data(key, value)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::Corrupt {
            key: key.to_string(),
            reason: "value does not serialize to an object".to_string(),
        }),
    }
}

// ── Tenants ──

pub async fn register_tenant(store: &dyn Store, tenant_id: &str) -> Result<(), StoreError> {
    let key = Key::new(TENANT_REGISTRY, tenant_partition(tenant_id));
    store
        .put(&key, &serde_json::json!({ "tenant_id": tenant_id }))
        .await
}

pub async fn list_tenants(store: &dyn Store) -> Result<Vec<String>, StoreError> {
    let records = store
        .query(&PrefixQuery::new(TENANT_REGISTRY, "TENANT#"))
        .await?;
    Ok(records
        .into_iter()
        .filter_map(|r| {
            r.key
                .sort
                .strip_prefix("TENANT#")
                .map(|id| id.to_string())
        })
        .collect())
}

// ── Services ──

pub async fn get_service(
    store: &dyn Store,
    tenant_id: &str,
    service_id: &str,
) -> Result<Option<ServiceDefinition>, StoreError> {
    match store.get(&service_key(tenant_id, service_id)).await? {
        Some(record) => Ok(Some(record.decode()?)),
        None => Ok(None),
    }
}

pub async fn put_service(store: &dyn Store, service: &ServiceDefinition) -> Result<(), StoreError> {
    let key = service_key(&service.tenant_id, &service.id);
    store.put(&key, &to_data(&key, service)?).await?;
    register_tenant(store, &service.tenant_id).await
}

pub async fn list_services(
    store: &dyn Store,
    tenant_id: &str,
    active_only: bool,
) -> Result<Vec<ServiceDefinition>, StoreError> {
    let mut query = PrefixQuery::new(tenant_partition(tenant_id), "SERVICE#");
    if active_only {
        query = query.filter_eq("is_active", true);
    }
    decode_all(store.query(&query).await?)
}

// ── Working hours ──

pub async fn get_working_hours(
    store: &dyn Store,
    tenant_id: &str,
) -> Result<Option<WorkingHoursConfig>, StoreError> {
    match store.get(&working_hours_key(tenant_id)).await? {
        Some(record) => Ok(Some(record.decode()?)),
        None => Ok(None),
    }
}

pub async fn put_working_hours(
    store: &dyn Store,
    tenant_id: &str,
    config: &WorkingHoursConfig,
) -> Result<(), StoreError> {
    let key = working_hours_key(tenant_id);
    store.put(&key, &to_data(&key, config)?).await?;
    register_tenant(store, tenant_id).await
}

// ── Appointments ──

/// The appointment currently holding a slot key, with the record version to
/// compare-and-swap against.
pub async fn get_slot(
    store: &dyn Store,
    tenant_id: &str,
    date: NaiveDate,
    start_time: &str,
) -> Result<Option<(Appointment, i64)>, StoreError> {
    match store.get(&slot_key(tenant_id, date, start_time)).await? {
        Some(record) => Ok(Some((record.decode()?, record.version))),
        None => Ok(None),
    }
}

pub async fn occupying_appointments(
    store: &dyn Store,
    tenant_id: &str,
    date: NaiveDate,
) -> Result<Vec<Appointment>, StoreError> {
    let query = PrefixQuery::new(tenant_partition(tenant_id), range_prefix("SLOT", Some(DateRange::day(date))))
        .filter_ne("status", AppointmentStatus::Cancelled.as_str());
    decode_all(store.query(&query).await?)
}

/// Appointments at their slot key, optionally narrowed to a date range and status.
pub async fn list_live_appointments(
    store: &dyn Store,
    tenant_id: &str,
    range: Option<DateRange>,
    status: Option<AppointmentStatus>,
) -> Result<Vec<Appointment>, StoreError> {
    let mut query = PrefixQuery::new(tenant_partition(tenant_id), range_prefix("SLOT", range));
    if let Some(status) = status {
        query = query.filter_eq("status", status.as_str());
    }
    Ok(within(decode_all(store.query(&query).await?)?, range))
}

/// Cancelled appointments displaced from their slot by a later booking.
pub async fn list_archived_appointments(
    store: &dyn Store,
    tenant_id: &str,
    range: Option<DateRange>,
) -> Result<Vec<Appointment>, StoreError> {
    let query = PrefixQuery::new(tenant_partition(tenant_id), range_prefix("CANCELLED", range));
    Ok(within(decode_all(store.query(&query).await?)?, range))
}

pub async fn list_confirmed_records(
    store: &dyn Store,
    tenant_id: &str,
) -> Result<Vec<(Appointment, i64)>, StoreError> {
    let query = PrefixQuery::new(tenant_partition(tenant_id), "SLOT#")
        .filter_eq("status", AppointmentStatus::Confirmed.as_str());
    let mut out = vec![];
    for record in store.query(&query).await? {
        out.push((record.decode()?, record.version));
    }
    Ok(out)
}

fn within(mut appointments: Vec<Appointment>, range: Option<DateRange>) -> Vec<Appointment> {
    if let Some(range) = range {
        appointments.retain(|a| range.contains(a.date));
    }
    appointments
}

fn decode_all<T: serde::de::DeserializeOwned>(records: Vec<Record>) -> Result<Vec<T>, StoreError> {
    records.iter().map(Record::decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    fn store() -> SqliteStore {
        SqliteStore::open(":memory:").unwrap()
    }

    fn service(tenant_id: &str, id: &str, is_active: bool) -> ServiceDefinition {
        ServiceDefinition {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: id.to_string(),
            duration_minutes: 30,
            price: 4000,
            is_active,
        }
    }

    #[test]
    fn test_slot_key_layout() {
        let date = NaiveDate::from_ymd_opt(2030, 6, 17).unwrap();
        let key = slot_key("salon", date, "10:00");
        assert_eq!(key.partition, "TENANT#salon");
        assert_eq!(key.sort, "SLOT#2030-06-17#10:00");
    }

    #[tokio::test]
    async fn test_services_round_trip_and_active_filter() {
        let store = store();
        put_service(&store, &service("t1", "cut", true)).await.unwrap();
        put_service(&store, &service("t1", "dye", false)).await.unwrap();
        put_service(&store, &service("t2", "nails", true)).await.unwrap();

        let found = get_service(&store, "t1", "cut").await.unwrap().unwrap();
        assert_eq!(found.duration_minutes, 30);
        assert!(get_service(&store, "t2", "cut").await.unwrap().is_none());

        assert_eq!(list_services(&store, "t1", false).await.unwrap().len(), 2);
        let active = list_services(&store, "t1", true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "cut");
    }

    #[tokio::test]
    async fn test_config_writes_register_tenant() {
        let store = store();
        put_service(&store, &service("t1", "cut", true)).await.unwrap();
        put_working_hours(&store, "t2", &WorkingHoursConfig::default())
            .await
            .unwrap();
        put_service(&store, &service("t1", "dye", true)).await.unwrap();

        assert_eq!(list_tenants(&store).await.unwrap(), vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_working_hours_absent_until_set() {
        let store = store();
        assert!(get_working_hours(&store, "t1").await.unwrap().is_none());

        let config = WorkingHoursConfig::default();
        put_working_hours(&store, "t1", &config).await.unwrap();
        assert_eq!(get_working_hours(&store, "t1").await.unwrap(), Some(config));
    }
}
