use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::queries;
use crate::db::{Key, PutOutcome, Store, UpdateOutcome};
use crate::errors::BookingError;
use crate::models::{Appointment, AppointmentStatus, ClientInfo, DateRange, PaymentStatus};
use crate::services::availability::{load_bookable_service, marked_grid};
use crate::services::hours::WorkingHoursResolver;
use crate::services::time::{minutes_to_time, time_to_minutes};
use crate::services::validate_id;

pub const MAX_UPDATE_ATTEMPTS: usize = 3;

pub const MAX_BATCH_SIZE: usize = 25;

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub tenant_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub client: ClientInfo,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
}

/// `<yyyymmdd><hhmm>-<uuid>`: the slot key is recoverable from the id.
pub fn new_appointment_id(date: NaiveDate, start_time: &str) -> String {
    format!(
        "{}{}-{}",
        date.format("%Y%m%d"),
        start_time.replace(':', ""),
        Uuid::new_v4().simple()
    )
}

pub fn parse_appointment_id(id: &str) -> Result<(NaiveDate, String), BookingError> {
    let malformed = || BookingError::NotFound(format!("appointment {id}"));

    let (day, hhmm, sep) = match (id.get(0..8), id.get(8..12), id.get(12..13)) {
        (Some(day), Some(hhmm), Some(sep)) => (day, hhmm, sep),
        _ => return Err(malformed()),
    };
    let digits = day.bytes().chain(hhmm.bytes()).all(|b| b.is_ascii_digit());
    if sep != "-" || id.len() == 13 || !digits {
        return Err(malformed());
    }

    let date = NaiveDate::parse_from_str(day, "%Y%m%d").map_err(|_| malformed())?;
    let start_time = format!("{}:{}", &hhmm[0..2], &hhmm[2..4]);
    time_to_minutes(&start_time).map_err(|_| malformed())?;
    Ok((date, start_time))
}

/// Create an appointment for the requested slot if nobody holds it.
///
/// The availability check up front only narrows the race window. The commit
/// is a conditional create on the `(tenant, date, start_time)` slot key, and
/// that write alone decides which of several concurrent requests wins.
pub async fn book_appointment(
    store: &dyn Store,
    hours: &WorkingHoursResolver,
    req: &BookingRequest,
    now: NaiveDateTime,
) -> Result<Appointment, BookingError> {
    let start = time_to_minutes(&req.start_time)?;
    if req.client.name.trim().is_empty() {
        return Err(BookingError::Validation("client name is required".to_string()));
    }
    if req
        .idempotency_key
        .as_deref()
        .is_some_and(|k| k.trim().is_empty())
    {
        return Err(BookingError::Validation(
            "idempotency key must not be empty".to_string(),
        ));
    }

    let service = load_bookable_service(store, &req.tenant_id, &req.service_id).await?;

    let now_minutes = now.hour() * 60 + now.minute();
    if req.date < now.date() || (req.date == now.date() && start < now_minutes) {
        return Err(BookingError::Validation(
            "cannot book a slot in the past".to_string(),
        ));
    }

    if let Some(existing) = replayed(store, req).await? {
        return Ok(existing);
    }

    let schedule = hours.resolve(store, &req.tenant_id, req.date).await?;
    let grid = marked_grid(store, &req.tenant_id, &service, schedule, req.date).await?;
    let Some(slot) = grid.iter().find(|s| s.start == start) else {
        return Err(BookingError::SlotNotOffered(if schedule.is_open() {
            format!(
                "{} is not a bookable start for {} on {}",
                req.start_time, service.id, req.date
            )
        } else {
            format!("closed on {}", req.date)
        }));
    };
    if !slot.available {
        tracing::info!(
            tenant_id = %req.tenant_id,
            date = %req.date,
            start_time = %req.start_time,
            "slot already taken at availability check"
        );
        return Err(BookingError::SlotNoLongerAvailable);
    }

    let appointment = Appointment {
        id: new_appointment_id(req.date, &req.start_time),
        tenant_id: req.tenant_id.clone(),
        service_id: service.id.clone(),
        client: req.client.clone(),
        date: req.date,
        start_time: req.start_time.clone(),
        end_time: minutes_to_time(slot.end),
        status: AppointmentStatus::Scheduled,
        payment_status: PaymentStatus::Pending,
        price: service.price,
        notes: req.notes.clone(),
        idempotency_key: req.idempotency_key.clone(),
        created_at: now,
        updated_at: now,
    };

    commit(store, appointment).await
}

async fn replayed(
    store: &dyn Store,
    req: &BookingRequest,
) -> Result<Option<Appointment>, BookingError> {
    let Some(token) = req.idempotency_key.as_deref() else {
        return Ok(None);
    };
    let Some((existing, _)) =
        queries::get_slot(store, &req.tenant_id, req.date, &req.start_time).await?
    else {
        return Ok(None);
    };
    if !existing.status.occupies_slot() || existing.idempotency_key.as_deref() != Some(token) {
        return Ok(None);
    }
    tracing::info!(
        tenant_id = %existing.tenant_id,
        appointment_id = %existing.id,
        "idempotent booking replay"
    );
    Ok(Some(existing))
}

async fn commit(store: &dyn Store, appointment: Appointment) -> Result<Appointment, BookingError> {
    let key = queries::slot_key(&appointment.tenant_id, appointment.date, &appointment.start_time);
    let data = queries::to_data(&key, &appointment)?;

    if store.put_if_absent(&key, &data).await? == PutOutcome::Created {
        tracing::info!(
            tenant_id = %appointment.tenant_id,
            appointment_id = %appointment.id,
            date = %appointment.date,
            start_time = %appointment.start_time,
            "appointment booked"
        );
        return Ok(appointment);
    }

    let Some(record) = store.get(&key).await? else {
        return Err(BookingError::SlotNoLongerAvailable);
    };
    let holder: Appointment = record.decode()?;

    if holder.status.occupies_slot() {
        if appointment.idempotency_key.is_some()
            && holder.idempotency_key == appointment.idempotency_key
        {
            return Ok(holder);
        }
        tracing::info!(
            tenant_id = %appointment.tenant_id,
            date = %appointment.date,
            start_time = %appointment.start_time,
            holder = %holder.id,
            "slot lost to concurrent booking"
        );
        return Err(BookingError::SlotNoLongerAvailable);
    }

    // The slot is held by a cancelled appointment: keep it in the archive,
    // then take the key over only if nobody else changed it meanwhile.
    let archive = queries::archive_key(&holder.tenant_id, holder.date, &holder.start_time, &holder.id);
    store.put(&archive, &record.data).await?;

    let fields = queries::to_fields(&key, &appointment)?;
    match store.update(&key, &fields, Some(record.version)).await? {
        UpdateOutcome::Updated(_) => {
            tracing::info!(
                tenant_id = %appointment.tenant_id,
                appointment_id = %appointment.id,
                replaced = %holder.id,
                "appointment booked over cancelled slot"
            );
            Ok(appointment)
        }
        UpdateOutcome::NotFound | UpdateOutcome::VersionMismatch { .. } => {
            Err(BookingError::SlotNoLongerAvailable)
        }
    }
}

struct Located {
    key: Key,
    version: i64,
    appointment: Appointment,
}

async fn locate(
    store: &dyn Store,
    tenant_id: &str,
    appointment_id: &str,
) -> Result<Located, BookingError> {
    validate_id("tenant id", tenant_id)?;
    let (date, start_time) = parse_appointment_id(appointment_id)?;

    let live = queries::slot_key(tenant_id, date, &start_time);
    if let Some(record) = store.get(&live).await? {
        let appointment: Appointment = record.decode()?;
        if appointment.id == appointment_id {
            return Ok(Located {
                key: live,
                version: record.version,
                appointment,
            });
        }
    }

    let archived = queries::archive_key(tenant_id, date, &start_time, appointment_id);
    match store.get(&archived).await? {
        Some(record) => Ok(Located {
            appointment: record.decode()?,
            key: archived,
            version: record.version,
        }),
        None => Err(BookingError::NotFound(format!("appointment {appointment_id}"))),
    }
}

pub async fn get_appointment(
    store: &dyn Store,
    tenant_id: &str,
    appointment_id: &str,
) -> Result<Appointment, BookingError> {
    Ok(locate(store, tenant_id, appointment_id).await?.appointment)
}

async fn update_with_retry<F>(
    store: &dyn Store,
    tenant_id: &str,
    appointment_id: &str,
    mut change: F,
) -> Result<Appointment, BookingError>
where
    F: FnMut(&Appointment) -> Result<Map<String, Value>, BookingError>,
{
    for _ in 0..MAX_UPDATE_ATTEMPTS {
        let located = locate(store, tenant_id, appointment_id).await?;
        let fields = change(&located.appointment)?;

        match store.update(&located.key, &fields, Some(located.version)).await? {
            UpdateOutcome::Updated(record) => return Ok(record.decode()?),
            UpdateOutcome::VersionMismatch { current } => {
                tracing::debug!(appointment_id, current, "appointment changed underneath, retrying");
            }
            // Displaced into the archive between read and write
            UpdateOutcome::NotFound => {}
        }
    }
    Err(BookingError::ConcurrentModification(appointment_id.to_string()))
}

pub async fn transition_status(
    store: &dyn Store,
    tenant_id: &str,
    appointment_id: &str,
    next: AppointmentStatus,
    now: NaiveDateTime,
) -> Result<Appointment, BookingError> {
    let updated = update_with_retry(store, tenant_id, appointment_id, |current| {
        if !current.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: current.status.as_str(),
                to: next.as_str(),
            });
        }
        status_fields(next, now)
    })
    .await?;

    tracing::info!(
        tenant_id,
        appointment_id,
        status = next.as_str(),
        "appointment status changed"
    );
    Ok(updated)
}

pub async fn record_payment(
    store: &dyn Store,
    tenant_id: &str,
    appointment_id: &str,
    next: PaymentStatus,
    now: NaiveDateTime,
) -> Result<Appointment, BookingError> {
    let updated = update_with_retry(store, tenant_id, appointment_id, |current| {
        let allowed = current.payment_status.can_transition_to(next)
            && (current.status.occupies_slot() || next == PaymentStatus::Refunded);
        if !allowed {
            return Err(BookingError::InvalidTransition {
                from: current.payment_status.as_str(),
                to: next.as_str(),
            });
        }
        let mut fields = Map::new();
        fields.insert("payment_status".to_string(), Value::from(next.as_str()));
        fields.insert("updated_at".to_string(), timestamp(now)?);
        Ok(fields)
    })
    .await?;

    tracing::info!(
        tenant_id,
        appointment_id,
        payment_status = next.as_str(),
        "payment status changed"
    );
    Ok(updated)
}

fn status_fields(
    status: AppointmentStatus,
    now: NaiveDateTime,
) -> Result<Map<String, Value>, BookingError> {
    let mut fields = Map::new();
    fields.insert("status".to_string(), Value::from(status.as_str()));
    fields.insert("updated_at".to_string(), timestamp(now)?);
    Ok(fields)
}

fn timestamp(now: NaiveDateTime) -> Result<Value, BookingError> {
    serde_json::to_value(now)
        .map_err(|e| BookingError::CorruptRecord(format!("timestamp {now}: {e}")))
}

/// Move confirmed appointments whose end time is at or before `now` to
/// completed. Returns how many were moved.
pub async fn complete_elapsed(
    store: &dyn Store,
    tenant_id: &str,
    now: NaiveDateTime,
) -> Result<usize, BookingError> {
    let mut completed = 0;
    for (appointment, version) in queries::list_confirmed_records(store, tenant_id).await? {
        let end = time_to_minutes(&appointment.end_time)?;
        let end_time = NaiveTime::from_num_seconds_from_midnight_opt(end * 60, 0)
            .ok_or_else(|| BookingError::InvalidFormat(appointment.end_time.clone()))?;
        if appointment.date.and_time(end_time) > now {
            continue;
        }

        let key = queries::slot_key(tenant_id, appointment.date, &appointment.start_time);
        let fields = status_fields(AppointmentStatus::Completed, now)?;
        match store.update(&key, &fields, Some(version)).await? {
            UpdateOutcome::Updated(_) => completed += 1,
            UpdateOutcome::VersionMismatch { .. } | UpdateOutcome::NotFound => {
                tracing::debug!(appointment_id = %appointment.id, "skipped completion, appointment changed");
            }
        }
    }
    Ok(completed)
}

pub async fn complete_elapsed_all(store: &dyn Store, now: NaiveDateTime) -> Result<usize, BookingError> {
    let mut total = 0;
    for tenant_id in queries::list_tenants(store).await? {
        match complete_elapsed(store, &tenant_id, now).await {
            Ok(n) => total += n,
            Err(e) => tracing::warn!(tenant_id = %tenant_id, error = %e, "auto-completion failed"),
        }
    }
    if total > 0 {
        tracing::info!(completed = total, "auto-completed appointments");
    }
    Ok(total)
}

#[derive(Debug)]
pub struct BatchItemOutcome {
    pub date: NaiveDate,
    pub start_time: String,
    pub result: Result<Appointment, BookingError>,
}

/// Books each request on its own; a failed item does not stop the rest.
pub async fn book_batch(
    store: &dyn Store,
    hours: &WorkingHoursResolver,
    requests: &[BookingRequest],
    now: NaiveDateTime,
) -> Result<Vec<BatchItemOutcome>, BookingError> {
    if requests.is_empty() {
        return Err(BookingError::Validation("batch has no appointments".to_string()));
    }
    if requests.len() > MAX_BATCH_SIZE {
        return Err(BookingError::Validation(format!(
            "batch holds {} appointments, at most {MAX_BATCH_SIZE} allowed",
            requests.len()
        )));
    }

    let mut outcomes = Vec::with_capacity(requests.len());
    for req in requests {
        let result = book_appointment(store, hours, req, now).await;
        if let Err(e) = &result {
            tracing::info!(
                tenant_id = %req.tenant_id,
                date = %req.date,
                start_time = %req.start_time,
                error = %e,
                "batch item not booked"
            );
        }
        outcomes.push(BatchItemOutcome {
            date: req.date,
            start_time: req.start_time.clone(),
            result,
        });
    }

    let booked = outcomes.iter().filter(|o| o.result.is_ok()).count();
    tracing::info!(booked, failed = outcomes.len() - booked, "batch booking finished");
    Ok(outcomes)
}

pub async fn list_appointments(
    store: &dyn Store,
    tenant_id: &str,
    range: Option<DateRange>,
    status: Option<AppointmentStatus>,
) -> Result<Vec<Appointment>, BookingError> {
    validate_id("tenant id", tenant_id)?;

    let mut appointments = queries::list_live_appointments(store, tenant_id, range, status).await?;
    if matches!(status, None | Some(AppointmentStatus::Cancelled)) {
        appointments.extend(queries::list_archived_appointments(store, tenant_id, range).await?);
    }
    appointments.sort_by(|a, b| {
        (a.date, &a.start_time, a.created_at).cmp(&(b.date, &b.start_time, b.created_at))
    });
    Ok(appointments)
}
