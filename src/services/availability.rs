use chrono::NaiveDate;
use serde::Serialize;

use crate::db::queries;
use crate::db::Store;
use crate::errors::BookingError;
use crate::models::{Appointment, Interval, ServiceDefinition, TimeSlot};
use crate::services::hours::{DaySchedule, WorkingHoursResolver};
use crate::services::slots::{generate_slots, mark_conflicts, SLOT_STEP_MINUTES};
use crate::services::time::time_to_minutes;
use crate::services::validate_id;

#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub service_id: String,
    pub duration_minutes: u32,
    pub is_open: bool,
    pub slots: Vec<TimeSlot>,
}

/// Open slots for `service_id` on `date`, ascending by start time. A closed
/// day yields an empty list without reading any appointments.
pub async fn get_available_slots(
    store: &dyn Store,
    hours: &WorkingHoursResolver,
    tenant_id: &str,
    service_id: &str,
    date: NaiveDate,
) -> Result<Vec<TimeSlot>, BookingError> {
    Ok(day_availability(store, hours, tenant_id, service_id, date)
        .await?
        .slots)
}

pub async fn day_availability(
    store: &dyn Store,
    hours: &WorkingHoursResolver,
    tenant_id: &str,
    service_id: &str,
    date: NaiveDate,
) -> Result<DayAvailability, BookingError> {
    let service = load_bookable_service(store, tenant_id, service_id).await?;
    let schedule = hours.resolve(store, tenant_id, date).await?;
    let grid = marked_grid(store, tenant_id, &service, schedule, date).await?;

    Ok(DayAvailability {
        date,
        service_id: service.id,
        duration_minutes: service.duration_minutes,
        is_open: schedule.is_open(),
        slots: grid.into_iter().filter(|s| s.available).collect(),
    })
}

pub(crate) async fn load_bookable_service(
    store: &dyn Store,
    tenant_id: &str,
    service_id: &str,
) -> Result<ServiceDefinition, BookingError> {
    validate_id("tenant id", tenant_id)?;
    validate_id("service id", service_id)?;

    let service = queries::get_service(store, tenant_id, service_id)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("service {service_id}")))?;
    if !service.is_active {
        return Err(BookingError::Validation(format!(
            "service {service_id} is not active"
        )));
    }
    Ok(service)
}

/// The day's full candidate grid with conflicting slots marked unavailable.
pub(crate) async fn marked_grid(
    store: &dyn Store,
    tenant_id: &str,
    service: &ServiceDefinition,
    schedule: DaySchedule,
    date: NaiveDate,
) -> Result<Vec<TimeSlot>, BookingError> {
    let DaySchedule::Open(open) = schedule else {
        tracing::debug!(tenant_id, date = %date, "tenant closed");
        return Ok(vec![]);
    };

    let mut grid = generate_slots(open, service.duration_minutes, SLOT_STEP_MINUTES);
    if grid.is_empty() {
        return Ok(grid);
    }

    let appointments = queries::occupying_appointments(store, tenant_id, date).await?;
    let busy = busy_intervals(&appointments)?;
    mark_conflicts(&mut grid, &busy);
    Ok(grid)
}

pub fn appointment_interval(appointment: &Appointment) -> Result<Interval, BookingError> {
    Ok(Interval::new(
        time_to_minutes(&appointment.start_time)?,
        time_to_minutes(&appointment.end_time)?,
    ))
}

fn busy_intervals(appointments: &[Appointment]) -> Result<Vec<Interval>, BookingError> {
    appointments
        .iter()
        .filter(|a| a.status.occupies_slot())
        .map(appointment_interval)
        .collect()
}
