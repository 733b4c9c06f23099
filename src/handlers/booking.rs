use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::parse_date;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, ClientInfo, PaymentStatus, ServiceDefinition, TimeSlot};
use crate::services::availability;
use crate::services::booking::{self, book_appointment, BookingRequest};
use crate::services::validate_id;
use crate::state::AppState;

// GET /api/tenants/:tenant_id/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<ServiceDefinition>>, AppError> {
    validate_id("tenant id", &tenant_id)?;
    let services = queries::list_services(state.store.as_ref(), &tenant_id, true).await?;
    Ok(Json(services))
}

// GET /api/tenants/:tenant_id/services/:service_id/slots?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    date: NaiveDate,
    service_id: String,
    duration_minutes: u32,
    is_open: bool,
    slots: Vec<TimeSlot>,
}

pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, service_id)): Path<(String, String)>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let date = parse_date(&query.date)?;
    let day = availability::day_availability(
        state.store.as_ref(),
        &state.hours,
        &tenant_id,
        &service_id,
        date,
    )
    .await?;

    Ok(Json(SlotsResponse {
        date: day.date,
        service_id: day.service_id,
        duration_minutes: day.duration_minutes,
        is_open: day.is_open,
        slots: day.slots,
    }))
}

// POST /api/tenants/:tenant_id/bookings
#[derive(Deserialize)]
pub struct CreateBookingBody {
    pub service_id: String,
    pub date: String,
    pub start_time: String,
    pub client_name: String,
    pub client_id: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingBody>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let date = parse_date(&body.date)?;

    let idempotency_key = body.idempotency_key.or_else(|| {
        headers
            .get("idempotency-key")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    });

    let request = BookingRequest {
        tenant_id,
        service_id: body.service_id,
        date,
        start_time: body.start_time,
        client: ClientInfo {
            client_id: body.client_id,
            name: body.client_name,
            phone: body.client_phone,
            email: body.client_email,
        },
        notes: body.notes,
        idempotency_key,
    };

    let appointment =
        book_appointment(state.store.as_ref(), &state.hours, &request, state.now()).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

// GET /api/tenants/:tenant_id/bookings/:booking_id
#[derive(Serialize)]
pub struct BookingStatusResponse {
    id: String,
    service_id: String,
    date: NaiveDate,
    start_time: String,
    end_time: String,
    status: AppointmentStatus,
    payment_status: PaymentStatus,
}

pub async fn booking_status(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, booking_id)): Path<(String, String)>,
) -> Result<Json<BookingStatusResponse>, AppError> {
    let appointment = booking::get_appointment(state.store.as_ref(), &tenant_id, &booking_id).await?;

    // Client contact details stay behind the admin API.
    Ok(Json(BookingStatusResponse {
        id: appointment.id,
        service_id: appointment.service_id,
        date: appointment.date,
        start_time: appointment.start_time,
        end_time: appointment.end_time,
        status: appointment.status,
        payment_status: appointment.payment_status,
    }))
}
