use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::parse_date;
use crate::db::queries;
use crate::errors::{AppError, BookingError};
use crate::models::{
    Appointment, AppointmentStatus, ClientInfo, DateRange, PaymentStatus, ServiceDefinition,
    WorkingHoursConfig,
};
use crate::services::booking::{self, BookingRequest};
use crate::services::validate_id;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/tenants/:tenant_id/appointments?date=&from=&to=&status=
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: Option<String>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let range = match (query.date.as_deref(), query.from.as_deref(), query.to.as_deref()) {
        (None, None, None) => None,
        (Some(date), None, None) => Some(DateRange::day(parse_date(date)?)),
        (None, Some(from), Some(to)) => Some(
            DateRange::new(parse_date(from)?, parse_date(to)?).map_err(AppError::BadRequest)?,
        ),
        _ => {
            return Err(AppError::BadRequest(
                "filter by either date, or both from and to".to_string(),
            ))
        }
    };
    let status = query
        .status
        .as_deref()
        .map(|s| {
            AppointmentStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status {s:?}")))
        })
        .transpose()?;

    let appointments =
        booking::list_appointments(state.store.as_ref(), &tenant_id, range, status).await?;
    Ok(Json(appointments))
}

// GET /api/admin/tenants/:tenant_id/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((tenant_id, id)): Path<(String, String)>,
) -> Result<Json<Appointment>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let appointment = booking::get_appointment(state.store.as_ref(), &tenant_id, &id).await?;
    Ok(Json(appointment))
}

// POST /api/admin/tenants/:tenant_id/appointments/batch
#[derive(Deserialize)]
pub struct BatchItemBody {
    pub service_id: String,
    pub date: String,
    pub start_time: String,
}

#[derive(Deserialize)]
pub struct BatchBody {
    pub client_name: String,
    pub client_id: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub items: Vec<BatchItemBody>,
}

#[derive(Serialize)]
pub struct BatchItemResponse {
    pub date: NaiveDate,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<Appointment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub booked: usize,
    pub failed: usize,
    pub items: Vec<BatchItemResponse>,
}

pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    Json(body): Json<BatchBody>,
) -> Result<Json<BatchResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let client = ClientInfo {
        client_id: body.client_id,
        name: body.client_name,
        phone: body.client_phone,
        email: body.client_email,
    };

    let mut requests = Vec::with_capacity(body.items.len());
    for item in body.items {
        let date = parse_date(&item.date)?;
        // Per-item key derived from the batch key and the slot
        let idempotency_key = body
            .idempotency_key
            .as_ref()
            .map(|key| format!("{key}:{date}:{}", item.start_time));
        requests.push(BookingRequest {
            tenant_id: tenant_id.clone(),
            service_id: item.service_id,
            date,
            start_time: item.start_time,
            client: client.clone(),
            notes: body.notes.clone(),
            idempotency_key,
        });
    }

    let outcomes =
        booking::book_batch(state.store.as_ref(), &state.hours, &requests, state.now()).await?;

    let items: Vec<BatchItemResponse> = outcomes
        .into_iter()
        .map(|o| match o.result {
            Ok(appointment) => BatchItemResponse {
                date: o.date,
                start_time: o.start_time,
                appointment: Some(appointment),
                error: None,
            },
            Err(e) => BatchItemResponse {
                date: o.date,
                start_time: o.start_time,
                appointment: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    let booked = items.iter().filter(|i| i.appointment.is_some()).count();

    Ok(Json(BatchResponse {
        booked,
        failed: items.len() - booked,
        items,
    }))
}

// POST /api/admin/tenants/:tenant_id/appointments/:id/status
#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((tenant_id, id)): Path<(String, String)>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Appointment>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let next = AppointmentStatus::parse(&body.status)
        .ok_or_else(|| AppError::BadRequest(format!("unknown status {:?}", body.status)))?;
    let appointment =
        booking::transition_status(state.store.as_ref(), &tenant_id, &id, next, state.now())
            .await?;
    Ok(Json(appointment))
}

// POST /api/admin/tenants/:tenant_id/appointments/:id/payment
#[derive(Deserialize)]
pub struct PaymentBody {
    pub payment_status: String,
}

pub async fn update_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((tenant_id, id)): Path<(String, String)>,
    Json(body): Json<PaymentBody>,
) -> Result<Json<Appointment>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let next = PaymentStatus::parse(&body.payment_status).ok_or_else(|| {
        AppError::BadRequest(format!("unknown payment status {:?}", body.payment_status))
    })?;
    let appointment =
        booking::record_payment(state.store.as_ref(), &tenant_id, &id, next, state.now()).await?;
    Ok(Json(appointment))
}

// GET /api/admin/tenants/:tenant_id/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<ServiceDefinition>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_id("tenant id", &tenant_id)?;
    Ok(Json(
        queries::list_services(state.store.as_ref(), &tenant_id, false).await?,
    ))
}

// PUT /api/admin/tenants/:tenant_id/services/:service_id
#[derive(Deserialize)]
pub struct ServiceBody {
    pub name: String,
    pub duration_minutes: u32,
    pub price: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

pub async fn put_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((tenant_id, service_id)): Path<(String, String)>,
    Json(body): Json<ServiceBody>,
) -> Result<Json<ServiceDefinition>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_id("tenant id", &tenant_id)?;
    validate_id("service id", &service_id)?;

    let service = ServiceDefinition {
        id: service_id,
        tenant_id,
        name: body.name,
        duration_minutes: body.duration_minutes,
        price: body.price,
        is_active: body.is_active,
    };
    service.validate().map_err(BookingError::Validation)?;

    // Booked appointments carry their own end time and price, so edits only
    // affect future bookings.
    queries::put_service(state.store.as_ref(), &service).await?;
    tracing::info!(tenant_id = %service.tenant_id, service_id = %service.id, "service saved");
    Ok(Json(service))
}

// GET /api/admin/tenants/:tenant_id/working-hours
pub async fn get_working_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Result<Json<WorkingHoursConfig>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_id("tenant id", &tenant_id)?;

    let config = queries::get_working_hours(state.store.as_ref(), &tenant_id)
        .await?
        .unwrap_or_else(|| state.hours.defaults().clone());
    Ok(Json(config))
}

// PUT /api/admin/tenants/:tenant_id/working-hours
pub async fn put_working_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    Json(config): Json<WorkingHoursConfig>,
) -> Result<Json<WorkingHoursConfig>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_id("tenant id", &tenant_id)?;
    config
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    queries::put_working_hours(state.store.as_ref(), &tenant_id, &config).await?;
    tracing::info!(tenant_id = %tenant_id, hours = %config.to_human_readable(), "working hours saved");
    Ok(Json(config))
}
