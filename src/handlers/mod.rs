pub mod admin;
pub mod booking;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDate;

use crate::errors::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/tenants/:tenant_id/services", get(booking::list_services))
        .route(
            "/api/tenants/:tenant_id/services/:service_id/slots",
            get(booking::available_slots),
        )
        .route("/api/tenants/:tenant_id/bookings", post(booking::create_booking))
        .route(
            "/api/tenants/:tenant_id/bookings/:booking_id",
            get(booking::booking_status),
        )
        .route(
            "/api/admin/tenants/:tenant_id/appointments",
            get(admin::list_appointments),
        )
        .route(
            "/api/admin/tenants/:tenant_id/appointments/batch",
            post(admin::create_batch),
        )
        .route(
            "/api/admin/tenants/:tenant_id/appointments/:id",
            get(admin::get_appointment),
        )
        .route(
            "/api/admin/tenants/:tenant_id/appointments/:id/status",
            post(admin::update_status),
        )
        .route(
            "/api/admin/tenants/:tenant_id/appointments/:id/payment",
            post(admin::update_payment),
        )
        .route(
            "/api/admin/tenants/:tenant_id/services",
            get(admin::list_services),
        )
        .route(
            "/api/admin/tenants/:tenant_id/services/:service_id",
            axum::routing::put(admin::put_service),
        )
        .route(
            "/api/admin/tenants/:tenant_id/working-hours",
            get(admin::get_working_hours).put(admin::put_working_hours),
        )
        .with_state(state)
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date {s:?}, expected YYYY-MM-DD")))
}
