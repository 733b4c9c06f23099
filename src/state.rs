use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::AppConfig;
use crate::db::Store;
use crate::services::hours::WorkingHoursResolver;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    pub hours: WorkingHoursResolver,
    pub clock: fn() -> NaiveDateTime,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        Self {
            hours: WorkingHoursResolver::new(config.default_working_hours.clone()),
            store,
            config,
            clock: system_clock,
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}

/// Wall-clock time of the server, which is expected to run in the tenants'
/// local timezone.
pub fn system_clock() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
