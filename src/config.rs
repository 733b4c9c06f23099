use std::env;

use anyhow::Context;

use crate::models::WorkingHoursConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    /// Seconds between auto-completion sweeps; 0 disables the sweep.
    pub auto_complete_interval_secs: u64,
    /// Schedule for tenants that never configured working hours.
    pub default_working_hours: WorkingHoursConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let default_working_hours = match env::var("DEFAULT_WORKING_HOURS") {
            Ok(json) if !json.trim().is_empty() => WorkingHoursConfig::from_json(&json)
                .context("DEFAULT_WORKING_HOURS is not a valid working hours config")?,
            _ => WorkingHoursConfig::default(),
        };

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "agenda.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            auto_complete_interval_secs: env::var("AUTO_COMPLETE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            default_working_hours,
        })
    }
}
