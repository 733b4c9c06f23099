use chrono::{Datelike, NaiveDate};

use crate::db::queries;
use crate::db::Store;
use crate::errors::BookingError;
use crate::models::{Interval, WorkingHoursConfig};
use crate::services::time::time_to_minutes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySchedule {
    Closed,
    Open(Interval),
}

impl DaySchedule {
    pub fn is_open(&self) -> bool {
        matches!(self, DaySchedule::Open(_))
    }
}

/// Resolves a tenant's opening interval for a calendar day, falling back to
/// `defaults` when the tenant never configured working hours.
#[derive(Debug, Clone, Default)]
pub struct WorkingHoursResolver {
    defaults: WorkingHoursConfig,
}

impl WorkingHoursResolver {
    pub fn new(defaults: WorkingHoursConfig) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &WorkingHoursConfig {
        &self.defaults
    }

    pub async fn resolve(
        &self,
        store: &dyn Store,
        tenant_id: &str,
        date: NaiveDate,
    ) -> Result<DaySchedule, BookingError> {
        let configured = queries::get_working_hours(store, tenant_id).await?;
        let config = configured.as_ref().unwrap_or(&self.defaults);
        schedule_for(config, date)
    }
}

pub fn schedule_for(config: &WorkingHoursConfig, date: NaiveDate) -> Result<DaySchedule, BookingError> {
    let Some(hours) = config.day(date.weekday()).filter(|h| h.enabled) else {
        return Ok(DaySchedule::Closed);
    };

    let start = time_to_minutes(&hours.start)?;
    let end = time_to_minutes(&hours.end)?;
    if start >= end {
        // Rejected on write, but old or hand-edited records may still carry it.
        tracing::warn!(date = %date, start = %hours.start, end = %hours.end, "empty working hours, treating day as closed");
        return Ok(DaySchedule::Closed);
    }
    Ok(DaySchedule::Open(Interval::new(start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::DayHours;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_default_weekday_is_open() {
        // 2030-06-17 is a Monday
        let schedule = schedule_for(&WorkingHoursConfig::default(), date("2030-06-17")).unwrap();
        assert_eq!(schedule, DaySchedule::Open(Interval::new(540, 1080)));
    }

    #[test]
    fn test_default_weekend_is_closed() {
        // 2030-06-22 is a Saturday, 2030-06-23 a Sunday
        let config = WorkingHoursConfig::default();
        assert_eq!(schedule_for(&config, date("2030-06-22")).unwrap(), DaySchedule::Closed);
        assert_eq!(schedule_for(&config, date("2030-06-23")).unwrap(), DaySchedule::Closed);
    }

    #[test]
    fn test_missing_day_is_closed() {
        let config = WorkingHoursConfig::from_json(
            r#"{"tuesday":{"enabled":true,"start":"10:00","end":"14:00"}}"#,
        )
        .unwrap();
        assert_eq!(schedule_for(&config, date("2030-06-17")).unwrap(), DaySchedule::Closed);
        assert_eq!(
            schedule_for(&config, date("2030-06-18")).unwrap(),
            DaySchedule::Open(Interval::new(600, 840))
        );
    }

    #[test]
    fn test_inverted_hours_treated_as_closed() {
        let mut config = WorkingHoursConfig::default();
        config.monday = Some(DayHours::open("18:00", "09:00"));
        assert_eq!(schedule_for(&config, date("2030-06-17")).unwrap(), DaySchedule::Closed);
    }

    #[tokio::test]
    async fn test_resolver_prefers_tenant_config() {
        let store = SqliteStore::open(":memory:").unwrap();
        let mut custom = WorkingHoursConfig::default();
        custom.saturday = Some(DayHours::open("08:00", "12:00"));
        queries::put_working_hours(&store, "t1", &custom).await.unwrap();

        let resolver = WorkingHoursResolver::default();
        let saturday = date("2030-06-22");
        assert_eq!(
            resolver.resolve(&store, "t1", saturday).await.unwrap(),
            DaySchedule::Open(Interval::new(480, 720))
        );
        // Tenant without config gets the defaults
        assert_eq!(
            resolver.resolve(&store, "t2", saturday).await.unwrap(),
            DaySchedule::Closed
        );
    }

    #[tokio::test]
    async fn test_resolver_uses_injected_defaults() {
        let store = SqliteStore::open(":memory:").unwrap();
        let mut defaults = WorkingHoursConfig::default();
        defaults.monday = Some(DayHours::open("07:00", "11:00"));

        let resolver = WorkingHoursResolver::new(defaults);
        assert_eq!(
            resolver.resolve(&store, "t1", date("2030-06-17")).await.unwrap(),
            DaySchedule::Open(Interval::new(420, 660))
        );
    }
}
