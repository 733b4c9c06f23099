use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::services::time::time_to_minutes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    #[serde(alias = "isOpen")]
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl DayHours {
    pub fn open(start: &str, end: &str) -> Self {
        Self {
            enabled: true,
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    pub fn closed(start: &str, end: &str) -> Self {
        Self {
            enabled: false,
            start: start.to_string(),
            end: end.to_string(),
        }
    }
}

/// Weekly schedule of a tenant. A missing day is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHoursConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thursday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturday: Option<DayHours>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunday: Option<DayHours>,
}

impl Default for WorkingHoursConfig {
    /// Mon-Fri 09:00-18:00, weekends configured for mornings but closed.
    fn default() -> Self {
        Self {
            monday: Some(DayHours::open("09:00", "18:00")),
            tuesday: Some(DayHours::open("09:00", "18:00")),
            wednesday: Some(DayHours::open("09:00", "18:00")),
            thursday: Some(DayHours::open("09:00", "18:00")),
            friday: Some(DayHours::open("09:00", "18:00")),
            saturday: Some(DayHours::closed("09:00", "13:00")),
            sunday: Some(DayHours::closed("09:00", "13:00")),
        }
    }
}

impl WorkingHoursConfig {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let config: WorkingHoursConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for weekday in WEEK {
            let Some(hours) = self.day(weekday) else {
                continue;
            };
            let name = weekday_name(weekday);
            let start = time_to_minutes(&hours.start)
                .map_err(|e| anyhow::anyhow!("{name}: {e}"))?;
            let end =
                time_to_minutes(&hours.end).map_err(|e| anyhow::anyhow!("{name}: {e}"))?;
            if hours.enabled && start >= end {
                anyhow::bail!("{name}: start {} must be before end {}", hours.start, hours.end);
            }
        }
        Ok(())
    }

    pub fn day(&self, weekday: Weekday) -> Option<&DayHours> {
        match weekday {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }

    pub fn to_human_readable(&self) -> String {
        WEEK.iter()
            .filter_map(|&weekday| {
                self.day(weekday)
                    .filter(|h| h.enabled)
                    .map(|h| format!("{}: {}-{}", capitalize(weekday_name(weekday)), h.start, h.end))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let config = WorkingHoursConfig::default();
        assert!(config.day(Weekday::Mon).unwrap().enabled);
        assert!(config.day(Weekday::Fri).unwrap().enabled);
        assert!(!config.day(Weekday::Sat).unwrap().enabled);
        assert!(!config.day(Weekday::Sun).unwrap().enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_valid_json() {
        let json = r#"{"monday":{"enabled":true,"start":"08:00","end":"12:00"}}"#;
        let config = WorkingHoursConfig::from_json(json).unwrap();
        assert_eq!(config.monday, Some(DayHours::open("08:00", "12:00")));
        assert!(config.tuesday.is_none());
    }

    #[test]
    fn test_parse_is_open_alias() {
        let json = r#"{"saturday":{"isOpen":true,"start":"09:00","end":"13:00"}}"#;
        let config = WorkingHoursConfig::from_json(json).unwrap();
        assert!(config.saturday.unwrap().enabled);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(WorkingHoursConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_parse_invalid_time() {
        let json = r#"{"monday":{"enabled":true,"start":"25:00","end":"17:00"}}"#;
        assert!(WorkingHoursConfig::from_json(json).is_err());
    }

    #[test]
    fn test_start_must_precede_end_when_enabled() {
        let json = r#"{"monday":{"enabled":true,"start":"18:00","end":"09:00"}}"#;
        assert!(WorkingHoursConfig::from_json(json).is_err());

        // Disabled days are not checked for ordering
        let json = r#"{"monday":{"enabled":false,"start":"18:00","end":"09:00"}}"#;
        assert!(WorkingHoursConfig::from_json(json).is_ok());
    }

    #[test]
    fn test_to_human_readable() {
        let json = r#"{"friday":{"enabled":true,"start":"10:00","end":"16:00"},"monday":{"enabled":true,"start":"09:00","end":"17:00"},"sunday":{"enabled":false,"start":"09:00","end":"12:00"}}"#;
        let config = WorkingHoursConfig::from_json(json).unwrap();
        assert_eq!(
            config.to_human_readable(),
            "Monday: 09:00-17:00, Friday: 10:00-16:00"
        );
    }
}
