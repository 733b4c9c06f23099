use chrono::NaiveDate;

/// Inclusive span of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if start > end {
            return Err(format!("start date {start} is after end date {end}"));
        }
        Ok(Self { start, end })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Longest common prefix of both ends as `YYYY-MM-DD`, completed with the
    /// `#` separator for a single day.
    pub fn key_prefix(&self) -> String {
        let start = self.start.format("%Y-%m-%d").to_string();
        if self.start == self.end {
            return format!("{start}#");
        }
        let end = self.end.format("%Y-%m-%d").to_string();
        start
            .chars()
            .zip(end.chars())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = DateRange::new(date("2030-06-17"), date("2030-06-21")).unwrap();
        assert!(range.contains(date("2030-06-17")));
        assert!(range.contains(date("2030-06-21")));
        assert!(!range.contains(date("2030-06-16")));
        assert!(!range.contains(date("2030-06-22")));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(DateRange::new(date("2030-06-21"), date("2030-06-17")).is_err());
    }

    #[test]
    fn test_key_prefix_narrows_to_shared_digits() {
        assert_eq!(DateRange::day(date("2030-06-17")).key_prefix(), "2030-06-17#");
        let june = DateRange::new(date("2030-06-01"), date("2030-06-30")).unwrap();
        assert_eq!(june.key_prefix(), "2030-06-");
        let across_years = DateRange::new(date("2029-12-30"), date("2030-01-02")).unwrap();
        assert_eq!(across_years.key_prefix(), "20");
    }
}
