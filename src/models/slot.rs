use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::services::time::minutes_to_time;

/// Half-open interval `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A candidate booking interval. Derived on every query, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: u32,
    pub end: u32,
    pub available: bool,
}

impl TimeSlot {
    pub fn span(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    pub fn start_time(&self) -> String {
        minutes_to_time(self.start)
    }

    pub fn end_time(&self) -> String {
        minutes_to_time(self.end)
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TimeSlot", 3)?;
        state.serialize_field("start_time", &self.start_time())?;
        state.serialize_field("end_time", &self.end_time())?;
        state.serialize_field("available", &self.available)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_half_open() {
        let appt = Interval::new(600, 630);
        assert!(Interval::new(585, 615).overlaps(&appt));
        assert!(Interval::new(600, 630).overlaps(&appt));
        assert!(Interval::new(610, 620).overlaps(&appt));
        assert!(Interval::new(590, 640).overlaps(&appt));
        // Touching boundaries do not overlap
        assert!(!Interval::new(570, 600).overlaps(&appt));
        assert!(!Interval::new(630, 660).overlaps(&appt));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let spans = [
            Interval::new(540, 570),
            Interval::new(555, 585),
            Interval::new(570, 600),
            Interval::new(500, 700),
            Interval::new(600, 601),
        ];
        for a in &spans {
            for b in &spans {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_slot_serializes_as_hhmm() {
        let slot = TimeSlot {
            start: 540,
            end: 570,
            available: true,
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"start_time": "09:00", "end_time": "09:30", "available": true})
        );
    }
}
