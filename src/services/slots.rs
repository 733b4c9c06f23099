use crate::models::{Interval, TimeSlot};

/// Spacing between candidate slot starts. Business policy, not configurable.
pub const SLOT_STEP_MINUTES: u32 = 15;

/// Every `[t, t + duration)` with `t = open.start + k * step` that fits inside
/// `open`, ascending, all marked available.
pub fn generate_slots(open: Interval, duration: u32, step: u32) -> Vec<TimeSlot> {
    if duration == 0 || step == 0 {
        return vec![];
    }

    let mut slots = vec![];
    let mut t = open.start;
    while t + duration <= open.end {
        slots.push(TimeSlot {
            start: t,
            end: t + duration,
            available: true,
        });
        t += step;
    }
    slots
}

/// Mark every slot touched by any busy interval as unavailable.
pub fn mark_conflicts(slots: &mut [TimeSlot], busy: &[Interval]) {
    for slot in slots.iter_mut() {
        let span = slot.span();
        if busy.iter().any(|b| span.overlaps(b)) {
            slot.available = false;
        }
    }
}
