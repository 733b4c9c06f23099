use crate::errors::BookingError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse a zero-padded `HH:MM` into minutes since midnight.
pub fn time_to_minutes(s: &str) -> Result<u32, BookingError> {
    let invalid = || BookingError::InvalidFormat(s.to_string());

    let (hh, mm) = s.split_once(':').ok_or_else(invalid)?;
    if hh.len() != 2 || mm.len() != 2 {
        return Err(invalid());
    }
    if !hh.bytes().chain(mm.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: u32 = hh.parse().map_err(|_| invalid())?;
    let minutes: u32 = mm.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Format minutes since midnight as `HH:MM`. Callers keep `minutes` below
/// [`MINUTES_PER_DAY`].
pub fn minutes_to_time(minutes: u32) -> String {
    debug_assert!(minutes < MINUTES_PER_DAY, "minute offset out of range: {minutes}");
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
