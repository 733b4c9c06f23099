pub mod availability;
pub mod booking;
pub mod hours;
pub mod slots;
pub mod time;

use crate::errors::BookingError;

const MAX_ID_LEN: usize = 128;

pub fn validate_id(kind: &str, id: &str) -> Result<(), BookingError> {
    if id.trim().is_empty() {
        return Err(BookingError::Validation(format!("{kind} must not be empty")));
    }
    if id.len() > MAX_ID_LEN {
        return Err(BookingError::Validation(format!("{kind} is too long")));
    }
    if id.contains('#') {
        return Err(BookingError::Validation(format!("{kind} must not contain '#'")));
    }
    Ok(())
}
