pub mod appointment;
pub mod date_range;
pub mod service;
pub mod slot;
pub mod working_hours;

pub use appointment::{Appointment, AppointmentStatus, ClientInfo, PaymentStatus};
pub use date_range::DateRange;
pub use service::ServiceDefinition;
pub use slot::{Interval, TimeSlot};
pub use working_hours::{DayHours, WorkingHoursConfig};
