use serde::{Deserialize, Serialize};

/// Longest bookable service; a slot may not spill into the next day.
pub const MAX_SERVICE_DURATION_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub duration_minutes: u32,
    /// Price in cents.
    pub price: i64,
    pub is_active: bool,
}

impl ServiceDefinition {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("service id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("service name must not be empty".to_string());
        }
        if self.duration_minutes == 0 || self.duration_minutes > MAX_SERVICE_DURATION_MINUTES {
            return Err(format!(
                "duration must be between 1 and {MAX_SERVICE_DURATION_MINUTES} minutes, got {}",
                self.duration_minutes
            ));
        }
        if self.price < 0 {
            return Err("price must not be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(duration_minutes: u32) -> ServiceDefinition {
        ServiceDefinition {
            id: "haircut".to_string(),
            tenant_id: "t1".to_string(),
            name: "Haircut".to_string(),
            duration_minutes,
            price: 5000,
            is_active: true,
        }
    }

    #[test]
    fn test_valid_service() {
        assert!(service(30).validate().is_ok());
    }

    #[test]
    fn test_zero_duration_rejected() {
        assert!(service(0).validate().is_err());
    }

    #[test]
    fn test_duration_longer_than_a_day_rejected() {
        assert!(service(MAX_SERVICE_DURATION_MINUTES + 1).validate().is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut s = service(30);
        s.price = -1;
        assert!(s.validate().is_err());
    }
}
