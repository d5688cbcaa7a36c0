//! Catalogue of services a task can be posted under.

/// Service type for tasks outside the catalogue.
pub const OTHER_SERVICE: &str = "Other";

/// A service offered on the board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Service {
    /// Stable identifier
    pub id: &'static str,
    /// Name shown to posters, also used as the task's service type
    pub title: &'static str,
    /// What the service covers
    pub description: &'static str,
    /// Suggested hourly price in dollars
    pub price: f64,
    /// Extra pricing note
    pub price_suffix: Option<&'static str>,
}

/// All catalogue services.
pub const SERVICES: &[Service] = &[
    Service {
        id: "service-yard-work",
        title: "Yard Work",
        description: "Raking leaves, mowing the lawn, gardening, and general outdoor cleanup.",
        price: 15.0,
        price_suffix: None,
    },
    Service {
        id: "service-tech-help",
        title: "Technology Assistance",
        description: "Help with smartphones, computers, social media, or setting up new devices.",
        price: 12.0,
        price_suffix: None,
    },
    Service {
        id: "service-housekeeping",
        title: "Housekeeping",
        description: "Dusting, vacuuming, tidying up, and helping with laundry.",
        price: 14.0,
        price_suffix: None,
    },
    Service {
        id: "service-companionship",
        title: "Companionship",
        description: "Reading together, playing board games, or simply having a friendly chat.",
        price: 10.0,
        price_suffix: None,
    },
    Service {
        id: "service-errands",
        title: "Running Errands",
        description: "Grocery shopping, picking up prescriptions, or trips to the post office.",
        price: 12.0,
        price_suffix: Some("+ mileage"),
    },
    Service {
        id: "service-pet-care",
        title: "Pet Care",
        description: "Dog walking, pet sitting, and helping with feeding your furry friends.",
        price: 10.0,
        price_suffix: None,
    },
];

fn find(service_type: &str) -> Option<&'static Service> {
    SERVICES
        .iter()
        .find(|s| s.title.eq_ignore_ascii_case(service_type.trim()))
}

/// Suggested budget for a service type, if it is in the catalogue.
pub fn suggested_budget(service_type: &str) -> Option<f64> {
    find(service_type).map(|s| s.price)
}

/// Whether `service_type` is a catalogue title or [`OTHER_SERVICE`].
pub fn is_known_service_type(service_type: &str) -> bool {
    service_type.trim().eq_ignore_ascii_case(OTHER_SERVICE) || find(service_type).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_budget_matches_catalogue() {
        assert_eq!(suggested_budget("Yard Work"), Some(15.0));
        assert_eq!(suggested_budget("pet care"), Some(10.0));
        assert_eq!(suggested_budget("Other"), None);
    }

    #[test]
    fn other_is_a_known_service_type() {
        assert!(is_known_service_type("Other"));
        assert!(is_known_service_type("Housekeeping"));
        assert!(!is_known_service_type("Rocket Repair"));
    }
}
