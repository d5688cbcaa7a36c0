//! Simulated card payment. Card details are checked for shape only and
//! never leave the process.

use helpboard_core::ValidationError;
use regex::Regex;

/// Card details entered to pay for a task.
#[derive(Debug, Clone)]
pub struct CardDetails {
    /// Name on the card
    pub card_name: String,
    /// 16-digit card number; spaces are ignored
    pub card_number: String,
    /// Expiry as `MM/YY`
    pub expiry_date: String,
    /// 3 or 4 digit security code
    pub cvc: String,
}

fn matches(pattern: &str, value: &str) -> bool {
    Regex::new(pattern).map(|re| re.is_match(value)).unwrap_or(false)
}

impl CardDetails {
    /// Check every field's format.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.card_name.trim().chars().count() < 2 {
            return Err(invalid("cardName", "name on card is required"));
        }
        let number: String = self.card_number.chars().filter(|c| !c.is_whitespace()).collect();
        if !matches(r"^[0-9]{16}$", &number) {
            return Err(invalid("cardNumber", "card number must be 16 digits"));
        }
        if !matches(r"^(0[1-9]|1[0-2])/[0-9]{2}$", self.expiry_date.trim()) {
            return Err(invalid("expiryDate", "expiry date must be in MM/YY format"));
        }
        if !matches(r"^[0-9]{3,4}$", self.cvc.trim()) {
            return Err(invalid("cvc", "CVC must be 3 or 4 digits"));
        }
        Ok(())
    }

    /// Card number with all but the last four digits hidden.
    pub fn masked_number(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().filter(|c| c.is_ascii_digit()).collect();
        let tail: String = digits.iter().skip(digits.len().saturating_sub(4)).collect();
        format!("**** **** **** {tail}")
    }
}

fn invalid(field: &'static str, message: &str) -> ValidationError {
    ValidationError {
        field,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> CardDetails {
        CardDetails {
            card_name: "John M. Doe".to_string(),
            card_number: "4242 4242 4242 4242".to_string(),
            expiry_date: "09/27".to_string(),
            cvc: "123".to_string(),
        }
    }

    #[test]
    fn well_formed_card_passes() {
        assert!(card().validate().is_ok());
        assert_eq!(card().masked_number(), "**** **** **** 4242");
    }

    #[test]
    fn each_field_is_checked() {
        let mut c = card();
        c.card_number = "4242".to_string();
        assert_eq!(c.validate().unwrap_err().field, "cardNumber");

        let mut c = card();
        c.expiry_date = "13/27".to_string();
        assert_eq!(c.validate().unwrap_err().field, "expiryDate");

        let mut c = card();
        c.cvc = "12".to_string();
        assert_eq!(c.validate().unwrap_err().field, "cvc");

        let mut c = card();
        c.card_number = "٤٢٤٢٤٢٤٢٤٢٤٢٤٢٤٢".to_string();
        assert_eq!(c.validate().unwrap_err().field, "cardNumber");

        let mut c = card();
        c.cvc = "١٢٣".to_string();
        assert_eq!(c.validate().unwrap_err().field, "cvc");

        let mut c = card();
        c.card_name = "J".to_string();
        assert_eq!(c.validate().unwrap_err().field, "cardName");
    }
}
