use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use crate::db::{BookingStatus, Channel};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid date range: check-out {check_out} must be after check-in {check_in}")]
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("no room mapping for category: {0}")]
    UnmappedCategory(String),
}

/// Fixed OTA-name lookup. Unmapped names fall through to `Other`; an
/// unrecognized channel is never a reason to drop a booking.
pub fn channel_from_ota_name(ota_name: &str) -> Channel {
    match ota_name.trim().to_ascii_lowercase().as_str() {
        "direct" => Channel::Direct,
        "booking.com" | "booking" => Channel::Booking,
        "airbnb" => Channel::Airbnb,
        "agoda" => Channel::Agoda,
        "expedia" => Channel::Expedia,
        "hotels.com" | "hotels" => Channel::Hotels,
        _ => Channel::Other,
    }
}

/// Fixed external-status lookup. `modified` means the booking still stands,
/// so it maps to confirmed. Anything unrecognized maps to pending; a
/// mis-classified status is recoverable, a dropped booking is not.
pub fn status_from_external(status: &str) -> BookingStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "confirmed" | "modified" => BookingStatus::Confirmed,
        "cancelled" | "canceled" => BookingStatus::Cancelled,
        _ => BookingStatus::Pending,
    }
}

/// Split a single display name into given name and surname. Everything
/// after the first whitespace run becomes the surname.
pub fn split_guest_name(display_name: &str) -> (String, String) {
    let trimmed = display_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Parse an amount the sender shipped as either a JSON string or number.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("Airbnb", Channel::Airbnb; "airbnb mixed case")]
    #[test_case("Booking.com", Channel::Booking; "booking dot com")]
    #[test_case("booking", Channel::Booking; "bare booking")]
    #[test_case("AGODA", Channel::Agoda; "agoda upper case")]
    #[test_case("Hotels.com", Channel::Hotels; "hotels dot com")]
    #[test_case("Vrbo", Channel::Other; "unmapped ota")]
    #[test_case("", Channel::Other; "empty name")]
    fn maps_ota_names(input: &str, expected: Channel) {
        assert_eq!(channel_from_ota_name(input), expected);
    }

    #[test_case("new", BookingStatus::Pending; "new is pending")]
    #[test_case("confirmed", BookingStatus::Confirmed; "confirmed")]
    #[test_case("modified", BookingStatus::Confirmed; "modified stays confirmed")]
    #[test_case("cancelled", BookingStatus::Cancelled; "cancelled")]
    #[test_case("pending", BookingStatus::Pending; "pending")]
    #[test_case("zzz-unknown", BookingStatus::Pending; "unknown is pending")]
    fn maps_external_statuses(input: &str, expected: BookingStatus) {
        assert_eq!(status_from_external(input), expected);
    }

    #[test]
    fn splits_guest_names() {
        assert_eq!(
            split_guest_name("John Smith"),
            ("John".to_string(), "Smith".to_string())
        );
        assert_eq!(
            split_guest_name("Ana Maria  da Silva"),
            ("Ana".to_string(), "Maria  da Silva".to_string())
        );
        assert_eq!(
            split_guest_name("Prince"),
            ("Prince".to_string(), String::new())
        );
    }

    #[test]
    fn parses_string_and_numeric_amounts() {
        assert_eq!(
            decimal_from_value(&serde_json::json!("100.50")),
            Some(Decimal::new(10050, 2))
        );
        assert_eq!(
            decimal_from_value(&serde_json::json!(200)),
            Some(Decimal::new(200, 0))
        );
        assert_eq!(decimal_from_value(&serde_json::json!(null)), None);
        assert_eq!(decimal_from_value(&serde_json::json!("not-a-number")), None);
    }
}
