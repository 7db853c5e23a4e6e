use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provenance of a booking: which sales channel it ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Direct,
    Booking,
    Airbnb,
    Agoda,
    Expedia,
    Hotels,
    Other,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Direct => "direct",
            Channel::Booking => "booking",
            Channel::Airbnb => "airbnb",
            Channel::Agoda => "agoda",
            Channel::Expedia => "expedia",
            Channel::Hotels => "hotels",
            Channel::Other => "other",
        }
    }

    /// Parse a stored column value. Unknown values collapse to `Other`
    /// rather than failing the row.
    pub fn from_db_str(value: &str) -> Self {
        match value {
            "direct" => Channel::Direct,
            "booking" => Channel::Booking,
            "airbnb" => Channel::Airbnb,
            "agoda" => Channel::Agoda,
            "expedia" => Channel::Expedia,
            "hotels" => Channel::Hotels,
            _ => Channel::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a stored column value. Unknown values collapse to `Pending`,
    /// the same safe default applied at the conversion boundary.
    pub fn from_db_str(value: &str) -> Self {
        match value {
            "confirmed" => BookingStatus::Confirmed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }
}

/// The canonical persisted booking. Cancellation is a status transition;
/// rows are never deleted by the sync path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    /// Channel-manager booking id; the sole de-duplication key for inbound
    /// reconciliation. Absent until a PMS-origin booking is pushed outward.
    pub external_booking_id: Option<String>,
    /// The OTA's own reference string, distinct from the channel-manager id.
    pub ota_reservation_code: Option<String>,
    pub channel: Channel,
    pub status: BookingStatus,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub adults: i32,
    pub children: i32,
    pub total_amount: Decimal,
    pub currency: String,
    /// PMS room record, when the inbound payload identified one.
    pub room_id: Option<i64>,
    pub room_category: String,
    pub room_title: Option<String>,
    pub notes: Option<String>,
    /// Original inbound payload, kept verbatim for forensic replay.
    pub provider_meta: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// Append-only record of an inbound webhook delivery. Exactly one entry per
/// parseable delivery, written before any processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLogEntry {
    pub id: i64,
    pub event_type: String,
    pub event_id: String,
    pub object_type: String,
    pub object_id: Option<String>,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookLogEntry {
    pub fn new(
        event_type: String,
        event_id: String,
        object_type: String,
        object_id: Option<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: 0,
            event_type,
            event_id,
            object_type,
            object_id,
            payload,
            received_at: Utc::now(),
            processed: false,
            processed_at: None,
        }
    }
}

/// Append-only record of a processing failure, with the payload that caused
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: i64,
    pub error_message: String,
    pub error_detail: Option<String>,
    pub payload: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorLogEntry {
    pub fn new(error_message: String, error_detail: Option<String>, payload: Option<Value>) -> Self {
        Self {
            id: 0,
            error_message,
            error_detail,
            payload,
            occurred_at: Utc::now(),
        }
    }
}
