use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ChannexConfig;

const API_KEY_HEADER: &str = "user-api-key";

#[derive(Error, Debug)]
pub enum ChannexError {
    #[error("channel manager request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel manager returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected channel manager response: {0}")]
    InvalidResponse(String),
}

/// One booking as the channel manager ships it: a JSON:API resource with an
/// id and an attributes block. Field-name drift between senders (mail vs
/// email, nested vs flat attributes) is absorbed here and in
/// `parsers::normalize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub attributes: BookingAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingAttributes {
    #[serde(default)]
    pub arrival_date: Option<NaiveDate>,
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ota_name: Option<String>,
    #[serde(default)]
    pub ota_reservation_code: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Top-level total; senders ship it as a string or a number, so it is
    /// kept raw until conversion.
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub customer: Option<CustomerPayload>,
    #[serde(default)]
    pub rooms: Vec<RoomPayload>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default, alias = "email")]
    pub mail: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomPayload {
    #[serde(default)]
    pub room_type_id: Option<String>,
    #[serde(default)]
    pub rate_plan_id: Option<String>,
    #[serde(default)]
    pub checkin_date: Option<NaiveDate>,
    #[serde(default)]
    pub checkout_date: Option<NaiveDate>,
    /// Per-date prices, string- or number-valued depending on the sender.
    #[serde(default)]
    pub days: BTreeMap<NaiveDate, Value>,
    #[serde(default)]
    pub occupancy: Option<OccupancyPayload>,
    #[serde(default)]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OccupancyPayload {
    #[serde(default)]
    pub adults: Option<i32>,
    #[serde(default)]
    pub children: Option<i32>,
}

/// Payload for an outbound booking push, produced by the outbound converter
/// and sent verbatim by the client.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundBooking {
    pub property_id: String,
    pub status: String,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    pub currency: String,
    pub amount: Decimal,
    pub ota_name: String,
    pub customer: OutboundCustomer,
    pub rooms: Vec<OutboundRoom>,
    pub meta: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundCustomer {
    pub name: String,
    pub surname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundRoom {
    pub room_type_id: String,
    pub rate_plan_id: String,
    pub days: BTreeMap<NaiveDate, Decimal>,
    pub occupancy: OutboundOccupancy,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutboundOccupancy {
    pub adults: i32,
    pub children: i32,
}

/// The channel manager's acknowledgement of a created booking.
#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub id: String,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

/// The outbound surface of the channel manager, as this service consumes
/// it. `ChannexClient` is the production implementation; tests substitute
/// fixtures.
#[async_trait::async_trait]
pub trait ChannelManager: Send + Sync {
    async fn create_booking(&self, payload: &OutboundBooking)
    -> Result<CreatedBooking, ChannexError>;
    async fn get_booking(&self, id: &str) -> Result<BookingResource, ChannexError>;
    async fn list_bookings(&self) -> Result<Vec<BookingResource>, ChannexError>;
    async fn update_availability(
        &self,
        room_type_id: &str,
        availability: u32,
    ) -> Result<(), ChannexError>;
}

/// Thin HTTPS client for the channel-manager API. No retry policy lives
/// here; failed calls surface to the caller.
#[derive(Clone)]
pub struct ChannexClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    property_id: String,
}

impl ChannexClient {
    pub fn new(config: &ChannexConfig) -> Result<Self, ChannexError> {
        // Fail at construction on an unusable base URL rather than on the
        // first request.
        let parsed = Url::parse(&config.api_url)
            .map_err(|e| ChannexError::InvalidResponse(format!("invalid api_url: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent("pms-channex-sync")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key(),
            property_id: config.property_id.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ChannexError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChannexError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl ChannelManager for ChannexClient {
    async fn create_booking(
        &self,
        payload: &OutboundBooking,
    ) -> Result<CreatedBooking, ChannexError> {
        let response = self
            .http
            .post(self.endpoint("bookings"))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&json!({ "booking": payload }))
            .send()
            .await?;
        let response = Self::check(response).await?;

        let envelope: ApiEnvelope<Value> = response.json().await?;
        let id = envelope
            .data
            .get("id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                ChannexError::InvalidResponse("created booking has no id".to_string())
            })?;
        let status = envelope
            .data
            .pointer("/attributes/status")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        debug!(booking_id = %id, "channel manager accepted booking");
        Ok(CreatedBooking { id, status })
    }

    async fn get_booking(&self, id: &str) -> Result<BookingResource, ChannexError> {
        let response = self
            .http
            .get(self.endpoint(&format!("bookings/{id}")))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;
        let response = Self::check(response).await?;

        let envelope: ApiEnvelope<BookingResource> = response.json().await?;
        Ok(envelope.data)
    }

    /// Every booking the channel manager knows for this property; the input
    /// to bulk reconciliation.
    async fn list_bookings(&self) -> Result<Vec<BookingResource>, ChannexError> {
        let response = self
            .http
            .get(self.endpoint("bookings"))
            .query(&[("filter[property_id]", self.property_id.as_str())])
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;
        let response = Self::check(response).await?;

        let envelope: ApiEnvelope<Vec<BookingResource>> = response.json().await?;
        Ok(envelope.data)
    }

    /// Push a flat inventory count for a room type, used when live
    /// availability is not tracked.
    async fn update_availability(
        &self,
        room_type_id: &str,
        availability: u32,
    ) -> Result<(), ChannexError> {
        let response = self
            .http
            .post(self.endpoint("availability"))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&json!({
                "values": [{
                    "property_id": self.property_id,
                    "room_type_id": room_type_id,
                    "availability": availability,
                }]
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_resource_accepts_email_alias_and_string_days() {
        let value = json!({
            "id": "ext-1",
            "type": "booking",
            "attributes": {
                "arrival_date": "2025-09-01",
                "departure_date": "2025-09-03",
                "customer": {"name": "John", "email": "j@example.com"},
                "rooms": [{
                    "room_type_id": "rt-std",
                    "days": {"2025-09-01": "100", "2025-09-02": 100.0}
                }]
            }
        });

        let resource: BookingResource =
            serde_json::from_value(value).expect("resource should parse");
        assert_eq!(resource.id.as_deref(), Some("ext-1"));
        let customer = resource.attributes.customer.expect("customer");
        assert_eq!(customer.mail.as_deref(), Some("j@example.com"));
        assert_eq!(resource.attributes.rooms[0].days.len(), 2);
    }

    #[test]
    fn client_rejects_invalid_base_url() {
        let config = ChannexConfig {
            api_url: "not a url".to_string(),
            api_key: "key".to_string(),
            property_id: "prop-1".to_string(),
            request_timeout_secs: 5,
        };
        assert!(ChannexClient::new(&config).is_err());
    }

    #[test]
    fn outbound_booking_serializes_days_as_decimal_strings() {
        let mut days = BTreeMap::new();
        days.insert(
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            Decimal::new(10000, 2),
        );
        let payload = OutboundBooking {
            property_id: "prop-1".to_string(),
            status: "pending".to_string(),
            arrival_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            departure_date: NaiveDate::from_ymd_opt(2025, 9, 2).unwrap(),
            currency: "USD".to_string(),
            amount: Decimal::new(10000, 2),
            ota_name: "direct".to_string(),
            customer: OutboundCustomer {
                name: "John".to_string(),
                surname: "Smith".to_string(),
                mail: None,
                phone: None,
            },
            rooms: vec![OutboundRoom {
                room_type_id: "rt-std".to_string(),
                rate_plan_id: "rp-std".to_string(),
                days,
                occupancy: OutboundOccupancy {
                    adults: 2,
                    children: 0,
                },
            }],
            meta: json!({"pms_booking_id": 1}),
        };

        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            value.pointer("/rooms/0/days/2025-09-01"),
            Some(&json!("100.00"))
        );
    }
}
