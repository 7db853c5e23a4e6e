use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use super::common::{ConvertError, channel_from_ota_name, decimal_from_value, status_from_external};
use crate::channex::BookingResource;
use crate::db::{Booking, BookingStatus, Channel};
use crate::mapping::RoomMappingTable;

const DEFAULT_ADULTS: i32 = 2;

/// Translates channel-manager booking resources into canonical PMS
/// bookings. Inbound conversion is deliberately lenient everywhere except
/// the booking identity: a payload with no id cannot be reconciled and is
/// the one thing rejected outright.
pub struct InboundConverter {
    mappings: Arc<RoomMappingTable>,
}

impl InboundConverter {
    pub fn new(mappings: Arc<RoomMappingTable>) -> Self {
        Self { mappings }
    }

    /// `raw` is the original payload, preserved verbatim on the booking for
    /// forensic replay.
    pub fn convert(
        &self,
        resource: &BookingResource,
        raw: Value,
    ) -> Result<Booking, ConvertError> {
        let external_id = resource
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConvertError::MalformedPayload("booking id is missing".into()))?;

        let attrs = &resource.attributes;
        let first_room = attrs.rooms.first();

        let check_in = attrs
            .arrival_date
            .or_else(|| first_room.and_then(|room| room.checkin_date))
            .ok_or_else(|| ConvertError::MalformedPayload("arrival date is missing".into()))?;
        let check_out = attrs
            .departure_date
            .or_else(|| first_room.and_then(|room| room.checkout_date))
            .ok_or_else(|| ConvertError::MalformedPayload("departure date is missing".into()))?;

        // Room identity, in priority order: an explicit PMS room reference in
        // the meta block wins, then the room-type mapping, then the default
        // category. OTA payloads populate meta inconsistently, so none of
        // these is allowed to fail the conversion.
        let room_id = pms_room_id(attrs.meta.as_ref())
            .or_else(|| first_room.and_then(|room| pms_room_id(room.meta.as_ref())));
        let mapping = first_room
            .and_then(|room| room.room_type_id.as_deref())
            .and_then(|room_type_id| {
                let found = self.mappings.lookup_by_room_type_id(room_type_id);
                if found.is_none() {
                    debug!(room_type_id, "unmapped room type, using default category");
                }
                found
            })
            .unwrap_or_else(|| self.mappings.default_mapping());

        let channel = attrs
            .ota_name
            .as_deref()
            .map(channel_from_ota_name)
            .unwrap_or(Channel::Other);
        let status = attrs
            .status
            .as_deref()
            .map(status_from_external)
            .unwrap_or(BookingStatus::Pending);

        // Per-date prices across every room win over the top-level amount,
        // which some senders omit or round differently.
        let day_sum: Decimal = attrs
            .rooms
            .iter()
            .flat_map(|room| room.days.values())
            .filter_map(decimal_from_value)
            .sum();
        let total_amount = if attrs.rooms.iter().any(|room| !room.days.is_empty()) {
            day_sum
        } else {
            attrs
                .amount
                .as_ref()
                .and_then(decimal_from_value)
                .unwrap_or(Decimal::ZERO)
        };

        let occupancy = first_room.and_then(|room| room.occupancy.as_ref());
        let adults = occupancy
            .and_then(|o| o.adults)
            .filter(|&count| count > 0)
            .unwrap_or(DEFAULT_ADULTS);
        let children = occupancy.and_then(|o| o.children).unwrap_or(0).max(0);

        let customer = attrs.customer.as_ref();
        let guest_name = customer.and_then(|c| {
            let full = [c.name.as_deref(), c.surname.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            let full = full.trim().to_string();
            (!full.is_empty()).then_some(full)
        });

        let now = Utc::now();
        Ok(Booking {
            id: 0,
            external_booking_id: Some(external_id.to_string()),
            ota_reservation_code: attrs.ota_reservation_code.clone(),
            channel,
            status,
            check_in,
            check_out,
            guest_name,
            guest_email: customer.and_then(|c| c.mail.clone()),
            guest_phone: customer.and_then(|c| c.phone.clone()),
            adults,
            children,
            total_amount,
            currency: attrs
                .currency
                .clone()
                .unwrap_or_else(|| self.mappings.currency.clone()),
            room_id,
            room_category: mapping.category.clone(),
            room_title: Some(mapping.title.clone()),
            notes: attrs.notes.clone(),
            provider_meta: Some(raw),
            created_at: now,
            updated_at: now,
        })
    }
}

/// An explicit PMS room reference some OTAs embed in the free-form meta
/// block, as a number or a numeric string.
fn pms_room_id(meta: Option<&Value>) -> Option<i64> {
    let meta = meta?.as_object()?;
    ["pms_room_id", "room_number", "room_id"]
        .iter()
        .find_map(|key| {
            meta.get(*key).and_then(|value| match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            })
        })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::config::{RoomMappingEntry, RoomsConfig};
    use crate::db::{BookingStatus, Channel};
    use crate::parsers::normalize::booking_resource_from_payload;

    fn converter() -> InboundConverter {
        let config = RoomsConfig {
            currency: "USD".to_string(),
            default_category: "standard".to_string(),
            mappings: vec![
                RoomMappingEntry {
                    category: "standard".to_string(),
                    room_type_id: "std-rt-1".to_string(),
                    rate_plan_id: "std-rp-1".to_string(),
                    title: "Standard Room".to_string(),
                    base_price: Decimal::new(10000, 2),
                    max_occupancy: 2,
                    availability: 5,
                },
                RoomMappingEntry {
                    category: "deluxe".to_string(),
                    room_type_id: "dlx-rt-1".to_string(),
                    rate_plan_id: "dlx-rp-1".to_string(),
                    title: "Deluxe Room".to_string(),
                    base_price: Decimal::new(18000, 2),
                    max_occupancy: 3,
                    availability: 3,
                },
            ],
        };
        InboundConverter::new(Arc::new(RoomMappingTable::from_config(&config)))
    }

    fn airbnb_payload() -> serde_json::Value {
        json!({
            "id": "ext-1",
            "attributes": {
                "arrival_date": "2025-09-01",
                "departure_date": "2025-09-03",
                "customer": {"name": "John", "surname": "Smith", "mail": "j@example.com"},
                "rooms": [{
                    "room_type_id": "std-rt-1",
                    "days": {"2025-09-01": "100", "2025-09-02": "100"},
                    "occupancy": {"adults": 2, "children": 0}
                }],
                "ota_name": "Airbnb",
                "status": "new"
            }
        })
    }

    #[test]
    fn converts_the_full_airbnb_booking() {
        let payload = airbnb_payload();
        let resource = booking_resource_from_payload(&payload).expect("resource");
        let booking = converter()
            .convert(&resource, payload.clone())
            .expect("conversion should succeed");

        assert_eq!(booking.external_booking_id.as_deref(), Some("ext-1"));
        assert_eq!(
            booking.check_in,
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
        );
        assert_eq!(
            booking.check_out,
            NaiveDate::from_ymd_opt(2025, 9, 3).unwrap()
        );
        assert_eq!(booking.channel, Channel::Airbnb);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_amount, Decimal::new(200, 0));
        assert_eq!(booking.room_category, "standard");
        assert_eq!(booking.guest_name.as_deref(), Some("John Smith"));
        assert_eq!(booking.guest_email.as_deref(), Some("j@example.com"));
        assert_eq!(booking.provider_meta, Some(payload));
    }

    #[test]
    fn missing_booking_id_is_malformed() {
        let payload = json!({"attributes": {"arrival_date": "2025-09-01"}});
        let resource = booking_resource_from_payload(&payload).expect("resource");
        let err = converter()
            .convert(&resource, payload)
            .expect_err("missing id must fail");
        assert!(matches!(err, ConvertError::MalformedPayload(_)));
    }

    #[test]
    fn meta_room_reference_wins_over_room_type() {
        let payload = json!({
            "id": "ext-2",
            "attributes": {
                "arrival_date": "2025-09-01",
                "departure_date": "2025-09-02",
                "meta": {"pms_room_id": 42},
                "rooms": [{"room_type_id": "dlx-rt-1"}]
            }
        });
        let resource = booking_resource_from_payload(&payload).expect("resource");
        let booking = converter().convert(&resource, payload).expect("conversion");

        assert_eq!(booking.room_id, Some(42));
        // Category still comes from the room-type mapping when one resolves.
        assert_eq!(booking.room_category, "deluxe");
    }

    #[test]
    fn unmapped_room_type_falls_back_to_default_category() {
        let payload = json!({
            "id": "ext-3",
            "attributes": {
                "arrival_date": "2025-09-01",
                "departure_date": "2025-09-02",
                "rooms": [{"room_type_id": "not-configured"}]
            }
        });
        let resource = booking_resource_from_payload(&payload).expect("resource");
        let booking = converter().convert(&resource, payload).expect("conversion");
        assert_eq!(booking.room_category, "standard");
        assert!(booking.room_id.is_none());
    }

    #[test]
    fn falls_back_to_top_level_amount_without_day_prices() {
        let payload = json!({
            "id": "ext-4",
            "attributes": {
                "arrival_date": "2025-09-01",
                "departure_date": "2025-09-02",
                "amount": "340.25",
                "rooms": [{"room_type_id": "std-rt-1"}]
            }
        });
        let resource = booking_resource_from_payload(&payload).expect("resource");
        let booking = converter().convert(&resource, payload).expect("conversion");
        assert_eq!(booking.total_amount, Decimal::new(34025, 2));
    }

    #[test]
    fn dates_fall_back_to_first_room_stay() {
        let payload = json!({
            "id": "ext-5",
            "attributes": {
                "rooms": [{
                    "room_type_id": "std-rt-1",
                    "checkin_date": "2025-10-01",
                    "checkout_date": "2025-10-04"
                }]
            }
        });
        let resource = booking_resource_from_payload(&payload).expect("resource");
        let booking = converter().convert(&resource, payload).expect("conversion");
        assert_eq!(booking.nights(), 3);
    }

    #[test]
    fn occupancy_defaults_apply_when_absent() {
        let payload = json!({
            "id": "ext-6",
            "attributes": {
                "arrival_date": "2025-09-01",
                "departure_date": "2025-09-02"
            }
        });
        let resource = booking_resource_from_payload(&payload).expect("resource");
        let booking = converter().convert(&resource, payload).expect("conversion");
        assert_eq!(booking.adults, 2);
        assert_eq!(booking.children, 0);
        assert_eq!(booking.channel, Channel::Other);
    }
}
