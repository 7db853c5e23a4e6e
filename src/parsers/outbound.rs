use std::collections::BTreeMap;

use chrono::Days;
use rust_decimal::Decimal;
use serde_json::json;

use super::common::{ConvertError, split_guest_name};
use crate::channex::{
    OutboundBooking, OutboundCustomer, OutboundOccupancy, OutboundRoom,
};
use crate::db::Booking;
use crate::mapping::RoomMapping;

const DEFAULT_ADULTS: i32 = 2;
const FALLBACK_GUEST_NAME: &str = "Guest";

/// Builds the channel-manager payload for a PMS-origin booking. The output
/// is inert data; sending it and interpreting the response belongs to the
/// client.
pub struct OutboundConverter {
    property_id: String,
    currency: String,
}

impl OutboundConverter {
    pub fn new(property_id: String, currency: String) -> Self {
        Self {
            property_id,
            currency,
        }
    }

    pub fn convert(
        &self,
        booking: &Booking,
        mapping: &RoomMapping,
    ) -> Result<OutboundBooking, ConvertError> {
        let nights = booking.nights();
        if nights <= 0 {
            return Err(ConvertError::InvalidDateRange {
                check_in: booking.check_in,
                check_out: booking.check_out,
            });
        }

        // One flat nightly rate per stay; seasonal pricing is the channel
        // manager's job once rate plans carry it.
        let mut days = BTreeMap::new();
        for offset in 0..nights as u64 {
            let date = booking
                .check_in
                .checked_add_days(Days::new(offset))
                .ok_or_else(|| ConvertError::InvalidDateRange {
                    check_in: booking.check_in,
                    check_out: booking.check_out,
                })?;
            days.insert(date, mapping.base_price);
        }
        let day_sum: Decimal = days.values().copied().sum();
        let amount = if booking.total_amount > Decimal::ZERO {
            booking.total_amount
        } else {
            day_sum
        };

        let (name, surname) = match booking.guest_name.as_deref() {
            Some(full) if !full.trim().is_empty() => split_guest_name(full),
            _ => (FALLBACK_GUEST_NAME.to_string(), String::new()),
        };

        // Occupancy above the room's capacity is rejected by the channel
        // manager, so clamp rather than fail the push.
        let adults = if booking.adults > 0 {
            booking.adults
        } else {
            DEFAULT_ADULTS
        }
        .min(mapping.max_occupancy as i32);

        Ok(OutboundBooking {
            property_id: self.property_id.clone(),
            status: booking.status.as_str().to_string(),
            arrival_date: booking.check_in,
            departure_date: booking.check_out,
            currency: self.currency.clone(),
            amount,
            ota_name: booking.channel.as_str().to_string(),
            customer: OutboundCustomer {
                name,
                surname,
                mail: booking.guest_email.clone(),
                phone: booking.guest_phone.clone(),
            },
            rooms: vec![OutboundRoom {
                room_type_id: mapping.room_type_id.clone(),
                rate_plan_id: mapping.rate_plan_id.clone(),
                days,
                occupancy: OutboundOccupancy {
                    adults,
                    children: booking.children.max(0),
                },
            }],
            meta: json!({
                "pms_booking_id": booking.id,
                "room_category": booking.room_category,
                "pms_room_id": booking.room_id,
            }),
        })
    }
}
