pub use self::common::{
    ConvertError, channel_from_ota_name, decimal_from_value, split_guest_name,
    status_from_external,
};
pub use self::inbound::InboundConverter;
pub use self::normalize::{WebhookEvent, booking_resource_from_payload, normalize_envelope};
pub use self::outbound::OutboundConverter;

pub mod common;
pub mod inbound;
pub mod normalize;
pub mod outbound;
