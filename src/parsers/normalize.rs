use serde_json::{Map, Value};
use uuid::Uuid;

use super::common::ConvertError;
use crate::channex::BookingResource;

/// One canonical inbound notification, whatever envelope the sender used.
/// All "which field name did this sender pick" logic lives in this module;
/// nothing downstream looks at the raw envelope again.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub event_id: String,
    pub object_type: String,
    pub object_id: Option<String>,
    pub property_id: Option<String>,
    /// The inner object payload (booking resource, etc).
    pub payload: Value,
    /// The entire request body, preserved for the audit log.
    pub raw: Value,
}

impl WebhookEvent {
    pub fn is_booking(&self) -> bool {
        self.object_type == "booking"
    }
}

/// Normalize a webhook body. Senders ship either `{event, payload}` or
/// `{type, data}`; both are accepted. A body that is valid JSON but not an
/// object cannot carry a notification and is rejected before logging.
pub fn normalize_envelope(body: Value) -> Result<WebhookEvent, ConvertError> {
    let object = body
        .as_object()
        .ok_or_else(|| ConvertError::MalformedPayload("webhook body is not an object".into()))?;

    let event_type = string_field(object, &["event", "type"]).unwrap_or_else(|| "unknown".into());

    let payload = object
        .get("payload")
        .or_else(|| object.get("data"))
        .cloned()
        .unwrap_or(Value::Null);

    // Senders do not reliably ship an event id; synthesize one so the audit
    // log always has a stable reference.
    let event_id = string_field(object, &["event_id", "id"])
        .or_else(|| {
            payload
                .as_object()
                .and_then(|p| string_field(p, &["event_id"]))
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let object_id = payload
        .as_object()
        .and_then(|p| string_field(p, &["id"]))
        .or_else(|| {
            payload
                .pointer("/data/id")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
        });

    let object_type = string_field(object, &["object_type"])
        .or_else(|| {
            payload
                .as_object()
                .and_then(|p| string_field(p, &["type"]))
        })
        .unwrap_or_else(|| {
            if event_type.to_ascii_lowercase().contains("booking") {
                "booking".to_string()
            } else {
                "unknown".to_string()
            }
        });

    let property_id = string_field(object, &["property_id"]);

    Ok(WebhookEvent {
        event_type,
        event_id,
        object_type,
        object_id,
        property_id,
        payload,
        raw: body,
    })
}

/// Extract the booking resource from an event payload. The resource may be
/// wrapped in a JSON:API `data` envelope, and its attributes may be nested
/// or flattened onto the object itself.
pub fn booking_resource_from_payload(payload: &Value) -> Result<BookingResource, ConvertError> {
    let value = payload.get("data").unwrap_or(payload);

    let object = value.as_object().ok_or_else(|| {
        ConvertError::MalformedPayload("booking payload is not an object".into())
    })?;

    let shaped = if object.contains_key("attributes") {
        value.clone()
    } else {
        // Flat shape: everything except id/type is the attributes block.
        let mut attributes = object.clone();
        let id = attributes.remove("id");
        let resource_type = attributes.remove("type");
        let mut resource = Map::new();
        if let Some(id) = id {
            resource.insert("id".to_string(), id);
        }
        if let Some(resource_type) = resource_type {
            resource.insert("type".to_string(), resource_type);
        }
        resource.insert("attributes".to_string(), Value::Object(attributes));
        Value::Object(resource)
    };

    serde_json::from_value(shaped)
        .map_err(|e| ConvertError::MalformedPayload(format!("booking payload: {e}")))
}

fn string_field(object: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        object.get(*name).and_then(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_event_payload_envelope() {
        let body = json!({
            "event": "booking_new",
            "payload": {"id": "ext-1", "attributes": {}},
            "property_id": "prop-1"
        });

        let event = normalize_envelope(body).expect("envelope should normalize");
        assert_eq!(event.event_type, "booking_new");
        assert_eq!(event.object_type, "booking");
        assert_eq!(event.object_id.as_deref(), Some("ext-1"));
        assert_eq!(event.property_id.as_deref(), Some("prop-1"));
        assert!(event.is_booking());
    }

    #[test]
    fn accepts_type_data_envelope() {
        let body = json!({
            "type": "booking",
            "data": {"id": "ext-2", "attributes": {}}
        });

        let event = normalize_envelope(body).expect("envelope should normalize");
        assert_eq!(event.event_type, "booking");
        assert_eq!(event.object_id.as_deref(), Some("ext-2"));
        assert!(event.is_booking());
    }

    #[test]
    fn synthesizes_event_id_when_absent() {
        let body = json!({"event": "booking", "payload": {"id": "ext-3"}});
        let event = normalize_envelope(body).expect("envelope should normalize");
        assert!(!event.event_id.is_empty());
        assert!(Uuid::parse_str(&event.event_id).is_ok());
    }

    #[test]
    fn keeps_sender_event_id_when_present() {
        let body = json!({"event": "booking", "event_id": "evt-9", "payload": {}});
        let event = normalize_envelope(body).expect("envelope should normalize");
        assert_eq!(event.event_id, "evt-9");
    }

    #[test]
    fn rejects_non_object_bodies() {
        assert!(normalize_envelope(json!("ping")).is_err());
        assert!(normalize_envelope(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn non_booking_events_are_flagged() {
        let body = json!({"event": "ari", "payload": {"type": "rate_plan"}});
        let event = normalize_envelope(body).expect("envelope should normalize");
        assert!(!event.is_booking());
        assert_eq!(event.object_type, "rate_plan");
    }

    #[test]
    fn resource_parses_nested_and_flat_attributes() {
        let nested = json!({
            "id": "ext-1",
            "attributes": {"arrival_date": "2025-09-01"}
        });
        let resource = booking_resource_from_payload(&nested).expect("nested shape");
        assert!(resource.attributes.arrival_date.is_some());

        let flat = json!({
            "id": "ext-1",
            "arrival_date": "2025-09-01",
            "departure_date": "2025-09-03"
        });
        let resource = booking_resource_from_payload(&flat).expect("flat shape");
        assert_eq!(resource.id.as_deref(), Some("ext-1"));
        assert!(resource.attributes.departure_date.is_some());

        let wrapped = json!({"data": {"id": "ext-2", "attributes": {}}});
        let resource = booking_resource_from_payload(&wrapped).expect("data wrapper");
        assert_eq!(resource.id.as_deref(), Some("ext-2"));
    }
}
