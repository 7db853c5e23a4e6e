use salvo::prelude::*;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::db::{ErrorLogEntry, UpsertOutcome, WebhookLogEntry};
use crate::parsers::{WebhookEvent, booking_resource_from_payload, normalize_envelope};
use crate::sync::SyncError;
use crate::web::metrics::Metrics;
use crate::web::{WebState, web_state};

fn render_failure(res: &mut Response, status: StatusCode, error: &str) {
    res.status_code(status);
    res.render(Json(json!({ "success": false, "error": error })));
}

fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    authorization?.strip_prefix("Bearer ").map(str::trim)
}

fn authorization_header(req: &Request) -> Option<&str> {
    req.headers().get("authorization")?.to_str().ok()
}

/// Inbound change notifications from the channel manager. Every path out of
/// this handler is an explicit response: 400 for an unusable body, 401 for a
/// wrong credential, 200 once a log entry exists and dispatch succeeded (or
/// was not needed), 500 when processing failed and the sender should retry.
#[handler]
pub async fn receive_webhook(req: &mut Request, res: &mut Response) {
    Metrics::webhook_received();
    let state = web_state();

    let body: Value = match req.parse_json().await {
        Ok(body) => body,
        Err(_) => {
            render_failure(res, StatusCode::BAD_REQUEST, "request body is not valid JSON");
            return;
        }
    };

    // A configured credential must match when presented. A missing header is
    // tolerated with a warning: some senders cannot be configured to send
    // one, and their deliveries are not treated as attacks. A wrong one is.
    if let Some(expected) = state.config.webhook.token() {
        match bearer_token(authorization_header(req)) {
            Some(presented) if presented == expected.expose_secret() => {}
            Some(_) => {
                Metrics::webhook_unauthorized();
                warn!("webhook rejected: credential mismatch");
                render_failure(res, StatusCode::UNAUTHORIZED, "invalid webhook credential");
                return;
            }
            None => {
                warn!("webhook delivered without credential, accepting");
            }
        }
    }

    let event = match normalize_envelope(body) {
        Ok(event) => event,
        Err(err) => {
            render_failure(res, StatusCode::BAD_REQUEST, &err.to_string());
            return;
        }
    };

    if let Some(property_id) = &event.property_id
        && property_id != &state.config.channex.property_id
    {
        warn!(
            received = %property_id,
            configured = %state.config.channex.property_id,
            "webhook property id does not match the configured property"
        );
    }

    // Log before any processing so a crash mid-dispatch still leaves
    // forensic evidence of the delivery.
    let log_store = state.engine.log_store();
    let entry = WebhookLogEntry::new(
        event.event_type.clone(),
        event.event_id.clone(),
        event.object_type.clone(),
        event.object_id.clone(),
        event.raw.clone(),
    );
    let log_id = match log_store.record_event(&entry).await {
        Ok(id) => id,
        Err(err) => {
            Metrics::webhook_failed();
            error!(error = %err, "failed to record webhook log entry");
            render_failure(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to record webhook",
            );
            return;
        }
    };

    if !event.is_booking() {
        Metrics::webhook_ignored();
        if let Err(err) = log_store.mark_processed(log_id).await {
            warn!(error = %err, "failed to mark ignored webhook as processed");
        }
        res.render(Json(json!({
            "success": true,
            "event_id": event.event_id,
            "message": format!("{} event acknowledged without dispatch", event.object_type),
        })));
        return;
    }

    match dispatch_booking_event(state, &event).await {
        Ok(outcome) => {
            if let Err(err) = log_store.mark_processed(log_id).await {
                warn!(error = %err, "failed to mark webhook as processed");
            }
            Metrics::webhook_processed();
            let message = match outcome {
                UpsertOutcome::Created => "booking created",
                UpsertOutcome::Updated => "booking updated",
            };
            res.render(Json(json!({
                "success": true,
                "event_id": event.event_id,
                "message": message,
            })));
        }
        Err(err) => {
            Metrics::webhook_failed();
            error!(event_id = %event.event_id, error = %err, "webhook processing failed");
            let error_entry = ErrorLogEntry::new(
                err.to_string(),
                Some(format!("{err:?}")),
                Some(event.raw.clone()),
            );
            if let Err(log_err) = log_store.record_error(&error_entry).await {
                error!(error = %log_err, "failed to record webhook error entry");
            }
            // 500 on purpose: the channel manager redelivers on 5xx, which
            // is the recovery path for transient failures.
            render_failure(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}

async fn dispatch_booking_event(
    state: &WebState,
    event: &WebhookEvent,
) -> Result<UpsertOutcome, SyncError> {
    let resource = booking_resource_from_payload(&event.payload)?;
    state.engine.ingest(&resource, event.payload.clone()).await
}

#[handler]
pub async fn method_not_allowed(res: &mut Response) {
    render_failure(
        res,
        StatusCode::METHOD_NOT_ALLOWED,
        "only POST is accepted on this endpoint",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        assert_eq!(
            bearer_token(Some("Bearer secret-token ")),
            Some("secret-token")
        );
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        assert_eq!(bearer_token(Some("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(None), None);
    }
}
