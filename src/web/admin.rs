use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::db::{Booking, BookingStatus, Channel};
use crate::parsers::ConvertError;
use crate::sync::SyncError;
use crate::web::metrics::Metrics;
use crate::web::web_state;

fn render_error(res: &mut Response, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "error": message })));
}

#[handler]
pub async fn list_bookings(req: &mut Request, res: &mut Response) {
    let limit = req.query::<i64>("limit").unwrap_or(100).clamp(1, 1000);
    let offset = req.query::<i64>("offset").unwrap_or(0).max(0);

    match web_state()
        .engine
        .booking_store()
        .list_bookings(limit, offset)
        .await
    {
        Ok(bookings) => {
            res.render(Json(json!({
                "bookings": bookings,
                "count": bookings.len(),
                "limit": limit,
                "offset": offset,
            })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn get_booking(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid booking id");
            return;
        }
    };

    match web_state().engine.booking_store().get_booking_by_id(id).await {
        Ok(Some(booking)) => {
            res.render(Json(json!({ "booking": booking })));
        }
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "booking not found");
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

/// Staff-entered booking, accepted before any channel-manager sync. The
/// outbound push is a separate, explicit step.
#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    check_in: NaiveDate,
    check_out: NaiveDate,
    room_category: String,
    #[serde(default)]
    guest_name: Option<String>,
    #[serde(default)]
    guest_email: Option<String>,
    #[serde(default)]
    guest_phone: Option<String>,
    #[serde(default)]
    adults: Option<i32>,
    #[serde(default)]
    children: Option<i32>,
    #[serde(default)]
    total_amount: Option<Decimal>,
    #[serde(default)]
    room_id: Option<i64>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    confirmed: bool,
}

#[handler]
pub async fn create_booking(req: &mut Request, res: &mut Response) {
    let body: CreateBookingRequest = match req.parse_json().await {
        Ok(body) => body,
        Err(err) => {
            render_error(
                res,
                StatusCode::BAD_REQUEST,
                &format!("invalid booking body: {}", err),
            );
            return;
        }
    };

    let state = web_state();
    if body.check_out <= body.check_in {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            "check_out must be after check_in",
        );
        return;
    }
    let Some(mapping) = state
        .engine
        .mappings()
        .lookup_by_category(&body.room_category)
        .cloned()
    else {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            &format!("unknown room category: {}", body.room_category),
        );
        return;
    };

    let now = Utc::now();
    let booking = Booking {
        id: 0,
        external_booking_id: None,
        ota_reservation_code: None,
        channel: Channel::Direct,
        status: if body.confirmed {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Pending
        },
        check_in: body.check_in,
        check_out: body.check_out,
        guest_name: body.guest_name,
        guest_email: body.guest_email,
        guest_phone: body.guest_phone,
        adults: body.adults.unwrap_or(2).max(1),
        children: body.children.unwrap_or(0).max(0),
        total_amount: body.total_amount.unwrap_or(Decimal::ZERO),
        currency: state.config.rooms.currency.clone(),
        room_id: body.room_id,
        room_category: mapping.category.clone(),
        room_title: Some(mapping.title.clone()),
        notes: body.notes,
        provider_meta: None,
        created_at: now,
        updated_at: now,
    };

    match state.engine.booking_store().create_booking(&booking).await {
        Ok(()) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "ok": true })));
        }
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}

#[handler]
pub async fn push_booking(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid booking id");
            return;
        }
    };

    match web_state().engine.push_booking(id).await {
        Ok(external_id) => {
            Metrics::booking_pushed();
            res.render(Json(json!({
                "ok": true,
                "external_booking_id": external_id,
            })));
        }
        Err(err) => {
            let status = match &err {
                SyncError::BookingNotFound(_) => StatusCode::NOT_FOUND,
                SyncError::AlreadyLinked { .. } => StatusCode::CONFLICT,
                SyncError::Convert(ConvertError::InvalidDateRange { .. })
                | SyncError::Convert(ConvertError::UnmappedCategory(_)) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SyncError::Convert(_) => StatusCode::BAD_REQUEST,
                SyncError::Upstream(_) => StatusCode::BAD_GATEWAY,
                SyncError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            render_error(res, status, &err.to_string());
        }
    }
}

#[handler]
pub async fn trigger_sync(res: &mut Response) {
    match web_state().engine.reconcile_all().await {
        Ok(report) => {
            res.render(Json(json!({ "ok": true, "report": report })));
        }
        Err(SyncError::Upstream(err)) => {
            render_error(res, StatusCode::BAD_GATEWAY, &err.to_string());
        }
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}

#[handler]
pub async fn push_availability(res: &mut Response) {
    let report = web_state().engine.push_availability().await;
    res.render(Json(json!({ "ok": report.failed == 0, "report": report })));
}

#[handler]
pub async fn list_errors(req: &mut Request, res: &mut Response) {
    let limit = req.query::<i64>("limit").unwrap_or(50).clamp(1, 500);

    match web_state()
        .engine
        .log_store()
        .list_recent_errors(limit)
        .await
    {
        Ok(errors) => {
            res.render(Json(json!({ "errors": errors, "count": errors.len() })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}
