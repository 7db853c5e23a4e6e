use salvo::prelude::*;
use serde_json::json;

use crate::web::web_state;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({ "status": "ok" })));
}

#[handler]
pub async fn get_status(res: &mut Response) {
    let state = web_state();
    let booking_store = state.engine.booking_store();
    let log_store = state.engine.log_store();

    let bookings = booking_store.count_bookings().await.unwrap_or(-1);
    let webhook_events = log_store.count_events().await.unwrap_or(-1);
    let unprocessed = log_store.count_unprocessed().await.unwrap_or(-1);

    res.render(Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "database": format!("{:?}", state.db_manager.db_type()).to_lowercase(),
        "property_id": state.config.channex.property_id,
        "bookings": bookings,
        "webhook_events": webhook_events,
        "webhook_events_unprocessed": unprocessed,
        "room_mappings": state.config.rooms.mappings.len(),
    })));
}
