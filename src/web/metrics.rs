use std::sync::atomic::{AtomicU64, Ordering};

use salvo::prelude::*;

use crate::web::web_state;

static WEBHOOKS_RECEIVED: AtomicU64 = AtomicU64::new(0);
static WEBHOOKS_PROCESSED: AtomicU64 = AtomicU64::new(0);
static WEBHOOKS_FAILED: AtomicU64 = AtomicU64::new(0);
static WEBHOOKS_UNAUTHORIZED: AtomicU64 = AtomicU64::new(0);
static WEBHOOKS_IGNORED: AtomicU64 = AtomicU64::new(0);
static BOOKINGS_CREATED: AtomicU64 = AtomicU64::new(0);
static BOOKINGS_UPDATED: AtomicU64 = AtomicU64::new(0);
static BOOKINGS_PUSHED: AtomicU64 = AtomicU64::new(0);
static PULL_RUNS: AtomicU64 = AtomicU64::new(0);

pub struct Metrics;

impl Metrics {
    pub fn webhook_received() {
        WEBHOOKS_RECEIVED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn webhook_processed() {
        WEBHOOKS_PROCESSED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn webhook_failed() {
        WEBHOOKS_FAILED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn webhook_unauthorized() {
        WEBHOOKS_UNAUTHORIZED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn webhook_ignored() {
        WEBHOOKS_IGNORED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn booking_created() {
        BOOKINGS_CREATED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn booking_updated() {
        BOOKINGS_UPDATED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn booking_pushed() {
        BOOKINGS_PUSHED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pull_run() {
        PULL_RUNS.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn format_prometheus() -> String {
    let uptime = web_state().started_at.elapsed().as_secs();
    let received = WEBHOOKS_RECEIVED.load(Ordering::Relaxed);
    let processed = WEBHOOKS_PROCESSED.load(Ordering::Relaxed);
    let failed = WEBHOOKS_FAILED.load(Ordering::Relaxed);
    let unauthorized = WEBHOOKS_UNAUTHORIZED.load(Ordering::Relaxed);
    let ignored = WEBHOOKS_IGNORED.load(Ordering::Relaxed);
    let created = BOOKINGS_CREATED.load(Ordering::Relaxed);
    let updated = BOOKINGS_UPDATED.load(Ordering::Relaxed);
    let pushed = BOOKINGS_PUSHED.load(Ordering::Relaxed);
    let pull_runs = PULL_RUNS.load(Ordering::Relaxed);

    format!(
        r#"# HELP sync_uptime_seconds Number of seconds the service has been running
# TYPE sync_uptime_seconds gauge
sync_uptime_seconds {}

# HELP webhooks_received_total Total number of webhook deliveries received
# TYPE webhooks_received_total counter
webhooks_received_total {}

# HELP webhooks_processed_total Number of webhook deliveries fully processed
# TYPE webhooks_processed_total counter
webhooks_processed_total {}

# HELP webhooks_failed_total Number of webhook deliveries that failed processing
# TYPE webhooks_failed_total counter
webhooks_failed_total {}

# HELP webhooks_unauthorized_total Number of webhook deliveries rejected for a bad credential
# TYPE webhooks_unauthorized_total counter
webhooks_unauthorized_total {}

# HELP webhooks_ignored_total Number of webhook deliveries acknowledged without dispatch
# TYPE webhooks_ignored_total counter
webhooks_ignored_total {}

# HELP bookings_created_total Number of bookings created by reconciliation
# TYPE bookings_created_total counter
bookings_created_total {}

# HELP bookings_updated_total Number of bookings updated by reconciliation
# TYPE bookings_updated_total counter
bookings_updated_total {}

# HELP bookings_pushed_total Number of PMS bookings pushed to the channel manager
# TYPE bookings_pushed_total counter
bookings_pushed_total {}

# HELP pull_runs_total Number of bulk reconciliation runs
# TYPE pull_runs_total counter
pull_runs_total {}
"#,
        uptime, received, processed, failed, unauthorized, ignored, created, updated, pushed,
        pull_runs,
    )
}

#[handler]
pub async fn metrics_endpoint(res: &mut Response) {
    res.headers_mut()
        .insert("Content-Type", "text/plain; charset=utf-8".parse().unwrap());
    res.body(format_prometheus());
}
