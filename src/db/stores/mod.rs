use async_trait::async_trait;

use super::DatabaseError;
use super::models::{Booking, ErrorLogEntry, WebhookLogEntry};

/// What an upsert did with the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_booking_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Booking>, DatabaseError>;
    async fn get_booking_by_id(&self, id: i64) -> Result<Option<Booking>, DatabaseError>;
    async fn count_bookings(&self) -> Result<i64, DatabaseError>;
    async fn list_bookings(&self, limit: i64, offset: i64)
    -> Result<Vec<Booking>, DatabaseError>;
    async fn create_booking(&self, booking: &Booking) -> Result<(), DatabaseError>;
    /// Single atomic insert-or-update keyed on the UNIQUE
    /// `external_booking_id` column. Correctness under concurrent writers
    /// comes from the datastore constraint, not from any in-process check.
    /// The booking must carry an external id; a `Conflict` is returned
    /// otherwise.
    async fn upsert_booking_by_external_id(
        &self,
        booking: &Booking,
    ) -> Result<UpsertOutcome, DatabaseError>;
    /// Attach the channel-manager id returned by an outbound push. A unique
    /// violation (another row already owns that id) surfaces as `Conflict`.
    async fn attach_external_id(&self, id: i64, external_id: &str) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait WebhookLogStore: Send + Sync {
    /// Returns the id of the inserted log row.
    async fn record_event(&self, entry: &WebhookLogEntry) -> Result<i64, DatabaseError>;
    async fn mark_processed(&self, id: i64) -> Result<(), DatabaseError>;
    async fn count_events(&self) -> Result<i64, DatabaseError>;
    async fn count_unprocessed(&self) -> Result<i64, DatabaseError>;
    async fn record_error(&self, entry: &ErrorLogEntry) -> Result<i64, DatabaseError>;
    async fn list_recent_errors(&self, limit: i64) -> Result<Vec<ErrorLogEntry>, DatabaseError>;
}
