use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use rust_decimal::Decimal;

use super::DatabaseError;
use super::models::{Booking, BookingStatus, Channel, ErrorLogEntry, WebhookLogEntry};
use super::stores::UpsertOutcome;
use crate::db::manager::Pool;
use crate::db::schema::{bookings, webhook_errors, webhook_log};

fn string_to_decimal(s: &str) -> Result<Decimal, DatabaseError> {
    s.parse::<Decimal>()
        .map_err(|e| DatabaseError::Query(format!("invalid decimal column value: {e}")))
}

fn string_to_json(s: &str) -> Result<serde_json::Value, DatabaseError> {
    serde_json::from_str(s)
        .map_err(|e| DatabaseError::Query(format!("invalid JSON column value: {e}")))
}

fn map_query_error(e: diesel::result::Error) -> DatabaseError {
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            DatabaseError::Conflict(info.message().to_string())
        }
        other => DatabaseError::Query(other.to_string()),
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
struct DbBooking {
    id: i64,
    external_booking_id: Option<String>,
    ota_reservation_code: Option<String>,
    channel: String,
    status: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guest_name: Option<String>,
    guest_email: Option<String>,
    guest_phone: Option<String>,
    adults: i32,
    children: i32,
    total_amount: String,
    currency: String,
    room_id: Option<i64>,
    room_category: String,
    room_title: Option<String>,
    notes: Option<String>,
    provider_meta: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DbBooking {
    fn to_booking(&self) -> Result<Booking, DatabaseError> {
        Ok(Booking {
            id: self.id,
            external_booking_id: self.external_booking_id.clone(),
            ota_reservation_code: self.ota_reservation_code.clone(),
            channel: Channel::from_db_str(&self.channel),
            status: BookingStatus::from_db_str(&self.status),
            check_in: self.check_in,
            check_out: self.check_out,
            guest_name: self.guest_name.clone(),
            guest_email: self.guest_email.clone(),
            guest_phone: self.guest_phone.clone(),
            adults: self.adults,
            children: self.children,
            total_amount: string_to_decimal(&self.total_amount)?,
            currency: self.currency.clone(),
            room_id: self.room_id,
            room_category: self.room_category.clone(),
            room_title: self.room_title.clone(),
            notes: self.notes.clone(),
            provider_meta: self
                .provider_meta
                .as_deref()
                .map(string_to_json)
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = bookings)]
struct NewBooking<'a> {
    external_booking_id: Option<&'a str>,
    ota_reservation_code: Option<&'a str>,
    channel: &'a str,
    status: &'a str,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guest_name: Option<&'a str>,
    guest_email: Option<&'a str>,
    guest_phone: Option<&'a str>,
    adults: i32,
    children: i32,
    total_amount: String,
    currency: &'a str,
    room_id: Option<i64>,
    room_category: &'a str,
    room_title: Option<&'a str>,
    notes: Option<&'a str>,
    provider_meta: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = bookings)]
struct UpdateBooking<'a> {
    ota_reservation_code: Option<&'a str>,
    channel: &'a str,
    status: &'a str,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guest_name: Option<&'a str>,
    guest_email: Option<&'a str>,
    guest_phone: Option<&'a str>,
    adults: i32,
    children: i32,
    total_amount: String,
    currency: &'a str,
    room_id: Option<i64>,
    room_category: &'a str,
    room_title: Option<&'a str>,
    notes: Option<&'a str>,
    provider_meta: Option<String>,
    updated_at: DateTime<Utc>,
}

fn new_booking_row(booking: &Booking, now: DateTime<Utc>) -> NewBooking<'_> {
    NewBooking {
        external_booking_id: booking.external_booking_id.as_deref(),
        ota_reservation_code: booking.ota_reservation_code.as_deref(),
        channel: booking.channel.as_str(),
        status: booking.status.as_str(),
        check_in: booking.check_in,
        check_out: booking.check_out,
        guest_name: booking.guest_name.as_deref(),
        guest_email: booking.guest_email.as_deref(),
        guest_phone: booking.guest_phone.as_deref(),
        adults: booking.adults,
        children: booking.children,
        total_amount: booking.total_amount.to_string(),
        currency: &booking.currency,
        room_id: booking.room_id,
        room_category: &booking.room_category,
        room_title: booking.room_title.as_deref(),
        notes: booking.notes.as_deref(),
        provider_meta: booking.provider_meta.as_ref().map(|v| v.to_string()),
        created_at: now,
        updated_at: now,
    }
}

fn update_booking_row(booking: &Booking, now: DateTime<Utc>) -> UpdateBooking<'_> {
    UpdateBooking {
        ota_reservation_code: booking.ota_reservation_code.as_deref(),
        channel: booking.channel.as_str(),
        status: booking.status.as_str(),
        check_in: booking.check_in,
        check_out: booking.check_out,
        guest_name: booking.guest_name.as_deref(),
        guest_email: booking.guest_email.as_deref(),
        guest_phone: booking.guest_phone.as_deref(),
        adults: booking.adults,
        children: booking.children,
        total_amount: booking.total_amount.to_string(),
        currency: &booking.currency,
        room_id: booking.room_id,
        room_category: &booking.room_category,
        room_title: booking.room_title.as_deref(),
        notes: booking.notes.as_deref(),
        provider_meta: booking.provider_meta.as_ref().map(|v| v.to_string()),
        updated_at: now,
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = webhook_log)]
struct DbWebhookLogEntry {
    id: i64,
    event_type: String,
    event_id: String,
    object_type: String,
    object_id: Option<String>,
    payload: String,
    received_at: DateTime<Utc>,
    processed: bool,
    processed_at: Option<DateTime<Utc>>,
}

impl DbWebhookLogEntry {
    fn to_entry(&self) -> Result<WebhookLogEntry, DatabaseError> {
        Ok(WebhookLogEntry {
            id: self.id,
            event_type: self.event_type.clone(),
            event_id: self.event_id.clone(),
            object_type: self.object_type.clone(),
            object_id: self.object_id.clone(),
            payload: string_to_json(&self.payload)?,
            received_at: self.received_at,
            processed: self.processed,
            processed_at: self.processed_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = webhook_log)]
struct NewWebhookLogEntry<'a> {
    event_type: &'a str,
    event_id: &'a str,
    object_type: &'a str,
    object_id: Option<&'a str>,
    payload: String,
    received_at: DateTime<Utc>,
    processed: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = webhook_errors)]
struct DbErrorLogEntry {
    id: i64,
    error_message: String,
    error_detail: Option<String>,
    payload: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl DbErrorLogEntry {
    fn to_entry(&self) -> Result<ErrorLogEntry, DatabaseError> {
        Ok(ErrorLogEntry {
            id: self.id,
            error_message: self.error_message.clone(),
            error_detail: self.error_detail.clone(),
            payload: self.payload.as_deref().map(string_to_json).transpose()?,
            occurred_at: self.occurred_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = webhook_errors)]
struct NewErrorLogEntry<'a> {
    error_message: &'a str,
    error_detail: Option<&'a str>,
    payload: Option<String>,
    occurred_at: DateTime<Utc>,
}

async fn with_connection<T, F>(pool: Pool, operation: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        operation(&mut conn)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

pub struct PostgresBookingStore {
    pool: Pool,
}

impl PostgresBookingStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::BookingStore for PostgresBookingStore {
    async fn get_booking_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Booking>, DatabaseError> {
        let external_id = external_id.to_string();
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::bookings::dsl::*;
            bookings
                .filter(external_booking_id.eq(&external_id))
                .select(DbBooking::as_select())
                .first::<DbBooking>(conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|b| b.to_booking())
                .transpose()
        })
        .await
    }

    async fn get_booking_by_id(&self, booking_id: i64) -> Result<Option<Booking>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::bookings::dsl::*;
            bookings
                .filter(id.eq(booking_id))
                .select(DbBooking::as_select())
                .first::<DbBooking>(conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|b| b.to_booking())
                .transpose()
        })
        .await
    }

    async fn count_bookings(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::bookings::dsl::*;
            bookings
                .count()
                .get_result(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn list_bookings(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::bookings::dsl::*;
            let results = bookings
                .order(id.desc())
                .limit(limit)
                .offset(offset)
                .select(DbBooking::as_select())
                .load::<DbBooking>(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            results.into_iter().map(|b| b.to_booking()).collect()
        })
        .await
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), DatabaseError> {
        let booking = booking.clone();
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            let now = Utc::now();
            let new_row = new_booking_row(&booking, now);
            diesel::insert_into(bookings::table)
                .values(&new_row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_query_error)
        })
        .await
    }

    async fn upsert_booking_by_external_id(
        &self,
        booking: &Booking,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let booking = booking.clone();
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            let external_id = booking.external_booking_id.clone().ok_or_else(|| {
                DatabaseError::Conflict("cannot upsert a booking without an external id".into())
            })?;

            use crate::db::schema::bookings::dsl::*;

            let now = Utc::now();
            let new_row = new_booking_row(&booking, now);
            let changes = update_booking_row(&booking, now);

            diesel::insert_into(bookings)
                .values(&new_row)
                .on_conflict(external_booking_id)
                .do_update()
                .set(&changes)
                .execute(conn)
                .map_err(map_query_error)?;

            // An insert stamps both timestamps with the same value; an
            // update bumps updated_at and never touches created_at.
            let row = bookings
                .filter(external_booking_id.eq(&external_id))
                .select(DbBooking::as_select())
                .first::<DbBooking>(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;

            if row.created_at == row.updated_at {
                Ok(UpsertOutcome::Created)
            } else {
                Ok(UpsertOutcome::Updated)
            }
        })
        .await
    }

    async fn attach_external_id(
        &self,
        booking_id: i64,
        external_id: &str,
    ) -> Result<(), DatabaseError> {
        let external_id = external_id.to_string();
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::bookings::dsl::*;
            let affected = diesel::update(bookings.filter(id.eq(booking_id)))
                .set((
                    external_booking_id.eq(&external_id),
                    updated_at.eq(Utc::now()),
                ))
                .execute(conn)
                .map_err(map_query_error)?;
            if affected == 0 {
                return Err(DatabaseError::NotFound(format!(
                    "booking {booking_id} does not exist"
                )));
            }
            Ok(())
        })
        .await
    }
}

pub struct PostgresWebhookLogStore {
    pool: Pool,
}

impl PostgresWebhookLogStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::WebhookLogStore for PostgresWebhookLogStore {
    async fn record_event(&self, entry: &WebhookLogEntry) -> Result<i64, DatabaseError> {
        let entry = entry.clone();
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            let new_row = NewWebhookLogEntry {
                event_type: &entry.event_type,
                event_id: &entry.event_id,
                object_type: &entry.object_type,
                object_id: entry.object_id.as_deref(),
                payload: entry.payload.to_string(),
                received_at: entry.received_at,
                processed: false,
            };
            diesel::insert_into(webhook_log::table)
                .values(&new_row)
                .returning(webhook_log::id)
                .get_result::<i64>(conn)
                .map_err(map_query_error)
        })
        .await
    }

    async fn mark_processed(&self, entry_id: i64) -> Result<(), DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::webhook_log::dsl::*;
            diesel::update(webhook_log.filter(id.eq(entry_id)))
                .set((processed.eq(true), processed_at.eq(Some(Utc::now()))))
                .execute(conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn count_events(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::webhook_log::dsl::*;
            webhook_log
                .count()
                .get_result(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn count_unprocessed(&self) -> Result<i64, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::webhook_log::dsl::*;
            webhook_log
                .filter(processed.eq(false))
                .count()
                .get_result(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
    }

    async fn record_error(&self, entry: &ErrorLogEntry) -> Result<i64, DatabaseError> {
        let entry = entry.clone();
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            let new_row = NewErrorLogEntry {
                error_message: &entry.error_message,
                error_detail: entry.error_detail.as_deref(),
                payload: entry.payload.as_ref().map(|v| v.to_string()),
                occurred_at: entry.occurred_at,
            };
            diesel::insert_into(webhook_errors::table)
                .values(&new_row)
                .returning(webhook_errors::id)
                .get_result::<i64>(conn)
                .map_err(map_query_error)
        })
        .await
    }

    async fn list_recent_errors(&self, limit: i64) -> Result<Vec<ErrorLogEntry>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::webhook_errors::dsl::*;
            let results = webhook_errors
                .order(id.desc())
                .limit(limit)
                .select(DbErrorLogEntry::as_select())
                .load::<DbErrorLogEntry>(conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
            results.into_iter().map(|e| e.to_entry()).collect()
        })
        .await
    }
}
