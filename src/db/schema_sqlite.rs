// SQLite schema definitions
// This file mirrors schema.rs but uses SQLite-compatible types

diesel::table! {
    bookings (id) {
        id -> Integer,
        external_booking_id -> Nullable<Text>,
        ota_reservation_code -> Nullable<Text>,
        channel -> Text,
        status -> Text,
        check_in -> Text,
        check_out -> Text,
        guest_name -> Nullable<Text>,
        guest_email -> Nullable<Text>,
        guest_phone -> Nullable<Text>,
        adults -> Integer,
        children -> Integer,
        total_amount -> Text,
        currency -> Text,
        room_id -> Nullable<BigInt>,
        room_category -> Text,
        room_title -> Nullable<Text>,
        notes -> Nullable<Text>,
        provider_meta -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    webhook_log (id) {
        id -> Integer,
        event_type -> Text,
        event_id -> Text,
        object_type -> Text,
        object_id -> Nullable<Text>,
        payload -> Text,
        received_at -> Text,
        processed -> Bool,
        processed_at -> Nullable<Text>,
    }
}

diesel::table! {
    webhook_errors (id) {
        id -> Integer,
        error_message -> Text,
        error_detail -> Nullable<Text>,
        payload -> Nullable<Text>,
        occurred_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(bookings, webhook_log, webhook_errors,);
