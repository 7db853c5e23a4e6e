diesel::table! {
    bookings (id) {
        id -> BigInt,
        external_booking_id -> Nullable<Text>,
        ota_reservation_code -> Nullable<Text>,
        channel -> Text,
        status -> Text,
        check_in -> Date,
        check_out -> Date,
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
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    webhook_log (id) {
        id -> BigInt,
        event_type -> Text,
        event_id -> Text,
        object_type -> Text,
        object_id -> Nullable<Text>,
        payload -> Text,
        received_at -> Timestamptz,
        processed -> Bool,
        processed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    webhook_errors (id) {
        id -> BigInt,
        error_message -> Text,
        error_detail -> Nullable<Text>,
        payload -> Nullable<Text>,
        occurred_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(bookings, webhook_log, webhook_errors,);
