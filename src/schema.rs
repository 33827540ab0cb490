// Kept in sync with the cetane migrations in `src/migrations`.
// Booleans are stored as INTEGER and timestamps as fixed-width RFC 3339 TEXT
// so the same DSL runs on SQLite and PostgreSQL.

diesel::table! {
    job_queue (id) {
        id -> Text,
        job_type -> Text,
        payload -> Text,
        status -> Text,
        priority -> Integer,
        scheduled_for -> Text,
        attempts -> Integer,
        max_attempts -> Integer,
        locked_by -> Nullable<Text>,
        locked_at -> Nullable<Text>,
        error_message -> Nullable<Text>,
        created_at -> Text,
        completed_at -> Nullable<Text>,
    }
}

diesel::table! {
    monitoring_schedule (id) {
        id -> Text,
        submission_id -> Text,
        is_active -> Integer,
        next_check_at -> Text,
        check_interval_hours -> Nullable<Integer>,
        checks_remaining -> Integer,
        total_checks -> Integer,
        last_checked_at -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    submission_captures (id) {
        id -> Text,
        submission_id -> Text,
        capture_type -> Text,
        screenshot_url -> Nullable<Text>,
        raw_metadata -> Text,
        is_live -> Integer,
        error_message -> Nullable<Text>,
        captured_at -> Text,
    }
}

diesel::table! {
    submissions (id) {
        id -> Text,
        content_url -> Text,
        platform -> Nullable<Text>,
        status -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    job_queue,
    monitoring_schedule,
    submission_captures,
    submissions,
);
