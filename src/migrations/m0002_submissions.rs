use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0002_submissions")
        .depends_on(&["0001_job_queue"])
        // Owned by the marketplace application; only the columns the worker touches.
        .operation(
            CreateTable::new("submissions")
                .add_field(Field::new("id", FieldType::Text).primary_key())
                .add_field(Field::new("content_url", FieldType::Text).not_null())
                .add_field(Field::new("platform", FieldType::Text))
                .add_field(Field::new("status", FieldType::Text).not_null().default("'pending'"))
                .add_field(Field::new("updated_at", FieldType::Text).not_null()),
        )
        .operation(
            CreateTable::new("submission_captures")
                .add_field(Field::new("id", FieldType::Text).primary_key())
                .add_field(Field::new("submission_id", FieldType::Text).not_null())
                .add_field(Field::new("capture_type", FieldType::Text).not_null())
                .add_field(Field::new("screenshot_url", FieldType::Text))
                .add_field(Field::new("raw_metadata", FieldType::Text).not_null().default("'{}'"))
                .add_field(Field::new("is_live", FieldType::Integer).not_null().default("0"))
                .add_field(Field::new("error_message", FieldType::Text))
                .add_field(Field::new("captured_at", FieldType::Text).not_null()),
        )
        .operation(
            RunSql::portable()
                .for_backend(
                    "sqlite",
                    "CREATE INDEX idx_submission_captures_submission ON submission_captures(submission_id, captured_at)",
                )
                .for_backend(
                    "postgres",
                    "CREATE INDEX idx_submission_captures_submission ON submission_captures(submission_id, captured_at)",
                ),
        )
}
