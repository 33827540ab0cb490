use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_job_queue")
        .operation(
            CreateTable::new("job_queue")
                .add_field(Field::new("id", FieldType::Text).primary_key())
                .add_field(Field::new("job_type", FieldType::Text).not_null())
                .add_field(Field::new("payload", FieldType::Text).not_null().default("'{}'"))
                .add_field(Field::new("status", FieldType::Text).not_null().default("'pending'"))
                .add_field(Field::new("priority", FieldType::Integer).not_null().default("0"))
                .add_field(Field::new("scheduled_for", FieldType::Text).not_null())
                .add_field(Field::new("attempts", FieldType::Integer).not_null().default("0"))
                .add_field(Field::new("max_attempts", FieldType::Integer).not_null().default("3"))
                .add_field(Field::new("locked_by", FieldType::Text))
                .add_field(Field::new("locked_at", FieldType::Text))
                .add_field(Field::new("error_message", FieldType::Text))
                .add_field(Field::new("created_at", FieldType::Text).not_null())
                .add_field(Field::new("completed_at", FieldType::Text)),
        )
        // Eligible-job selection: status/scheduled_for filter, priority ordering
        .operation(
            RunSql::portable()
                .for_backend(
                    "sqlite",
                    "CREATE INDEX idx_job_queue_eligible ON job_queue(status, scheduled_for, priority) WHERE locked_by IS NULL",
                )
                .for_backend(
                    "postgres",
                    "CREATE INDEX idx_job_queue_eligible ON job_queue(status, scheduled_for, priority) WHERE locked_by IS NULL",
                ),
        )
        // Retention sweep and lease reaper
        .operation(
            RunSql::portable()
                .for_backend(
                    "sqlite",
                    "CREATE INDEX idx_job_queue_status_created ON job_queue(status, created_at)",
                )
                .for_backend(
                    "postgres",
                    "CREATE INDEX idx_job_queue_status_created ON job_queue(status, created_at)",
                ),
        )
}
