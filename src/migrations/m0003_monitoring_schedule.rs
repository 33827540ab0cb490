use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0003_monitoring_schedule")
        .depends_on(&["0002_submissions"])
        .operation(
            CreateTable::new("monitoring_schedule")
                .add_field(Field::new("id", FieldType::Text).primary_key())
                .add_field(Field::new("submission_id", FieldType::Text).not_null())
                .add_field(Field::new("is_active", FieldType::Integer).not_null().default("1"))
                .add_field(Field::new("next_check_at", FieldType::Text).not_null())
                .add_field(Field::new("check_interval_hours", FieldType::Integer))
                .add_field(Field::new("checks_remaining", FieldType::Integer).not_null().default("0"))
                .add_field(Field::new("total_checks", FieldType::Integer).not_null().default("0"))
                .add_field(Field::new("last_checked_at", FieldType::Text))
                .add_field(Field::new("created_at", FieldType::Text).not_null()),
        )
        .operation(
            RunSql::portable()
                .for_backend(
                    "sqlite",
                    "CREATE INDEX idx_monitoring_schedule_due ON monitoring_schedule(next_check_at) WHERE is_active = 1",
                )
                .for_backend(
                    "postgres",
                    "CREATE INDEX idx_monitoring_schedule_due ON monitoring_schedule(next_check_at) WHERE is_active = 1",
                ),
        )
        .operation(
            RunSql::portable()
                .for_backend(
                    "sqlite",
                    "CREATE INDEX idx_monitoring_schedule_submission ON monitoring_schedule(submission_id)",
                )
                .for_backend(
                    "postgres",
                    "CREATE INDEX idx_monitoring_schedule_submission ON monitoring_schedule(submission_id)",
                ),
        )
}
