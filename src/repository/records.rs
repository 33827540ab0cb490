//! Diesel row types for the queue tables.

use diesel::prelude::*;

use crate::schema;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::job_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobRecord {
    pub id: String,
    pub job_type: String,
    pub payload: String,
    pub status: String,
    pub priority: i32,
    pub scheduled_for: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub locked_by: Option<String>,
    pub locked_at: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::job_queue)]
pub struct NewJob<'a> {
    pub id: &'a str,
    pub job_type: &'a str,
    pub payload: &'a str,
    pub status: &'a str,
    pub priority: i32,
    pub scheduled_for: &'a str,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::submissions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SubmissionRecord {
    pub id: String,
    pub content_url: String,
    pub platform: Option<String>,
    pub status: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::submissions)]
pub struct NewSubmission<'a> {
    pub id: &'a str,
    pub content_url: &'a str,
    pub platform: Option<&'a str>,
    pub status: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::submission_captures)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CaptureRecord {
    pub id: String,
    pub submission_id: String,
    pub capture_type: String,
    pub screenshot_url: Option<String>,
    pub raw_metadata: String,
    pub is_live: i32,
    pub error_message: Option<String>,
    pub captured_at: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::submission_captures)]
pub struct NewCapture<'a> {
    pub id: &'a str,
    pub submission_id: &'a str,
    pub capture_type: &'a str,
    pub screenshot_url: Option<&'a str>,
    pub raw_metadata: &'a str,
    pub is_live: i32,
    pub error_message: Option<&'a str>,
    pub captured_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::monitoring_schedule)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScheduleRecord {
    pub id: String,
    pub submission_id: String,
    pub is_active: i32,
    pub next_check_at: String,
    pub check_interval_hours: Option<i32>,
    pub checks_remaining: i32,
    pub total_checks: i32,
    pub last_checked_at: Option<String>,
    pub created_at: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::monitoring_schedule)]
pub struct NewSchedule<'a> {
    pub id: &'a str,
    pub submission_id: &'a str,
    pub is_active: i32,
    pub next_check_at: &'a str,
    pub check_interval_hours: Option<i32>,
    pub checks_remaining: i32,
    pub total_checks: i32,
    pub last_checked_at: Option<&'a str>,
    pub created_at: &'a str,
}
