//! postwatch - background job queue and post capture for a creator marketplace.
//!
//! Producers insert jobs into a durable table; workers lease them with a
//! conditional update, capture screenshots of submitted posts, and keep
//! recurring monitoring checks flowing until a submission is settled.

#![allow(clippy::should_implement_trait)]

pub mod cli;
pub mod config;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod schema;
pub mod server;
pub mod services;
pub mod tasks;
pub mod work_queue;
pub mod worker;
