mod m0001_job_queue;
mod m0002_submissions;
mod m0003_monitoring_schedule;

use cetane::prelude::MigrationRegistry;

pub fn registry() -> MigrationRegistry {
    let mut reg = MigrationRegistry::new();
    reg.register(m0001_job_queue::migration());
    reg.register(m0002_submissions::migration());
    reg.register(m0003_monitoring_schedule::migration());
    reg
}
