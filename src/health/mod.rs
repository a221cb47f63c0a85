// src/health/mod.rs
mod record;
mod writer;

pub use record::{HealthCheckRecord, HEALTH_CHECK_SECTION, HEALTH_CHECK_TEXT};
pub use writer::{run_health_check, HealthCheckWriter, WriteReport};
