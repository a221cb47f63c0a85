// src/health/record.rs
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::warehouse::RowBatch;

pub const HEALTH_CHECK_SECTION: &str = "HealthCheck";
pub const HEALTH_CHECK_TEXT: &str = "ok";

/// Synthetic row proving the statements table accepts writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckRecord {
    pub publish_date: NaiveDate,
    pub section: &'static str,
    pub text: &'static str,
}

impl HealthCheckRecord {
    pub fn new(publish_date: NaiveDate) -> Self {
        Self {
            publish_date,
            section: HEALTH_CHECK_SECTION,
            text: HEALTH_CHECK_TEXT,
        }
    }

    /// Stamped with the local calendar date.
    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn into_batch(self) -> Result<RowBatch, serde_json::Error> {
        RowBatch::from_rows(&[self])
    }
}
