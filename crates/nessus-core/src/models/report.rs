use chrono::{DateTime, Local};
use serde::Serialize;

use crate::extract::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Report identifier, also used to download it
    pub name: String,
    pub readable_name: Option<String>,
    pub timestamp: Option<DateTime<Local>>,
}

impl Report {
    pub fn from_record(name: &str, record: &Record) -> Self {
        Self {
            name: name.to_string(),
            readable_name: super::text(record, "readableName"),
            timestamp: super::time(record, "timestamp"),
        }
    }
}
