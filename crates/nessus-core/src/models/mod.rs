//! Typed views over extracted listing records.
//!
//! - `Policy`: scan policies from `policy/list`
//! - `Report`: finished reports from `report/list`
//! - `Scan`: running scans from `scan/list`
//! - `PluginFamily`: plugin families from `plugins/list`

pub mod plugin;
pub mod policy;
pub mod report;
pub mod scan;

pub use plugin::PluginFamily;
pub use policy::Policy;
pub use report::Report;
pub use scan::Scan;

use chrono::{DateTime, Local};

use crate::extract::Record;

/// Text of `tag` in `record`, if present
pub(crate) fn text(record: &Record, tag: &str) -> Option<String> {
    record.get(tag).map(|v| v.to_string())
}

/// Timestamp of `tag`, if the extractor converted it
pub(crate) fn time(record: &Record, tag: &str) -> Option<DateTime<Local>> {
    record.get(tag).and_then(|v| v.as_time())
}

pub(crate) fn number(record: &Record, tag: &str) -> Option<u64> {
    record.get(tag).and_then(|v| v.as_text()).and_then(|s| s.trim().parse().ok())
}
