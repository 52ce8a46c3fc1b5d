use chrono::{DateTime, Local};
use serde::Serialize;

use crate::extract::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scan {
    pub uuid: String,
    pub owner: Option<String>,
    pub start_time: Option<DateTime<Local>>,
    pub completion_current: Option<u64>,
    pub completion_total: Option<u64>,
}

impl Scan {
    pub fn from_record(uuid: &str, record: &Record) -> Self {
        Self {
            uuid: uuid.to_string(),
            owner: super::text(record, "owner"),
            start_time: super::time(record, "start_time"),
            completion_current: super::number(record, "completion_current"),
            completion_total: super::number(record, "completion_total"),
        }
    }

    /// Completed share of the scan, 0-100
    pub fn progress_percent(&self) -> Option<u64> {
        match (self.completion_current, self.completion_total) {
            (Some(current), Some(total)) if total > 0 => {
                let percent = u128::from(current.min(total)) * 100 / u128::from(total);
                u64::try_from(percent).ok()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Value;

    fn scan(current: &str, total: &str) -> Scan {
        let mut record = Record::new();
        record.insert("completion_current".into(), Value::Text(current.into()));
        record.insert("completion_total".into(), Value::Text(total.into()));
        Scan::from_record("s", &record)
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(scan("0", "200").progress_percent(), Some(0));
        assert_eq!(scan("50", "200").progress_percent(), Some(25));
        assert_eq!(scan("200", "200").progress_percent(), Some(100));
        assert_eq!(scan("5", "0").progress_percent(), None);
        assert_eq!(scan("x", "10").progress_percent(), None);
    }

    #[test]
    fn test_progress_percent_huge_counts() {
        let max = u64::MAX.to_string();
        assert_eq!(scan(&max, &max).progress_percent(), Some(100));
        let half = (u64::MAX / 2).to_string();
        assert_eq!(scan(&half, &max).progress_percent(), Some(49));
    }

    #[test]
    fn test_unconverted_start_time() {
        let mut record = Record::new();
        record.insert("start_time".into(), Value::Text("12345".into()));
        assert_eq!(Scan::from_record("s", &record).start_time, None);
    }
}
