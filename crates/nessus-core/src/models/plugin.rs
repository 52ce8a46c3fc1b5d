use serde::Serialize;

use crate::extract::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginFamily {
    pub name: String,
    pub plugin_count: Option<u64>,
}

impl PluginFamily {
    pub fn from_record(name: &str, record: &Record) -> Self {
        Self {
            name: name.to_string(),
            plugin_count: super::number(record, "numFamilyMembers"),
        }
    }
}
