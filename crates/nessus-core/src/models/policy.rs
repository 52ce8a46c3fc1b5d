use serde::Serialize;

use crate::extract::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub id: String,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub comments: Option<String>,
}

impl Policy {
    pub fn from_record(id: &str, record: &Record) -> Self {
        Self {
            id: id.to_string(),
            name: super::text(record, "policyName"),
            owner: super::text(record, "policyOwner"),
            comments: super::text(record, "policyComments").filter(|c| !c.is_empty()),
        }
    }
}
