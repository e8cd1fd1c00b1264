use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Milestone;

/// Descriptive fields the contract does not store. Cached per invoice id
/// right after a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceMetadata {
    pub item_name: String,
    pub item_description: Option<String>,
    pub date: NaiveDate,
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}
