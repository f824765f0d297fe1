//! Core data models used throughout vendor sync.
//!
//! These types represent the tabular vendor rows and the three remote entity
//! kinds (accounts, invoices, attachments) that flow through backfill,
//! cleanup, and extraction.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Separator used when several contract filenames share one tabular cell.
pub const FILENAME_DELIMITER: &str = ";";

/// Contract status as recorded on the tabular row.
///
/// Tokens other than `Active` / `Inactive` are kept verbatim so that stale
/// or hand-edited statuses survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VendorStatus {
    #[default]
    Active,
    Inactive,
    Other(String),
}

impl From<String> for VendorStatus {
    fn from(s: String) -> Self {
        match s.trim() {
            "" | "Active" => VendorStatus::Active,
            "Inactive" => VendorStatus::Inactive,
            other => VendorStatus::Other(other.to_string()),
        }
    }
}

impl From<VendorStatus> for String {
    fn from(s: VendorStatus) -> Self {
        s.to_string()
    }
}

impl FromStr for VendorStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(VendorStatus::from(s.to_string()))
    }
}

impl fmt::Display for VendorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorStatus::Active => f.write_str("Active"),
            VendorStatus::Inactive => f.write_str("Inactive"),
            VendorStatus::Other(s) => f.write_str(s),
        }
    }
}

/// Spend tier derived from aggregated spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Strategic,
    Major,
    Standard,
    #[serde(rename = "Low-Value")]
    LowValue,
}

impl Category {
    /// Closed, descending thresholds. The first one reached wins.
    const TIERS: [(f64, Category); 3] = [
        (100_000_000.0, Category::Strategic),
        (10_000_000.0, Category::Major),
        (1_000_000.0, Category::Standard),
    ];

    pub fn for_spend(spend: f64) -> Self {
        Self::TIERS
            .iter()
            .find(|(threshold, _)| spend >= *threshold)
            .map(|(_, category)| *category)
            .unwrap_or(Category::LowValue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Strategic => "Strategic",
            Category::Major => "Major",
            Category::Standard => "Standard",
            Category::LowValue => "Low-Value",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated tabular vendor row, as read by backfill.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorRecord {
    /// Externally minted stable key.
    pub vendor_id: i64,
    pub vendor_name: String,
    pub total_spend_ytd: f64,
    pub contract_filenames: Vec<String>,
    pub renewal_date: Option<NaiveDate>,
    pub status: VendorStatus,
}

/// A tabular row produced by extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRow {
    pub vendor_id: i64,
    pub vendor_name: String,
    pub total_spend_ytd: i64,
    pub contract_filename: String,
    pub renewal_date: NaiveDate,
    pub status: VendorStatus,
    pub category: Category,
}

/// Remote account entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Remote invoice entity. Amount may be absent on hand-created invoices.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub account_id: String,
    pub amount: Option<f64>,
}

/// Remote file attachment, payload already decoded to bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub account_id: String,
    pub filename: String,
    pub body: Option<Vec<u8>>,
}
