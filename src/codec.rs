//! Vendor metadata carried in an account's free-text description.
//!
//! The remote account has no columns for the vendor's external id, renewal
//! date, or contract status, so they are serialized into the description
//! with a small line grammar:
//!
//! ```text
//! Vendor ID: <int>; Renewal Date: <YYYY-MM-DD>; Status: <token>; Type: Vendor
//! ```
//!
//! Encoding always writes the fields in that order and omits absent ones.
//! Decoding looks for each field independently, so order, extra text, and
//! missing fields are all tolerated. A status runs up to the next `;`, so it
//! may contain spaces (`On Hold`) but never a semicolon.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::VendorStatus;

/// Description written on accounts created for documents with no tabular row.
pub const DISCOVERED_DESCRIPTION: &str = "Created from PDF Scan";

static VENDOR_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Vendor ID:\s*(-?\d+)").expect("valid regex"));
static RENEWAL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Renewal Date:\s*(\d{4}-\d{2}-\d{2})").expect("valid regex"));
static STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Status:\s*([^;]*[^;\s])").expect("valid regex"));

/// Renewal date assumed when a description carries none.
pub fn placeholder_renewal_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid calendar date")
}

/// The structured fields embedded in a description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorMetadata {
    pub vendor_id: Option<i64>,
    pub renewal_date: Option<NaiveDate>,
    pub status: Option<VendorStatus>,
}

impl VendorMetadata {
    /// Renewal date, or the placeholder when absent.
    pub fn renewal_date_or_default(&self) -> NaiveDate {
        self.renewal_date.unwrap_or_else(placeholder_renewal_date)
    }

    /// Status, or `Active` when absent.
    pub fn status_or_default(&self) -> VendorStatus {
        self.status.clone().unwrap_or_default()
    }
}

/// Serialize metadata into description text.
pub fn encode(meta: &VendorMetadata) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(id) = meta.vendor_id {
        parts.push(format!("Vendor ID: {}", id));
    }
    if let Some(date) = meta.renewal_date {
        parts.push(format!("Renewal Date: {}", date.format("%Y-%m-%d")));
    }
    if let Some(status) = &meta.status {
        parts.push(format!("Status: {}", status));
    }
    parts.push("Type: Vendor".to_string());
    parts.join("; ")
}

/// Parse whatever metadata fields a description carries.
///
/// Never fails: malformed or missing fields simply decode as `None`.
pub fn decode(description: &str) -> VendorMetadata {
    let capture = |re: &Regex| {
        re.captures(description)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };

    VendorMetadata {
        vendor_id: capture(&VENDOR_ID).and_then(|s| s.parse().ok()),
        renewal_date: capture(&RENEWAL_DATE)
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        status: capture(&STATUS).map(VendorStatus::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn encodes_fixed_field_order() {
        let meta = VendorMetadata {
            vendor_id: Some(99),
            renewal_date: Some(date(2027, 1, 1)),
            status: Some(VendorStatus::Active),
        };
        assert_eq!(
            encode(&meta),
            "Vendor ID: 99; Renewal Date: 2027-01-01; Status: Active; Type: Vendor"
        );
    }

    #[test]
    fn round_trip() {
        for status in [
            VendorStatus::Active,
            VendorStatus::Inactive,
            VendorStatus::Other("Expired".into()),
            VendorStatus::Other("On Hold".into()),
        ] {
            let meta = VendorMetadata {
                vendor_id: Some(4021),
                renewal_date: Some(date(2026, 2, 28)),
                status: Some(status),
            };
            assert_eq!(decode(&encode(&meta)), meta);
        }
    }

    #[test]
    fn negative_vendor_id_round_trips() {
        let meta = VendorMetadata {
            vendor_id: Some(-5),
            ..Default::default()
        };
        assert_eq!(encode(&meta), "Vendor ID: -5; Type: Vendor");
        assert_eq!(decode(&encode(&meta)).vendor_id, Some(-5));
    }

    #[test]
    fn multi_word_status_stops_at_separator() {
        let meta = decode("Vendor ID: 8; Status: On Hold ; Type: Vendor");
        assert_eq!(meta.status, Some(VendorStatus::Other("On Hold".into())));

        let last = decode("Vendor ID: 8; Status: Under Review");
        assert_eq!(last.status, Some(VendorStatus::Other("Under Review".into())));
    }

    #[test]
    fn decode_is_order_independent() {
        let meta = decode("Status: Inactive; Type: Vendor; Renewal Date: 2024-06-30; Vendor ID: 7");
        assert_eq!(meta.vendor_id, Some(7));
        assert_eq!(meta.renewal_date, Some(date(2024, 6, 30)));
        assert_eq!(meta.status, Some(VendorStatus::Inactive));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let meta = decode("Vendor ID: 12; Type: Vendor");
        assert_eq!(meta.vendor_id, Some(12));
        assert_eq!(meta.renewal_date_or_default(), date(2025, 1, 1));
        assert_eq!(meta.status_or_default(), VendorStatus::Active);
    }

    #[test]
    fn discovered_description_has_no_vendor_id() {
        assert_eq!(decode(DISCOVERED_DESCRIPTION), VendorMetadata::default());
    }

    #[test]
    fn invalid_date_is_treated_as_absent() {
        let meta = decode("Vendor ID: 3; Renewal Date: 2025-13-40");
        assert_eq!(meta.renewal_date, None);
    }

    #[test]
    fn absent_fields_are_omitted_when_encoding() {
        let meta = VendorMetadata {
            vendor_id: Some(5),
            ..Default::default()
        };
        assert_eq!(encode(&meta), "Vendor ID: 5; Type: Vendor");
    }
}
