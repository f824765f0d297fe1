//! Tabular vendor-spend files.
//!
//! Reads the source CSV used by backfill and cleanup and writes the CSV
//! produced by extraction. Columns:
//!
//! ```text
//! vendor_id,vendor_name,total_spend_ytd,contract_filename,renewal_date,status,category
//! ```
//!
//! `category` is optional on input and ignored: it is always re-derived from
//! spend. Rows are read leniently into [`RawVendorRow`] and validated one at a
//! time, so a single bad row is an item-level failure rather than a failure
//! to read the file.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::models::{ExtractedRow, VendorRecord, VendorStatus, FILENAME_DELIMITER};

/// Column order of the extraction output.
pub const OUTPUT_HEADER: [&str; 7] = [
    "vendor_id",
    "vendor_name",
    "total_spend_ytd",
    "contract_filename",
    "renewal_date",
    "status",
    "category",
];

/// A source row before validation. Every column is optional text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVendorRow {
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub total_spend_ytd: Option<String>,
    #[serde(default)]
    pub contract_filename: Option<String>,
    #[serde(default)]
    pub renewal_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RawVendorRow {
    /// Trimmed vendor name, empty when the column is missing.
    pub fn name(&self) -> &str {
        self.vendor_name.as_deref().unwrap_or_default().trim()
    }

    /// Validate the row into a [`VendorRecord`].
    pub fn to_record(&self) -> Result<VendorRecord> {
        let name = self.name();
        if name.is_empty() {
            return Err(SyncError::invalid("row has no vendor_name"));
        }

        let raw_id = self.vendor_id.as_deref().unwrap_or_default().trim();
        let vendor_id = raw_id.parse::<i64>().map_err(|_| {
            SyncError::invalid(format!("{}: vendor_id '{}' is not an integer", name, raw_id))
        })?;

        let total_spend_ytd = parse_currency(self.total_spend_ytd.as_deref().unwrap_or_default())
            .map_err(|e| SyncError::invalid(format!("{}: {}", name, e)))?;

        let renewal_date = match self.renewal_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                SyncError::invalid(format!("{}: renewal_date '{}' is not YYYY-MM-DD", name, s))
            })?),
        };

        let status = self.status.clone().unwrap_or_default();
        if status.contains(';') {
            return Err(SyncError::invalid(format!(
                "{}: status '{}' must not contain ';'",
                name, status
            )));
        }

        Ok(VendorRecord {
            vendor_id,
            vendor_name: name.to_string(),
            total_spend_ytd,
            contract_filenames: split_filenames(
                self.contract_filename.as_deref().unwrap_or_default(),
            ),
            renewal_date,
            status: VendorStatus::from(status),
        })
    }
}

/// Parse a currency cell such as `$150,000,000` or `1,234.50`.
///
/// A leading currency symbol and thousands separators are stripped. An empty
/// cell is zero.
pub fn parse_currency(value: &str) -> std::result::Result<f64, String> {
    let trimmed = value.trim();
    let digits = trimmed
        .trim_start_matches(['$', '€', '£', '¥'])
        .replace(',', "");
    let digits = digits.trim();
    if digits.is_empty() {
        return Ok(0.0);
    }
    digits
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a currency amount", trimmed))
}

/// Split a `contract_filename` cell into its filenames.
pub fn split_filenames(cell: &str) -> Vec<String> {
    cell.split(FILENAME_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join filenames into a `contract_filename` cell.
pub fn join_filenames(names: &[String]) -> String {
    names.join(FILENAME_DELIMITER)
}

/// Read every row of a vendor CSV.
///
/// Fails with [`SyncError::LocalIo`] if the file cannot be read, and with
/// [`SyncError::InvalidRecord`] if it is not well-formed CSV.
pub fn read_vendor_rows(path: &Path) -> Result<Vec<RawVendorRow>> {
    let text = std::fs::read_to_string(path).map_err(|e| SyncError::local_io(path, e))?;
    parse_vendor_rows(&text)
        .map_err(|e| SyncError::invalid(format!("{}: {}", path.display(), e)))
}

/// Parse vendor CSV text. A leading byte-order mark is ignored.
pub fn parse_vendor_rows(text: &str) -> std::result::Result<Vec<RawVendorRow>, csv::Error> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader.deserialize().collect()
}

/// Distinct non-empty vendor names, in first-seen order.
pub fn distinct_vendor_names(rows: &[RawVendorRow]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .map(RawVendorRow::name)
        .filter(|name| !name.is_empty() && seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

/// Write extraction rows as one batch, header first (also when empty).
pub fn write_extracted_rows(path: &Path, rows: &[ExtractedRow]) -> Result<()> {
    let to_io = |e: csv::Error| SyncError::local_io(path, std::io::Error::other(e));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(to_io)?;
    writer.write_record(OUTPUT_HEADER).map_err(to_io)?;
    for row in rows {
        writer.serialize(row).map_err(to_io)?;
    }
    writer.flush().map_err(|e| SyncError::local_io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    const SAMPLE: &str = "\u{feff}vendor_id,vendor_name,total_spend_ytd,contract_filename,renewal_date,status,category
99,Apex Logistics,\"$150,000,000\",Apex_Logistics_MSA.pdf,2027-01-01,Active,Strategic
7,CloudNine Hosting,\"1,250.50\",CloudNine_Hosting_Contract_v2.pdf;CloudNine_SOW.pdf,,Inactive,
8,Orion Supply,,,2026-03-31,,
";

    #[test]
    fn currency_parsing() {
        assert_eq!(parse_currency("$150,000,000").unwrap(), 150_000_000.0);
        assert_eq!(parse_currency(" 1,234.50 ").unwrap(), 1234.5);
        assert_eq!(parse_currency("").unwrap(), 0.0);
        assert_eq!(parse_currency("$").unwrap(), 0.0);
        assert_eq!(parse_currency("-20").unwrap(), -20.0);
        assert!(parse_currency("ten dollars").is_err());
    }

    #[test]
    fn reads_rows_with_bom_and_missing_cells() {
        let rows = parse_vendor_rows(SAMPLE).unwrap();
        assert_eq!(rows.len(), 3);

        let apex = rows[0].to_record().unwrap();
        assert_eq!(apex.vendor_id, 99);
        assert_eq!(apex.total_spend_ytd, 150_000_000.0);
        assert_eq!(apex.renewal_date, NaiveDate::from_ymd_opt(2027, 1, 1));
        assert_eq!(apex.contract_filenames, vec!["Apex_Logistics_MSA.pdf"]);

        let cloud = rows[1].to_record().unwrap();
        assert_eq!(cloud.status, VendorStatus::Inactive);
        assert_eq!(cloud.renewal_date, None);
        assert_eq!(cloud.contract_filenames.len(), 2);

        let orion = rows[2].to_record().unwrap();
        assert_eq!(orion.total_spend_ytd, 0.0);
        assert_eq!(orion.status, VendorStatus::Active);
    }

    #[test]
    fn category_column_is_optional() {
        let text = "vendor_id,vendor_name,total_spend_ytd,contract_filename,renewal_date,status\n1,A,10,,,Active\n";
        let rows = parse_vendor_rows(text).unwrap();
        assert_eq!(rows[0].to_record().unwrap().vendor_id, 1);
    }

    #[test]
    fn invalid_rows_are_reported_per_row() {
        let row = RawVendorRow {
            vendor_id: Some("V-12".into()),
            vendor_name: Some("Bad Id".into()),
            ..Default::default()
        };
        let err = row.to_record().unwrap_err();
        assert!(err.to_string().contains("vendor_id 'V-12'"));

        let row = RawVendorRow {
            vendor_id: Some("12".into()),
            vendor_name: Some("Bad Date".into()),
            renewal_date: Some("01/02/2027".into()),
            ..Default::default()
        };
        assert!(row.to_record().is_err());
    }

    #[test]
    fn status_with_separator_is_rejected() {
        let row = RawVendorRow {
            vendor_id: Some("12".into()),
            vendor_name: Some("Semi".into()),
            status: Some("Active; Type: Other".into()),
            ..Default::default()
        };
        let err = row.to_record().unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord(_)));

        let row = RawVendorRow {
            vendor_id: Some("-5".into()),
            vendor_name: Some("Negative".into()),
            status: Some("On Hold".into()),
            ..Default::default()
        };
        let record = row.to_record().unwrap();
        assert_eq!(record.vendor_id, -5);
        assert_eq!(record.status, VendorStatus::Other("On Hold".into()));
    }

    #[test]
    fn distinct_names_keep_source_order() {
        let rows: Vec<RawVendorRow> = ["B", "A", "B", "", "C"]
            .iter()
            .map(|n| RawVendorRow {
                vendor_name: Some(n.to_string()),
                ..Default::default()
            })
            .collect();
        assert_eq!(distinct_vendor_names(&rows), vec!["B", "A", "C"]);
    }

    #[test]
    fn filenames_split_and_join() {
        let names = split_filenames("a.pdf; b.pdf;;");
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert_eq!(join_filenames(&names), "a.pdf;b.pdf");
    }

    #[test]
    fn writes_header_and_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let rows = vec![ExtractedRow {
            vendor_id: 99,
            vendor_name: "Apex Logistics".into(),
            total_spend_ytd: 350,
            contract_filename: "a.pdf;b.pdf".into(),
            renewal_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            status: VendorStatus::Active,
            category: Category::LowValue,
        }];
        write_extracted_rows(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(OUTPUT_HEADER.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("99,Apex Logistics,350,a.pdf;b.pdf,2027-01-01,Active,Low-Value")
        );
    }

    #[test]
    fn empty_output_still_has_header() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        write_extracted_rows(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), OUTPUT_HEADER.join(","));
    }
}
