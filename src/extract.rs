//! Extraction: rebuild the tabular export and document directory from the
//! entity store.
//!
//! For every account, invoice amounts are summed into spend, document
//! attachments are downloaded, and the vendor metadata is decoded from the
//! description. Accounts without a vendor id (placeholders created for
//! orphan documents) are skipped. Rows are collected in memory and the CSV
//! is written once, after every account has been processed.
//!
//! Contract filenames are sorted before being joined, because the store
//! does not guarantee a stable attachment order.

use std::path::Path;

use tracing::warn;

use crate::codec;
use crate::config::{Config, DocumentsConfig, PathsConfig};
use crate::documents;
use crate::error::{ErrorPolicy, Result, RunAborted, RunResult};
use crate::models::{Account, Attachment, Category, ExtractedRow};
use crate::progress::{Job, ProgressEvent, ProgressReporter};
use crate::store::EntityStore;
use crate::tabular;

/// Counts reported at the end of an extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub accounts_scanned: u64,
    pub rows_extracted: u64,
    /// Accounts skipped because their description carries no vendor id.
    pub orphans_skipped: u64,
    pub documents_downloaded: u64,
    pub failures: u64,
}

impl ExtractReport {
    pub fn print_summary(&self, paths: &PathsConfig) {
        println!("extract");
        println!("  accounts scanned: {}", self.accounts_scanned);
        println!("  rows extracted: {}", self.rows_extracted);
        println!("  orphans skipped: {}", self.orphans_skipped);
        println!("  documents downloaded: {}", self.documents_downloaded);
        println!("  failures: {}", self.failures);
        println!("  structured data: {}", paths.output_csv.display());
        println!("  documents: {}", paths.output_documents_dir.display());
    }
}

/// Create the output directories. Run before any remote call so that an
/// unwritable location fails fast.
pub fn prepare_output(paths: &PathsConfig) -> Result<()> {
    documents::ensure_dir(&paths.output_documents_dir)?;
    if let Some(parent) = paths.output_csv.parent() {
        if !parent.as_os_str().is_empty() {
            documents::ensure_dir(parent)?;
        }
    }
    Ok(())
}

/// Collect one output row per account that carries a vendor id, saving
/// document attachments into `output_dir` along the way.
///
/// On abort the error carries the counts reached so far.
pub async fn extract_rows(
    store: &dyn EntityStore,
    docs: &DocumentsConfig,
    output_dir: &Path,
    reporter: &dyn ProgressReporter,
    policy: ErrorPolicy,
) -> std::result::Result<(Vec<ExtractedRow>, ExtractReport), RunAborted<ExtractReport>> {
    let mut report = ExtractReport::default();
    let mut rows = Vec::new();
    let outcome =
        collect_rows(store, docs, output_dir, reporter, policy, &mut rows, &mut report).await;
    match outcome {
        Ok(()) => Ok((rows, report)),
        Err(error) => Err(RunAborted::new(report, error)),
    }
}

async fn collect_rows(
    store: &dyn EntityStore,
    docs: &DocumentsConfig,
    output_dir: &Path,
    reporter: &dyn ProgressReporter,
    policy: ErrorPolicy,
    rows: &mut Vec<ExtractedRow>,
    report: &mut ExtractReport,
) -> Result<()> {
    let accounts = store.list_accounts().await?;
    let total = accounts.len() as u64;

    reporter.report(ProgressEvent::Phase {
        job: Job::Extract,
        name: "extracting accounts".to_string(),
        total,
    });

    for account in &accounts {
        report.accounts_scanned += 1;
        let outcome = extract_account(store, docs, output_dir, account, report).await;
        let label = account.name.clone();
        let message = outcome.as_ref().err().map(|e| e.to_string());

        match policy.absorb(outcome, &label)? {
            Some(Some(row)) => {
                report.rows_extracted += 1;
                reporter.report(ProgressEvent::Extracted {
                    job: Job::Extract,
                    label,
                    n: report.accounts_scanned,
                    total,
                });
                rows.push(row);
            }
            Some(None) => {
                report.orphans_skipped += 1;
                warn!(account = %account.name, id = %account.id, "no vendor_id in description, skipping");
                reporter.report(ProgressEvent::Skipped {
                    job: Job::Extract,
                    label,
                    reason: "no vendor_id in description".to_string(),
                });
            }
            None => {
                report.failures += 1;
                reporter.report(ProgressEvent::Failed {
                    job: Job::Extract,
                    label,
                    error: message.unwrap_or_default(),
                });
            }
        }
    }

    Ok(())
}

/// Build the row for one account, or `None` if it has no vendor id.
async fn extract_account(
    store: &dyn EntityStore,
    docs: &DocumentsConfig,
    output_dir: &Path,
    account: &Account,
    report: &mut ExtractReport,
) -> Result<Option<ExtractedRow>> {
    let spend: f64 = store
        .invoices_for_account(&account.id)
        .await?
        .iter()
        .map(|invoice| invoice.amount.unwrap_or(0.0))
        .sum();

    let mut filenames = Vec::new();
    for attachment in store.attachments_for_account(&account.id).await? {
        let Attachment { id, filename, body, .. } = attachment;
        let filename = if filename.trim().is_empty() {
            let fallback = format!("unknown.{}", docs.extension);
            warn!(attachment = %id, file = %fallback, "attachment has no filename");
            fallback
        } else {
            filename
        };
        if !docs.is_document(&filename) {
            continue;
        }
        let Some(body) = body else {
            warn!(file = %filename, "attachment has no document body");
            continue;
        };
        let safe_name = documents::sanitize_filename(&filename);
        if safe_name.is_empty() {
            continue;
        }
        documents::write_document(output_dir, &safe_name, &body)?;
        report.documents_downloaded += 1;
        filenames.push(safe_name);
    }
    filenames.sort();

    let meta = codec::decode(account.description.as_deref().unwrap_or_default());
    let Some(vendor_id) = meta.vendor_id else {
        return Ok(None);
    };

    Ok(Some(ExtractedRow {
        vendor_id,
        vendor_name: account.name.clone(),
        total_spend_ytd: spend.trunc() as i64,
        contract_filename: tabular::join_filenames(&filenames),
        renewal_date: meta.renewal_date_or_default(),
        status: meta.status_or_default(),
        category: Category::for_spend(spend),
    }))
}

/// Extract every account and write the output CSV in one batch.
///
/// Nothing is written to the CSV when the run aborts.
pub async fn run_extract(
    config: &Config,
    store: &dyn EntityStore,
    reporter: &dyn ProgressReporter,
    policy: ErrorPolicy,
) -> RunResult<ExtractReport> {
    let paths = &config.paths;
    prepare_output(paths).map_err(|e| RunAborted::new(ExtractReport::default(), e))?;

    let (rows, report) = extract_rows(
        store,
        &config.documents,
        &paths.output_documents_dir,
        reporter,
        policy,
    )
    .await?;

    tracing::info!(rows = rows.len(), path = %paths.output_csv.display(), "writing extraction output");
    match tabular::write_extracted_rows(&paths.output_csv, &rows) {
        Ok(()) => Ok(report),
        Err(e) => Err(RunAborted::new(report, e)),
    }
}
