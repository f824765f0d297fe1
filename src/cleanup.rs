//! Cleanup: cascade-delete the accounts named in the tabular source.
//!
//! For each distinct vendor name, every account with exactly that name is
//! removed (repeated backfills leave several). The entity store refuses to
//! delete an account that invoices still reference, so each account's
//! invoices are deleted first. Attachments go with the account.
//!
//! Cleanup runs under [`ErrorPolicy::Strict`] by default: the first failed
//! query or delete stops the run.

use crate::error::{ErrorPolicy, Result, RunAborted, RunResult, SyncError};
use crate::models::Account;
use crate::progress::{Job, ProgressEvent, ProgressReporter};
use crate::store::EntityStore;

/// Counts reported at the end of a cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub vendors_scanned: u64,
    /// Vendor names with no matching account.
    pub vendors_not_found: u64,
    pub accounts_deleted: u64,
    pub invoices_deleted: u64,
    pub failures: u64,
}

impl CleanupReport {
    pub fn print_summary(&self) {
        println!("cleanup");
        println!("  vendors scanned: {}", self.vendors_scanned);
        println!("  vendors not found: {}", self.vendors_not_found);
        println!("  invoices deleted: {}", self.invoices_deleted);
        println!("  accounts deleted: {}", self.accounts_deleted);
        println!("  failures: {}", self.failures);
    }
}

/// Delete every account named in `vendor_names`, invoices first.
///
/// On abort the error carries the counts reached so far.
pub async fn run_cleanup(
    vendor_names: &[String],
    store: &dyn EntityStore,
    reporter: &dyn ProgressReporter,
    policy: ErrorPolicy,
) -> RunResult<CleanupReport> {
    let mut report = CleanupReport::default();
    let outcome = cleanup_names(vendor_names, store, reporter, policy, &mut report).await;
    match outcome {
        Ok(()) => Ok(report),
        Err(error) => Err(RunAborted::new(report, error)),
    }
}

async fn cleanup_names(
    vendor_names: &[String],
    store: &dyn EntityStore,
    reporter: &dyn ProgressReporter,
    policy: ErrorPolicy,
    report: &mut CleanupReport,
) -> Result<()> {
    reporter.report(ProgressEvent::Phase {
        job: Job::Cleanup,
        name: "deleting vendor accounts".to_string(),
        total: vendor_names.len() as u64,
    });

    for name in vendor_names {
        report.vendors_scanned += 1;

        let accounts = match store.find_accounts_by_name(name).await {
            Ok(accounts) => accounts,
            Err(e) => {
                record_failure(policy, reporter, report, name, e)?;
                continue;
            }
        };

        if accounts.is_empty() {
            report.vendors_not_found += 1;
            reporter.report(ProgressEvent::Skipped {
                job: Job::Cleanup,
                label: name.clone(),
                reason: "no accounts found".to_string(),
            });
            continue;
        }

        for account in &accounts {
            if let Err(e) = delete_cascade(store, reporter, report, account).await {
                let label = format!("{} ({})", account.name, account.id);
                record_failure(policy, reporter, report, &label, e)?;
            }
        }
    }

    Ok(())
}

/// Delete one account's invoices, then the account.
async fn delete_cascade(
    store: &dyn EntityStore,
    reporter: &dyn ProgressReporter,
    report: &mut CleanupReport,
    account: &Account,
) -> Result<()> {
    let invoices = store.invoices_for_account(&account.id).await?;
    for invoice in &invoices {
        store.delete_invoice(&invoice.id).await?;
        report.invoices_deleted += 1;
        reporter.report(ProgressEvent::Deleted {
            job: Job::Cleanup,
            kind: "invoice",
            label: invoice.id.clone(),
        });
    }

    store.delete_account(&account.id).await?;
    report.accounts_deleted += 1;
    reporter.report(ProgressEvent::Deleted {
        job: Job::Cleanup,
        kind: "account",
        label: format!("{} ({})", account.name, account.id),
    });
    Ok(())
}

fn record_failure(
    policy: ErrorPolicy,
    reporter: &dyn ProgressReporter,
    report: &mut CleanupReport,
    label: &str,
    e: SyncError,
) -> Result<()> {
    let message = e.to_string();
    policy.absorb::<()>(Err(e), label)?;
    report.failures += 1;
    reporter.report(ProgressEvent::Failed {
        job: Job::Cleanup,
        label: label.to_string(),
        error: message,
    });
    Ok(())
}
