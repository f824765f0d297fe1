//! Backfill: seed the entity store from the tabular source and documents.
//!
//! Phase 1 creates one account per tabular row, with the vendor metadata
//! encoded into its description and one invoice for the row's spend.
//! Phase 2 walks the document directory in filename order, resolves each
//! filename to a vendor name, and attaches the document to the account
//! created for that name. Documents whose vendor has no row get a new
//! placeholder account, which extraction will later skip.
//!
//! Backfill does not look at what the remote store already holds. Running
//! it twice creates every account, invoice, and attachment twice; run
//! `vsync cleanup` first to start from a clean slate.

use tracing::warn;

use crate::codec::{self, VendorMetadata, DISCOVERED_DESCRIPTION};
use crate::config::{Config, DocumentsConfig};
use crate::documents::{self, LocalDocument};
use crate::error::{ErrorPolicy, Result, RunAborted, RunResult, SyncError};
use crate::progress::{Job, ProgressEvent, ProgressReporter};
use crate::resolver::{self, VendorIdentityMap};
use crate::store::EntityStore;
use crate::tabular::{self, RawVendorRow};

/// Local inputs of a backfill run, loaded before any remote call.
#[derive(Debug, Clone)]
pub struct BackfillInput {
    pub rows: Vec<RawVendorRow>,
    /// `None` when the document directory does not exist.
    pub documents: Option<Vec<LocalDocument>>,
}

impl BackfillInput {
    /// Read the source CSV and list the document directory.
    ///
    /// A missing CSV is fatal. A missing document directory is logged and
    /// phase 2 is skipped.
    pub fn load(config: &Config) -> Result<Self> {
        let rows = tabular::read_vendor_rows(&config.paths.source_csv)?;
        let dir = &config.paths.documents_dir;
        let documents = if dir.is_dir() {
            Some(documents::scan_documents(dir, &config.documents)?)
        } else {
            warn!(dir = %dir.display(), "document directory not found, skipping document upload");
            None
        };
        Ok(Self { rows, documents })
    }
}

/// Counts reported at the end of a backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub accounts_created: u64,
    pub invoices_created: u64,
    pub attachments_uploaded: u64,
    /// Accounts created for documents with no tabular row.
    pub discovered_accounts: u64,
    pub skipped: u64,
    pub failures: u64,
    /// Distinct vendor names known at the end of the run.
    pub vendors: usize,
}

impl BackfillReport {
    pub fn print_summary(&self) {
        println!("backfill");
        println!("  accounts created: {}", self.accounts_created);
        println!("  invoices created: {}", self.invoices_created);
        println!("  attachments uploaded: {}", self.attachments_uploaded);
        println!("  accounts discovered from documents: {}", self.discovered_accounts);
        println!("  skipped: {}", self.skipped);
        println!("  failures: {}", self.failures);
        println!("  unique vendors: {}", self.vendors);
    }
}

/// One backfill run. Holds the run's vendor identity map.
pub struct Backfill<'a> {
    store: &'a dyn EntityStore,
    docs: &'a DocumentsConfig,
    reporter: &'a dyn ProgressReporter,
    policy: ErrorPolicy,
    identities: VendorIdentityMap,
    report: BackfillReport,
}

impl<'a> Backfill<'a> {
    pub fn new(
        store: &'a dyn EntityStore,
        docs: &'a DocumentsConfig,
        reporter: &'a dyn ProgressReporter,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            store,
            docs,
            reporter,
            policy,
            identities: VendorIdentityMap::new(),
            report: BackfillReport::default(),
        }
    }

    /// Phase 1: one account (and at most one invoice) per row, in source order.
    pub async fn seed_records(&mut self, rows: &[RawVendorRow]) -> Result<()> {
        self.reporter.report(ProgressEvent::Phase {
            job: Job::Backfill,
            name: "seeding accounts and invoices".to_string(),
            total: rows.len() as u64,
        });

        for (index, row) in rows.iter().enumerate() {
            let label = match row.name() {
                "" => format!("row {}", index + 1),
                name => name.to_string(),
            };
            if let Err(e) = self.seed_one(row).await {
                self.item_failed(&label, e)?;
            }
        }
        Ok(())
    }

    async fn seed_one(&mut self, row: &RawVendorRow) -> Result<()> {
        let record = row.to_record()?;
        let description = codec::encode(&VendorMetadata {
            vendor_id: Some(record.vendor_id),
            renewal_date: record.renewal_date,
            status: Some(record.status.clone()),
        });

        let account_id = self
            .store
            .create_account(&record.vendor_name, &description)
            .await?;
        self.report.accounts_created += 1;
        self.identities.register(&record.vendor_name, &account_id);
        self.reporter.report(ProgressEvent::Created {
            job: Job::Backfill,
            kind: "account",
            label: record.vendor_name.clone(),
        });

        if record.total_spend_ytd > 0.0 {
            self.store
                .create_invoice(&account_id, record.total_spend_ytd)
                .await?;
            self.report.invoices_created += 1;
            self.reporter.report(ProgressEvent::Created {
                job: Job::Backfill,
                kind: "invoice",
                label: format!("{} ({:.2})", record.vendor_name, record.total_spend_ytd),
            });
        }
        Ok(())
    }

    /// Phase 2: attach each document to its vendor's account.
    ///
    /// `documents` is expected in filename order, as returned by
    /// [`documents::scan_documents`].
    pub async fn attach_documents(&mut self, documents: &[LocalDocument]) -> Result<()> {
        self.reporter.report(ProgressEvent::Phase {
            job: Job::Backfill,
            name: "uploading documents".to_string(),
            total: documents.len() as u64,
        });

        for doc in documents {
            if let Err(e) = self.attach_one(doc).await {
                self.item_failed(&doc.filename, e)?;
            }
        }
        Ok(())
    }

    async fn attach_one(&mut self, doc: &LocalDocument) -> Result<()> {
        let name = resolver::normalize(&doc.filename, &self.docs.fixture_marker);
        if name.is_empty() {
            self.report.skipped += 1;
            self.reporter.report(ProgressEvent::Skipped {
                job: Job::Backfill,
                label: doc.filename.clone(),
                reason: "no vendor name in filename".to_string(),
            });
            return Ok(());
        }

        let body = doc.read()?;

        let account_id = match self.identities.resolve(&name) {
            Some(id) => id.to_string(),
            None => {
                let id = self
                    .store
                    .create_account(&name, DISCOVERED_DESCRIPTION)
                    .await?;
                self.identities.register(&name, &id);
                self.report.accounts_created += 1;
                self.report.discovered_accounts += 1;
                self.reporter.report(ProgressEvent::Created {
                    job: Job::Backfill,
                    kind: "account",
                    label: format!("{} (from {})", name, doc.filename),
                });
                id
            }
        };

        self.store
            .create_attachment(&account_id, &doc.filename, &body)
            .await?;
        self.report.attachments_uploaded += 1;
        self.reporter.report(ProgressEvent::Created {
            job: Job::Backfill,
            kind: "attachment",
            label: format!("{} -> {}", doc.filename, name),
        });
        Ok(())
    }

    fn item_failed(&mut self, label: &str, e: SyncError) -> Result<()> {
        let message = e.to_string();
        self.policy.absorb::<()>(Err(e), label)?;
        self.report.failures += 1;
        self.reporter.report(ProgressEvent::Failed {
            job: Job::Backfill,
            label: label.to_string(),
            error: message,
        });
        Ok(())
    }

    async fn run_phases(&mut self, config: &Config, input: &BackfillInput) -> Result<()> {
        self.seed_records(&input.rows).await?;
        match &input.documents {
            Some(documents) => self.attach_documents(documents).await?,
            None => self.reporter.report(ProgressEvent::Skipped {
                job: Job::Backfill,
                label: config.paths.documents_dir.display().to_string(),
                reason: "document directory not found".to_string(),
            }),
        }
        Ok(())
    }

    pub fn identities(&self) -> &VendorIdentityMap {
        &self.identities
    }

    pub fn finish(mut self) -> BackfillReport {
        self.report.vendors = self.identities.len();
        self.report
    }
}

/// Run both backfill phases.
///
/// On abort the error carries the counts reached so far.
pub async fn run_backfill(
    config: &Config,
    input: &BackfillInput,
    store: &dyn EntityStore,
    reporter: &dyn ProgressReporter,
    policy: ErrorPolicy,
) -> RunResult<BackfillReport> {
    let mut backfill = Backfill::new(store, &config.documents, reporter, policy);
    let outcome = backfill.run_phases(config, input).await;
    match outcome {
        Ok(()) => Ok(backfill.finish()),
        Err(error) => Err(RunAborted::new(backfill.finish(), error)),
    }
}
