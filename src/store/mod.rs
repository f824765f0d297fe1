//! Entity store abstraction.
//!
//! The [`EntityStore`] trait defines every remote operation the
//! orchestrators need over the three entity kinds, so the same backfill,
//! cleanup, and extraction code runs against the Dataverse Web API
//! ([`crate::dataverse::DataverseClient`]) or the in-memory
//! [`memory::InMemoryEntityStore`] used for dry runs and tests.
//!
//! The remote store enforces no cascade of its own for invoices: callers
//! must delete every invoice referencing an account before the account.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`create_account`](EntityStore::create_account) | Create an account, returning its id |
//! | [`create_invoice`](EntityStore::create_invoice) | Create an invoice owned by an account |
//! | [`create_attachment`](EntityStore::create_attachment) | Upload a document onto an account |
//! | [`list_accounts`](EntityStore::list_accounts) | Every account with name and description |
//! | [`find_accounts_by_name`](EntityStore::find_accounts_by_name) | Accounts whose name equals a string |
//! | [`invoices_for_account`](EntityStore::invoices_for_account) | Invoices referencing an account |
//! | [`attachments_for_account`](EntityStore::attachments_for_account) | Documents attached to an account |
//! | [`delete_invoice`](EntityStore::delete_invoice) | Delete one invoice |
//! | [`delete_account`](EntityStore::delete_account) | Delete one account |

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Account, Attachment, Invoice};

/// Name given to invoices created by backfill.
pub const INVOICE_NAME: &str = "Consolidated Annual Spend";

/// Typed create / query / delete access to accounts, invoices, and attachments.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Create an account and return its id.
    async fn create_account(&self, name: &str, description: &str) -> Result<String>;

    /// Create an invoice for `amount` referencing `account_id`.
    async fn create_invoice(&self, account_id: &str, amount: f64) -> Result<String>;

    /// Attach a document to an account.
    async fn create_attachment(&self, account_id: &str, filename: &str, body: &[u8])
        -> Result<String>;

    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Accounts whose name is exactly `name`.
    async fn find_accounts_by_name(&self, name: &str) -> Result<Vec<Account>>;

    async fn invoices_for_account(&self, account_id: &str) -> Result<Vec<Invoice>>;

    async fn attachments_for_account(&self, account_id: &str) -> Result<Vec<Attachment>>;

    async fn delete_invoice(&self, invoice_id: &str) -> Result<()>;

    /// Delete an account. Fails if invoices still reference it.
    async fn delete_account(&self, account_id: &str) -> Result<()>;
}
