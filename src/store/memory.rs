//! In-memory [`EntityStore`] implementation for dry runs and tests.
//!
//! Mirrors the remote store's referential rules: deleting an account that
//! still has invoices fails, while its attachments are removed along with
//! it. Every mutation is appended to an operation log so callers can check
//! what a run did and in which order.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::models::{Account, Attachment, Invoice};

use super::EntityStore;

/// A mutation applied to the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    CreateAccount { id: String, name: String },
    CreateInvoice { id: String, account_id: String },
    CreateAttachment { id: String, account_id: String, filename: String },
    DeleteInvoice { id: String },
    DeleteAccount { id: String },
}

/// In-memory entity store.
pub struct InMemoryEntityStore {
    accounts: RwLock<Vec<Account>>,
    invoices: RwLock<Vec<Invoice>>,
    attachments: RwLock<Vec<Attachment>>,
    ops: RwLock<Vec<StoreOp>>,
    rejected_names: RwLock<HashSet<String>>,
    denied_reads: RwLock<HashSet<String>>,
    denied_deletes: RwLock<HashSet<String>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
            invoices: RwLock::new(Vec::new()),
            attachments: RwLock::new(Vec::new()),
            ops: RwLock::new(Vec::new()),
            rejected_names: RwLock::new(HashSet::new()),
            denied_reads: RwLock::new(HashSet::new()),
            denied_deletes: RwLock::new(HashSet::new()),
        }
    }

    /// Make every later `create_account` for `name` fail with HTTP 400,
    /// the way the remote store rejects an invalid payload.
    pub fn reject_account_name(&self, name: &str) {
        self.rejected_names.write().unwrap().insert(name.to_string());
    }

    /// Make later invoice and attachment queries for `account_id` fail with
    /// HTTP 403, as when the caller lacks read privileges on the record.
    pub fn deny_reads(&self, account_id: &str) {
        self.denied_reads.write().unwrap().insert(account_id.to_string());
    }

    /// Make a later `delete_account` for `account_id` fail with HTTP 403.
    pub fn deny_delete(&self, account_id: &str) {
        self.denied_deletes
            .write()
            .unwrap()
            .insert(account_id.to_string());
    }

    /// Insert an invoice directly, bypassing the backfill rules
    /// (e.g. several invoices, or one without an amount).
    pub fn seed_invoice(&self, account_id: &str, amount: Option<f64>) -> String {
        let id = Uuid::new_v4().to_string();
        self.invoices.write().unwrap().push(Invoice {
            id: id.clone(),
            account_id: account_id.to_string(),
            amount,
        });
        id
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.read().unwrap().clone()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.invoices.read().unwrap().clone()
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.attachments.read().unwrap().clone()
    }

    /// Every mutation so far, oldest first.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.read().unwrap().clone()
    }

    fn log(&self, op: StoreOp) {
        self.ops.write().unwrap().push(op);
    }

    fn account_exists(&self, account_id: &str) -> bool {
        self.accounts
            .read()
            .unwrap()
            .iter()
            .any(|a| a.id == account_id)
    }

    fn check_access(
        denied: &RwLock<HashSet<String>>,
        operation: &str,
        account_id: &str,
    ) -> Result<()> {
        if denied.read().unwrap().contains(account_id) {
            return Err(SyncError::remote(
                operation,
                403,
                format!("access to account {} denied", account_id),
            ));
        }
        Ok(())
    }

    fn require_account(&self, operation: &str, account_id: &str) -> Result<()> {
        if self.account_exists(account_id) {
            Ok(())
        } else {
            Err(SyncError::remote(
                operation,
                404,
                format!("account {} does not exist", account_id),
            ))
        }
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn create_account(&self, name: &str, description: &str) -> Result<String> {
        if self.rejected_names.read().unwrap().contains(name) {
            return Err(SyncError::remote(
                "create account",
                400,
                format!("account '{}' rejected", name),
            ));
        }
        let id = Uuid::new_v4().to_string();
        self.accounts.write().unwrap().push(Account {
            id: id.clone(),
            name: name.to_string(),
            description: Some(description.to_string()),
        });
        self.log(StoreOp::CreateAccount {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn create_invoice(&self, account_id: &str, amount: f64) -> Result<String> {
        self.require_account("create invoice", account_id)?;
        let id = self.seed_invoice(account_id, Some(amount));
        self.log(StoreOp::CreateInvoice {
            id: id.clone(),
            account_id: account_id.to_string(),
        });
        Ok(id)
    }

    async fn create_attachment(
        &self,
        account_id: &str,
        filename: &str,
        body: &[u8],
    ) -> Result<String> {
        self.require_account("create attachment", account_id)?;
        let id = Uuid::new_v4().to_string();
        self.attachments.write().unwrap().push(Attachment {
            id: id.clone(),
            account_id: account_id.to_string(),
            filename: filename.to_string(),
            body: Some(body.to_vec()),
        });
        self.log(StoreOp::CreateAttachment {
            id: id.clone(),
            account_id: account_id.to_string(),
            filename: filename.to_string(),
        });
        Ok(id)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts())
    }

    async fn find_accounts_by_name(&self, name: &str) -> Result<Vec<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .iter()
            .filter(|a| a.name == name)
            .cloned()
            .collect())
    }

    async fn invoices_for_account(&self, account_id: &str) -> Result<Vec<Invoice>> {
        Self::check_access(&self.denied_reads, "query invoices", account_id)?;
        Ok(self
            .invoices
            .read()
            .unwrap()
            .iter()
            .filter(|i| i.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn attachments_for_account(&self, account_id: &str) -> Result<Vec<Attachment>> {
        Self::check_access(&self.denied_reads, "query attachments", account_id)?;
        Ok(self
            .attachments
            .read()
            .unwrap()
            .iter()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn delete_invoice(&self, invoice_id: &str) -> Result<()> {
        let mut invoices = self.invoices.write().unwrap();
        let before = invoices.len();
        invoices.retain(|i| i.id != invoice_id);
        if invoices.len() == before {
            return Err(SyncError::remote(
                "delete invoice",
                404,
                format!("invoice {} does not exist", invoice_id),
            ));
        }
        drop(invoices);
        self.log(StoreOp::DeleteInvoice {
            id: invoice_id.to_string(),
        });
        Ok(())
    }

    async fn delete_account(&self, account_id: &str) -> Result<()> {
        self.require_account("delete account", account_id)?;
        Self::check_access(&self.denied_deletes, "delete account", account_id)?;
        let referencing = self
            .invoices
            .read()
            .unwrap()
            .iter()
            .filter(|i| i.account_id == account_id)
            .count();
        if referencing > 0 {
            return Err(SyncError::remote(
                "delete account",
                409,
                format!(
                    "account {} is still referenced by {} invoice(s)",
                    account_id, referencing
                ),
            ));
        }
        self.accounts
            .write()
            .unwrap()
            .retain(|a| a.id != account_id);
        self.attachments
            .write()
            .unwrap()
            .retain(|a| a.account_id != account_id);
        self.log(StoreOp::DeleteAccount {
            id: account_id.to_string(),
        });
        Ok(())
    }
}
