//! # Vendor Sync
//!
//! Moves vendor spend data between a local workspace and a remote OData
//! entity store (accounts, invoices, and document attachments).
//!
//! The local workspace holds a CSV of vendors (id, name, year-to-date spend,
//! contract filenames, renewal date, status) and a directory of contract
//! documents. Three jobs operate on it:
//!
//! - **backfill** seeds the store: one account and one invoice per row, then
//!   each document attached to the account its filename resolves to.
//! - **cleanup** cascade-deletes every account named in the CSV.
//! - **extract** rebuilds the CSV and document directory from the store,
//!   summing invoices into spend and classifying each vendor by tier.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  CSV + docs  │──▶│  backfill    │──▶│ EntityStore  │
//! │  (tabular,   │   │  cleanup     │   │ Dataverse /  │
//! │  documents)  │◀──│  extract     │◀──│ in-memory    │
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Vendor metadata without a dedicated column in the store travels inside
//! the account description, see [`codec`].
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy and error policy |
//! | [`models`] | Vendor records, categories, store entities |
//! | [`auth`] | OAuth2 client-credentials token exchange |
//! | [`store`] | `EntityStore` trait and in-memory implementation |
//! | [`dataverse`] | OData Web API client |
//! | [`resolver`] | Filename to vendor name normalization |
//! | [`codec`] | Description metadata encoding |
//! | [`tabular`] | CSV reading and writing |
//! | [`documents`] | Local document directory |
//! | [`progress`] | Per-item progress reporting |
//! | [`backfill`] | Seed the store |
//! | [`cleanup`] | Cascade delete |
//! | [`extract`] | Rebuild local data from the store |
//! | [`check`] | Configuration and connectivity health check |

pub mod auth;
pub mod backfill;
pub mod check;
pub mod cleanup;
pub mod codec;
pub mod config;
pub mod dataverse;
pub mod documents;
pub mod error;
pub mod extract;
pub mod models;
pub mod progress;
pub mod resolver;
pub mod store;
pub mod tabular;
