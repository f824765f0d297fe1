//! `vsync check`: verify local paths and remote credentials before a run.

use std::path::Path;

use anyhow::Result;

use crate::auth::TokenProvider;
use crate::config::Config;
use crate::dataverse::DataverseClient;
use crate::documents;
use crate::store::EntityStore;
use crate::tabular;

/// One line of the health table.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckLine {
    pub name: &'static str,
    pub status: String,
    pub healthy: bool,
}

impl CheckLine {
    fn ok(name: &'static str, status: impl Into<String>) -> Self {
        Self {
            name,
            status: status.into(),
            healthy: true,
        }
    }

    fn failed(name: &'static str, status: impl Into<String>) -> Self {
        Self {
            name,
            status: status.into(),
            healthy: false,
        }
    }
}

/// Checks that need no network access.
pub fn check_local(config: &Config) -> Vec<CheckLine> {
    let paths = &config.paths;
    let mut lines = Vec::new();

    lines.push(match tabular::read_vendor_rows(&paths.source_csv) {
        Ok(rows) => CheckLine::ok("source csv", format!("OK ({} rows)", rows.len())),
        Err(e) => CheckLine::failed("source csv", e.to_string()),
    });

    lines.push(if paths.documents_dir.is_dir() {
        match documents::scan_documents(&paths.documents_dir, &config.documents) {
            Ok(docs) => CheckLine::ok("documents", format!("OK ({} files)", docs.len())),
            Err(e) => CheckLine::failed("documents", e.to_string()),
        }
    } else {
        CheckLine::failed("documents", "NOT FOUND (phase 2 will be skipped)")
    });

    let output_parent = paths
        .output_csv
        .parent()
        .filter(|p| !p.as_os_str().is_empty());
    lines.push(match output_parent {
        Some(parent) if !parent.exists() => CheckLine::ok("output", "OK (will be created)"),
        Some(parent) if is_read_only(parent) => {
            CheckLine::failed("output", format!("{} is read-only", parent.display()))
        }
        _ => CheckLine::ok("output", "OK"),
    });

    lines
}

fn is_read_only(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.permissions().readonly())
        .unwrap_or(false)
}

/// Acquire a token and run one query against the entity store.
pub async fn check_remote(config: &Config) -> Vec<CheckLine> {
    let mut lines = Vec::new();

    let token = match TokenProvider::new(&config.remote).acquire().await {
        Ok(token) => {
            lines.push(CheckLine::ok("auth", "OK"));
            token
        }
        Err(e) => {
            lines.push(CheckLine::failed("auth", e.to_string()));
            return lines;
        }
    };

    let outcome = match DataverseClient::new(&config.remote, &token) {
        Ok(client) => client.list_accounts().await,
        Err(e) => Err(e),
    };
    lines.push(match outcome {
        Ok(accounts) => CheckLine::ok("entity store", format!("OK ({} accounts)", accounts.len())),
        Err(e) => CheckLine::failed("entity store", e.to_string()),
    });

    lines
}

pub fn print_checks(lines: &[CheckLine]) {
    println!("{:<14} {:<8} STATUS", "CHECK", "HEALTHY");
    for line in lines {
        println!("{:<14} {:<8} {}", line.name, line.healthy, line.status);
    }
}

/// Run every check and print the table. Returns whether all passed.
pub async fn run_check(config: &Config) -> Result<bool> {
    let mut lines = check_local(config);
    lines.extend(check_remote(config).await);
    print_checks(&lines);
    Ok(lines.iter().all(|l| l.healthy))
}
