//! Vendor identity resolution.
//!
//! Contract documents carry no foreign key into the entity store, only a
//! filename such as `Apex_Logistics_MSA.pdf`. [`normalize`] turns that into
//! the display name `Apex Logistics`, and [`VendorIdentityMap`] maps display
//! names to the account ids created during the current run.
//!
//! Matching is exact on the normalized string. The first account registered
//! under a name keeps it for the rest of the run.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static MSA_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_MSA$").expect("valid regex"));
static CONTRACT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_Contract.*$").expect("valid regex"));

/// Derive a vendor display name from a document filename.
///
/// Strips the extension and `fixture_marker`, drops an `_MSA` suffix or a
/// `_Contract...` tail (case-insensitive), turns underscores into spaces,
/// and trims.
pub fn normalize(filename: &str, fixture_marker: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(pos) if pos > 0 => &filename[..pos],
        _ => filename,
    };
    let name = if fixture_marker.is_empty() {
        stem.to_string()
    } else {
        stem.replace(fixture_marker, "")
    };
    let name = MSA_SUFFIX.replace(&name, "");
    let name = CONTRACT_SUFFIX.replace(&name, "");
    name.replace('_', " ").trim().to_string()
}

/// Normalized vendor name → account id, scoped to one orchestrator run.
#[derive(Debug, Default)]
pub struct VendorIdentityMap {
    ids: HashMap<String, String>,
}

impl VendorIdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(String::as_str)
    }

    /// Record `name → id`. Returns `false` if the name was already taken,
    /// in which case the existing mapping is kept.
    pub fn register(&mut self, name: &str, id: &str) -> bool {
        if self.ids.contains_key(name) {
            return false;
        }
        self.ids.insert(name.to_string(), id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
