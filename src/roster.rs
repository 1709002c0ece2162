//! Static roster of enrolled legislators and their committee assignments.
//!
//! Loaded once from the master roster JSON and immutable afterwards. The
//! matching engine uses it purely as a prior source; nothing in this core
//! ever writes it back.

use crate::error::{Result, RollcallError};
use crate::profile::EntityDescriptor;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// One roster record as stored in the master roster file, keyed by name.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterRecord {
    pub chamber: String,
    pub district: String,
    pub party: String,
    pub committees: BTreeSet<String>,
}

/// A loaded roster entry with its derived slug.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub slug: String,
    pub name: String,
    pub chamber: String,
    pub district: String,
    pub party: String,
    pub committees: BTreeSet<String>,
}

/// Read-only index over the legislator roster.
///
/// Provides slug-keyed lookup and an inverted committee -> members index.
#[derive(Debug, Clone)]
pub struct RosterIndex {
    entries: BTreeMap<String, RosterEntry>,
    committees: BTreeMap<String, Vec<String>>,
}

/// Convert a legislator name to a filesystem-safe slug.
///
/// Examples:
/// - `Christine Chandler` -> `christine_chandler`
/// - `William A. Hall II` -> `william_a_hall_ii`
/// - `Elizabeth "Liz" Stefanics` -> `elizabeth_liz_stefanics`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        match c {
            '"' | '\'' => {}
            c if c.is_ascii_alphanumeric() => {
                if pending_sep && !slug.is_empty() {
                    slug.push('_');
                }
                pending_sep = false;
                slug.push(c.to_ascii_lowercase());
            }
            _ => pending_sep = true,
        }
    }
    slug
}

impl RosterIndex {
    /// Load the roster from a JSON file mapping name -> record.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RollcallError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                RollcallError::Io(e)
            }
        })?;
        let records: BTreeMap<String, RosterRecord> = serde_json::from_str(&contents)?;
        Ok(Self::from_records(records))
    }

    /// Build an index from in-memory records (used by tests and loaders).
    pub fn from_records(records: BTreeMap<String, RosterRecord>) -> Self {
        let mut entries = BTreeMap::new();
        let mut committees: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, record) in records {
            let slug = slugify(&name);
            for code in &record.committees {
                committees.entry(code.clone()).or_default().push(slug.clone());
            }
            entries.insert(
                slug.clone(),
                RosterEntry {
                    slug,
                    name,
                    chamber: record.chamber,
                    district: record.district,
                    party: record.party,
                    committees: record.committees,
                },
            );
        }

        // Member lists sorted for deterministic iteration
        for members in committees.values_mut() {
            members.sort();
        }

        Self { entries, committees }
    }

    /// Ordered member slugs of a committee; empty for an unknown code.
    pub fn members_of(&self, committee_code: &str) -> &[String] {
        self.committees
            .get(committee_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Committee codes an entity belongs to.
    pub fn committees_of(&self, slug: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(slug).map(|e| &e.committees)
    }

    /// Whether any roster entry carries this committee code.
    pub fn has_committee(&self, committee_code: &str) -> bool {
        self.committees.contains_key(committee_code)
    }

    /// Whether the roster contains this entity.
    pub fn contains(&self, slug: &str) -> bool {
        self.entries.contains_key(slug)
    }

    /// All entries in slug order.
    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.values()
    }

    /// Number of enrolled entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entity descriptor for profile bootstrap.
    pub fn descriptor_for(&self, slug: &str) -> Option<EntityDescriptor> {
        self.entries.get(slug).map(|e| EntityDescriptor {
            slug: e.slug.clone(),
            name: e.name.clone(),
            chamber: e.chamber.clone(),
            district: e.district.clone(),
            party: e.party.clone(),
            committees: e.committees.clone(),
        })
    }

    /// Case-insensitive substring search over legislator names.
    pub fn search(&self, query: &str) -> Vec<&RosterEntry> {
        let needle = query.to_lowercase();
        self.entries
            .values()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a small roster for tests: two HJC members, one SFC member.
    pub fn sample_roster() -> RosterIndex {
        let mut records = BTreeMap::new();
        records.insert(
            "Christine Chandler".to_string(),
            RosterRecord {
                chamber: "House".to_string(),
                district: "43".to_string(),
                party: "Democrat".to_string(),
                committees: ["HJC".to_string(), "HTRC".to_string()].into(),
            },
        );
        records.insert(
            "Gail Chasey".to_string(),
            RosterRecord {
                chamber: "House".to_string(),
                district: "18".to_string(),
                party: "Democrat".to_string(),
                committees: ["HJC".to_string()].into(),
            },
        );
        records.insert(
            "George Munoz".to_string(),
            RosterRecord {
                chamber: "Senate".to_string(),
                district: "4".to_string(),
                party: "Democrat".to_string(),
                committees: ["SFC".to_string()].into(),
            },
        );
        RosterIndex::from_records(records)
    }
}
