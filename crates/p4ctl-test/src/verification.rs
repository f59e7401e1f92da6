//! Verification helpers for device state
//!
//! Entries are compared through [`Catalog::describe`], so expectations read
//! the way the controller logs them.

use p4ctl_catalog::{Catalog, CatalogError, MatchValue, TableEntry};
use p4ctl_runtime::MemoryDevice;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("expected entry not installed on {device}: {entry}")]
    EntryNotFound { device: String, entry: String },

    #[error("expected {expected} entries in {table} on {device}, found {actual}")]
    EntryCountMismatch {
        device: String,
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("write order on {device} differs at position {position}: expected '{expected}', got '{actual}'")]
    WriteOrderMismatch {
        device: String,
        position: usize,
        expected: String,
        actual: String,
    },
}

pub type VerifyResult<T> = Result<T, VerificationError>;

/// Reads one in-memory device through a catalog.
pub struct DeviceVerifier<'a> {
    catalog: &'a Catalog,
    name: String,
    device: MemoryDevice,
}

impl<'a> DeviceVerifier<'a> {
    pub fn new(catalog: &'a Catalog, name: impl Into<String>, device: MemoryDevice) -> Self {
        Self {
            catalog,
            name: name.into(),
            device,
        }
    }

    /// Installed entries, rendered by name.
    pub fn described_entries(&self) -> Vec<String> {
        self.device
            .entries()
            .iter()
            .map(|e| self.catalog.describe(e))
            .collect()
    }

    /// Accepted writes in wire order, rendered by name.
    pub fn described_writes(&self) -> Vec<String> {
        self.device
            .write_log()
            .iter()
            .map(|e| self.catalog.describe(e))
            .collect()
    }

    pub fn assert_installed(&self, entry: &str) -> VerifyResult<()> {
        if self.described_entries().iter().any(|e| e == entry) {
            return Ok(());
        }
        Err(VerificationError::EntryNotFound {
            device: self.name.clone(),
            entry: entry.to_string(),
        })
    }

    pub fn assert_entry_count(&self, table: &str, expected: usize) -> VerifyResult<()> {
        let actual = self.entries_of(table)?.len();
        if actual != expected {
            return Err(VerificationError::EntryCountMismatch {
                device: self.name.clone(),
                table: table.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Checks that the writes seen by the device start with `expected`.
    pub fn assert_write_order(&self, expected: &[&str]) -> VerifyResult<()> {
        let writes = self.described_writes();
        for (position, want) in expected.iter().enumerate() {
            let got = writes.get(position).map(String::as_str).unwrap_or("<none>");
            if got != *want {
                return Err(VerificationError::WriteOrderMismatch {
                    device: self.name.clone(),
                    position,
                    expected: want.to_string(),
                    actual: got.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn entries_of(&self, table: &str) -> VerifyResult<Vec<TableEntry>> {
        let table_id = self.catalog.resolve_table(table)?;
        Ok(self.device.entries_of(table_id))
    }

    /// Entries of a table keyed by the bytes of one exact match field, in
    /// installation order.
    pub fn exact_keys(&self, table: &str, field: &str) -> VerifyResult<Vec<(Vec<u8>, TableEntry)>> {
        let (field_id, _, _) = self.catalog.resolve_match_field(table, field)?;
        Ok(self
            .entries_of(table)?
            .into_iter()
            .filter_map(|entry| match entry.field(field_id) {
                Some(MatchValue::Exact { value }) => Some((value.clone(), entry.clone())),
                _ => None,
            })
            .collect())
    }
}
