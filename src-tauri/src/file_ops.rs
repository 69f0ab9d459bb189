use crate::error::{HoHatchError, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Delete a single texture file
pub fn delete_dds_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(HoHatchError::FileSystem("File not found.".to_string()));
    }
    fs::remove_file(path)
        .map_err(|e| HoHatchError::FileSystem(format!("Failed to delete image: {}", e)))?;
    log::info!("Deleted {}", path.display());
    Ok(())
}

/// Result of one item in a batch
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemOutcome {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-item outcomes of a sequential batch. One failure never stops the rest.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn run<F>(paths: &[String], mut op: F) -> Self
    where
        F: FnMut(&str) -> Result<()>,
    {
        let outcomes = paths.iter().fold(Vec::with_capacity(paths.len()), |mut acc, path| {
            let error = op(path).err().map(|e| {
                log::warn!("{}: {}", path, e);
                e.to_string()
            });
            acc.push(ItemOutcome {
                path: path.clone(),
                error,
            });
            acc
        });
        Self { outcomes }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures().next().is_none()
    }

    /// `"<prefix>: <path>: <error>; ..."`, or `None` when nothing failed
    pub fn error_summary(&self, prefix: &str) -> Option<String> {
        let details: Vec<String> = self
            .failures()
            .map(|o| format!("{}: {}", o.path, o.error.as_deref().unwrap_or_default()))
            .collect();
        if details.is_empty() {
            None
        } else {
            Some(format!("{}: {}", prefix, details.join("; ")))
        }
    }
}

/// Delete every path, collecting failures
pub fn batch_delete(paths: &[String]) -> BatchReport {
    BatchReport::run(paths, |p| delete_dds_file(Path::new(p)))
}
