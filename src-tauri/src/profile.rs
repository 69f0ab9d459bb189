use crate::error::{HoHatchError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Profile used when `Profiles/` holds more than one directory
pub const KNOWN_PROFILE_NAME: &str = "Shadowverse Worlds Beyond";

pub const NO_UNIQUE_PROFILE: &str =
    "Could not find a unique profile directory in Special K/Profiles.";

/// Which texture folder of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    Dump,
    Inject,
}

impl FolderKind {
    /// Dump textures are nested under per-executable folders, inject is flat
    pub fn is_recursive(self) -> bool {
        matches!(self, FolderKind::Dump)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FolderKind::Dump => "dump",
            FolderKind::Inject => "inject",
        }
    }

    /// `<profile>/SK_Res/<kind>/textures`
    pub fn textures_dir(self, profile_dir: &Path) -> PathBuf {
        profile_dir.join("SK_Res").join(self.as_str()).join("textures")
    }
}

impl FromStr for FolderKind {
    type Err = HoHatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dump" => Ok(FolderKind::Dump),
            "inject" => Ok(FolderKind::Inject),
            other => Err(HoHatchError::Config(format!("Invalid folder type: {}", other))),
        }
    }
}

/// Find the active profile under `<special_k_dir>/Profiles`.
///
/// A single subdirectory wins outright. With several, only the known profile
/// name is accepted; anything else is ambiguous and yields `None`.
pub fn find_profile_dir(special_k_dir: &Path) -> Option<PathBuf> {
    let profiles = special_k_dir.join("Profiles");
    let entries = fs::read_dir(&profiles).ok()?;

    let dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();

    if dirs.len() == 1 {
        return dirs.into_iter().next();
    }

    let known = profiles.join(KNOWN_PROFILE_NAME);
    if dirs.iter().any(|d| d == &known) {
        return Some(known);
    }

    log::debug!(
        "No unique profile in {} ({} candidates)",
        profiles.display(),
        dirs.len()
    );
    None
}

/// Texture folder of the given kind, or an error when no profile resolves
pub fn textures_dir(special_k_dir: &Path, kind: FolderKind) -> Result<PathBuf> {
    find_profile_dir(special_k_dir)
        .map(|profile| kind.textures_dir(&profile))
        .ok_or_else(|| HoHatchError::FileSystem(NO_UNIQUE_PROFILE.to_string()))
}
