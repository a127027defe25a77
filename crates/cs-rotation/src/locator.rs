//! Locate the newest key/chain pair in a certbot-style `live` tree.
//!
//! Each domain directory holds `privkey.pem` / `fullchain.pem` or numbered
//! variants (`privkey3.pem`, `fullchain3.pem`). The unnumbered file counts as
//! index 0.

use crate::types::{RotationError, RotationResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

const KEY_STEM: &str = "privkey";
const CHAIN_STEM: &str = "fullchain";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateFilePair {
    /// Name of the directory the files were found in
    pub domain: String,
    pub private_key_path: PathBuf,
    pub full_chain_path: PathBuf,
    /// Index of the private key file
    pub version_index: u64,
    /// Index of the chain file, differs from `version_index` only on fallback
    pub chain_index: u64,
}

impl CertificateFilePair {
    pub fn is_matched(&self) -> bool {
        self.version_index == self.chain_index
    }
}

/// Find the key/chain pair to deploy.
///
/// `preferred` names a directory under `root` that is used when it exists
/// and holds a key/chain pair. Otherwise the most recently modified
/// subdirectory wins, ties broken by name.
pub fn locate(root: &Path, preferred: &str) -> RotationResult<CertificateFilePair> {
    if !preferred.is_empty() {
        let dir = root.join(preferred);
        if dir.is_dir() {
            match pick_pair(&dir, preferred) {
                Ok(pair) => return Ok(pair),
                Err(e) => warn!(dir = %dir.display(), "Preferred certificate directory unusable, scanning: {}", e),
            }
        } else {
            debug!(dir = %dir.display(), "Preferred certificate directory missing, scanning");
        }
    }

    let dir_name = newest_subdirectory(root)?;
    pick_pair(&root.join(&dir_name), &dir_name)
}

fn newest_subdirectory(root: &Path) -> RotationResult<String> {
    let mut dirs: Vec<(String, SystemTime)> = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        dirs.push((name, modified));
    }

    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    dirs.sort_by(|a, b| b.1.cmp(&a.1));

    dirs.into_iter().next().map(|(name, _)| name).ok_or_else(|| {
        RotationError::CertificateNotFound(format!(
            "no certificate directories under {}",
            root.display()
        ))
    })
}

/// `<stem><digits>.pem` → index, empty digits → 0
fn file_index(file_name: &str, stem: &str) -> Option<u64> {
    let digits = file_name.strip_prefix(stem)?.strip_suffix(".pem")?;
    if digits.is_empty() {
        return Some(0);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn pick_pair(dir: &Path, domain: &str) -> RotationResult<CertificateFilePair> {
    let mut keys: BTreeMap<u64, PathBuf> = BTreeMap::new();
    let mut chains: BTreeMap<u64, PathBuf> = BTreeMap::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some(idx) = file_index(&name, KEY_STEM) {
            keys.insert(idx, entry.path());
        } else if let Some(idx) = file_index(&name, CHAIN_STEM) {
            chains.insert(idx, entry.path());
        }
    }

    let (Some(&max_key), Some(&max_chain)) = (keys.keys().next_back(), chains.keys().next_back())
    else {
        return Err(RotationError::CertificateNotFound(format!(
            "no privkey/fullchain files in {}",
            dir.display()
        )));
    };

    let common = keys.keys().rev().find(|idx| chains.contains_key(idx)).copied();
    let (key_idx, chain_idx) = match common {
        Some(idx) => (idx, idx),
        None => {
            // Legacy behaviour: deploy the newest of each even though they
            // may not belong together.
            warn!(
                dir = %dir.display(),
                key_index = max_key,
                chain_index = max_chain,
                "No matching privkey/fullchain index, using newest of each"
            );
            (max_key, max_chain)
        }
    };

    Ok(CertificateFilePair {
        domain: domain.to_string(),
        private_key_path: keys[&key_idx].clone(),
        full_chain_path: chains[&chain_idx].clone(),
        version_index: key_idx,
        chain_index: chain_idx,
    })
}
