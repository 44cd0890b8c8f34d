//! Content-hash metadata cache.
//!
//! Parsing a document header and asking the renderer for a title is the
//! expensive part of a scan. This cache lets a scan skip both when a source
//! file's bytes are unchanged since the previous run.
//!
//! # Validity
//!
//! An entry is reused iff its stored BLAKE3 hash equals the hash of the
//! file's current bytes. Modification times play no part here, so the cache
//! survives `git checkout` and `touch`.
//!
//! # Storage
//!
//! A pretty-printed JSON sidecar keyed by content-relative path. Only
//! metadata is stored, never document bodies. A missing, unreadable or
//! corrupt sidecar is treated as an empty cache.
//!
//! The sidecar also carries a [`SiteStamp`]: the fingerprint of the config
//! the current outputs were rendered with, and whether the last derived
//! page pass ran to completion.

use super::document::DocumentMeta;
use crate::log;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, io, path::Path};

/// Bump to invalidate every existing sidecar when the format changes.
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub meta: DocumentMeta,
}

/// State of the output tree as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStamp {
    /// Hash of every config value that shows up in rendered pages.
    pub fingerprint: String,
    /// False from the start of a derived page pass until it has written
    /// every page.
    pub derived_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataCache {
    version: u32,
    #[serde(default)]
    site: Option<SiteStamp>,
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            site: None,
            entries: BTreeMap::new(),
        }
    }
}

impl MetadataCache {
    /// Load the sidecar at `path`, or an empty cache if that fails.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                log!("cache"; "cannot read {}: {err}, starting empty", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(cache) if cache.version == CACHE_VERSION => cache,
            Ok(_) => {
                log!("cache"; "format changed, starting empty");
                Self::default()
            }
            Err(err) => {
                log!("cache"; "corrupt cache {}: {err}, starting empty", path.display());
                Self::default()
            }
        }
    }

    /// Write the sidecar, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Cached metadata for `path`, only if `hash` still matches.
    pub fn get(&self, path: &str, hash: &str) -> Option<&DocumentMeta> {
        self.entries
            .get(path)
            .filter(|entry| entry.hash == hash)
            .map(|entry| &entry.meta)
    }

    /// Metadata stored for `path` by an earlier scan, whatever its hash.
    pub fn previous(&self, path: &str) -> Option<&DocumentMeta> {
        self.entries.get(path).map(|entry| &entry.meta)
    }

    /// Insert or replace, returning the metadata previously stored for the path.
    pub fn insert(&mut self, hash: String, meta: DocumentMeta) -> Option<DocumentMeta> {
        self.entries
            .insert(meta.path.clone(), CacheEntry { hash, meta })
            .map(|entry| entry.meta)
    }

    pub fn remove(&mut self, path: &str) -> Option<DocumentMeta> {
        self.entries.remove(path).map(|entry| entry.meta)
    }

    /// Drop every entry whose path fails `keep`, returning the dropped metadata.
    pub fn purge(&mut self, keep: impl Fn(&str) -> bool) -> Vec<DocumentMeta> {
        let removed: Vec<String> = self
            .entries
            .keys()
            .filter(|path| !keep(path))
            .cloned()
            .collect();

        removed
            .iter()
            .filter_map(|path| self.entries.remove(path))
            .map(|entry| entry.meta)
            .collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn site(&self) -> Option<&SiteStamp> {
        self.site.as_ref()
    }

    pub fn set_site(&mut self, stamp: SiteStamp) {
        self.site = Some(stamp);
    }
}

/// BLAKE3 of `bytes` as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
