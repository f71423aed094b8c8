// src/exec/status_cache.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::backend::{BoxFuture, GameStatusCache, StatusCache};
use crate::fs::FileSystem;

/// Reads `<dir>/<account_id>.json` snapshots written by the scraper.
///
/// A missing file means "no data yet" and yields `Ok(None)`. A file that
/// exists but does not parse is an error; smart mode treats both the same way.
#[derive(Debug, Clone)]
pub struct JsonStatusCache<F: FileSystem> {
    fs: F,
    dir: PathBuf,
}

impl<F: FileSystem> JsonStatusCache<F> {
    pub fn new(fs: F, dir: impl Into<PathBuf>) -> Self {
        Self { fs, dir: dir.into() }
    }

    pub fn path_for(&self, account_id: &str) -> PathBuf {
        self.dir.join(format!("{account_id}.json"))
    }

    fn load(&self, path: &Path) -> Result<Option<GameStatusCache>> {
        if !self.fs.exists(path) {
            return Ok(None);
        }
        let raw = self.fs.read_to_string(path)?;
        let cache = serde_json::from_str(&raw)
            .with_context(|| format!("parsing status cache {:?}", path))?;
        Ok(Some(cache))
    }
}

impl<F: FileSystem> StatusCache for JsonStatusCache<F> {
    fn fetch<'a>(&'a self, account_id: &'a str) -> BoxFuture<'a, Result<Option<GameStatusCache>>> {
        Box::pin(async move { self.load(&self.path_for(account_id)) })
    }
}
