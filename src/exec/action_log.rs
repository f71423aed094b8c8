// src/exec/action_log.rs

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::backend::{ActionLog, ActionLogEntry, BoxFuture};
use crate::fs::FileSystem;

/// Appends one JSON object per line to a log file.
#[derive(Debug, Clone)]
pub struct JsonlActionLog<F: FileSystem> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> JsonlActionLog<F> {
    pub fn new(fs: F, path: impl Into<PathBuf>) -> Self {
        Self { fs, path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl<F: FileSystem> ActionLog for JsonlActionLog<F> {
    fn record<'a>(&'a self, entry: ActionLogEntry) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut line = serde_json::to_vec(&entry).context("serializing action log entry")?;
            line.push(b'\n');
            self.fs.append(&self.path, &line)
        })
    }
}
