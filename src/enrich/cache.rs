// src/enrich/cache.rs
//! Enrichment cache: id -> AnalysisResult, in memory, mirrored to one JSON file.
//!
//! Loaded once at startup; every `set` writes the whole map back (write-through).
//! No eviction. I/O problems are logged and never surface to callers: a bad or
//! missing file means an empty cache, a failed write leaves the in-memory map
//! authoritative for the rest of the process.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use metrics::counter;
use tokio::sync::Mutex as AsyncMutex;

use crate::enrich::types::AnalysisResult;

pub const DEFAULT_CACHE_PATH: &str = "cache/analysis.json";

#[derive(Default)]
struct Entries {
    map: HashMap<String, AnalysisResult>,
    /// Bumped on every insert; a file write covers everything up to the
    /// generation it snapshotted.
    generation: u64,
}

pub struct AnalysisCache {
    path: Option<PathBuf>,
    state: Arc<RwLock<Entries>>,
    // Last generation known to be on disk. Held for the whole write, so only
    // one flush touches the temp file at a time.
    flushed: AsyncMutex<u64>,
    writes: AtomicU64,
}

impl AnalysisCache {
    /// Load the persisted document at `path`. Never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = match read_document(&path) {
            Ok(Some(map)) => {
                tracing::info!(target: "cache", path = %path.display(), entries = map.len(), "analysis cache loaded");
                map
            }
            Ok(None) => {
                tracing::info!(target: "cache", path = %path.display(), "no analysis cache on disk; starting empty");
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(target: "cache", path = %path.display(), error = ?e, "analysis cache unreadable; starting empty");
                HashMap::new()
            }
        };
        Self::with_entries(Some(path), map)
    }

    /// In-memory only; `flush` is a no-op.
    pub fn ephemeral() -> Self {
        Self::with_entries(None, HashMap::new())
    }

    fn with_entries(path: Option<PathBuf>, map: HashMap<String, AnalysisResult>) -> Self {
        Self {
            path,
            state: Arc::new(RwLock::new(Entries { map, generation: 0 })),
            flushed: AsyncMutex::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<AnalysisResult> {
        let g = self.state.read().unwrap_or_else(|p| p.into_inner());
        g.map.get(id).cloned()
    }

    /// Insert (or replace) and write through to disk.
    ///
    /// The write runs on the blocking pool. Concurrent inserts coalesce: while
    /// one write is in progress the others queue, and the next write picks all
    /// of them up at once.
    pub async fn set(&self, id: &str, result: AnalysisResult) {
        let generation = {
            let mut g = self.state.write().unwrap_or_else(|p| p.into_inner());
            g.map.insert(id.to_string(), result);
            g.generation += 1;
            g.generation
        };
        if let Err(e) = self.flush_through(generation).await {
            counter!("cache_flush_errors_total").increment(1);
            tracing::warn!(target: "cache", error = ?e, id, "analysis cache flush failed; keeping in-memory copy");
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(|p| p.into_inner()).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the full map to disk via temp file + rename.
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let mut flushed = self.flushed.lock().await;
        *flushed = self.write_snapshot(path).await?;
        Ok(())
    }

    /// Make sure everything up to `generation` is on disk.
    async fn flush_through(&self, generation: u64) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let mut flushed = self.flushed.lock().await;
        if *flushed >= generation {
            return Ok(());
        }
        *flushed = self.write_snapshot(path).await?;
        Ok(())
    }

    async fn write_snapshot(&self, path: &Path) -> Result<u64> {
        let state = Arc::clone(&self.state);
        let path = path.to_path_buf();
        let generation = tokio::task::spawn_blocking(move || -> Result<u64> {
            let (snapshot, generation) = {
                let g = state.read().unwrap_or_else(|p| p.into_inner());
                (g.map.clone(), g.generation)
            };
            let json = serde_json::to_vec_pretty(&snapshot).context("serializing analysis cache")?;
            write_atomic(&path, &json).with_context(|| format!("writing {}", path.display()))?;
            Ok(generation)
        })
        .await
        .context("analysis cache flush task")??;

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(target: "cache", generation, writes, "analysis cache flushed");
        Ok(generation)
    }
}

fn read_document(path: &Path) -> Result<Option<HashMap<String, AnalysisResult>>> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    if s.trim().is_empty() {
        return Ok(Some(HashMap::new()));
    }
    let map = serde_json::from_str(&s).context("parsing analysis cache json")?;
    Ok(Some(map))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}
