//! Raw and compiled regeneration queues.
//!
//! Writers append entity colors to the raw queue (`input/queue.json`). Before
//! a queued run the raw queue is compiled into `defines/queue.json`: every
//! named entity plus everything connected to it through subject and overlord
//! edges, as filename color keys.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use realmmap_shared::{MapMode, QueueDocument, color_key, parse_color_key};
use tracing::{info, warn};

use crate::config::DataPaths;
use crate::error::Result;
use crate::store::{EntityTable, WorldData, write_json_atomic};

/// File-backed queue access. Clones share one lock so request handlers and
/// the regeneration worker never interleave read-modify-write cycles.
#[derive(Debug, Clone)]
pub struct QueueStore {
    raw_path: PathBuf,
    compiled_path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl QueueStore {
    pub fn new(paths: &DataPaths) -> Self {
        Self {
            raw_path: paths.raw_queue(),
            compiled_path: paths.compiled_queue(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn raw(&self) -> Result<QueueDocument> {
        let _guard = self.guard();
        read_document(&self.raw_path)
    }

    /// Append `entry` under `mode` unless already queued. Returns whether the
    /// queue changed.
    pub fn enqueue(&self, mode: MapMode, entry: &str) -> Result<bool> {
        let _guard = self.guard();
        let mut queue = read_document(&self.raw_path)?;
        let entries = queue.entry(mode.as_str().to_string()).or_default();
        if entries.iter().any(|existing| existing == entry) {
            return Ok(false);
        }
        entries.push(entry.to_string());
        write_document(&self.raw_path, &queue)?;
        Ok(true)
    }

    /// Remove only `consumed` entries, keeping anything enqueued since they
    /// were read.
    pub fn drain(&self, mode: MapMode, consumed: &[String]) -> Result<usize> {
        let _guard = self.guard();
        let mut queue = read_document(&self.raw_path)?;
        let Some(entries) = queue.get_mut(mode.as_str()) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|entry| !consumed.contains(entry));
        let removed = before - entries.len();
        if entries.is_empty() {
            queue.remove(mode.as_str());
        }
        if removed > 0 {
            write_document(&self.raw_path, &queue)?;
        }
        Ok(removed)
    }

    /// Compile the raw queue against `world`, persist the result, and return
    /// it together with the raw snapshot that was compiled.
    pub fn compile(&self, world: &WorldData) -> Result<(QueueDocument, QueueDocument)> {
        let _guard = self.guard();
        let raw = read_document(&self.raw_path)?;
        let compiled = compile_queue(&raw, world);
        write_document(&self.compiled_path, &compiled)?;
        info!(
            modes = compiled.len(),
            keys = compiled.values().map(Vec::len).sum::<usize>(),
            "compiled regeneration queue"
        );
        Ok((compiled, raw))
    }

    /// Compiled color keys for `mode`; empty when nothing is compiled.
    pub fn load_queue(&self, mode: MapMode) -> Result<Vec<String>> {
        let _guard = self.guard();
        let mut compiled = read_document(&self.compiled_path)?;
        Ok(compiled.remove(mode.as_str()).unwrap_or_default())
    }
}

/// Expand every raw entry to its subject/overlord closure, per mode.
pub fn compile_queue(raw: &QueueDocument, world: &WorldData) -> QueueDocument {
    let mut compiled = QueueDocument::new();
    for (raw_mode, entries) in raw {
        let mode = match raw_mode.parse::<MapMode>() {
            Ok(mode) => mode,
            Err(e) => {
                warn!(error = %e, "skipping queue entries for unknown mode");
                continue;
            }
        };
        let Some(table) = world.table(mode) else {
            warn!(%mode, "skipping queue entries: no definitions for mode");
            continue;
        };

        let mut seeds = Vec::new();
        for entry in entries {
            match parse_color_key(entry).and_then(|rgb| table.id_of_color(rgb)) {
                Some(id) => seeds.push(id),
                None => warn!(%mode, entry = %entry, "no entity found for queued color"),
            }
        }

        let keys: BTreeSet<String> = expand_related(table, &seeds)
            .iter()
            .filter_map(|id| table.color_of(id))
            .map(color_key)
            .collect();
        compiled
            .entry(mode.as_str().to_string())
            .or_default()
            .extend(keys);
    }
    compiled
}

/// Every entity reachable from `seeds` by following subject edges down and
/// overlord edges up. Each id is expanded at most once.
pub fn expand_related(table: &EntityTable, seeds: &[&str]) -> BTreeSet<String> {
    let mut expanded = BTreeSet::new();
    let mut stack: Vec<&str> = seeds.to_vec();
    while let Some(id) = stack.pop() {
        if !table.contains(id) || !expanded.insert(id.to_string()) {
            continue;
        }
        stack.extend(table.subjects_of(id).iter().map(String::as_str));
        if let Some(overlord) = table.overlord_of(id) {
            stack.push(overlord);
        }
    }
    expanded
}

fn read_document(path: &Path) -> Result<QueueDocument> {
    if !path.exists() {
        return Ok(QueueDocument::new());
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(QueueDocument::new());
    }
    Ok(serde_json::from_str(&text)?)
}

fn write_document(path: &Path, queue: &QueueDocument) -> Result<()> {
    write_json_atomic(path, queue)
}
