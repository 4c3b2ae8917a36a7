use std::sync::Arc;

use realmmap_shared::RegenReport;
use tokio::sync::RwLock;

use crate::config::DataPaths;
use crate::queue::QueueStore;
use crate::regen::RegenGate;
use crate::services::nation_compiler::NationLock;

#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<DataPaths>,
    /// Path segment that unlocks privileged routes. None rejects them all.
    pub secret: Option<String>,
    pub gate: RegenGate,
    pub queue: QueueStore,
    pub nations_lock: NationLock,
    pub last_report: Arc<RwLock<Option<RegenReport>>>,
}

impl AppState {
    pub fn new(paths: DataPaths, secret: Option<String>) -> Self {
        Self {
            queue: QueueStore::new(&paths),
            paths: Arc::new(paths),
            secret,
            gate: RegenGate::default(),
            nations_lock: NationLock::default(),
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Constant-shape comparison of a presented secret against the configured one.
    pub fn authorized(&self, presented: &str) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            return false;
        };
        let (a, b) = (secret.as_bytes(), presented.as_bytes());
        a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}
