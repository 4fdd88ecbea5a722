//! Watched, diff-aware store of hook definitions.
//!
//! Definitions live as JSON files under a root directory. A background task
//! rescans on a fixed interval and notifies listeners with a batch of
//! *changed* definitions only: new records, records whose mtime moved, and
//! synthesized tombstones for identifiers that vanished. Listeners are never
//! handed the full set.
//!
//! The current snapshot and the version map are guarded by read/write locks;
//! request handlers read a coherent snapshot while the refresh task publishes
//! updates. Refresh cycles never overlap: a slow scan delays the next tick.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::hooks::definition::HookDefinition;

/// Listener invoked once per refresh cycle with the changed batch.
pub type ChangeListener = Box<dyn Fn(&[HookDefinition]) + Send + Sync>;

/// Directory-backed hook definition store.
pub struct HookStore {
    root: PathBuf,
    refresh_interval: Duration,
    snapshot: RwLock<HashMap<String, HookDefinition>>,
    versions: RwLock<HashMap<String, SystemTime>>,
    listeners: RwLock<Vec<ChangeListener>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HookStore {
    pub fn new(root: impl Into<PathBuf>, refresh_interval: Duration) -> Arc<HookStore> {
        Arc::new(HookStore {
            root: root.into(),
            refresh_interval,
            snapshot: RwLock::new(HashMap::new()),
            versions: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Register a change listener. Registration order is notification order.
    pub fn subscribe(&self, listener: impl Fn(&[HookDefinition]) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    /// Current definitions, excluding anything that failed validation.
    pub fn definitions(&self) -> Vec<HookDefinition> {
        self.snapshot.read().values().cloned().collect()
    }

    /// Look up one definition by id in the current snapshot.
    pub fn get(&self, id: &str) -> Option<HookDefinition> {
        self.snapshot.read().get(id).cloned()
    }

    /// Run the initial scan and spawn the periodic refresh task.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        self.refresh_now();

        let store = Arc::clone(self);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial scan already ran.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        info!(target: "config", "refreshing hook definitions");
                        // The scan is blocking fs work; keep it off the
                        // async workers.
                        let scanner = Arc::clone(&store);
                        if tokio::task::spawn_blocking(move || scanner.refresh_now())
                            .await
                            .is_err()
                        {
                            error!(target: "config", "hook definition refresh panicked");
                        }
                    }
                }
            }
        });
        *task = Some(handle);
    }

    /// Stop the periodic schedule. An in-flight cycle runs to completion.
    /// Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
        let _ = self.task.lock().take();
    }

    /// One refresh cycle: scan, diff, notify, then advance the version map.
    ///
    /// A scan-level I/O error aborts the cycle without notification; the next
    /// tick retries.
    pub fn refresh_now(&self) {
        let defs = match collect_definitions(&self.root) {
            Ok(defs) => defs,
            Err(err) => {
                error!(target: "config", root = %self.root.display(), error = %err,
                    "hook definition scan failed; keeping previous snapshot");
                return;
            }
        };

        let changed = self.diff(defs);

        {
            let mut snapshot = self.snapshot.write();
            for def in &changed {
                if def.deleted {
                    snapshot.remove(&def.id);
                } else {
                    snapshot.insert(def.id.clone(), def.clone());
                }
            }
        }

        for listener in self.listeners.read().iter() {
            listener(&changed);
        }

        let mut versions = self.versions.write();
        for def in &changed {
            if def.deleted {
                versions.remove(&def.id);
            } else if let Some(modified) = def.last_modified {
                versions.insert(def.id.clone(), modified);
            }
        }
        debug!(target: "config", changed = changed.len(), "hook store refresh cycle complete");
    }

    /// Changed batch for this scan: unseen ids, moved versions, tombstones.
    fn diff(&self, defs: Vec<HookDefinition>) -> Vec<HookDefinition> {
        let versions = self.versions.read();
        let mut changed = Vec::new();
        let mut seen = HashSet::new();

        for def in defs {
            seen.insert(def.id.clone());
            match versions.get(&def.id) {
                None => changed.push(def),
                Some(prev) => {
                    if def.last_modified != Some(*prev) {
                        changed.push(def);
                    }
                }
            }
        }

        for id in versions.keys() {
            if !seen.contains(id) {
                changed.push(HookDefinition::tombstone(id.clone()));
            }
        }

        changed
    }
}

impl Drop for HookStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Walk the definition tree. A per-file decode or validation failure is
/// logged and skipped; a directory read failure aborts the whole scan.
fn collect_definitions(root: &Path) -> io::Result<Vec<HookDefinition>> {
    let mut out = Vec::new();
    walk(root, &mut out)?;
    Ok(out)
}

fn walk(dir: &Path, out: &mut Vec<HookDefinition>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            walk(&path, out)?;
            continue;
        }

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) => {
                error!(target: "config", path = %path.display(), error = %err,
                    "can't read hook definition file");
                continue;
            }
        };

        let mut def: HookDefinition = match serde_json::from_slice(&data) {
            Ok(def) => def,
            Err(err) => {
                error!(target: "config", path = %path.display(), error = %err,
                    "can't decode hook definition file");
                continue;
            }
        };
        def.last_modified = meta.modified().ok();

        if let Err(err) = def.validate() {
            error!(target: "config", path = %path.display(), error = %err,
                "invalid hook definition file");
            continue;
        }

        out.push(def);
    }
    Ok(())
}
