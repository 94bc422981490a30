use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::errors::CatalogError;
use crate::models::panel::{PanelRecord, PanelSpec};

/// One complete, immutable version of the panel catalog.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub version: u64,
    pub panels: HashMap<String, PanelSpec>,
}

impl CatalogSnapshot {
    pub fn len(&self) -> usize {
        self.panels.len()
    }
}

/// Hot-swappable panel catalog.
///
/// Readers load the current `Arc<CatalogSnapshot>` without locking; `swap`
/// publishes a whole new snapshot in one pointer store, so a reader sees
/// either the old catalog or the new one, never a mix.
#[derive(Debug)]
pub struct PanelCatalog {
    active: ArcSwap<CatalogSnapshot>,
    defaults: HashMap<String, PanelSpec>,
    next_version: AtomicU64,
}

impl PanelCatalog {
    pub fn new(panels: HashMap<String, PanelSpec>) -> Self {
        Self {
            active: ArcSwap::from_pointee(CatalogSnapshot { version: 1, panels }),
            defaults: default_panels(),
            next_version: AtomicU64::new(2),
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Active catalog first, then the built-in defaults.
    pub fn lookup(&self, id: &str) -> Result<PanelSpec, CatalogError> {
        if let Some(spec) = self.active.load().panels.get(id) {
            return Ok(spec.clone());
        }
        self.defaults
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Active catalog only; the defaults are not listed.
    pub fn get_loaded(&self, id: &str) -> Option<PanelSpec> {
        self.active.load().panels.get(id).cloned()
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.active.load_full()
    }

    /// Replaces the whole catalog. Returns the version number assigned to it.
    pub fn swap(&self, panels: HashMap<String, PanelSpec>) -> u64 {
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let count = panels.len();
        let previous = self.active.swap(Arc::new(CatalogSnapshot { version, panels }));
        info!(
            version,
            previous_version = previous.version,
            panels = count,
            "Panel catalog swapped"
        );
        version
    }

    /// Case-insensitive substring search over the loaded model ids.
    pub fn search(&self, query: &str, limit: usize) -> Vec<String> {
        let needle = query.to_lowercase();
        let snapshot = self.active.load();
        let mut hits: Vec<String> = snapshot
            .panels
            .keys()
            .filter(|id| id.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort();
        hits.truncate(limit);
        hits
    }
}

/// Built-in fallback specs, one per cell technology.
fn default_panels() -> HashMap<String, PanelSpec> {
    [
        ("Mono-Default-400", 400.0, -0.0035, 45.0),
        ("Poly-Default-340", 340.0, -0.0040, 45.0),
        ("Thin-Default-150", 150.0, -0.0025, 47.0),
    ]
    .into_iter()
    .filter_map(|(id, rated, coeff, noct)| PanelSpec::new(id, rated, coeff, noct).ok())
    .map(|spec| (spec.model_id().to_string(), spec))
    .collect()
}

/// Reads a catalog file of the form `{ "<model id>": { "model_no": ..., ... } }`.
///
/// Entries that fail validation are skipped; I/O and JSON errors fail the load.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<HashMap<String, PanelSpec>, CatalogError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let records: HashMap<String, PanelRecord> = serde_json::from_str(&content)?;

    let total = records.len();
    let mut panels = HashMap::with_capacity(total);
    for (id, mut record) in records {
        // The map key is the lookup id, so it is also the model id
        if !record.model_no.is_empty() && record.model_no != id {
            warn!(id = %id, model_no = %record.model_no, "Entry model_no differs from its key, using the key");
        }
        record.model_no = id.clone();
        match PanelSpec::try_from(record) {
            Ok(spec) => {
                panels.insert(id, spec);
            }
            Err(e) => warn!(id = %id, error = %e, "Skipping invalid panel entry"),
        }
    }

    info!(
        path = %path.display(),
        loaded = panels.len(),
        skipped = total - panels.len(),
        "Panel catalog file read"
    );
    Ok(panels)
}
