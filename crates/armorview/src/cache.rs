//! The view cache.
//!
//! Entries hold *pending computations*, not just finished views: the first
//! caller for a `{model, view}` pair installs a shared in-flight future, and
//! every concurrent caller awaits that same future. Finished views persist
//! to disk keyed by the source hash; a hash mismatch throws the disk entry
//! away and regenerates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use armorview_core::Tolerances;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::builder::{build_view, PieceFilter};
use crate::error::{ArmorViewError, Result};
use crate::model::{Metadata, Model};
use crate::pool::WorkerPool;
use crate::view::{View, ViewPlane};

type SharedModel = Shared<BoxFuture<'static, Result<Arc<Model>>>>;
type SharedView = Shared<BoxFuture<'static, Result<Arc<View>>>>;

/// One designator slot: either the raw source model or a generated view.
enum Entry {
    Raw(SharedModel),
    View(SharedView),
}

/// Wire shape of `{cache_dir}/{model}.{view}.json`.
#[derive(Serialize, Deserialize)]
struct CachedView {
    metadata: Metadata,
    view: View,
}

pub(crate) struct ViewCache {
    armor_dir: PathBuf,
    cache_dir: PathBuf,
    tolerances: Tolerances,
    pool: Arc<WorkerPool>,
    filter: PieceFilter,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ViewCache {
    pub(crate) fn new(
        armor_dir: PathBuf,
        cache_dir: PathBuf,
        tolerances: Tolerances,
        pool: Arc<WorkerPool>,
        filter: PieceFilter,
    ) -> Self {
        Self {
            armor_dir,
            cache_dir,
            tolerances,
            pool,
            filter,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn view(self: Arc<Self>, model_name: &str, plane: ViewPlane) -> Result<Arc<View>> {
        let designator = format!("{model_name}.{plane}");
        let pending = {
            // Checking for an entry and installing the in-flight one happen
            // under one lock acquisition, with no await in between: that
            // atomicity is the whole deduplication guarantee.
            let mut entries = self.entries.lock().expect("cache lock poisoned");
            match entries.get(&designator) {
                Some(Entry::View(shared)) => shared.clone(),
                _ => {
                    let raw = self.raw(&mut entries, model_name);
                    let shared = generate(self.clone(), raw, designator.clone(), plane)
                        .boxed()
                        .shared();
                    entries.insert(designator.clone(), Entry::View(shared.clone()));
                    shared
                }
            }
        };
        match pending.clone().await {
            Ok(view) => Ok(view),
            Err(err) => {
                // Evict the failed generation so a later caller starts over.
                let mut entries = self.entries.lock().expect("cache lock poisoned");
                if matches!(entries.get(&designator), Some(Entry::View(current)) if current.ptr_eq(&pending))
                {
                    entries.remove(&designator);
                }
                Err(err)
            }
        }
    }

    fn raw(&self, entries: &mut HashMap<String, Entry>, model_name: &str) -> SharedModel {
        let key = format!("{model_name}.raw");
        if let Some(Entry::Raw(shared)) = entries.get(&key) {
            return shared.clone();
        }
        let path = self.armor_dir.join(format!("{model_name}.json"));
        let shared = async move { read_model(&path).map(Arc::new) }.boxed().shared();
        entries.insert(key, Entry::Raw(shared.clone()));
        shared
    }
}

async fn generate(
    cache: Arc<ViewCache>,
    raw: SharedModel,
    designator: String,
    plane: ViewPlane,
) -> Result<Arc<View>> {
    let model = raw.await?;

    let path = cache.cache_dir.join(format!("{designator}.json"));
    match read_cached(&path) {
        Ok(cached) if cached.metadata.hash.eq_ignore_ascii_case(&model.metadata.hash) => {
            tracing::debug!(%designator, "serving the view from the disk cache");
            return Ok(Arc::new(cached.view));
        }
        Ok(_) => tracing::debug!(%designator, "disk cache is stale; regenerating"),
        Err(reason) => {
            let reason = format!("{reason:#}");
            tracing::debug!(%designator, %reason, "no usable disk cache; generating");
        }
    }

    let view = build_view(&model, plane, cache.tolerances, &cache.pool, &cache.filter)
        .instrument(tracing::info_span!("generate armor view", %designator))
        .await?;

    let entry = CachedView {
        metadata: model.metadata.clone(),
        view,
    };
    if let Err(err) = write_cached(&cache.cache_dir, &path, &entry) {
        // The in-memory result stays valid; the next run just regenerates.
        let error = format!("{err:#}");
        tracing::warn!(%designator, %error, "failed to persist the view");
    }
    Ok(Arc::new(entry.view))
}

fn read_model(path: &Path) -> Result<Model> {
    let bytes = std::fs::read(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ArmorViewError::SourceMissing {
                path: path.to_owned(),
            }
        } else {
            ArmorViewError::Io {
                path: path.to_owned(),
                message: err.to_string(),
            }
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|err| ArmorViewError::SourceMalformed {
        path: path.to_owned(),
        message: err.to_string(),
    })
}

fn read_cached(path: &Path) -> anyhow::Result<CachedView> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

fn write_cached(cache_dir: &Path, path: &Path, entry: &CachedView) -> anyhow::Result<()> {
    std::fs::create_dir_all(cache_dir)
        .with_context(|| format!("creating {}", cache_dir.display()))?;
    let payload = serde_json::to_vec(entry).context("encoding view")?;
    // Whole-file rewrite through a sibling temp file, swapped in atomically.
    let staged = path.with_extension("json.tmp");
    std::fs::write(&staged, payload).with_context(|| format!("writing {}", staged.display()))?;
    std::fs::rename(&staged, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests;
