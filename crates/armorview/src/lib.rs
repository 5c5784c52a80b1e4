//! Armor silhouette generation.
//!
//! Takes a ship's 3D armor model and flattens it into a 2D view along one of
//! three orthogonal axes, with every armor plate cut against everything that
//! sits in front of it, so a 2D point in the result still answers "which
//! plate is hit here". Views are expensive to build; [`ArmorViewer`] caches
//! them in memory and on disk and shares in-flight work between concurrent
//! requests.

pub mod error;
pub mod model;
pub mod pool;
pub mod view;

mod builder;
mod cache;
mod occlude;

pub mod core {
    pub use armorview_core::*;
}

use std::path::PathBuf;
use std::sync::Arc;

use armorview_core::Tolerances;

pub use builder::PieceFilter;
pub use error::{ArmorViewError, Result};
pub use model::{Metadata, Model, Piece, PieceId};
pub use view::{Outline, View, ViewPlane};

use crate::cache::ViewCache;
use crate::pool::WorkerPool;

pub struct ArmorViewer {
    cache: Arc<ViewCache>,
}

impl ArmorViewer {
    pub fn builder(
        armor_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> ArmorViewerBuilder {
        ArmorViewerBuilder::new(armor_dir, cache_dir)
    }

    /// The silhouette of `{armor_dir}/{model_name}.json` along `plane`.
    ///
    /// Concurrent calls for the same model and plane share one generation;
    /// repeated calls share one cached result.
    pub async fn armor_view(&self, model_name: &str, plane: ViewPlane) -> Result<Arc<View>> {
        self.cache.clone().view(model_name, plane).await
    }

    /// As [`armor_view`](Self::armor_view), with the view given by name
    /// (`front`, `top` or `side`).
    pub async fn armor_view_named(&self, model_name: &str, view: &str) -> Result<Arc<View>> {
        let plane = view
            .parse::<ViewPlane>()
            .map_err(|_| ArmorViewError::InvalidView(view.to_string()))?;
        self.armor_view(model_name, plane).await
    }

    pub fn available_views() -> [ViewPlane; 3] {
        ViewPlane::ALL
    }
}

pub struct ArmorViewerBuilder {
    armor_dir: PathBuf,
    cache_dir: PathBuf,
    workers: Option<usize>,
    tolerances: Tolerances,
    filter: PieceFilter,
}

impl ArmorViewerBuilder {
    pub fn new(armor_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            armor_dir: armor_dir.into(),
            cache_dir: cache_dir.into(),
            workers: None,
            tolerances: Tolerances::default(),
            filter: builder::keep_all_pieces(),
        }
    }

    /// Worker count of the occlusion pool. Defaults to the machine's
    /// available parallelism.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Excludes pieces from a view before occlusion, so they neither appear
    /// nor cast shadows.
    pub fn with_piece_filter(
        mut self,
        filter: impl Fn(PieceId) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn build(self) -> Result<ArmorViewer> {
        let workers = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(4)
        });
        let pool = Arc::new(WorkerPool::new(workers)?);
        Ok(ArmorViewer {
            cache: Arc::new(ViewCache::new(
                self.armor_dir,
                self.cache_dir,
                self.tolerances,
                pool,
                self.filter,
            )),
        })
    }
}
