use super::loads::BackgroundLoads;
use super::multicast::Producer;
use super::scheduler::SurfaceSize;
use super::state::RenderState;
use crate::assets::{Environment, ModelSelection, ResourceLoader};
use crate::scene::GltfAsset;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;

/// What the UI needs to know about a freshly installed asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSummary {
    pub generation: u64,
    pub name: String,
    pub scene_count: usize,
    pub scene_index: usize,
    pub camera_count: usize,
    pub scene_cameras: Vec<usize>,
    pub animation_count: usize,
    pub animation_indices: Vec<usize>,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(AssetSummary),
    Failed {
        generation: u64,
        path: PathBuf,
        message: String,
    },
}

/// Turns model selections into installed assets.
///
/// Selections queue until the pipeline is pumped. Loads overlap freely on the
/// background runtime; only the one issued last is ever installed.
pub struct AssetLoadPipeline {
    loader: Arc<dyn ResourceLoader>,
    selections: Sender<ModelSelection>,
    pending: Receiver<ModelSelection>,
    loads: BackgroundLoads<GltfAsset>,
    latest_path: PathBuf,
    viewport: Option<SurfaceSize>,
}

impl AssetLoadPipeline {
    pub fn new(loader: Arc<dyn ResourceLoader>, runtime: Handle) -> Self {
        let (selections, pending) = mpsc::channel();
        Self {
            loader,
            selections,
            pending,
            loads: BackgroundLoads::new("asset", runtime),
            latest_path: PathBuf::new(),
            viewport: None,
        }
    }

    pub fn select(&self, selection: ModelSelection) {
        // The receiver lives as long as `self`.
        let _ = self.selections.send(selection);
    }

    pub fn in_flight(&self) -> usize {
        self.loads.in_flight()
    }

    pub fn observe_viewport(&mut self, size: SurfaceSize) {
        self.viewport = Some(size);
    }

    fn dispatch(&mut self, selection: ModelSelection) {
        let future = self.loader.load_gltf(&selection);
        let generation = self.loads.issue(future);
        log::info!(
            "loading {} (generation {})",
            selection.main_file.display(),
            generation
        );
        self.latest_path = selection.main_file;
    }

    fn install(&self, state: &mut RenderState, mut asset: GltfAsset, generation: u64) -> AssetSummary {
        let scene_index = asset.default_scene_index();
        if let Err(err) = asset.apply_transform_hierarchy(scene_index) {
            log::debug!("asset {} has no scene to place: {}", asset.name, err);
        }
        let animation_indices = asset.maximal_disjoint_animations();

        if let Some(aspect) = self.viewport.and_then(SurfaceSize::aspect) {
            state.user_camera.aspect_ratio = aspect;
        }
        state.user_camera.fit_view_to_scene(&asset, scene_index);
        state.scene_index = scene_index;
        state.camera_index = None;
        state.animation_indices = animation_indices.clone();
        state.animation_timer.start(Instant::now());

        let summary = AssetSummary {
            generation,
            name: asset.name.clone(),
            scene_count: asset.scenes.len(),
            scene_index,
            camera_count: asset.cameras.len(),
            scene_cameras: asset.scene_cameras(scene_index),
            animation_count: asset.animations.len(),
            animation_indices,
            variants: asset.variants.clone(),
        };
        state.asset = Some(asset);
        log::info!(
            "installed {} ({} scene(s), {} of {} animation(s) playing)",
            summary.name,
            summary.scene_count,
            summary.animation_indices.len(),
            summary.animation_count
        );
        summary
    }
}

impl Producer for AssetLoadPipeline {
    type Output = LoadOutcome;

    fn produce(&mut self, state: &mut RenderState) -> Option<LoadOutcome> {
        while let Ok(selection) = self.pending.try_recv() {
            self.dispatch(selection);
        }
        let completion = self.loads.poll_current()?;
        match completion.result {
            Ok(asset) => Some(LoadOutcome::Loaded(self.install(
                state,
                asset,
                completion.generation,
            ))),
            Err(err) => {
                log::warn!("{err}");
                Some(LoadOutcome::Failed {
                    generation: completion.generation,
                    path: self.latest_path.clone(),
                    message: err.to_string(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentOutcome {
    Loaded { name: String },
    Failed { path: PathBuf, message: String },
}

/// Environment loads with the same latest-wins policy as assets.
pub struct EnvironmentLoads {
    loader: Arc<dyn ResourceLoader>,
    selections: Sender<PathBuf>,
    pending: Receiver<PathBuf>,
    loads: BackgroundLoads<Environment>,
    latest_path: PathBuf,
}

impl EnvironmentLoads {
    pub fn new(loader: Arc<dyn ResourceLoader>, runtime: Handle) -> Self {
        let (selections, pending) = mpsc::channel();
        Self {
            loader,
            selections,
            pending,
            loads: BackgroundLoads::new("environment", runtime),
            latest_path: PathBuf::new(),
        }
    }

    pub fn select(&self, path: PathBuf) {
        let _ = self.selections.send(path);
    }

    pub fn in_flight(&self) -> usize {
        self.loads.in_flight()
    }
}

impl Producer for EnvironmentLoads {
    type Output = EnvironmentOutcome;

    fn produce(&mut self, state: &mut RenderState) -> Option<EnvironmentOutcome> {
        while let Ok(path) = self.pending.try_recv() {
            let generation = self.loads.issue(self.loader.load_environment(&path));
            log::info!(
                "loading environment {} (generation {})",
                path.display(),
                generation
            );
            self.latest_path = path;
        }
        let completion = self.loads.poll_current()?;
        match completion.result {
            Ok(environment) => {
                let name = environment.name.clone();
                log::info!(
                    "environment {} installed ({}x{})",
                    name,
                    environment.width,
                    environment.height
                );
                state.environment = Some(environment);
                Some(EnvironmentOutcome::Loaded { name })
            }
            Err(err) => {
                log::warn!("{err}");
                Some(EnvironmentOutcome::Failed {
                    path: self.latest_path.clone(),
                    message: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::assets::{Environment, LoadError, LoadFuture, ModelSelection, ResourceLoader};
    use crate::scene::fixtures::two_scene_asset;
    use crate::scene::GltfAsset;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Loader whose completions are released by the test, keyed by file name.
    #[derive(Default)]
    pub struct GatedLoader {
        gates: Mutex<HashMap<PathBuf, oneshot::Receiver<Result<GltfAsset, String>>>>,
        calls: AtomicUsize,
    }

    impl GatedLoader {
        pub fn gate(&self, path: &str) -> oneshot::Sender<Result<GltfAsset, String>> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), rx);
            tx
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ResourceLoader for GatedLoader {
        fn load_gltf(&self, selection: &ModelSelection) -> LoadFuture<GltfAsset> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let path = selection.main_file.clone();
            let gate = self.gates.lock().unwrap().remove(&path);
            Box::pin(async move {
                let abandoned = || LoadError::Abandoned {
                    path: path.display().to_string(),
                };
                match gate {
                    Some(gate) => match gate.await {
                        Ok(Ok(asset)) => Ok(asset),
                        Ok(Err(uri)) => Err(LoadError::MissingResource {
                            path: path.display().to_string(),
                            uri,
                        }),
                        Err(_) => Err(abandoned()),
                    },
                    None => Ok(two_scene_asset(&path.display().to_string())),
                }
            })
        }

        fn load_environment(&self, path: &Path) -> LoadFuture<Environment> {
            let name = path.display().to_string();
            Box::pin(async move {
                if name.contains("broken") {
                    return Err(LoadError::Abandoned { path: name });
                }
                Ok(Environment {
                    name,
                    width: 4,
                    height: 2,
                    mean_radiance: [0.5, 0.5, 0.5],
                })
            })
        }
    }
}
