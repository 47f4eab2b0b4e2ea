use super::multicast::Producer;
use super::scheduler::SurfaceSize;
use super::state::RenderState;
use crate::render::{describe_fixed_camera, CameraDescription};
use crate::scene::SelectionError;
use std::collections::VecDeque;

/// Emitted after every applied scene change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraChange {
    pub scene_index: usize,
    pub camera_index: Option<usize>,
    /// Fixed cameras placed in the new scene.
    pub cameras: Vec<usize>,
}

/// Applies requested scene indices in order.
#[derive(Debug, Default)]
pub struct SceneChangeReaction {
    pending: VecDeque<usize>,
    viewport: Option<SurfaceSize>,
}

impl SceneChangeReaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, scene_index: usize) {
        self.pending.push_back(scene_index);
    }

    pub fn observe_viewport(&mut self, size: SurfaceSize) {
        self.viewport = Some(size);
    }

    fn apply(&self, state: &mut RenderState, scene_index: usize) -> Result<CameraChange, SelectionError> {
        let asset = state.asset.as_mut().ok_or(SelectionError::NoAsset)?;
        asset.apply_transform_hierarchy(scene_index)?;
        let cameras = asset.scene_cameras(scene_index);

        if let Some(aspect) = self.viewport.and_then(SurfaceSize::aspect) {
            state.user_camera.aspect_ratio = aspect;
        }
        state.user_camera.fit_view_to_scene(asset, scene_index);
        state.scene_index = scene_index;
        state.camera_index = None;
        Ok(CameraChange {
            scene_index,
            camera_index: None,
            cameras,
        })
    }
}

impl Producer for SceneChangeReaction {
    type Output = CameraChange;

    fn produce(&mut self, state: &mut RenderState) -> Option<CameraChange> {
        while let Some(scene_index) = self.pending.pop_front() {
            match self.apply(state, scene_index) {
                Ok(change) => {
                    log::info!(
                        "scene {} active with {} fixed camera(s)",
                        scene_index,
                        change.cameras.len()
                    );
                    return Some(change);
                }
                Err(err) => log::warn!("rejected scene change: {err}"),
            }
        }
        None
    }
}

/// Animations that conflict with the selection and cannot be added to it.
pub fn disabled_animations(state: &RenderState, selection: &[usize]) -> Vec<usize> {
    state
        .asset
        .as_ref()
        .map(|asset| asset.non_disjoint_animations(selection))
        .unwrap_or_default()
}

/// The camera the renderer actually uses: the fixed camera when one is selected.
pub fn effective_camera(state: &RenderState) -> Result<CameraDescription, SelectionError> {
    let Some(camera_index) = state.camera_index else {
        return Ok(state.user_camera.description());
    };
    let asset = state.asset()?;
    asset.check_camera(camera_index)?;
    describe_fixed_camera(asset, state.scene_index, camera_index).ok_or(SelectionError::Camera {
        index: camera_index,
        count: asset.cameras.len(),
    })
}
