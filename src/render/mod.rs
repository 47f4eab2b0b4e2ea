pub mod camera;
mod preview;

pub use camera::{describe_fixed_camera, CameraDescription, UserCamera};
pub use preview::PreviewRenderer;

use crate::scene::AlphaMode;
use crate::viewer::RenderState;
use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("surface {width}x{height} exceeds the renderer limit")]
    SurfaceTooLarge { width: u32, height: u32 },
    #[error("no frame has been rendered yet")]
    NoFrame,
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

/// Counts for the active scene of the loaded asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Statistics {
    pub mesh_count: usize,
    pub face_count: usize,
    pub opaque_material_count: usize,
    pub transparent_material_count: usize,
}

impl Statistics {
    /// Meshes and materials are counted once; faces are counted per instancing node.
    pub fn of_state(state: &RenderState) -> Self {
        let Some(asset) = state.asset.as_ref() else {
            return Self::default();
        };
        let mut meshes = BTreeSet::new();
        let mut materials = BTreeSet::new();
        let mut face_count = 0;
        for node in asset.scene_nodes(state.scene_index) {
            let Some(mesh_index) = asset.nodes[node].mesh else {
                continue;
            };
            let Some(mesh) = asset.meshes.get(mesh_index) else {
                continue;
            };
            meshes.insert(mesh_index);
            for primitive in &mesh.primitives {
                face_count += primitive.face_count;
                if let Some(material) = primitive.material {
                    materials.insert(material);
                }
            }
        }
        let transparent_material_count = materials
            .iter()
            .filter_map(|&index| asset.materials.get(index))
            .filter(|material| material.alpha_mode == AlphaMode::Blend)
            .count();
        Self {
            mesh_count: meshes.len(),
            face_count,
            opaque_material_count: materials.len() - transparent_material_count,
            transparent_material_count,
        }
    }
}

/// Draws the render state into a surface of the given size.
pub trait Renderer {
    fn render(&mut self, state: &RenderState, width: u32, height: u32) -> Result<(), RenderError>;

    fn gather_statistics(&self, state: &RenderState) -> Statistics {
        Statistics::of_state(state)
    }

    /// PNG bytes of the last rendered frame.
    fn capture_png(&self) -> Result<Vec<u8>, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::fixtures::two_scene_asset;
    use crate::scene::{Material, Primitive};

    #[test]
    fn statistics_follow_active_scene() {
        let mut state = RenderState::default();
        assert_eq!(Statistics::of_state(&state), Statistics::default());

        state.asset = Some(two_scene_asset("a"));
        let stats = Statistics::of_state(&state);
        assert_eq!(stats.mesh_count, 1);
        assert_eq!(stats.face_count, 12);
        assert_eq!(stats.opaque_material_count, 1);
        assert_eq!(stats.transparent_material_count, 0);
    }

    #[test]
    fn blended_materials_count_as_transparent() {
        let mut asset = two_scene_asset("a");
        asset.materials.push(Material {
            name: Some("glass".into()),
            alpha_mode: AlphaMode::Blend,
        });
        asset.meshes[0].primitives.push(Primitive {
            bounds: None,
            face_count: 2,
            material: Some(1),
        });
        let mut state = RenderState::default();
        state.asset = Some(asset);
        let stats = Statistics::of_state(&state);
        assert_eq!(stats.face_count, 14);
        assert_eq!(stats.opaque_material_count, 1);
        assert_eq!(stats.transparent_material_count, 1);
    }
}
