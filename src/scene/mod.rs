use glam::{Mat4, Vec3};

/// Rejected selection against the loaded asset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("no asset is loaded")]
    NoAsset,
    #[error("scene index {index} out of range ({count} scenes)")]
    Scene { index: usize, count: usize },
    #[error("camera index {index} out of range ({count} cameras)")]
    Camera { index: usize, count: usize },
    #[error("animation index {index} out of range ({count} animations)")]
    Animation { index: usize, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimatedProperty {
    Translation,
    Rotation,
    Scale,
    MorphTargetWeights,
}

/// Node and path written by one animation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelTarget {
    pub node: usize,
    pub property: AnimatedProperty,
}

#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub name: Option<String>,
    pub targets: Vec<ChannelTarget>,
}

impl Animation {
    /// Two animations are disjoint when they write no common node property.
    pub fn is_disjoint(&self, other: &Animation) -> bool {
        !self
            .targets
            .iter()
            .any(|target| other.targets.contains(target))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn radius(&self) -> f32 {
        self.half_extent().length()
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let mut corners = self.corners().into_iter().map(|c| matrix.transform_point3(c));
        let first = corners.next().unwrap_or(Vec3::ZERO);
        corners.fold(Aabb::new(first, first), |acc, p| Aabb {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Primitive {
    pub bounds: Option<Aabb>,
    pub face_count: usize,
    pub material: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    pub fn bounds(&self) -> Option<Aabb> {
        self.primitives
            .iter()
            .filter_map(|primitive| primitive.bounds)
            .reduce(|acc, bounds| acc.union(&bounds))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: Option<String>,
    pub alpha_mode: AlphaMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        yfov: f32,
        aspect_ratio: Option<f32>,
        znear: f32,
        zfar: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
}

/// Camera authored inside the asset.
#[derive(Debug, Clone)]
pub struct CameraDef {
    pub name: Option<String>,
    pub projection: Projection,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub local: Mat4,
    pub world: Mat4,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub camera: Option<usize>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: None,
            local: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
            children: Vec::new(),
            mesh: None,
            camera: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneDef {
    pub name: Option<String>,
    pub roots: Vec<usize>,
}

/// Loaded scene graph as consumed by the viewer.
#[derive(Debug, Clone, Default)]
pub struct GltfAsset {
    pub name: String,
    pub default_scene: Option<usize>,
    pub scenes: Vec<SceneDef>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub cameras: Vec<CameraDef>,
    pub animations: Vec<Animation>,
    pub variants: Vec<String>,
}

impl GltfAsset {
    pub fn default_scene_index(&self) -> usize {
        self.default_scene.unwrap_or(0)
    }

    pub fn check_scene(&self, index: usize) -> Result<(), SelectionError> {
        if index < self.scenes.len() {
            Ok(())
        } else {
            Err(SelectionError::Scene {
                index,
                count: self.scenes.len(),
            })
        }
    }

    pub fn check_camera(&self, index: usize) -> Result<(), SelectionError> {
        if index < self.cameras.len() {
            Ok(())
        } else {
            Err(SelectionError::Camera {
                index,
                count: self.cameras.len(),
            })
        }
    }

    pub fn check_animations(&self, indices: &[usize]) -> Result<(), SelectionError> {
        match indices.iter().find(|index| **index >= self.animations.len()) {
            Some(index) => Err(SelectionError::Animation {
                index: *index,
                count: self.animations.len(),
            }),
            None => Ok(()),
        }
    }

    /// Node indices reachable from the scene roots, parents before children.
    pub fn scene_nodes(&self, scene_index: usize) -> Vec<usize> {
        let Some(scene) = self.scenes.get(scene_index) else {
            return Vec::new();
        };
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack: Vec<usize> = scene.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            if index >= self.nodes.len() || visited[index] {
                continue;
            }
            visited[index] = true;
            order.push(index);
            stack.extend(self.nodes[index].children.iter().rev().copied());
        }
        order
    }

    /// Recompute world matrices for every node of the scene.
    pub fn apply_transform_hierarchy(&mut self, scene_index: usize) -> Result<(), SelectionError> {
        self.check_scene(scene_index)?;
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> = self.scenes[scene_index]
            .roots
            .iter()
            .map(|root| (*root, Mat4::IDENTITY))
            .collect();
        while let Some((index, parent)) = stack.pop() {
            if index >= self.nodes.len() || visited[index] {
                continue;
            }
            visited[index] = true;
            let node = &mut self.nodes[index];
            node.world = parent * node.local;
            let world = node.world;
            stack.extend(node.children.iter().map(|child| (*child, world)));
        }
        Ok(())
    }

    /// World-space bounds of every mesh in the scene. Uses the last applied hierarchy.
    pub fn scene_bounds(&self, scene_index: usize) -> Option<Aabb> {
        self.scene_nodes(scene_index)
            .into_iter()
            .filter_map(|index| {
                let node = &self.nodes[index];
                let mesh = self.meshes.get(node.mesh?)?;
                Some(mesh.bounds()?.transformed(&node.world))
            })
            .reduce(|acc, bounds| acc.union(&bounds))
    }

    /// Fixed cameras instanced by nodes of the scene, ascending.
    pub fn scene_cameras(&self, scene_index: usize) -> Vec<usize> {
        let mut cameras: Vec<usize> = self
            .scene_nodes(scene_index)
            .into_iter()
            .filter_map(|index| self.nodes[index].camera)
            .filter(|camera| *camera < self.cameras.len())
            .collect();
        cameras.sort_unstable();
        cameras.dedup();
        cameras
    }

    /// First node of the scene that instances the camera.
    pub fn camera_node(&self, scene_index: usize, camera: usize) -> Option<usize> {
        self.scene_nodes(scene_index)
            .into_iter()
            .find(|index| self.nodes[*index].camera == Some(camera))
    }

    /// Animations outside `selection` that share a target with any selected animation.
    pub fn non_disjoint_animations(&self, selection: &[usize]) -> Vec<usize> {
        let selected: Vec<&Animation> = selection
            .iter()
            .filter_map(|index| self.animations.get(*index))
            .collect();
        (0..self.animations.len())
            .filter(|index| !selection.contains(index))
            .filter(|index| {
                let candidate = &self.animations[*index];
                selected.iter().any(|other| !candidate.is_disjoint(other))
            })
            .collect()
    }

    /// Greedy ascending scan admitting every animation that conflicts with none already admitted.
    pub fn maximal_disjoint_animations(&self) -> Vec<usize> {
        let mut admitted = Vec::new();
        for index in 0..self.animations.len() {
            if !self.non_disjoint_animations(&admitted).contains(&index) {
                admitted.push(index);
            }
        }
        admitted
    }
}
