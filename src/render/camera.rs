use crate::scene::{GltfAsset, Projection};
use glam::{Mat4, Quat, Vec3};

const MIN_DISTANCE: f32 = 0.01;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Free orbit camera driven by user gestures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub aspect_ratio: f32,
    pub yfov: f32,
    pub znear: f32,
    pub zfar: f32,
    pub orbit_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
}

impl Default for UserCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 3.0,
            yaw: 0.0,
            pitch: 0.0,
            aspect_ratio: 16.0 / 9.0,
            yfov: 45f32.to_radians(),
            znear: 0.01,
            zfar: 100.0,
            orbit_speed: 1.0 / 180.0,
            pan_speed: 1.0 / 500.0,
            zoom_speed: 1.0 / 20.0,
        }
    }
}

impl UserCamera {
    /// Unit vector from the target towards the eye.
    fn back_direction(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        Vec3::new(
            self.yaw.sin() * cos_pitch,
            self.pitch.sin(),
            self.yaw.cos() * cos_pitch,
        )
    }

    pub fn position(&self) -> Vec3 {
        self.target + self.back_direction() * self.distance
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(-self.pitch)
    }

    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw -= delta_x * self.orbit_speed;
        self.pitch = (self.pitch + delta_y * self.orbit_speed).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        if self.yaw.is_finite() {
            self.yaw = (self.yaw + std::f32::consts::PI).rem_euclid(std::f32::consts::TAU)
                - std::f32::consts::PI;
        }
    }

    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let rotation = self.rotation();
        let right = rotation * Vec3::X;
        let up = rotation * Vec3::Y;
        let scale = self.distance * self.pan_speed;
        self.target += (-right * delta_x + up * delta_y) * scale;
    }

    pub fn zoom_by(&mut self, delta: f32) {
        let factor = (1.0 + delta * self.zoom_speed).max(0.1);
        self.distance = (self.distance * factor).max(MIN_DISTANCE);
    }

    /// Aim at the scene bounds keeping the current orientation.
    pub fn fit_view_to_scene(&mut self, asset: &GltfAsset, scene_index: usize) {
        let Some(bounds) = asset.scene_bounds(scene_index) else {
            self.target = Vec3::ZERO;
            self.distance = 3.0;
            return;
        };
        let radius = bounds.radius();
        let radius = if radius > 0.0 { radius } else { 1.0 };
        self.target = bounds.center();
        self.distance = radius / (self.yfov * 0.5).tan().max(1e-3) * 1.2;
        self.znear = (self.distance - radius).max(self.distance * 1e-3).max(MIN_DISTANCE) * 0.5;
        self.zfar = (self.distance + radius) * 4.0;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.yfov, self.aspect_ratio.max(1e-3), self.znear, self.zfar)
    }

    pub fn description(&self) -> CameraDescription {
        CameraDescription {
            name: None,
            projection: ProjectionDescription::Perspective {
                aspect_ratio: Some(self.aspect_ratio),
                yfov: self.yfov,
                znear: self.znear,
                zfar: Some(self.zfar),
            },
            translation: self.position().to_array(),
            rotation: self.rotation().to_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProjectionDescription {
    Perspective {
        aspect_ratio: Option<f32>,
        yfov: f32,
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

impl From<Projection> for ProjectionDescription {
    fn from(projection: Projection) -> Self {
        match projection {
            Projection::Perspective {
                yfov,
                aspect_ratio,
                znear,
                zfar,
            } => Self::Perspective {
                aspect_ratio,
                yfov,
                znear,
                zfar,
            },
            Projection::Orthographic {
                xmag,
                ymag,
                znear,
                zfar,
            } => Self::Orthographic {
                xmag,
                ymag,
                znear,
                zfar,
            },
        }
    }
}

/// Serializable pose and projection of a camera.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraDescription {
    pub name: Option<String>,
    pub projection: ProjectionDescription,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
}

/// Describe a fixed asset camera as placed in the given scene.
pub fn describe_fixed_camera(
    asset: &GltfAsset,
    scene_index: usize,
    camera_index: usize,
) -> Option<CameraDescription> {
    let camera = asset.cameras.get(camera_index)?;
    let world = asset
        .camera_node(scene_index, camera_index)
        .map(|node| asset.nodes[node].world)
        .unwrap_or(Mat4::IDENTITY);
    let (_, rotation, translation) = world.to_scale_rotation_translation();
    Some(CameraDescription {
        name: camera.name.clone(),
        projection: camera.projection.into(),
        translation: translation.to_array(),
        rotation: rotation.normalize().to_array(),
    })
}

/// View and projection of a fixed camera; the surface aspect fills in a missing ratio.
pub fn fixed_camera_matrices(
    asset: &GltfAsset,
    scene_index: usize,
    camera_index: usize,
    surface_aspect: f32,
) -> Option<(Mat4, Mat4)> {
    let camera = asset.cameras.get(camera_index)?;
    let world = asset
        .camera_node(scene_index, camera_index)
        .map(|node| asset.nodes[node].world)
        .unwrap_or(Mat4::IDENTITY);
    let projection = match camera.projection {
        Projection::Perspective {
            yfov,
            aspect_ratio,
            znear,
            zfar,
        } => {
            let aspect = aspect_ratio.unwrap_or(surface_aspect).max(1e-3);
            match zfar {
                Some(zfar) => Mat4::perspective_rh(yfov, aspect, znear, zfar),
                None => Mat4::perspective_infinite_rh(yfov, aspect, znear),
            }
        }
        Projection::Orthographic {
            xmag,
            ymag,
            znear,
            zfar,
        } => Mat4::orthographic_rh(-xmag, xmag, -ymag, ymag, znear, zfar),
    };
    Some((world.inverse(), projection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::fixtures::two_scene_asset;

    #[test]
    fn fit_centers_on_scene_and_keeps_orientation() {
        let mut asset = two_scene_asset("a");
        asset.apply_transform_hierarchy(0).unwrap();
        let mut camera = UserCamera {
            yaw: 1.1,
            pitch: -0.3,
            ..UserCamera::default()
        };
        camera.fit_view_to_scene(&asset, 0);
        assert!((camera.target - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);
        assert!((camera.yaw - 1.1).abs() < 1e-6);
        assert!((camera.pitch + 0.3).abs() < 1e-6);
        assert!(camera.distance > asset.scene_bounds(0).unwrap().radius());
        assert!(camera.znear > 0.0 && camera.znear < camera.zfar);
    }

    #[test]
    fn orbit_pan_zoom_stay_finite() {
        let mut camera = UserCamera::default();
        camera.orbit(400.0, 2000.0);
        camera.pan(30.0, -12.0);
        camera.zoom_by(-100.0);
        assert!(camera.position().is_finite());
        assert!(camera.pitch.abs() <= PITCH_LIMIT);
        assert!(camera.distance >= MIN_DISTANCE);
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = UserCamera::default();
        let forward = camera.rotation() * Vec3::NEG_Z;
        let to_target = (camera.target - camera.position()).normalize();
        assert!((forward - to_target).length() < 1e-5);
    }

    #[test]
    fn fixed_camera_description_uses_node_world_pose() {
        let mut asset = two_scene_asset("a");
        asset.apply_transform_hierarchy(0).unwrap();
        let description = describe_fixed_camera(&asset, 0, 0).unwrap();
        assert_eq!(description.name.as_deref(), Some("shot"));
        assert_eq!(description.translation, [10.0, 0.0, 5.0]);
        let json = serde_json::to_string(&description).unwrap();
        assert!(json.contains("\"type\":\"perspective\""));
        assert!(describe_fixed_camera(&asset, 0, 3).is_none());
    }
}
