use super::camera::fixed_camera_matrices;
use super::{RenderError, Renderer};
use crate::viewer::{RenderState, RenderingParameters, ToneMap};
use glam::{Mat3, Mat4, Vec3, Vec4};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

const MAX_SURFACE_PIXELS: u64 = 16384 * 16384;
const MARKER_RADIUS: i64 = 1;

/// CPU preview that paints the background and projected mesh bounds.
#[derive(Debug, Default)]
pub struct PreviewRenderer {
    frame: Option<RgbaImage>,
}

impl PreviewRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    fn background(state: &RenderState) -> Rgba<u8> {
        let params = &state.rendering_parameters;
        match state.environment.as_ref() {
            Some(environment)
                if params.render_environment_map && params.environment_background =>
            {
                let radiance = Vec3::from_array(environment.mean_radiance);
                encode(tone_map(params.tone_map, radiance * params.exposure), 1.0)
            }
            _ => {
                let [r, g, b, a] = params.clear_color;
                encode(Vec3::new(r, g, b), a)
            }
        }
    }

    fn view_projection(state: &RenderState, aspect: f32) -> Mat4 {
        let fixed = match (state.asset.as_ref(), state.camera_index) {
            (Some(asset), Some(camera)) => {
                fixed_camera_matrices(asset, state.scene_index, camera, aspect)
            }
            _ => None,
        };
        let (view, projection) = fixed.unwrap_or_else(|| {
            let camera = &state.user_camera;
            (camera.view_matrix(), camera.projection_matrix())
        });
        projection * view
    }

    fn draw_bounds(image: &mut RgbaImage, state: &RenderState, params: &RenderingParameters) {
        let Some(asset) = state.asset.as_ref() else {
            return;
        };
        let (width, height) = image.dimensions();
        let view_projection = Self::view_projection(state, width as f32 / height as f32);
        let marker = encode(tone_map(params.tone_map, Vec3::ONE * params.exposure), 1.0);

        for index in asset.scene_nodes(state.scene_index) {
            let node = &asset.nodes[index];
            let Some(bounds) = node
                .mesh
                .and_then(|mesh| asset.meshes.get(mesh))
                .and_then(|mesh| mesh.bounds())
            else {
                continue;
            };
            for corner in bounds.corners() {
                let clip = view_projection * node.world * Vec4::from((corner, 1.0));
                if clip.w <= 0.0 {
                    continue;
                }
                let ndc = clip.truncate() / clip.w;
                if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 {
                    continue;
                }
                let x = ((ndc.x + 1.0) * 0.5 * width as f32) as i64;
                let y = ((1.0 - ndc.y) * 0.5 * height as f32) as i64;
                plot(image, x, y, marker);
            }
        }
    }
}

impl Renderer for PreviewRenderer {
    fn render(&mut self, state: &RenderState, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        if u64::from(width) * u64::from(height) > MAX_SURFACE_PIXELS {
            return Err(RenderError::SurfaceTooLarge { width, height });
        }

        let background = Self::background(state);
        if self.frame.as_ref().map(RgbaImage::dimensions) != Some((width, height)) {
            self.frame = None;
        }
        let image = self
            .frame
            .get_or_insert_with(|| RgbaImage::new(width, height));
        for pixel in image.pixels_mut() {
            *pixel = background;
        }
        Self::draw_bounds(image, state, &state.rendering_parameters);
        Ok(())
    }

    fn capture_png(&self) -> Result<Vec<u8>, RenderError> {
        let frame = self.frame.as_ref().ok_or(RenderError::NoFrame)?;
        let mut bytes = Vec::new();
        frame.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

fn plot(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    for py in (y - MARKER_RADIUS)..=(y + MARKER_RADIUS) {
        for px in (x - MARKER_RADIUS)..=(x + MARKER_RADIUS) {
            if px >= 0 && py >= 0 && (px as u64) < u64::from(width) && (py as u64) < u64::from(height)
            {
                image.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

fn encode(linear: Vec3, alpha: f32) -> Rgba<u8> {
    let srgb = linear.clamp(Vec3::ZERO, Vec3::ONE).powf(1.0 / 2.2);
    let to_byte = |v: f32| (v * 255.0).round() as u8;
    Rgba([
        to_byte(srgb.x),
        to_byte(srgb.y),
        to_byte(srgb.z),
        to_byte(alpha.clamp(0.0, 1.0)),
    ])
}

fn tone_map(mode: ToneMap, color: Vec3) -> Vec3 {
    match mode {
        ToneMap::KhronosPbrNeutral => khronos_pbr_neutral(color),
        ToneMap::AcesHillExposureBoost => aces_hill(color / 0.6),
        ToneMap::AcesNarkowicz => {
            let c = color * 0.6;
            (c * (2.51 * c + 0.03)) / (c * (2.43 * c + 0.59) + 0.14)
        }
        ToneMap::AcesHill => aces_hill(color),
        ToneMap::None => color,
    }
}

fn khronos_pbr_neutral(color: Vec3) -> Vec3 {
    const START_COMPRESSION: f32 = 0.8 - 0.04;
    const DESATURATION: f32 = 0.15;

    let x = color.min_element();
    let offset = if x < 0.08 { x - 6.25 * x * x } else { 0.04 };
    let color = color - offset;
    let peak = color.max_element();
    if peak < START_COMPRESSION {
        return color;
    }
    let d = 1.0 - START_COMPRESSION;
    let new_peak = 1.0 - d * d / (peak + d - START_COMPRESSION);
    let color = color * (new_peak / peak);
    let g = 1.0 - 1.0 / (DESATURATION * (peak - new_peak) + 1.0);
    color.lerp(Vec3::splat(new_peak), g)
}

fn aces_hill(color: Vec3) -> Vec3 {
    let input = Mat3::from_cols(
        Vec3::new(0.59719, 0.07600, 0.02840),
        Vec3::new(0.35458, 0.90834, 0.13383),
        Vec3::new(0.04823, 0.01566, 0.83777),
    );
    let output = Mat3::from_cols(
        Vec3::new(1.60475, -0.10208, -0.00327),
        Vec3::new(-0.53108, 1.10813, -0.07276),
        Vec3::new(-0.07367, -0.00605, 1.07602),
    );
    let v = input * color;
    let a = v * (v + 0.0245786) - 0.000090537;
    let b = v * (0.983729 * v + 0.4329510) + 0.238081;
    output * (a / b)
}
