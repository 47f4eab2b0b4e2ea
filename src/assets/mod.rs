use crate::scene::{
    AlphaMode, AnimatedProperty, Animation, Aabb, CameraDef, ChannelTarget, GltfAsset, Material,
    Mesh, Node, Primitive, Projection, SceneDef,
};
use glam::{Mat4, Vec3};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// A boxed, `Send` load result so loads can run on the background runtime.
pub type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<T, LoadError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF {path} references missing resource '{uri}'")]
    MissingResource { path: String, uri: String },
    #[error("failed to decode environment {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("load of {path} ended before producing a result")]
    Abandoned { path: String },
}

/// A "model selected" request: the main glTF file plus files dropped or picked with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub main_file: PathBuf,
    pub additional_files: Vec<PathBuf>,
}

impl ModelSelection {
    pub fn new(main_file: impl Into<PathBuf>) -> Self {
        Self {
            main_file: main_file.into(),
            additional_files: Vec::new(),
        }
    }

    pub fn with_additional_files(mut self, files: Vec<PathBuf>) -> Self {
        self.additional_files = files;
        self
    }

    /// Pick the first `.gltf`/`.glb` as the main file and keep the rest as auxiliary files.
    pub fn from_files(files: Vec<PathBuf>) -> Option<Self> {
        let main_position = files.iter().position(|file| is_gltf_path(file))?;
        let mut files = files;
        let main_file = files.remove(main_position);
        Some(Self {
            main_file,
            additional_files: files,
        })
    }

    pub fn display_name(&self) -> String {
        file_stem(&self.main_file, "gltf")
    }
}

pub fn is_gltf_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref(),
        Some("gltf") | Some("glb")
    )
}

pub fn is_environment_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref(),
        Some("hdr")
    )
}

/// Decoded lighting environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mean_radiance: [f32; 3],
}

/// Loading capability consumed by the viewer.
///
/// Implementations return futures that do not drive themselves; the viewer
/// spawns them on its background runtime.
pub trait ResourceLoader: Send + Sync + 'static {
    fn load_gltf(&self, selection: &ModelSelection) -> LoadFuture<GltfAsset>;

    fn load_environment(&self, path: &Path) -> LoadFuture<Environment>;
}

/// Loads glTF documents and image-based environments from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfResourceLoader;

impl ResourceLoader for GltfResourceLoader {
    fn load_gltf(&self, selection: &ModelSelection) -> LoadFuture<GltfAsset> {
        let selection = selection.clone();
        Box::pin(async move {
            let path = selection.main_file.display().to_string();
            let bytes = tokio::fs::read(&selection.main_file)
                .await
                .map_err(|source| LoadError::Read {
                    path: path.clone(),
                    source,
                })?;
            let gltf = gltf::Gltf::from_slice(&bytes).map_err(|source| LoadError::Parse {
                path: path.clone(),
                source,
            })?;
            for uri in external_uris(&gltf.document) {
                if resolve_resource(&selection, &uri).await.is_none() {
                    return Err(LoadError::MissingResource { path, uri });
                }
            }
            Ok(convert_document(selection.display_name(), &gltf.document))
        })
    }

    fn load_environment(&self, path: &Path) -> LoadFuture<Environment> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let display = path.display().to_string();
            let bytes = tokio::fs::read(&path).await.map_err(|source| LoadError::Read {
                path: display.clone(),
                source,
            })?;
            let image = image::load_from_memory(&bytes)
                .map_err(|source| LoadError::Decode {
                    path: display,
                    source,
                })?
                .into_rgb32f();
            let pixel_count = (image.width() as f64 * image.height() as f64).max(1.0);
            let mut sum = [0.0f64; 3];
            for pixel in image.pixels() {
                for (channel, value) in sum.iter_mut().zip(pixel.0) {
                    *channel += value as f64;
                }
            }
            Ok(Environment {
                name: file_stem(&path, "environment"),
                width: image.width(),
                height: image.height(),
                mean_radiance: sum.map(|channel| (channel / pixel_count) as f32),
            })
        })
    }
}

fn file_stem(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or(fallback)
        .to_string()
}

fn external_uris(document: &gltf::Document) -> Vec<String> {
    let buffers = document.buffers().filter_map(|buffer| match buffer.source() {
        gltf::buffer::Source::Uri(uri) => Some(uri.to_string()),
        gltf::buffer::Source::Bin => None,
    });
    let images = document.images().filter_map(|image| match image.source() {
        gltf::image::Source::Uri { uri, .. } => Some(uri.to_string()),
        gltf::image::Source::View { .. } => None,
    });
    buffers
        .chain(images)
        .filter(|uri| !uri.starts_with("data:"))
        .collect()
}

/// Auxiliary files win by file name; otherwise the URI is resolved next to the main file.
async fn resolve_resource(selection: &ModelSelection, uri: &str) -> Option<PathBuf> {
    let wanted = Path::new(uri).file_name()?;
    if let Some(file) = selection
        .additional_files
        .iter()
        .find(|file| file.file_name() == Some(wanted))
    {
        return Some(file.clone());
    }
    let sibling = selection
        .main_file
        .parent()
        .map(|dir| dir.join(uri))
        .unwrap_or_else(|| PathBuf::from(uri));
    match tokio::fs::try_exists(&sibling).await {
        Ok(true) => Some(sibling),
        _ => None,
    }
}

fn convert_document(name: String, document: &gltf::Document) -> GltfAsset {
    let scenes = document
        .scenes()
        .map(|scene| SceneDef {
            name: scene.name().map(String::from),
            roots: scene.nodes().map(|node| node.index()).collect(),
        })
        .collect();

    let nodes = document
        .nodes()
        .map(|node| Node {
            name: node.name().map(String::from),
            local: Mat4::from_cols_array_2d(&node.transform().matrix()),
            world: Mat4::IDENTITY,
            children: node.children().map(|child| child.index()).collect(),
            mesh: node.mesh().map(|mesh| mesh.index()),
            camera: node.camera().map(|camera| camera.index()),
        })
        .collect();

    let meshes = document
        .meshes()
        .map(|mesh| Mesh {
            name: mesh.name().map(String::from),
            primitives: mesh.primitives().map(|primitive| convert_primitive(&primitive)).collect(),
        })
        .collect();

    let materials = document
        .materials()
        .map(|material| Material {
            name: material.name().map(String::from),
            alpha_mode: match material.alpha_mode() {
                gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
                gltf::material::AlphaMode::Mask => AlphaMode::Mask,
                gltf::material::AlphaMode::Blend => AlphaMode::Blend,
            },
        })
        .collect();

    let cameras = document
        .cameras()
        .map(|camera| CameraDef {
            name: camera.name().map(String::from),
            projection: match camera.projection() {
                gltf::camera::Projection::Perspective(p) => Projection::Perspective {
                    yfov: p.yfov(),
                    aspect_ratio: p.aspect_ratio(),
                    znear: p.znear(),
                    zfar: p.zfar(),
                },
                gltf::camera::Projection::Orthographic(o) => Projection::Orthographic {
                    xmag: o.xmag(),
                    ymag: o.ymag(),
                    znear: o.znear(),
                    zfar: o.zfar(),
                },
            },
        })
        .collect();

    let animations = document
        .animations()
        .map(|animation| Animation {
            name: animation.name().map(String::from),
            targets: animation
                .channels()
                .map(|channel| ChannelTarget {
                    node: channel.target().node().index(),
                    property: match channel.target().property() {
                        gltf::animation::Property::Translation => AnimatedProperty::Translation,
                        gltf::animation::Property::Rotation => AnimatedProperty::Rotation,
                        gltf::animation::Property::Scale => AnimatedProperty::Scale,
                        gltf::animation::Property::MorphTargetWeights => {
                            AnimatedProperty::MorphTargetWeights
                        }
                    },
                })
                .collect(),
        })
        .collect();

    let variants = document
        .variants()
        .map(|variants| variants.map(|variant| variant.name().to_string()).collect())
        .unwrap_or_default();

    GltfAsset {
        name,
        default_scene: document.default_scene().map(|scene| scene.index()),
        scenes,
        nodes,
        meshes,
        materials,
        cameras,
        animations,
        variants,
    }
}

fn convert_primitive(primitive: &gltf::Primitive<'_>) -> Primitive {
    let positions = primitive.get(&gltf::Semantic::Positions);
    let bounds = positions.as_ref().and_then(|accessor| {
        let min: [f32; 3] = serde_json::from_value(accessor.min()?).ok()?;
        let max: [f32; 3] = serde_json::from_value(accessor.max()?).ok()?;
        Some(Aabb::new(Vec3::from(min), Vec3::from(max)))
    });
    let count = primitive
        .indices()
        .map(|indices| indices.count())
        .or_else(|| positions.as_ref().map(|accessor| accessor.count()))
        .unwrap_or(0);
    let face_count = match primitive.mode() {
        gltf::mesh::Mode::Triangles => count / 3,
        gltf::mesh::Mode::TriangleStrip | gltf::mesh::Mode::TriangleFan => count.saturating_sub(2),
        _ => 0,
    };
    Primitive {
        bounds,
        face_count,
        material: primitive.material().index(),
    }
}
