//! glTF 2.0 (`.gltf` + `.bin`, or `.glb`) to [`Model`] conversion.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use glam::{Quat, Vec3, Vec4};

use crate::error::LoadError;
use crate::geometry::MeshGeometry;
use crate::scene::{
    Material, MaterialTextures, Model, ModelNode, ModelPrimitive, TextureId, TextureImage,
    Transform,
};

/// An image referenced by the model, decoded to RGBA8.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn decode(label: &str, bytes: &[u8]) -> Result<Self, LoadError> {
        let image = image::load_from_memory(bytes).map_err(|source| LoadError::Image {
            path: label.to_string(),
            source,
        })?;
        let rgba = image.to_rgba8();
        Ok(Self {
            label: label.to_string(),
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

/// Images sampled by a material slot the renderer binds: base color,
/// metallic-roughness and emissive. Other images (normal and occlusion maps)
/// are never fetched.
pub fn bound_images(document: &gltf::Document) -> BTreeSet<usize> {
    let (color, data) = slot_images(document);
    color.union(&data).copied().collect()
}

/// Bound images split into color (sRGB) and linear data.
fn slot_images(document: &gltf::Document) -> (BTreeSet<usize>, BTreeSet<usize>) {
    let mut color = BTreeSet::new();
    let mut data = BTreeSet::new();
    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        let image_of = |info: gltf::texture::Info| info.texture().source().index();
        color.extend(pbr.base_color_texture().map(image_of));
        color.extend(material.emissive_texture().map(image_of));
        data.extend(pbr.metallic_roughness_texture().map(image_of));
    }
    (color, data)
}

/// Build a [`Model`] from a parsed document, its resolved buffers and the
/// decoded images keyed by glTF image index.
///
/// Only triangle primitives are kept. Images used as base color or emissive
/// are flagged sRGB; metallic-roughness images are linear data. Images not
/// in `images` are left out and any slot pointing at them stays empty.
pub fn build_model(
    path: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    images: BTreeMap<usize, DecodedImage>,
) -> Result<Model, LoadError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::EmptyScene {
            path: path.to_string(),
        })?;

    let (color_images, _) = slot_images(document);
    let mut texture_ids = HashMap::new();
    let mut textures = Vec::with_capacity(images.len());
    for (index, image) in images {
        texture_ids.insert(index, TextureId(textures.len()));
        textures.push(TextureImage {
            label: image.label,
            width: image.width,
            height: image.height,
            rgba: image.rgba,
            srgb: color_images.contains(&index),
        });
    }

    let materials: Vec<Material> = document
        .materials()
        .map(|m| load_material(&m, &texture_ids))
        .collect();

    // glTF mesh index -> primitives of that mesh.
    let mut geometries = Vec::new();
    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        let mut primitives = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "{path}: skipping {:?} primitive in mesh {}",
                    primitive.mode(),
                    mesh.name().unwrap_or("unnamed")
                );
                continue;
            }
            let Some(geometry) = load_primitive(&primitive, buffers) else {
                log::warn!("{path}: primitive without positions in mesh {}", mesh.index());
                continue;
            };
            primitives.push(ModelPrimitive {
                geometry: geometries.len(),
                material: primitive.material().index(),
            });
            geometries.push(geometry);
        }
        meshes.push(primitives);
    }

    let nodes = document
        .nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            ModelNode {
                name: node
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("node_{}", node.index())),
                transform: Transform {
                    position: Vec3::from(translation),
                    rotation: Quat::from_array(rotation),
                    scale: Vec3::from(scale),
                },
                children: node.children().map(|c| c.index()).collect(),
                primitives: node
                    .mesh()
                    .and_then(|m| meshes.get(m.index()).cloned())
                    .unwrap_or_default(),
            }
        })
        .collect();

    Ok(Model {
        name: model_name(path),
        nodes,
        roots: scene.nodes().map(|n| n.index()).collect(),
        geometries,
        textures,
        materials,
    })
}

fn model_name(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file.rsplit_once('.')
        .map_or(file, |(stem, _)| stem)
        .to_string()
}

fn load_primitive(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> Option<MeshGeometry> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals = reader.read_normals().map(|n| n.collect());
    let uvs = reader.read_tex_coords(0).map(|uv| uv.into_f32().collect());
    let indices = reader.read_indices().map(|i| i.into_u32().collect());
    Some(MeshGeometry::from_attributes(positions, normals, uvs, indices))
}

fn load_material(material: &gltf::Material, texture_ids: &HashMap<usize, TextureId>) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let slot = |info: Option<gltf::texture::Info>| {
        info.and_then(|info| texture_ids.get(&info.texture().source().index()).copied())
    };
    Material {
        name: material.name().unwrap_or_default().to_string(),
        base_color: Vec4::from(pbr.base_color_factor()),
        textures: MaterialTextures {
            base_color: slot(pbr.base_color_texture()),
            metallic_roughness: slot(pbr.metallic_roughness_texture()),
            emissive: slot(material.emissive_texture()),
        },
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive: Vec3::from(material.emissive_factor()),
        env_map_intensity: 1.0,
        double_sided: material.double_sided(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_is_the_file_stem() {
        assert_eq!(model_name("assets/wolf_head_statuine/scene.gltf"), "scene");
        assert_eq!(model_name("head.glb"), "head");
        assert_eq!(model_name("noext"), "noext");
    }

    #[test]
    fn document_without_scenes_is_rejected() {
        let json = br#"{"asset":{"version":"2.0"}}"#;
        let gltf = gltf::Gltf::from_slice(json).unwrap();
        let err = build_model("empty.gltf", &gltf.document, &[], BTreeMap::new()).unwrap_err();
        assert!(matches!(err, LoadError::EmptyScene { .. }));
    }

    #[test]
    fn bad_texture_bytes_are_an_image_error() {
        let err = DecodedImage::decode("a.png", b"nope").unwrap_err();
        assert!(matches!(err, LoadError::Image { .. }));
    }
}
