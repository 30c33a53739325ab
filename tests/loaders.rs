use std::path::Path;

use vista::scene::TextureId;
use vista::{AssetLoader, AssetStore, FileSource, LoadError};

const TRIANGLE_GLTF: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0] }],
    "nodes": [
        { "name": "group", "children": [1] },
        { "name": "body", "mesh": 0, "translation": [0.0, 1.0, 0.0] }
    ],
    "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
    "buffers": [{ "uri": "BUFFER_URI", "byteLength": 42 }],
    "bufferViews": [
        { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
        { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
    ],
    "accessors": [
        {
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
        },
        { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
    ]
}"#;

fn triangle_bin() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u16; 3] = [0, 1, 2];
    let mut bytes: Vec<u8> = positions.iter().flat_map(|p| p.to_le_bytes()).collect();
    bytes.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
    bytes
}

fn write_model(dir: &Path, buffer_uri: &str) {
    std::fs::create_dir_all(dir.join("statue")).unwrap();
    std::fs::write(
        dir.join("statue/scene.gltf"),
        TRIANGLE_GLTF.replace("BUFFER_URI", buffer_uri),
    )
    .unwrap();
}

#[test]
fn loads_gltf_with_external_buffer() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "scene.bin");
    std::fs::write(dir.path().join("statue/scene.bin"), triangle_bin()).unwrap();

    let mut store = AssetStore::new(FileSource::new(dir.path()));
    let model = pollster::block_on(store.load_model("statue/scene.gltf")).unwrap();

    assert_eq!(model.name, "scene");
    assert_eq!(model.roots, vec![0]);
    assert_eq!(model.nodes.len(), 2);
    assert_eq!(model.nodes[0].children, vec![1]);
    assert!(model.nodes[0].primitives.is_empty());
    assert_eq!(model.primitive_count(), 1);
    assert_eq!(model.nodes[1].transform.position.y, 1.0);

    let geometry = &model.geometries[0];
    assert_eq!(geometry.vertices.len(), 3);
    assert_eq!(geometry.indices, vec![0, 1, 2]);
}

#[test]
fn missing_buffer_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "scene.bin");

    let mut store = AssetStore::new(FileSource::new(dir.path()));
    let err = pollster::block_on(store.load_model("statue/scene.gltf")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
    assert_eq!(err.path(), "statue/scene.bin");
}

#[test]
fn loads_gltf_with_embedded_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!("data:application/octet-stream;base64,{}", base64::encode(triangle_bin()));
    write_model(dir.path(), &uri);

    let mut store = AssetStore::new(FileSource::new(dir.path()));
    let model = pollster::block_on(store.load_model("statue/scene.gltf")).unwrap();
    assert_eq!(model.geometries[0].indices, vec![0, 1, 2]);
}

#[test]
fn truncated_embedded_buffer_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), "data:application/octet-stream;base64,AAAA");

    let mut store = AssetStore::new(FileSource::new(dir.path()));
    let err = pollster::block_on(store.load_model("statue/scene.gltf")).unwrap_err();
    assert!(matches!(err, LoadError::MissingBuffer { index: 0, .. }));
}

/// One material using a base color and a metallic-roughness image, plus a
/// normal map the renderer never samples.
const TEXTURED_GLTF: &str = r#"{
    "asset": { "version": "2.0" },
    "scenes": [{ "nodes": [0] }],
    "nodes": [{ "name": "body", "mesh": 0 }],
    "meshes": [{
        "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }]
    }],
    "materials": [{
        "pbrMetallicRoughness": {
            "baseColorTexture": { "index": 0 },
            "metallicRoughnessTexture": { "index": 2 }
        },
        "normalTexture": { "index": 1 }
    }],
    "textures": [{ "source": 0 }, { "source": 1 }, { "source": 2 }],
    "images": [{ "uri": "color.png" }, { "uri": "normal.png" }, { "uri": "packed.png" }],
    "buffers": [{ "uri": "scene.bin", "byteLength": 42 }],
    "bufferViews": [
        { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
        { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
    ],
    "accessors": [
        {
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
        },
        { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
    ]
}"#;

#[test]
fn only_images_bound_to_a_material_slot_are_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let statue = dir.path().join("statue");
    std::fs::create_dir_all(&statue).unwrap();
    std::fs::write(statue.join("scene.gltf"), TEXTURED_GLTF).unwrap();
    std::fs::write(statue.join("scene.bin"), triangle_bin()).unwrap();
    for name in ["color.png", "packed.png"] {
        image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 100, 50, 255]))
            .save(statue.join(name))
            .unwrap();
    }
    // normal.png is deliberately absent; reading it would fail the load.

    let mut store = AssetStore::new(FileSource::new(dir.path()));
    let model = pollster::block_on(store.load_model("statue/scene.gltf")).unwrap();

    assert_eq!(model.textures.len(), 2);
    assert_eq!(model.textures[0].label, "statue/color.png");
    assert!(model.textures[0].srgb);
    assert_eq!(model.textures[1].label, "statue/packed.png");
    assert!(!model.textures[1].srgb);
    assert_eq!(model.textures[1].rgba.len(), 2 * 2 * 4);

    let slots = model.materials[0].textures;
    assert_eq!(slots.base_color, Some(TextureId(0)));
    assert_eq!(slots.metallic_roughness, Some(TextureId(1)));
    assert_eq!(slots.emissive, None);
}

#[test]
fn loads_radiance_environment() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 2\n".to_vec();
    bytes.extend_from_slice(&[128, 128, 128, 129, 128, 128, 128, 129]);
    std::fs::write(dir.path().join("sky.hdr"), bytes).unwrap();

    let mut store = AssetStore::new(FileSource::new(dir.path()));
    let image = pollster::block_on(store.load_environment("sky.hdr")).unwrap();
    assert_eq!((image.width, image.height), (2, 1));
    assert!((image.pixels[1][0] - 1.0).abs() < 0.02);
}
