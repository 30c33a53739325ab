use super::{Material, TextureImage, Transform};
use crate::geometry::MeshGeometry;

/// A decoded model, detached from any scene.
///
/// Nodes form a forest stored as an arena; `roots` and `children` index into
/// `nodes`. Primitive geometry and material indices are local to the model and
/// get remapped when the model is added to a [`SceneGraph`](super::SceneGraph).
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub name: String,
    pub nodes: Vec<ModelNode>,
    pub roots: Vec<usize>,
    pub geometries: Vec<MeshGeometry>,
    pub textures: Vec<TextureImage>,
    pub materials: Vec<Material>,
}

#[derive(Clone, Debug, Default)]
pub struct ModelNode {
    pub name: String,
    pub transform: Transform,
    pub children: Vec<usize>,
    pub primitives: Vec<ModelPrimitive>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelPrimitive {
    pub geometry: usize,
    pub material: Option<usize>,
}

impl Model {
    /// Number of drawable primitives across all nodes.
    pub fn primitive_count(&self) -> usize {
        self.nodes.iter().map(|n| n.primitives.len()).sum()
    }
}
