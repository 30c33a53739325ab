//! The scene graph.
//!
//! Nodes are `hecs` entities. Every node carries a [`Node`] (name and
//! hierarchy links) and a local [`Transform`]; mesh nodes add a [`Mesh`] and
//! [`Shadows`], the light adds a [`DirectionalLight`]. Geometry and texture
//! data live in append-only arenas on the [`SceneGraph`] and are referenced by
//! [`GeometryId`] / [`TextureId`], so ids stay valid for the scene's lifetime.
//!
//! Loaders do not touch the graph directly: they produce a detached [`Model`]
//! which [`SceneGraph::add_model`] spawns under a new root node.

mod model;

use std::sync::Arc;

use glam::{Mat4, Quat, UVec2, Vec3, Vec4};
use hecs::{Entity, World};

use crate::environment::EnvironmentMap;
use crate::geometry::MeshGeometry;

pub use model::{Model, ModelNode, ModelPrimitive};

/// Index into the scene's geometry arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeometryId(pub usize);

/// Index into the scene's texture arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// Texture slots of a [`Material`]. An empty slot samples white, so the
/// matching factor is used as is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MaterialTextures {
    pub base_color: Option<TextureId>,
    /// Roughness in green, metalness in blue.
    pub metallic_roughness: Option<TextureId>,
    pub emissive: Option<TextureId>,
}

impl MaterialTextures {
    /// Every bound texture, in slot order.
    pub fn bound(&self) -> impl Iterator<Item = TextureId> {
        [self.base_color, self.metallic_roughness, self.emissive]
            .into_iter()
            .flatten()
    }

    /// Shift every slot by `base`, for textures appended to a larger arena.
    pub fn offset(self, base: usize) -> Self {
        let shift = |slot: Option<TextureId>| slot.map(|id| TextureId(id.0 + base));
        Self {
            base_color: shift(self.base_color),
            metallic_roughness: shift(self.metallic_roughness),
            emissive: shift(self.emissive),
        }
    }

    /// Drop slots that point past the first `count` textures.
    pub fn within(self, count: usize) -> Self {
        let keep = |slot: Option<TextureId>| slot.filter(|id| id.0 < count);
        Self {
            base_color: keep(self.base_color),
            metallic_roughness: keep(self.metallic_roughness),
            emissive: keep(self.emissive),
        }
    }
}

/// Decoded RGBA8 image used as a material texture.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    /// True for color data, false for data textures such as roughness maps.
    pub srgb: bool,
}

/// Position, rotation and scale relative to the parent node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Name and hierarchy links of a scene node.
#[derive(Clone, Debug, Default)]
pub struct Node {
    pub name: String,
    pub parent: Option<Entity>,
    pub children: Vec<Entity>,
}

/// Metallic-roughness surface description.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA multiplier.
    pub base_color: Vec4,
    pub textures: MaterialTextures,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    /// Scale applied to image-based lighting on this material.
    pub env_map_intensity: f32,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec4::ONE,
            textures: MaterialTextures::default(),
            metallic: 1.0,
            roughness: 1.0,
            emissive: Vec3::ZERO,
            env_map_intensity: 1.0,
            double_sided: false,
        }
    }
}

/// A drawable node: geometry plus its material.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub geometry: GeometryId,
    pub material: Material,
}

/// Shadow participation of a mesh node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Shadows {
    pub cast: bool,
    pub receive: bool,
}

/// Orthographic frustum and map settings of a directional light's shadow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalShadow {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub map_size: UVec2,
    pub bias: f32,
}

impl DirectionalShadow {
    /// Light-space view-projection for a light at `position` aimed at `target`.
    pub fn view_projection(&self, position: Vec3, target: Vec3) -> Mat4 {
        let direction = (target - position).normalize_or(Vec3::NEG_Y);
        let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(position, target, up);
        let projection = Mat4::orthographic_rh(
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        );
        projection * view
    }
}

/// A light shining from its node's position toward `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub target: Vec3,
    pub shadow: Option<DirectionalShadow>,
}

/// Everything the renderer needs to draw one mesh node.
#[derive(Clone, Debug)]
pub struct MeshDraw {
    pub entity: Entity,
    pub geometry: GeometryId,
    pub material: Material,
    pub world: Mat4,
    pub shadows: Shadows,
}

/// The light as seen by the renderer, resolved to world space.
#[derive(Clone, Debug)]
pub struct LightDraw {
    pub position: Vec3,
    pub light: DirectionalLight,
}

/// Hierarchical node container.
#[derive(Default)]
pub struct SceneGraph {
    world: World,
    roots: Vec<Entity>,
    geometries: Vec<MeshGeometry>,
    textures: Vec<TextureImage>,
    /// Drawn behind everything.
    pub background: Option<Arc<EnvironmentMap>>,
    /// Image-based lighting source for every material.
    pub environment: Option<Arc<EnvironmentMap>>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a node with no parent.
    pub fn spawn(&mut self, name: impl Into<String>, transform: Transform) -> Entity {
        let entity = self.world.spawn((
            Node {
                name: name.into(),
                parent: None,
                children: Vec::new(),
            },
            transform,
        ));
        self.roots.push(entity);
        entity
    }

    /// Spawn a node under `parent`. Returns `None` if `parent` does not exist.
    pub fn spawn_child(
        &mut self,
        parent: Entity,
        name: impl Into<String>,
        transform: Transform,
    ) -> Option<Entity> {
        if !self.world.contains(parent) {
            return None;
        }
        let entity = self.world.spawn((
            Node {
                name: name.into(),
                parent: Some(parent),
                children: Vec::new(),
            },
            transform,
        ));
        if let Ok(mut node) = self.world.get::<&mut Node>(parent) {
            node.children.push(entity);
        }
        Some(entity)
    }

    /// Attach a component to an existing node.
    pub fn insert<C: hecs::Component>(&mut self, entity: Entity, component: C) -> bool {
        self.world.insert_one(entity, component).is_ok()
    }

    pub fn get<T: hecs::Component>(&self, entity: Entity) -> Option<hecs::Ref<'_, T>> {
        self.world.get::<&T>(entity).ok()
    }

    pub fn get_mut<T: hecs::Component>(&self, entity: Entity) -> Option<hecs::RefMut<'_, T>> {
        self.world.get::<&mut T>(entity).ok()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn roots(&self) -> &[Entity] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }

    pub fn add_geometry(&mut self, geometry: MeshGeometry) -> GeometryId {
        self.geometries.push(geometry);
        GeometryId(self.geometries.len() - 1)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&MeshGeometry> {
        self.geometries.get(id.0)
    }

    pub fn geometries(&self) -> &[MeshGeometry] {
        &self.geometries
    }

    pub fn add_texture(&mut self, texture: TextureImage) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureImage> {
        self.textures.get(id.0)
    }

    pub fn textures(&self) -> &[TextureImage] {
        &self.textures
    }

    /// `root` and all of its descendants, depth-first, parents before children.
    pub fn descendants(&self, root: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(entity) = stack.pop() {
            let Some(node) = self.get::<Node>(entity) else {
                continue;
            };
            out.push(entity);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Visit every node depth-first, root by root.
    pub fn traverse(&self, mut visit: impl FnMut(Entity)) {
        for &root in &self.roots {
            for entity in self.descendants(root) {
                visit(entity);
            }
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Entity> {
        let mut found = None;
        self.traverse(|entity| {
            if found.is_none() && self.get::<Node>(entity).is_some_and(|n| n.name == name) {
                found = Some(entity);
            }
        });
        found
    }

    /// Local-to-world matrix of a node.
    pub fn world_matrix(&self, entity: Entity) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(entity);
        while let Some(e) = current {
            if let Some(transform) = self.get::<Transform>(e) {
                matrix = transform.matrix() * matrix;
            }
            current = self.get::<Node>(e).and_then(|n| n.parent);
        }
        matrix
    }

    /// Spawn a loaded model under a new root node named after the model.
    ///
    /// Nodes with a single primitive become mesh nodes themselves; nodes with
    /// several primitives get one child mesh node per primitive.
    pub fn add_model(&mut self, model: Model) -> Entity {
        let geometry_base = self.geometries.len();
        let texture_base = self.textures.len();
        self.geometries.extend(model.geometries);
        self.textures.extend(model.textures);

        let materials: Vec<Material> = model
            .materials
            .into_iter()
            .map(|mut material| {
                material.textures = material.textures.offset(texture_base);
                material
            })
            .collect();

        let root = self.spawn(model.name, Transform::default());
        let mut stack: Vec<(usize, Entity)> =
            model.roots.iter().rev().map(|&i| (i, root)).collect();

        while let Some((index, parent)) = stack.pop() {
            let Some(source) = model.nodes.get(index) else {
                continue;
            };
            let Some(entity) = self.spawn_child(parent, source.name.clone(), source.transform)
            else {
                continue;
            };

            let meshes = source.primitives.iter().map(|primitive| Mesh {
                geometry: GeometryId(primitive.geometry + geometry_base),
                material: primitive
                    .material
                    .and_then(|m| materials.get(m).cloned())
                    .unwrap_or_default(),
            });

            if source.primitives.len() == 1 {
                if let Some(mesh) = meshes.into_iter().next() {
                    self.insert(entity, mesh);
                }
            } else {
                for (i, mesh) in meshes.enumerate() {
                    let name = format!("{}_{i}", source.name);
                    if let Some(child) = self.spawn_child(entity, name, Transform::default()) {
                        self.insert(child, mesh);
                    }
                }
            }

            for &child in source.children.iter().rev() {
                stack.push((child, entity));
            }
        }

        root
    }

    /// Resolve every mesh node to world space, in traversal order.
    pub fn mesh_draws(&self) -> Vec<MeshDraw> {
        let mut draws = Vec::new();
        self.traverse(|entity| {
            if let Some(mesh) = self.get::<Mesh>(entity) {
                draws.push(MeshDraw {
                    entity,
                    geometry: mesh.geometry,
                    material: mesh.material.clone(),
                    world: self.world_matrix(entity),
                    shadows: self.get::<Shadows>(entity).map(|s| *s).unwrap_or_default(),
                });
            }
        });
        draws
    }

    /// The first directional light in traversal order.
    pub fn directional_light(&self) -> Option<LightDraw> {
        let mut found = None;
        self.traverse(|entity| {
            if found.is_some() {
                return;
            }
            if let Some(light) = self.get::<DirectionalLight>(entity) {
                found = Some(LightDraw {
                    position: self.world_matrix(entity).w_axis.truncate(),
                    light: (*light).clone(),
                });
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshGeometry;

    fn single_mesh_model() -> Model {
        Model {
            name: "Scene".into(),
            nodes: vec![
                ModelNode {
                    name: "root".into(),
                    transform: Transform::from_position(Vec3::new(0.0, 5.0, 0.0)),
                    children: vec![1],
                    primitives: vec![],
                },
                ModelNode {
                    name: "head".into(),
                    transform: Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
                    children: vec![],
                    primitives: vec![ModelPrimitive {
                        geometry: 0,
                        material: Some(0),
                    }],
                },
            ],
            roots: vec![0],
            geometries: vec![MeshGeometry::from_attributes(
                vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
                None,
                None,
                None,
            )],
            textures: vec![],
            materials: vec![Material {
                name: "stone".into(),
                roughness: 0.5,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn descendants_are_depth_first_preorder() {
        let mut scene = SceneGraph::new();
        let a = scene.spawn("a", Transform::default());
        let b = scene.spawn_child(a, "b", Transform::default()).unwrap();
        let c = scene.spawn_child(b, "c", Transform::default()).unwrap();
        let d = scene.spawn_child(a, "d", Transform::default()).unwrap();
        assert_eq!(scene.descendants(a), vec![a, b, c, d]);
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = SceneGraph::new();
        let parent = scene.spawn("parent", Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
        let child = scene
            .spawn_child(parent, "child", Transform::from_position(Vec3::X))
            .unwrap();
        let origin = scene.world_matrix(child).transform_point3(Vec3::ZERO);
        assert_eq!(origin, Vec3::new(2.0, 2.0, 3.0));
    }

    #[test]
    fn add_model_spawns_single_primitive_as_mesh_node() {
        let mut scene = SceneGraph::new();
        let root = scene.add_model(single_mesh_model());

        let nodes = scene.descendants(root);
        assert_eq!(nodes.len(), 3);

        let head = scene.find_by_name("head").unwrap();
        let mesh = scene.get::<Mesh>(head).unwrap();
        assert_eq!(mesh.geometry, GeometryId(0));
        assert_eq!(mesh.material.name, "stone");
        assert!(scene.get::<Mesh>(scene.find_by_name("root").unwrap()).is_none());

        let draws = scene.mesh_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(
            draws[0].world.transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 5.0, 0.0)
        );
    }

    #[test]
    fn second_model_offsets_arena_ids() {
        let mut scene = SceneGraph::new();
        scene.add_model(single_mesh_model());
        let second = scene.add_model(single_mesh_model());
        assert_eq!(scene.geometries().len(), 2);

        let draws: Vec<_> = scene
            .mesh_draws()
            .into_iter()
            .filter(|d| scene.descendants(second).contains(&d.entity))
            .collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].geometry, GeometryId(1));
    }

    #[test]
    fn second_model_offsets_every_texture_slot() {
        let textured = || {
            let mut model = single_mesh_model();
            model.textures = (0..2)
                .map(|i| TextureImage {
                    label: format!("t{i}"),
                    width: 1,
                    height: 1,
                    rgba: vec![255; 4],
                    srgb: i == 0,
                })
                .collect();
            model.materials[0].textures = MaterialTextures {
                base_color: Some(TextureId(0)),
                metallic_roughness: Some(TextureId(1)),
                emissive: Some(TextureId(0)),
            };
            model
        };
        let mut scene = SceneGraph::new();
        scene.add_model(textured());
        scene.add_model(textured());
        assert_eq!(scene.textures().len(), 4);

        let slots: Vec<MaterialTextures> = scene
            .mesh_draws()
            .iter()
            .map(|d| d.material.textures)
            .collect();
        assert_eq!(slots[1].base_color, Some(TextureId(2)));
        assert_eq!(slots[1].metallic_roughness, Some(TextureId(3)));
        assert_eq!(slots[1].emissive, Some(TextureId(2)));
        assert_eq!(slots[1].bound().count(), 3);
        assert_eq!(slots[1].within(3).metallic_roughness, None);
    }

    #[test]
    fn multi_primitive_nodes_get_one_child_per_primitive() {
        let mut model = single_mesh_model();
        model.nodes[1].primitives.push(ModelPrimitive {
            geometry: 0,
            material: None,
        });
        let mut scene = SceneGraph::new();
        scene.add_model(model);

        let head = scene.find_by_name("head").unwrap();
        assert!(scene.get::<Mesh>(head).is_none());
        assert_eq!(scene.mesh_draws().len(), 2);
        assert!(scene.find_by_name("head_1").is_some());
    }

    #[test]
    fn light_position_comes_from_its_node() {
        let mut scene = SceneGraph::new();
        let light = scene.spawn(
            "Dir. Light",
            Transform::from_position(Vec3::new(-150.0, 500.0, 300.0)),
        );
        scene.insert(
            light,
            DirectionalLight {
                color: Vec3::ONE,
                intensity: 0.5,
                target: Vec3::ZERO,
                shadow: None,
            },
        );
        let resolved = scene.directional_light().unwrap();
        assert_eq!(resolved.position, Vec3::new(-150.0, 500.0, 300.0));
        assert_eq!(resolved.light.intensity, 0.5);
        assert_eq!(resolved.light.color, Vec3::ONE);
        assert_eq!(resolved.light.target, Vec3::ZERO);
    }
}
