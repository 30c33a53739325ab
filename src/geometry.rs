//! CPU-side mesh geometry.
//!
//! [`MeshGeometry`] holds indexed triangle data in the [`Vertex3d`] layout used
//! by the scene pass. Loaders produce it; the renderer uploads it once and
//! keeps the GPU copy for the lifetime of the scene.

use glam::Vec3;

/// A vertex with position, normal and texture coordinates (32 bytes).
///
/// | Attribute | Format    | Offset | Location |
/// |-----------|-----------|--------|----------|
/// | position  | Float32x3 | 0      | 0        |
/// | normal    | Float32x3 | 12     | 1        |
/// | uv        | Float32x2 | 24     | 2        |
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

impl MeshGeometry {
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Build from separate attribute streams. Missing normals are computed from
    /// the faces, missing UVs default to zero, and a missing index buffer
    /// means the positions are already a triangle list.
    pub fn from_attributes(
        positions: Vec<[f32; 3]>,
        normals: Option<Vec<[f32; 3]>>,
        uvs: Option<Vec<[f32; 2]>>,
        indices: Option<Vec<u32>>,
    ) -> Self {
        let has_normals = normals
            .as_ref()
            .is_some_and(|n| n.len() == positions.len());
        let normals = normals.filter(|_| has_normals);
        let uvs = uvs.filter(|uv| uv.len() == positions.len());

        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| Vertex3d {
                position,
                normal: normals.as_ref().map_or([0.0; 3], |n| n[i]),
                uv: uvs.as_ref().map_or([0.0; 2], |uv| uv[i]),
            })
            .collect();

        let indices = indices.unwrap_or_else(|| (0..positions.len() as u32).collect());

        let mut geometry = Self { vertices, indices };
        if !has_normals {
            geometry.recalculate_normals();
        }
        geometry
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Replace all normals with area-weighted face normals.
    pub fn recalculate_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = [0.0, 0.0, 0.0];
        }

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if i0 >= self.vertices.len() || i1 >= self.vertices.len() || i2 >= self.vertices.len()
            {
                continue;
            }

            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            let face_normal = (p1 - p0).cross(p2 - p0);

            for i in [i0, i1, i2] {
                let n = Vec3::from(self.vertices[i].normal) + face_normal;
                self.vertices[i].normal = n.into();
            }
        }

        for v in &mut self.vertices {
            v.normal = Vec3::from(v.normal).normalize_or_zero().into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Vertex3d>(), 32);
    }

    #[test]
    fn missing_normals_are_computed_from_faces() {
        let geometry = MeshGeometry::from_attributes(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            None,
            None,
            Some(vec![0, 1, 2]),
        );
        for v in &geometry.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
            assert_eq!(v.uv, [0.0, 0.0]);
        }
    }

    #[test]
    fn unindexed_positions_become_a_triangle_list() {
        let geometry = MeshGeometry::from_attributes(
            vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]],
            Some(vec![[0.0, 1.0, 0.0]; 3]),
            None,
            None,
        );
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        assert_eq!(geometry.triangle_count(), 1);
        assert_eq!(geometry.vertices[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn shared_vertices_average_their_face_normals() {
        // Two triangles folded 90 degrees along the X axis.
        let mut geometry = MeshGeometry::new(
            vec![
                Vertex3d::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
                Vertex3d::new([1.0, 0.0, 0.0], [0.0; 3], [0.0; 2]),
                Vertex3d::new([0.0, 0.0, -1.0], [0.0; 3], [0.0; 2]),
                Vertex3d::new([0.0, 1.0, 0.0], [0.0; 3], [0.0; 2]),
            ],
            vec![0, 1, 2, 0, 1, 3],
        );
        geometry.recalculate_normals();

        let up = Vec3::from(geometry.vertices[2].normal);
        assert!((up - Vec3::Y).length() < 1e-6, "{up}");
        let shared = Vec3::from(geometry.vertices[0].normal);
        let expected = Vec3::new(0.0, 1.0, 1.0).normalize();
        assert!((shared - expected).length() < 1e-6, "{shared}");
    }
}
