//! Flattened geometry produced by resolution.
//!
//! A [`ResolvedGeometry`] holds every face and edge of one part for one
//! inherited colour, in part-local space. Faces are stored as vertex-count
//! run-lengths into a shared position list, with one [`FaceInfo`] per face
//! in the same order, so downstream material assignment can match by index.

use std::fmt;

use brix_math::{Aabb, Vec2, Vec3};

use crate::color::{EDGE_COLOR, MAIN_COLOR};
use crate::texmap::TexmapId;

/// Colour after 16/24 inheritance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedColor {
    /// Nearest enclosing non-16 code (`"16"` when nothing overrides it)
    pub code: String,

    /// True when the edge colour of `code` is meant (code 24)
    pub edge: bool,
}

impl ResolvedColor {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            edge: false,
        }
    }

    /// The unresolved main colour.
    pub fn main() -> Self {
        Self::new(MAIN_COLOR)
    }

    /// Colour of a child declared with `code` under this colour.
    pub fn inherit(&self, code: &str) -> Self {
        match code {
            MAIN_COLOR => self.clone(),
            EDGE_COLOR => Self {
                code: self.code.clone(),
                edge: true,
            },
            other => Self::new(other),
        }
    }

    /// True when the main colour was never overridden.
    pub fn is_main(&self) -> bool {
        self.code == MAIN_COLOR
    }
}

impl fmt::Display for ResolvedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.edge {
            write!(f, "{}:edge", self.code)
        } else {
            f.write_str(&self.code)
        }
    }
}

/// Geometry cache key: inherited colour plus normalized filename.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub color: ResolvedColor,
    pub filename: String,
}

impl GeometryKey {
    pub fn new(color: ResolvedColor, filename: impl Into<String>) -> Self {
        Self {
            color,
            filename: filename.into(),
        }
    }
}

impl fmt::Display for GeometryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.color, self.filename)
    }
}

/// Per-face metadata, parallel to the face list.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceInfo {
    pub color: ResolvedColor,

    /// False for stud faces, which are never treated as sloped
    pub slope_allowed: bool,

    /// Texture mapping whose UVs the face carries
    pub texmap: Option<TexmapId>,
}

/// Flattened mesh of one `(colour, filename)` key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedGeometry {
    /// Face vertex positions, face after face
    pub positions: Vec<Vec3>,

    /// Vertex count of each face (3 or 4)
    pub face_sizes: Vec<u32>,

    /// Metadata of each face
    pub face_info: Vec<FaceInfo>,

    /// UV per position; `None` for untextured faces
    pub uvs: Vec<Option<Vec2>>,

    /// Edge endpoints, two per edge
    pub edge_positions: Vec<Vec3>,

    /// Colour of each edge
    pub edge_colors: Vec<ResolvedColor>,

    /// Bounds of faces and edges
    pub bounds: Aabb,
}

impl ResolvedGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a face. `uvs`, when given, must match `vertices` in length.
    pub fn push_face(&mut self, vertices: &[Vec3], info: FaceInfo, uvs: Option<&[Vec2]>) {
        for (i, &p) in vertices.iter().enumerate() {
            self.positions.push(p);
            self.uvs.push(uvs.and_then(|uvs| uvs.get(i).copied()));
            self.bounds.include(p);
        }
        self.face_sizes.push(vertices.len() as u32);
        self.face_info.push(info);
    }

    /// Append an edge segment.
    pub fn push_edge(&mut self, a: Vec3, b: Vec3, color: ResolvedColor) {
        self.edge_positions.extend([a, b]);
        self.edge_colors.push(color);
        self.bounds.include(a);
        self.bounds.include(b);
    }

    pub fn face_count(&self) -> usize {
        self.face_sizes.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_colors.len()
    }

    /// Check if there is neither a face nor an edge.
    pub fn is_empty(&self) -> bool {
        self.face_sizes.is_empty() && self.edge_colors.is_empty()
    }

    /// Check if any face carries UVs.
    pub fn has_uvs(&self) -> bool {
        self.uvs.iter().any(Option::is_some)
    }

    /// Iterate over faces as (vertices, metadata).
    pub fn faces(&self) -> impl Iterator<Item = (&[Vec3], &FaceInfo)> + '_ {
        self.face_sizes
            .iter()
            .scan(0usize, |offset, &size| {
                let start = *offset;
                *offset += size as usize;
                Some(start..*offset)
            })
            .zip(&self.face_info)
            .map(move |(range, info)| (&self.positions[range], info))
    }

    /// UVs of one face, if it is textured.
    pub fn face_uvs(&self, face: usize) -> Option<Vec<Vec2>> {
        let size = *self.face_sizes.get(face)? as usize;
        let start: usize = self.face_sizes[..face].iter().map(|&s| s as usize).sum();
        self.uvs[start..start + size].iter().copied().collect()
    }

    /// Positions as a flat `[x, y, z, x, y, z, ...]` slice.
    pub fn positions_flat(&self) -> &[f32] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Fan triangulation of the faces into position indices.
    pub fn triangulate(&self) -> Vec<u32> {
        let mut indices = Vec::new();
        let mut vertex_offset = 0u32;

        for &count in &self.face_sizes {
            if count < 3 {
                vertex_offset += count;
                continue;
            }

            // (0,1,2), (0,2,3), ... (0,n-2,n-1)
            for i in 1..(count - 1) {
                indices.push(vertex_offset);
                indices.push(vertex_offset + i);
                indices.push(vertex_offset + i + 1);
            }

            vertex_offset += count;
        }

        indices
    }

    /// Number of triangles after fan triangulation.
    pub fn triangle_count(&self) -> usize {
        self.face_sizes
            .iter()
            .map(|&count| count.saturating_sub(2) as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(code: &str) -> FaceInfo {
        FaceInfo {
            color: ResolvedColor::new(code),
            slope_allowed: true,
            texmap: None,
        }
    }

    #[test]
    fn test_color_inheritance() {
        let red = ResolvedColor::new("4");
        assert_eq!(red.inherit("16"), red);
        assert_eq!(
            red.inherit("24"),
            ResolvedColor {
                code: "4".to_string(),
                edge: true
            }
        );
        assert_eq!(red.inherit("1"), ResolvedColor::new("1"));
        assert!(ResolvedColor::main().inherit("16").is_main());
    }

    #[test]
    fn test_key_display() {
        let key = GeometryKey::new(ResolvedColor::new("4"), "3001.dat");
        assert_eq!(key.to_string(), "4_3001.dat");
    }

    #[test]
    fn test_push_and_iterate_faces() {
        let mut geometry = ResolvedGeometry::new();
        geometry.push_face(&[Vec3::ZERO, Vec3::X, Vec3::Y], info("4"), None);
        geometry.push_face(
            &[Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            info("1"),
            Some(&[Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y]),
        );

        assert_eq!(geometry.face_count(), 2);
        assert_eq!(geometry.vertex_count(), 7);
        let sizes: Vec<usize> = geometry.faces().map(|(v, _)| v.len()).collect();
        assert_eq!(sizes, vec![3, 4]);
        assert_eq!(geometry.faces().nth(1).unwrap().1.color.code, "1");

        assert!(geometry.has_uvs());
        assert_eq!(geometry.face_uvs(0), None);
        assert_eq!(geometry.face_uvs(1).unwrap()[2], Vec2::ONE);
        assert_eq!(geometry.positions_flat().len(), 21);
    }

    #[test]
    fn test_triangulate() {
        let mut geometry = ResolvedGeometry::new();
        geometry.push_face(&[Vec3::ZERO, Vec3::X, Vec3::Y], info("4"), None);
        geometry.push_face(&[Vec3::ZERO, Vec3::X, Vec3::ONE, Vec3::Y], info("4"), None);

        assert_eq!(geometry.triangulate(), vec![0, 1, 2, 3, 4, 5, 3, 5, 6]);
        assert_eq!(geometry.triangle_count(), 3);
    }

    #[test]
    fn test_edges_and_bounds() {
        let mut geometry = ResolvedGeometry::new();
        assert!(geometry.is_empty());
        geometry.push_edge(Vec3::ZERO, Vec3::new(0.0, -24.0, 0.0), ResolvedColor::new("0"));

        assert_eq!(geometry.edge_count(), 1);
        assert_eq!(geometry.face_count(), 0);
        assert!(!geometry.is_empty());
        assert!((geometry.bounds.min().y + 24.0).abs() < 0.001);
    }
}
