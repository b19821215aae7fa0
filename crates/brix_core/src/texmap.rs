//! `!TEXMAP` texture mappings and UV projection.
//!
//! A mapping defines an orthonormal frame from three control points and
//! projects points into `(u, v)`:
//!
//! - **planar**: `P1` is the origin, `P2` the end of the u axis, `P3` the
//!   end of the v axis
//! - **cylindrical**: `P1` top of the axis, `P2` bottom, `P3` the front
//!   direction, plus the horizontal wrap angle
//! - **spherical**: `P1` centre, `P2` front, `P3` up reference, plus the
//!   horizontal and vertical wrap angles
//!
//! `v` is measured from the far control point and negated so the UV origin
//! is the top-left corner of the image (LDraw up is `-y`).

use std::collections::HashMap;
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use brix_math::{Vec2, Vec3};
use thiserror::Error;

const EPSILON: f32 = 1e-6;

/// Errors that can occur while parsing `!TEXMAP START/NEXT` parameters.
#[derive(Error, Debug, PartialEq)]
pub enum TexmapError {
    #[error("unknown projection method: {0}")]
    UnknownMethod(String),

    #[error("expected {expected} parameters for {method}, found {found}")]
    Arity {
        method: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("degenerate control points for {0} projection")]
    Degenerate(&'static str),
}

/// Result type for texture mapping operations.
pub type TexmapResult<T> = Result<T, TexmapError>;

/// Session-unique texture mapping identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TexmapId(pub u32);

impl fmt::Display for TexmapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texmap{}", self.0)
    }
}

/// Projection method with its control geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Planar {
        points: [Vec3; 3],
    },
    Cylindrical {
        points: [Vec3; 3],
        angle: f32,
    },
    Spherical {
        points: [Vec3; 3],
        angle1: f32,
        angle2: f32,
    },
}

impl Projection {
    /// Parse `<method> <params...>` and return the projection with the
    /// number of tokens consumed.
    fn parse(tokens: &[&str]) -> TexmapResult<(Self, usize)> {
        let method = tokens
            .first()
            .ok_or_else(|| TexmapError::UnknownMethod(String::new()))?;
        let (name, count) = match method.to_ascii_uppercase().as_str() {
            "PLANAR" => ("planar", 9),
            "CYLINDRICAL" => ("cylindrical", 10),
            "SPHERICAL" => ("spherical", 11),
            _ => return Err(TexmapError::UnknownMethod(method.to_string())),
        };

        let params = &tokens[1..];
        // Texture name must follow the numbers.
        if params.len() < count + 1 {
            return Err(TexmapError::Arity {
                method: name,
                expected: count,
                found: params.len().saturating_sub(1),
            });
        }
        let values = params[..count]
            .iter()
            .map(|s| {
                s.parse::<f32>()
                    .map_err(|_| TexmapError::InvalidNumber(s.to_string()))
            })
            .collect::<TexmapResult<Vec<f32>>>()?;

        let points = [
            Vec3::new(values[0], values[1], values[2]),
            Vec3::new(values[3], values[4], values[5]),
            Vec3::new(values[6], values[7], values[8]),
        ];
        let projection = match name {
            "planar" => Projection::Planar { points },
            "cylindrical" => Projection::Cylindrical {
                points,
                angle: values[9],
            },
            _ => Projection::Spherical {
                points,
                angle1: values[9],
                angle2: values[10],
            },
        };
        Ok((projection, count + 1))
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            Projection::Planar { .. } => "planar",
            Projection::Cylindrical { .. } => "cylindrical",
            Projection::Spherical { .. } => "spherical",
        }
    }
}

/// Precomputed orthonormal frame of a projection.
#[derive(Clone, Debug)]
enum Frame {
    Planar {
        origin: Vec3,
        v_origin: Vec3,
        u_axis: Vec3,
        u_length: f32,
        v_axis: Vec3,
        v_length: f32,
    },
    Cylindrical {
        top: Vec3,
        base: Vec3,
        up: Vec3,
        up_length: f32,
        front: Vec3,
        side: Vec3,
        wrap: f32,
    },
    Spherical {
        center: Vec3,
        front: Vec3,
        up: Vec3,
        side: Vec3,
        wrap_u: f32,
        wrap_v: f32,
    },
}

impl Frame {
    fn new(projection: &Projection) -> TexmapResult<Self> {
        match *projection {
            Projection::Planar { points: [a, b, c] } => {
                let ab = b - a;
                let ac = c - a;
                let (u_length, v_length) = (ab.length(), ac.length());
                if u_length < EPSILON || v_length < EPSILON {
                    return Err(TexmapError::Degenerate("planar"));
                }
                Ok(Frame::Planar {
                    origin: a,
                    v_origin: c,
                    u_axis: ab / u_length,
                    u_length,
                    v_axis: ac / v_length,
                    v_length,
                })
            }
            Projection::Cylindrical {
                points: [a, b, c],
                angle,
            } => {
                let up = a - b;
                let up_length = up.length();
                let front = (c - b).normalize_or_zero();
                let side = front.cross(up).normalize_or_zero();
                if up_length < EPSILON || side == Vec3::ZERO || angle.abs() < EPSILON {
                    return Err(TexmapError::Degenerate("cylindrical"));
                }
                Ok(Frame::Cylindrical {
                    top: a,
                    base: b,
                    up: up / up_length,
                    up_length,
                    front,
                    side,
                    wrap: 360.0 / angle,
                })
            }
            Projection::Spherical {
                points: [a, b, c],
                angle1,
                angle2,
            } => {
                let front = (b - a).normalize_or_zero();
                let up = front.cross(c - a).normalize_or_zero();
                let side = up.cross(front).normalize_or_zero();
                if up == Vec3::ZERO
                    || side == Vec3::ZERO
                    || angle1.abs() < EPSILON
                    || angle2.abs() < EPSILON
                {
                    return Err(TexmapError::Degenerate("spherical"));
                }
                Ok(Frame::Spherical {
                    center: a,
                    front,
                    up,
                    side,
                    wrap_u: 360.0 / angle1,
                    wrap_v: 180.0 / angle2,
                })
            }
        }
    }

    fn project(&self, p: Vec3) -> Vec2 {
        match *self {
            Frame::Planar {
                origin,
                v_origin,
                u_axis,
                u_length,
                v_axis,
                v_length,
            } => {
                let u = u_axis.dot(p - origin) / u_length;
                let v = v_axis.dot(p - v_origin) / v_length;
                Vec2::new(u, -v)
            }
            Frame::Cylindrical {
                top,
                base,
                up,
                up_length,
                front,
                side,
                wrap,
            } => {
                let height = up.dot(p - base);
                let in_plane = p - up * height - base;
                let angle = side.dot(in_plane).atan2(front.dot(in_plane)) / PI * wrap;
                let u = (0.5 + 0.5 * angle).clamp(0.0, 1.0);
                let v = up.dot(p - top) / up_length;
                Vec2::new(u, -v)
            }
            Frame::Spherical {
                center,
                front,
                up,
                side,
                wrap_u,
                wrap_v,
            } => {
                let direction = p - center;
                let height = up.dot(direction);
                let in_plane = direction - up * height;
                let angle_u = side.dot(in_plane).atan2(front.dot(in_plane)) / PI * wrap_u;
                let distance = direction.length();
                let angle_v = if distance > EPSILON {
                    (height / distance).clamp(-1.0, 1.0).asin() / PI * wrap_v
                } else {
                    0.0
                };
                let v = -0.5 - angle_v;
                Vec2::new(0.5 + 0.5 * angle_u, -v)
            }
        }
    }
}

/// One `!TEXMAP` projection context.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureMapping {
    pub id: TexmapId,
    pub projection: Projection,

    /// Texture image name
    pub texture: String,

    /// Optional gloss map image name
    pub glossmap: Option<String>,
}

impl TextureMapping {
    /// Parse the tokens following `!TEXMAP START` / `!TEXMAP NEXT`.
    ///
    /// Accepts both `<texture> GLOSSMAP <gloss>` and `<texture>,<gloss>`.
    pub fn parse(id: TexmapId, tokens: &[&str]) -> TexmapResult<Self> {
        let (projection, consumed) = Projection::parse(tokens)?;
        Frame::new(&projection)?;

        let rest = &tokens[consumed..];
        let (texture, mut glossmap) = match rest[0].split_once(',') {
            Some((texture, gloss)) if !gloss.is_empty() => {
                (texture.to_string(), Some(gloss.to_string()))
            }
            Some((texture, _)) => (texture.to_string(), None),
            None => (rest[0].to_string(), None),
        };
        if rest.len() >= 3 && rest[1].eq_ignore_ascii_case("GLOSSMAP") {
            glossmap = Some(rest[2].to_string());
        }

        Ok(Self {
            id,
            projection,
            texture,
            glossmap,
        })
    }
}

/// Computes and memoizes UVs for one mapping.
///
/// UVs are cached by exact vertex coordinate so faces sharing a vertex
/// get the identical UV.
#[derive(Debug)]
pub struct TextureProjector {
    mapping: Arc<TextureMapping>,
    frame: Frame,
    uvs: HashMap<[u32; 3], Vec2>,
}

impl TextureProjector {
    pub fn new(mapping: Arc<TextureMapping>) -> TexmapResult<Self> {
        let frame = Frame::new(&mapping.projection)?;
        Ok(Self {
            mapping,
            frame,
            uvs: HashMap::new(),
        })
    }

    pub fn mapping(&self) -> &Arc<TextureMapping> {
        &self.mapping
    }

    /// UV of a single point in the mapping's space.
    pub fn project_point(&mut self, p: Vec3) -> Vec2 {
        let frame = &self.frame;
        *self
            .uvs
            .entry([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
            .or_insert_with(|| frame.project(p))
    }

    /// Per-vertex UVs of a face.
    pub fn project(&mut self, vertices: &[Vec3]) -> Vec<Vec2> {
        vertices.iter().map(|&p| self.project_point(p)).collect()
    }

    /// Number of memoized vertices.
    pub fn cached_len(&self) -> usize {
        self.uvs.len()
    }
}

/// Session-scoped registry of texture mappings and their projectors.
#[derive(Debug, Default)]
pub struct TexmapRegistry {
    next_id: u32,
    projectors: HashMap<TexmapId, TextureProjector>,
}

impl TexmapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and register a mapping, returning its fresh id.
    pub fn register(&mut self, tokens: &[&str]) -> TexmapResult<TexmapId> {
        let id = TexmapId(self.next_id);
        let mapping = Arc::new(TextureMapping::parse(id, tokens)?);
        self.projectors.insert(id, TextureProjector::new(mapping)?);
        self.next_id += 1;
        Ok(id)
    }

    pub fn get(&self, id: TexmapId) -> Option<&Arc<TextureMapping>> {
        self.projectors.get(&id).map(TextureProjector::mapping)
    }

    pub fn projector_mut(&mut self, id: TexmapId) -> Option<&mut TextureProjector> {
        self.projectors.get_mut(&id)
    }

    /// Registered mappings in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TextureMapping>> + '_ {
        (0..self.next_id).filter_map(move |id| self.get(TexmapId(id)))
    }

    pub fn len(&self) -> usize {
        self.projectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectors.is_empty()
    }

    /// Forget every mapping; ids restart at zero.
    pub fn clear(&mut self) {
        self.projectors.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    fn projector(s: &str) -> TextureProjector {
        let mapping = TextureMapping::parse(TexmapId(0), &tokens(s)).unwrap();
        TextureProjector::new(Arc::new(mapping)).unwrap()
    }

    #[test]
    fn test_parse_planar() {
        let mapping =
            TextureMapping::parse(TexmapId(3), &tokens("PLANAR 0 0 0 1 0 0 0 1 0 tex.png")).unwrap();
        assert_eq!(mapping.projection.method_name(), "planar");
        assert_eq!(mapping.texture, "tex.png");
        assert_eq!(mapping.glossmap, None);
    }

    #[test]
    fn test_parse_glossmap_forms() {
        let keyword = TextureMapping::parse(
            TexmapId(0),
            &tokens("planar 0 0 0 1 0 0 0 1 0 tex.png GLOSSMAP gloss.png"),
        )
        .unwrap();
        assert_eq!(keyword.glossmap.as_deref(), Some("gloss.png"));

        let comma =
            TextureMapping::parse(TexmapId(0), &tokens("planar 0 0 0 1 0 0 0 1 0 tex.png,gloss.png"))
                .unwrap();
        assert_eq!(comma.texture, "tex.png");
        assert_eq!(comma.glossmap.as_deref(), Some("gloss.png"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            TextureMapping::parse(TexmapId(0), &tokens("conical 0 0 0 tex.png")).unwrap_err(),
            TexmapError::UnknownMethod("conical".to_string())
        );
        assert!(matches!(
            TextureMapping::parse(TexmapId(0), &tokens("cylindrical 0 0 0 1 0 0 0 1 0 tex.png")),
            Err(TexmapError::Arity { .. })
        ));
        assert_eq!(
            TextureMapping::parse(TexmapId(0), &tokens("planar 0 0 0 0 0 0 0 1 0 tex.png")).unwrap_err(),
            TexmapError::Degenerate("planar")
        );
    }

    #[test]
    fn test_planar_projection() {
        let mut p = projector("planar 0 0 0 1 0 0 0 1 0 tex.png");

        // Origin maps to the bottom-left of the far edge convention
        let uv = p.project_point(Vec3::ZERO);
        assert!((uv - Vec2::new(0.0, 1.0)).length() < 0.001);

        let uv = p.project_point(Vec3::new(1.0, 1.0, 0.0));
        assert!((uv - Vec2::new(1.0, 0.0)).length() < 0.001);

        let uv = p.project_point(Vec3::new(0.5, 0.25, 7.0));
        assert!((uv - Vec2::new(0.5, 0.75)).length() < 0.001);
    }

    #[test]
    fn test_planar_memoizes_shared_vertices() {
        let mut p = projector("planar 0 0 0 20 0 0 0 0 20 tex.png");
        let first = p.project(&[Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 20.0)]);
        let second = p.project(&[Vec3::new(20.0, 0.0, 20.0), Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO]);

        assert_eq!(first[2], second[0]);
        assert_eq!(first[0], second[2]);
        assert_eq!(p.cached_len(), 4);
    }

    #[test]
    fn test_cylindrical_projection() {
        // Axis from (0,-10,0) down to origin, front towards +z, full wrap
        let mut p = projector("cylindrical 0 -10 0 0 0 0 0 0 1 360 tex.png");

        let front = p.project_point(Vec3::new(0.0, 0.0, 1.0));
        assert!((front.x - 0.5).abs() < 0.001);
        // Bottom of the axis is one full height below the top
        assert!((front.y - 1.0).abs() < 0.001);

        let top = p.project_point(Vec3::new(0.0, -10.0, 1.0));
        assert!(top.y.abs() < 0.001);

        let side = p.project_point(Vec3::new(1.0, -5.0, 0.0));
        assert!((side.x - 0.5).abs() > 0.2);
        assert!((0.0..=1.0).contains(&side.x));
        assert!((side.y - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_spherical_projection() {
        let mut p = projector("spherical 0 0 0 0 0 1 1 0 0 360 180 tex.png");

        // Straight ahead lands in the middle of the image
        let front = p.project_point(Vec3::new(0.0, 0.0, 5.0));
        assert!((front - Vec2::new(0.5, 0.5)).length() < 0.001);

        let off_axis = p.project_point(Vec3::new(0.0, 5.0, 5.0));
        assert!((off_axis.y - 0.5).abs() > 0.1);
    }

    #[test]
    fn test_registry_ids_and_clear() {
        let mut registry = TexmapRegistry::new();
        let a = registry.register(&tokens("planar 0 0 0 1 0 0 0 1 0 a.png")).unwrap();
        let b = registry.register(&tokens("planar 0 0 0 1 0 0 0 1 0 b.png")).unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.get(b).unwrap().texture, "b.png");
        assert!(registry.register(&tokens("planar 0 0 0 x 0 0 0 1 0 c.png")).is_err());
        assert_eq!(registry.len(), 2);
        let textures: Vec<_> = registry.iter().map(|m| m.texture.as_str()).collect();
        assert_eq!(textures, vec!["a.png", "b.png"]);

        registry.clear();
        assert!(registry.is_empty());
        let c = registry.register(&tokens("planar 0 0 0 1 0 0 0 1 0 c.png")).unwrap();
        assert_eq!(c, TexmapId(0));
    }
}
