// Transform utilities for LDraw matrices
//
// A type-1 line carries `x y z a b c d e f g h i`, the row-major 3x3
// rotation/scale block plus a translation. glam is column-major, so the
// rows are transposed into columns here.

use glam::{Mat4, Vec4};

use crate::Aabb;

/// Build an affine matrix from an LDraw translation and row-major 3x3 block.
pub fn ldraw_matrix(translation: [f32; 3], m: [f32; 9]) -> Mat4 {
    let [x, y, z] = translation;
    let [a, b, c, d, e, f, g, h, i] = m;
    Mat4::from_cols(
        Vec4::new(a, d, g, 0.0),
        Vec4::new(b, e, h, 0.0),
        Vec4::new(c, f, i, 0.0),
        Vec4::new(x, y, z, 1.0),
    )
}

/// Extension trait for Mat4 with the operations the resolver needs.
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::empty();
        }
        Aabb::from_iter(aabb.corners().iter().map(|&c| self.transform_point3(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_ldraw_matrix_translation() {
        let m = ldraw_matrix([10.0, 20.0, 30.0], [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let p = m.transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p, Vec3::new(11.0, 22.0, 33.0));
    }

    #[test]
    fn test_ldraw_matrix_rows() {
        // Row 0 is (a b c): x' = a*x + b*y + c*z
        let m = ldraw_matrix([0.0; 3], [0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let p = m.transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!((p - Vec3::new(2.0, -1.0, 3.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let aabb = Aabb::from_iter([Vec3::ZERO, Vec3::ONE]);
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.min() - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max() - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_empty_aabb() {
        let mat = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        assert!(mat.transform_aabb(&Aabb::empty()).is_empty());
    }
}
