// Re-export glam for convenience
pub use glam::*;

// brix math types
mod aabb;
mod interval;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use transform::{ldraw_matrix, Mat4Ext};
