//! Scene graph produced by an import.
//!
//! Shared part geometry is stored once as a [`Prototype`] and placed by
//! [`Instance`]s. Model boundaries become [`Group`]s, and meta-commands are
//! carried through as [`SceneDirective`]s for whoever builds the final scene.

use std::sync::Arc;

use brix_math::{Aabb, Mat4, Mat4Ext};

use crate::color::ColorDefinition;
use crate::geometry::{GeometryKey, ResolvedColor, ResolvedGeometry};
use crate::ldraw::parser::Warning;
use crate::ldraw::types::Directive;

/// Shared geometry of one `(colour, filename)` key.
#[derive(Clone, Debug)]
pub struct Prototype {
    /// Unique identifier within the scene
    pub id: usize,

    pub key: GeometryKey,

    /// Display name (the part's `Name:` header or filename)
    pub name: String,

    /// Shared geometry, same allocation as the session cache entry
    pub geometry: Arc<ResolvedGeometry>,

    /// Local bounding box (from geometry)
    pub bounds: Aabb,
}

impl Prototype {
    pub fn new(id: usize, key: GeometryKey, name: String, geometry: Arc<ResolvedGeometry>) -> Self {
        let bounds = geometry.bounds;
        Self {
            id,
            key,
            name,
            geometry,
            bounds,
        }
    }
}

/// One placement of a prototype.
#[derive(Clone, Debug)]
pub struct Instance {
    /// Index of the prototype this instance references
    pub prototype_id: usize,

    /// Placement relative to the enclosing group
    pub transform: Mat4,

    /// Placement in root space
    pub world_transform: Mat4,

    /// Enclosing group, `None` at the root
    pub group: Option<usize>,

    /// Colour the part was placed with
    pub color: ResolvedColor,
}

/// Grouping boundary opened for each placement of a model.
#[derive(Clone, Debug)]
pub struct Group {
    pub id: usize,
    pub name: String,
    pub parent: Option<usize>,

    /// Placement relative to the parent group
    pub transform: Mat4,

    /// Placement in root space
    pub world_transform: Mat4,
}

/// A meta-command positioned in the scene.
#[derive(Clone, Debug)]
pub struct SceneDirective {
    pub directive: Directive,

    /// Document the directive was declared in
    pub file: String,

    /// Group of that document's placement
    pub group: Option<usize>,

    /// Number of instances emitted before the directive
    pub instance_index: usize,
}

/// A resolved LDraw import.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Scene name (the root filename)
    pub name: String,

    pub prototypes: Vec<Arc<Prototype>>,
    pub instances: Vec<Instance>,
    pub groups: Vec<Group>,
    pub directives: Vec<SceneDirective>,

    /// Non-fatal problems met while importing
    pub warnings: Vec<Warning>,

    /// Colours loaded from a configuration root
    pub palette: Vec<ColorDefinition>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a prototype to the scene and return its ID.
    pub fn add_prototype(
        &mut self,
        key: GeometryKey,
        name: String,
        geometry: Arc<ResolvedGeometry>,
    ) -> usize {
        let id = self.prototypes.len();
        self.prototypes
            .push(Arc::new(Prototype::new(id, key, name, geometry)));
        id
    }

    /// Add an instance of a prototype.
    pub fn add_instance(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    /// Open a group and return its ID.
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        transform: Mat4,
        world_transform: Mat4,
    ) -> usize {
        let id = self.groups.len();
        self.groups.push(Group {
            id,
            name: name.into(),
            parent,
            transform,
            world_transform,
        });
        id
    }

    /// Find the prototype of a key.
    pub fn find_prototype(&self, key: &GeometryKey) -> Option<&Arc<Prototype>> {
        self.prototypes.iter().find(|p| &p.key == key)
    }

    /// Instances placing a given prototype.
    pub fn instances_of(&self, prototype_id: usize) -> impl Iterator<Item = &Instance> {
        self.instances
            .iter()
            .filter(move |i| i.prototype_id == prototype_id)
    }

    /// Get total instance count.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Get prototype count.
    pub fn prototype_count(&self) -> usize {
        self.prototypes.len()
    }

    /// Get total face count across all instances.
    pub fn total_face_count(&self) -> usize {
        self.instances
            .iter()
            .filter_map(|i| self.prototypes.get(i.prototype_id))
            .map(|p| p.geometry.face_count())
            .sum()
    }

    /// Get total triangle count across all instances.
    pub fn total_triangle_count(&self) -> usize {
        self.instances
            .iter()
            .filter_map(|i| self.prototypes.get(i.prototype_id))
            .map(|p| p.geometry.triangle_count())
            .sum()
    }

    /// Compute the world-space bounding box of all instances.
    pub fn world_bounds(&self) -> Aabb {
        self.instances
            .iter()
            .filter_map(|instance| {
                let proto = self.prototypes.get(instance.prototype_id)?;
                Some(instance.world_transform.transform_aabb(&proto.bounds))
            })
            .fold(Aabb::empty(), |acc, b| Aabb::surrounding(&acc, &b))
    }

    /// Check if the scene holds no geometry.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
