//! Resolution of an LDraw reference tree into a [`Scene`].
//!
//! The walk is an explicit work list rather than recursion. Each visited
//! document is classified and handled as one of:
//!
//! - **model-like**: opens a [`Group`](crate::scene::Group) per placement;
//!   placements below it are expressed relative to that group
//! - **part** with no open accumulator: served from the geometry cache keyed
//!   by `(inherited colour, filename)`, or walked into a new accumulator in
//!   part-local space
//! - anything inside an open accumulator: merged into it under the
//!   accumulated transform
//! - **configuration**: never turned into geometry
//!
//! A missing file is a warning and the walk continues. A reference cycle or
//! a missing root aborts the import.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use brix_math::{Mat4, Vec3};
use thiserror::Error;

use crate::geometry::{FaceInfo, GeometryKey, ResolvedColor, ResolvedGeometry};
use crate::ldraw::parser::{is_edge_logo, is_stud_file, Warning, WarningKind};
use crate::ldraw::part_type::PartType;
use crate::ldraw::store::{FileResolver, StoreError};
use crate::ldraw::types::{normalize_name, ChildReference, Directive, ParsedFile};
use crate::scene::{Instance, Scene, SceneDirective};
use crate::session::{ExtraPartColoring, Session};
use crate::texmap::TexmapId;

/// Errors that abort an import.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Root file not found: {0}")]
    RootNotFound(String),

    #[error("Cyclic reference: {}", .chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Resolve `root` with the session's caches and return the scene.
pub fn resolve<R: FileResolver>(session: &mut Session<R>, root: &str) -> LoadResult<Scene> {
    let first_warning = session.warnings.len();
    let root_file = session.parsed(root).map_err(|e| match e {
        StoreError::NotFound(_) => LoadError::RootNotFound(root.to_string()),
        e => LoadError::Store(e),
    })?;
    session.colors();

    let mut scene = Scene::new(root.trim());

    if root_file.part_type == PartType::Configuration {
        scene.palette = root_file.colors.clone();
        scene.warnings = session.warnings[first_warning..].to_vec();
        log::info!("Loaded {} colours from {}", scene.palette.len(), root);
        return Ok(scene);
    }

    let mut resolver = Resolver {
        session,
        scene,
        work: Vec::new(),
        active: Vec::new(),
        accumulator: None,
        prototype_ids: HashMap::new(),
        reported_colors: HashSet::new(),
    };
    resolver.enter(root_file, Context::root())?;
    resolver.run()?;

    let Resolver { session, mut scene, .. } = resolver;
    scene.warnings = session.warnings[first_warning..].to_vec();

    log::info!(
        "Resolved {}: {} prototypes, {} instances, {} groups, {} warnings",
        scene.name,
        scene.prototype_count(),
        scene.instance_count(),
        scene.groups.len(),
        scene.warnings.len()
    );
    Ok(scene)
}

/// State carried down the reference tree.
#[derive(Clone, Debug)]
struct Context {
    color: ResolvedColor,

    /// Node space to enclosing group space
    to_group: Mat4,

    /// Node space to root space
    to_world: Mat4,

    /// Node space to the open accumulator's part space
    to_part: Mat4,

    group: Option<usize>,
    is_stud: bool,
    edge_logo: bool,

    /// Mapping inherited through a reference, with node space to the
    /// declaring document's space
    texmap: Option<(TexmapId, Mat4)>,
}

impl Context {
    fn root() -> Self {
        Self {
            color: ResolvedColor::main(),
            to_group: Mat4::IDENTITY,
            to_world: Mat4::IDENTITY,
            to_part: Mat4::IDENTITY,
            group: None,
            is_stud: false,
            edge_logo: false,
            texmap: None,
        }
    }

    /// Context of a referenced child. Colour and transforms are composed
    /// here, before anything below the child is visited.
    fn child(&self, reference: &ChildReference, texture_support: bool) -> Self {
        let m = reference.transform;
        let texmap = match (texture_support, reference.texmap, self.texmap) {
            (false, _, _) => None,
            (true, Some(id), _) => Some((id, m)),
            (true, None, Some((id, to_declaring))) => Some((id, to_declaring * m)),
            (true, None, None) => None,
        };
        Self {
            color: self.color.inherit(&reference.color_code),
            to_group: self.to_group * m,
            to_world: self.to_world * m,
            to_part: self.to_part * m,
            group: self.group,
            is_stud: self.is_stud || is_stud_file(&reference.filename),
            edge_logo: self.edge_logo || is_edge_logo(&reference.filename),
            texmap,
        }
    }
}

/// Where a part's geometry gets placed once it is closed.
#[derive(Clone, Debug)]
struct Placement {
    transform: Mat4,
    world_transform: Mat4,
    group: Option<usize>,
    color: ResolvedColor,
}

/// Geometry being collected for one part.
struct Accumulator {
    key: GeometryKey,
    name: String,
    cacheable: bool,
    geometry: ResolvedGeometry,
    placement: Placement,
}

enum Work {
    Enter {
        reference: ChildReference,
        context: Context,
        from: String,
    },
    Directive {
        directive: Directive,
        file: String,
        group: Option<usize>,
    },
    Exit {
        closes_part: bool,
    },
}

struct Resolver<'s, R: FileResolver> {
    session: &'s mut Session<R>,
    scene: Scene,
    work: Vec<Work>,

    /// Documents on the current path, for cycle detection
    active: Vec<String>,

    accumulator: Option<Accumulator>,

    /// Geometry allocation address -> prototype id
    prototype_ids: HashMap<usize, usize>,

    reported_colors: HashSet<String>,
}

impl<'s, R: FileResolver> Resolver<'s, R> {
    fn run(&mut self) -> LoadResult<()> {
        while let Some(work) = self.work.pop() {
            match work {
                Work::Enter {
                    reference,
                    context,
                    from,
                } => self.visit(&reference, context, &from)?,
                Work::Directive {
                    directive,
                    file,
                    group,
                } => self.scene.directives.push(SceneDirective {
                    directive,
                    file,
                    group,
                    instance_index: self.scene.instances.len(),
                }),
                Work::Exit { closes_part } => {
                    self.active.pop();
                    if closes_part {
                        self.close_part();
                    }
                }
            }
        }
        Ok(())
    }

    fn visit(&mut self, reference: &ChildReference, context: Context, from: &str) -> LoadResult<()> {
        let config = &self.session.config;
        if !reference.branch.is_visible(config.texture_support) {
            return Ok(());
        }
        if config.no_studs && normalize_name(&reference.filename).starts_with("stud") {
            log::trace!("Skipping stud {}", reference.filename);
            return Ok(());
        }

        match self.session.parsed(&reference.filename) {
            Ok(file) => self.enter(file, context),
            Err(e) => {
                log::debug!("Skipping {}: {}", reference.filename, e);
                self.session.push_warning(Warning::new(
                    from,
                    reference.line,
                    WarningKind::FileNotFound(reference.filename.clone()),
                ));
                Ok(())
            }
        }
    }

    fn enter(&mut self, file: Arc<ParsedFile>, context: Context) -> LoadResult<()> {
        if self.active.contains(&file.filename) {
            let mut chain = self.active.clone();
            chain.push(file.filename.clone());
            return Err(LoadError::CyclicReference { chain });
        }

        let model_like = file
            .part_type
            .is_model_like(self.session.config.treat_shortcut_as_model);

        if file.part_type == PartType::Configuration {
            log::debug!("Not resolving configuration {} as geometry", file.filename);
        } else if self.accumulator.is_some() {
            self.merge(&file, &context);
        } else if model_like {
            self.open_group(&file, context);
        } else {
            self.open_part(&file, context);
        }
        Ok(())
    }

    /// Model boundary: one group per placement, transforms reset below it.
    fn open_group(&mut self, file: &ParsedFile, context: Context) {
        let id = self.scene.add_group(
            file.display_name(),
            context.group,
            context.to_group,
            context.to_world,
        );
        let inner = Context {
            to_group: Mat4::IDENTITY,
            group: Some(id),
            ..context
        };
        self.descend(file, &inner, false, true);
    }

    /// Part with no open accumulator: reuse the cache or start collecting.
    fn open_part(&mut self, file: &ParsedFile, context: Context) {
        let shared = file.is_synthetic
            && self.session.config.extra_part_coloring == ExtraPartColoring::Shared;
        let geometry_color = if shared {
            ResolvedColor::main()
        } else {
            context.color.clone()
        };
        let key = GeometryKey::new(geometry_color.clone(), file.filename.clone());
        let placement = Placement {
            transform: context.to_group,
            world_transform: context.to_world,
            group: context.group,
            color: context.color.clone(),
        };

        // UVs projected through a reference depend on the placement
        let cacheable = context.texmap.is_none();
        if cacheable {
            if let Some(geometry) = self.session.geometry.get(&key).cloned() {
                log::debug!("Geometry cache hit: {}", key);
                self.emit(key, file.display_name().to_string(), geometry, placement);
                return;
            }
        }
        log::debug!("Geometry cache miss: {}", key);

        self.accumulator = Some(Accumulator {
            key,
            name: file.display_name().to_string(),
            cacheable,
            geometry: ResolvedGeometry::new(),
            placement,
        });
        let inner = Context {
            color: geometry_color,
            to_part: Mat4::IDENTITY,
            ..context
        };
        self.merge_geometry(file, &inner);
        self.descend(file, &inner, true, false);
    }

    fn merge(&mut self, file: &ParsedFile, context: &Context) {
        self.merge_geometry(file, context);
        self.descend(file, context, false, false);
    }

    /// Mark `file` active and queue its children (and directives).
    fn descend(&mut self, file: &ParsedFile, context: &Context, closes_part: bool, directives: bool) {
        self.active.push(file.filename.clone());
        self.work.push(Work::Exit { closes_part });

        let texture_support = self.session.config.texture_support;
        let enter = |reference: &ChildReference| Work::Enter {
            reference: reference.clone(),
            context: context.child(reference, texture_support),
            from: file.filename.clone(),
        };
        let directive = |d: &Directive| Work::Directive {
            directive: d.clone(),
            file: file.filename.clone(),
            group: context.group,
        };

        let mut items = Vec::with_capacity(file.children.len());
        let mut pending = file.directives.iter().filter(|_| directives).peekable();
        for (index, reference) in file.children.iter().enumerate() {
            while let Some(d) = pending.next_if(|d| d.child_index <= index) {
                items.push(directive(d));
            }
            items.push(enter(reference));
        }
        items.extend(pending.map(directive));

        self.work.extend(items.into_iter().rev());
    }

    /// Add a document's own faces and edges to the open accumulator.
    fn merge_geometry(&mut self, file: &ParsedFile, context: &Context) {
        let config = &self.session.config;
        let texture_support = config.texture_support;
        let wants_edges = config.wants_edges() || (config.display_logo && context.edge_logo);

        let Some(accumulator) = self.accumulator.as_mut() else {
            return;
        };
        let colors = self.session.colors.as_ref().filter(|table| !table.is_empty());

        for face in &file.faces {
            if !face.branch.is_visible(texture_support) {
                continue;
            }
            let color = context.color.inherit(&face.color_code);
            if let Some(table) = colors {
                if !color.is_main()
                    && !table.is_known(&color.code)
                    && self.reported_colors.insert(color.code.clone())
                {
                    let warning = Warning::new(
                        file.filename.clone(),
                        face.line,
                        WarningKind::UnknownColorCode(color.code.clone()),
                    );
                    log::warn!("{}", warning);
                    self.session.warnings.push(warning);
                }
            }

            let projected: Option<(TexmapId, Vec<Vec3>)> = match (face.texmap, context.texmap) {
                _ if !texture_support => None,
                (Some(id), _) => Some((id, face.vertices.clone())),
                (None, Some((id, to_declaring))) => Some((
                    id,
                    face.vertices
                        .iter()
                        .map(|&v| to_declaring.transform_point3(v))
                        .collect(),
                )),
                (None, None) => None,
            };
            let (texmap, uvs) = match projected {
                Some((id, points)) => match self.session.texmaps.projector_mut(id) {
                    Some(projector) => (Some(id), Some(projector.project(&points))),
                    None => (None, None),
                },
                None => (None, None),
            };

            let vertices: Vec<Vec3> = face
                .vertices
                .iter()
                .map(|&v| context.to_part.transform_point3(v))
                .collect();
            accumulator.geometry.push_face(
                &vertices,
                FaceInfo {
                    color,
                    slope_allowed: !context.is_stud,
                    texmap,
                },
                uvs.as_deref(),
            );
        }

        if !wants_edges {
            return;
        }
        for edge in &file.edges {
            if !edge.branch.is_visible(texture_support) || edge.vertices.len() < 2 {
                continue;
            }
            accumulator.geometry.push_edge(
                context.to_part.transform_point3(edge.vertices[0]),
                context.to_part.transform_point3(edge.vertices[1]),
                context.color.inherit(&edge.color_code),
            );
        }
    }

    fn close_part(&mut self) {
        let Some(accumulator) = self.accumulator.take() else {
            return;
        };
        let geometry = Arc::new(accumulator.geometry);
        let geometry = if accumulator.cacheable {
            // First writer wins; the key is populated at most once
            Arc::clone(
                self.session
                    .geometry
                    .entry(accumulator.key.clone())
                    .or_insert(geometry),
            )
        } else {
            geometry
        };
        self.emit(accumulator.key, accumulator.name, geometry, accumulator.placement);
    }

    fn emit(
        &mut self,
        key: GeometryKey,
        name: String,
        geometry: Arc<ResolvedGeometry>,
        placement: Placement,
    ) {
        if geometry.is_empty() {
            log::debug!("No geometry for {}, not placing it", key);
            return;
        }

        let address = Arc::as_ptr(&geometry) as usize;
        let prototype_id = match self.prototype_ids.get(&address) {
            Some(&id) => id,
            None => {
                let id = self.scene.add_prototype(key, name, geometry);
                self.prototype_ids.insert(address, id);
                id
            }
        };
        self.scene.add_instance(Instance {
            prototype_id,
            transform: placement.transform,
            world_transform: placement.world_transform,
            group: placement.group,
            color: placement.color,
        });
    }
}
