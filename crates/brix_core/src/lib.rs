//! Brix Core - LDraw ingestion and geometry resolution.
//!
//! This crate provides:
//!
//! - **LDraw support**: document store, line parser, part classification
//!   and the resolver that flattens a model into instanced geometry
//! - **Colours**: `!COLOUR` tables with finish details
//! - **Texture mapping**: `!TEXMAP` planar/cylindrical/spherical projection
//! - **Scene graph types**: `Scene`, `Prototype`, `Instance`, `Group`
//!
//! # Example
//!
//! ```ignore
//! use brix_core::ldraw::MemoryResolver;
//! use brix_core::{Session, SessionConfig};
//!
//! let resolver = MemoryResolver::new().with_file("m.ldr", "3 4 0 0 0 1 0 0 0 1 0\n");
//! let mut session = Session::new(resolver, SessionConfig::default());
//! let scene = session.import("m.ldr")?;
//! println!("Loaded {} prototypes, {} instances",
//!     scene.prototype_count(),
//!     scene.instance_count());
//! ```

pub mod color;
pub mod geometry;
pub mod ldraw;
pub mod scene;
pub mod session;
pub mod texmap;

// Re-export commonly used types
pub use color::{ColorDefinition, ColorTable, Finish};
pub use geometry::{FaceInfo, GeometryKey, ResolvedColor, ResolvedGeometry};
pub use ldraw::{LoadError, LoadResult, PartType, Warning, WarningKind};
pub use scene::{Group, Instance, Prototype, Scene, SceneDirective};
pub use session::{ExtraPartColoring, Session, SessionConfig};
pub use texmap::{TexmapId, TextureMapping, TextureProjector};
