//! LDraw support for brix.
//!
//! This module provides reading, splitting, parsing and resolving of LDraw
//! documents (`.ldr`, `.dat`, `.mpd`):
//!
//! - `store`: filename resolution and multi-part container splitting
//! - `parser`: line grammar, meta-commands, `!TEXMAP` regions
//! - `part_type`: structural classification of documents
//! - `loader`: expansion of the reference tree into a [`Scene`](crate::Scene)
//!
//! # Example
//!
//! ```ignore
//! use brix_core::ldraw::SearchPaths;
//! use brix_core::{Session, SessionConfig};
//!
//! let resolver = SearchPaths::new(["/usr/share/ldraw"]);
//! let mut session = Session::new(resolver, SessionConfig::default());
//! let scene = session.import("car.mpd")?;
//! println!("Loaded {} prototypes, {} instances",
//!     scene.prototype_count(),
//!     scene.instance_count());
//! ```

pub mod loader;
pub mod parser;
pub mod part_type;
pub mod store;
pub mod types;

pub use loader::*;
pub use parser::*;
pub use part_type::*;
pub use store::*;
pub use types::*;
