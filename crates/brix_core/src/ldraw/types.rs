//! LDraw document types for intermediate representation.
//!
//! These types represent parsed LDraw documents before resolution into
//! flattened geometry.

use std::sync::Arc;

use brix_math::{Mat4, Vec3};

use crate::color::ColorDefinition;
use crate::ldraw::part_type::PartType;
use crate::texmap::TexmapId;

/// Normalize a filename for cache lookups.
///
/// LDraw filenames are case-insensitive and may use either separator.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('\\', "/")
}

/// Remainder of `line` after skipping `skip` whitespace-separated tokens.
///
/// Filenames and names may contain spaces, so they are taken as the rest of
/// the line rather than a single token.
pub fn line_tail(line: &str, skip: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..skip {
        match rest.find(char::is_whitespace) {
            Some(end) => rest = rest[end..].trim_start(),
            None => return "",
        }
    }
    rest.trim_end()
}

/// One named LDraw sub-document: a standalone file or one `0 FILE`
/// section of a multi-part container.
#[derive(Clone, Debug, PartialEq)]
pub struct LogicalDocument {
    /// Name as declared (`0 FILE` name or requested filename)
    pub name: String,

    /// Raw text lines, without the `0 FILE` introducer
    pub lines: Vec<String>,

    /// 1-based line number of `lines[0]` in the file it came from
    pub first_line: usize,

    /// True when this document was split out of a multi-part container
    pub from_container: bool,
}

impl LogicalDocument {
    /// Create a standalone document starting at line 1.
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines,
            first_line: 1,
            from_container: false,
        }
    }

    /// Cache key for this document.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Which renderers a piece of texture-region geometry is meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TexmapBranch {
    /// Ordinary geometry, always drawn
    #[default]
    Shared,
    /// `0 !:` geometry, only for renderers with texture support
    TexturedOnly,
    /// Geometry after `!TEXMAP FALLBACK`, only for renderers without it
    FallbackOnly,
}

impl TexmapBranch {
    /// Whether geometry of this branch is kept for the given renderer.
    pub fn is_visible(self, texture_support: bool) -> bool {
        match self {
            TexmapBranch::Shared => true,
            TexmapBranch::TexturedOnly => texture_support,
            TexmapBranch::FallbackOnly => !texture_support,
        }
    }
}

/// A type-1 line: `1 <colour> <x y z a b c d e f g h i> <file>`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildReference {
    /// Referenced filename, after logo substitution
    pub filename: String,

    /// Colour code (`"16"` inherits, `"24"` inherits the edge colour)
    pub color_code: String,

    /// Local transform (rotation/scale/shear + translation)
    pub transform: Mat4,

    /// Texture mapping active when the line was read
    pub texmap: Option<TexmapId>,

    /// Texture-region branch the line belongs to
    pub branch: TexmapBranch,

    /// Source line number
    pub line: usize,
}

/// A type-2/3/4 line: an edge (2 vertices) or a face (3 or 4 vertices).
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRecord {
    /// Colour code as written
    pub color_code: String,

    /// Vertices in document space
    pub vertices: Vec<Vec3>,

    /// Texture mapping active when the line was read
    pub texmap: Option<TexmapId>,

    /// Texture-region branch the line belongs to
    pub branch: TexmapBranch,

    /// Source line number
    pub line: usize,
}

/// Meta-command kinds carried for the animation/grouping collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectiveKind {
    Step,
    Save,
    Clear,
    Pause,
    Print,
    Write,
    /// Start of a named group (`!LEOCAD GROUP BEGIN`)
    GroupBegin,
    /// End of the innermost group
    GroupEnd,
    /// MLCAD `GROUP <n> <name>`: the preceding n references form a group
    Group,
    /// MLCAD `BTG <name>`: the next reference belongs to a group
    BelongsToGroup,
    Camera,
}

/// A meta-command, positioned relative to the child reference list.
#[derive(Clone, Debug, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,

    /// Remaining tokens of the line
    pub args: Vec<String>,

    /// Number of child references declared before this directive
    pub child_index: usize,

    /// Source line number
    pub line: usize,
}

/// Header metadata of a document (first occurrence of each wins).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentHeader {
    /// `0 Name:` value
    pub name: Option<String>,

    /// `0 Author:` value
    pub author: Option<String>,

    /// First free-text `0` line
    pub description: Option<String>,

    /// Raw declared type (`!LDRAW_ORG` text)
    pub declared_type: Option<String>,
}

/// Parsed form of a [`LogicalDocument`].
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedFile {
    /// Cache key (normalized filename)
    pub filename: String,

    /// Structural classification, fixed at first declaration
    pub part_type: PartType,

    pub header: DocumentHeader,

    /// Local type-3/4 faces
    pub faces: Vec<FaceRecord>,

    /// Local type-2 edges
    pub edges: Vec<FaceRecord>,

    /// Ordered sub-file references
    pub children: Vec<ChildReference>,

    /// Meta-commands, in source order
    pub directives: Vec<Directive>,

    /// Colours defined inline by `!COLOUR` lines
    pub colors: Vec<ColorDefinition>,

    /// Synthetic parts holding a model's direct geometry
    pub synthetic: Vec<Arc<ParsedFile>>,

    /// True for parts generated from a model's direct geometry
    pub is_synthetic: bool,
}

impl ParsedFile {
    /// Create an empty parsed file.
    pub fn new(filename: impl Into<String>, part_type: PartType) -> Self {
        Self {
            filename: filename.into(),
            part_type,
            header: DocumentHeader::default(),
            faces: Vec::new(),
            edges: Vec::new(),
            children: Vec::new(),
            directives: Vec::new(),
            colors: Vec::new(),
            synthetic: Vec::new(),
            is_synthetic: false,
        }
    }

    /// Check if the document carries no geometry and no references.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.edges.is_empty() && self.children.is_empty()
    }

    /// Display name: the `Name:` header, else the filename.
    pub fn display_name(&self) -> &str {
        self.header.name.as_deref().unwrap_or(&self.filename)
    }
}
