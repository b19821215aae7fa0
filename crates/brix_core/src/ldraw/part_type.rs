//! Structural role of an LDraw document.
//!
//! Every downstream decision (grouping, instancing, merging) matches on
//! [`PartType`] rather than on the raw `!LDRAW_ORG` text.

use std::fmt;

/// Classification tier of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartType {
    /// Geometry fragment, only referenced from inside parts.
    Primitive,
    /// Named fragment of a single part (`s/` directory).
    Subpart,
    /// Directly instantiable physical piece.
    Part,
    /// Part composed purely of references to other parts.
    Shortcut,
    /// Full assembly of parts and submodels.
    Model,
    /// Colour-table-only document (`LDConfig.ldr`).
    Configuration,
}

impl PartType {
    /// Keyword tested for each tier, in priority order.
    const KEYWORDS: [(&'static str, PartType); 6] = [
        ("primitive", PartType::Primitive),
        ("subpart", PartType::Subpart),
        ("part", PartType::Part),
        ("shortcut", PartType::Shortcut),
        ("model", PartType::Model),
        ("configuration", PartType::Configuration),
    ];

    /// Classify a declared type string by keyword containment.
    ///
    /// `Unofficial_Part`, `Part Alias` and `Part Physical_Colour` are parts,
    /// `8_Primitive`/`48_Primitive` are primitives. No declaration, or a
    /// declaration matching no keyword, is a part.
    pub fn classify(declared: Option<&str>) -> PartType {
        let Some(declared) = declared else {
            return PartType::Part;
        };
        let declared = declared.to_ascii_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| declared.contains(keyword))
            .map(|&(_, part_type)| part_type)
            .unwrap_or(PartType::Part)
    }

    /// Classification of a parsed document.
    ///
    /// Undeclared `.ldr`/`.mpd` files and sub-documents of a multi-part
    /// container are models; everything else follows [`PartType::classify`].
    pub fn infer(declared: Option<&str>, name: &str, from_container: bool) -> PartType {
        if declared.is_none() && (from_container || is_model_filename(name)) {
            return PartType::Model;
        }
        Self::classify(declared)
    }

    /// True for types that behave as model boundaries.
    pub fn is_model_like(self, treat_shortcut_as_model: bool) -> bool {
        match self {
            PartType::Model => true,
            PartType::Shortcut => treat_shortcut_as_model,
            PartType::Primitive | PartType::Subpart | PartType::Part | PartType::Configuration => {
                false
            }
        }
    }

    /// True for geometry fragments that must live inside a part.
    pub fn is_fragment(self) -> bool {
        matches!(self, PartType::Primitive | PartType::Subpart)
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartType::Primitive => "primitive",
            PartType::Subpart => "subpart",
            PartType::Part => "part",
            PartType::Shortcut => "shortcut",
            PartType::Model => "model",
            PartType::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

fn is_model_filename(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".ldr") || lower.ends_with(".mpd")
}
