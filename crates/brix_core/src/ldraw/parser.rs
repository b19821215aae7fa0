//! LDraw line parser.
//!
//! Converts the raw lines of one [`LogicalDocument`] into a [`ParsedFile`]:
//! header metadata, local faces and edges, child references, meta-command
//! directives and inline colour definitions.
//!
//! Supported line types:
//! - `0` meta commands (`Name:`, `Author:`, `!LDRAW_ORG`, `!COLOUR`, `STEP`,
//!   grouping, camera, `!TEXMAP`, `!:`)
//! - `1` sub-file references
//! - `2` edges
//! - `3`/`4` triangles and quads
//!
//! Type `5` (optional line) is accepted and dropped.

use std::fmt;
use std::sync::Arc;

use brix_math::{ldraw_matrix, Mat4, Vec3};
use thiserror::Error;

use crate::color::{ColorDefinition, ColorError, MAIN_COLOR};
use crate::ldraw::part_type::PartType;
use crate::ldraw::types::{
    line_tail, normalize_name, ChildReference, Directive, DirectiveKind, FaceRecord,
    LogicalDocument, ParsedFile, TexmapBranch,
};
use crate::session::SessionConfig;
use crate::texmap::{TexmapError, TexmapId, TexmapResult};

/// Errors for a single malformed line. These never abort a parse; they are
/// reported as [`Warning`]s and the line is skipped.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("expected at least {expected} tokens, found {found}")]
    Arity { expected: usize, found: usize },

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("invalid texture mapping: {0}")]
    InvalidTexmap(#[from] TexmapError),

    #[error("invalid colour definition: {0}")]
    InvalidColor(#[from] ColorError),
}

/// Result type for line parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Kind of a non-fatal problem.
#[derive(Clone, Debug, PartialEq)]
pub enum WarningKind {
    /// A referenced file could not be located
    FileNotFound(String),
    /// Token, arity or number problem; the line was skipped
    MalformedLine(String),
    /// A colour code with no definition; a default colour was used
    UnknownColorCode(String),
}

/// A non-fatal problem attributed to a file and line.
#[derive(Clone, Debug, PartialEq)]
pub struct Warning {
    pub file: String,

    /// 1-based line number, 0 when no line applies
    pub line: usize,

    pub kind: WarningKind,
}

impl Warning {
    pub fn new(file: impl Into<String>, line: usize, kind: WarningKind) -> Self {
        Self {
            file: file.into(),
            line,
            kind,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: ", self.file, self.line)?;
        match &self.kind {
            WarningKind::FileNotFound(name) => write!(f, "file not found: {}", name),
            WarningKind::MalformedLine(reason) => write!(f, "malformed line: {}", reason),
            WarningKind::UnknownColorCode(code) => write!(f, "unknown colour code: {}", code),
        }
    }
}

/// Services the parser needs from the surrounding session.
pub trait ParseContext {
    fn config(&self) -> &SessionConfig;

    /// Classification of another document, from its header only.
    ///
    /// Returns `None` when the file cannot be located.
    fn part_type_of(&mut self, filename: &str) -> Option<PartType>;

    /// True when a file can be located.
    fn exists(&mut self, filename: &str) -> bool;

    /// Parse and register a texture mapping (`!TEXMAP START/NEXT` tokens
    /// after the keyword).
    fn register_texmap(&mut self, tokens: &[&str]) -> TexmapResult<TexmapId>;

    /// Record a non-fatal problem.
    fn warn(&mut self, warning: Warning);
}

/// Stud files whose subtree is never slope-eligible.
const STUD_FILES: [&str; 2] = ["stud.dat", "stud2.dat"];

/// Logo files drawn with edges when logos are displayed.
const EDGE_LOGO_FILES: [&str; 2] = ["logo.dat", "logo2.dat"];

/// True for stud primitives, including their logo variants.
pub fn is_stud_file(name: &str) -> bool {
    let name = normalize_name(name);
    STUD_FILES.contains(&name.as_str()) || name.starts_with("stud-") || name.starts_with("stud2-")
}

/// True for logos that are built from edge lines.
pub fn is_edge_logo(name: &str) -> bool {
    EDGE_LOGO_FILES.contains(&normalize_name(name).as_str())
}

/// Find the first part-type declaration in a document's lines.
pub fn scan_declared_type(lines: &[String]) -> Option<String> {
    lines.iter().find_map(|line| {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("0") {
            return None;
        }
        let declared = match tokens.next()? {
            "!LDRAW_ORG" | "LDRAW_ORG" => line_tail(line, 2),
            k if k.eq_ignore_ascii_case("Unofficial") || k.eq_ignore_ascii_case("Un-official") => {
                line_tail(line, 1)
            }
            _ => return None,
        };
        (!declared.is_empty()).then(|| declared.to_string())
    })
}

/// Classification of a document from its header declaration.
pub fn classify_document(doc: &LogicalDocument) -> PartType {
    PartType::infer(
        scan_declared_type(&doc.lines).as_deref(),
        &doc.name,
        doc.from_container,
    )
}

/// Parse a logical document.
///
/// Direct geometry of a model-like document, and subpart/primitive
/// references it makes, are moved into synthetic parts (one per texture
/// mapping) which are referenced from the document's child list.
pub fn parse_document<C: ParseContext>(doc: &LogicalDocument, ctx: &mut C) -> ParsedFile {
    let part_type = classify_document(doc);
    let model_like = part_type.is_model_like(ctx.config().treat_shortcut_as_model);

    let mut parser = LineParser {
        ctx,
        file: ParsedFile::new(doc.key(), part_type),
        model_like,
        stack: Vec::new(),
        extras: Vec::new(),
    };
    for (index, line) in doc.lines.iter().enumerate() {
        parser.parse_line(doc.first_line + index, line);
    }
    let file = parser.finish();

    log::debug!(
        "Parsed {} ({}): {} faces, {} edges, {} children, {} synthetic",
        file.filename,
        file.part_type,
        file.faces.len(),
        file.edges.len(),
        file.children.len(),
        file.synthetic.len()
    );
    file
}

/// One level of the texture mapping stack.
#[derive(Debug)]
struct TexmapFrame {
    /// `None` when the START/NEXT line was invalid
    mapping: Option<TexmapId>,
    /// Closes after one geometry line
    next: bool,
    /// FALLBACK seen
    fallback: bool,
}

struct LineParser<'a, C: ParseContext> {
    ctx: &'a mut C,
    file: ParsedFile,
    model_like: bool,
    stack: Vec<TexmapFrame>,
    extras: Vec<(Option<TexmapId>, ParsedFile)>,
}

impl<'a, C: ParseContext> LineParser<'a, C> {
    fn parse_line(&mut self, line_no: usize, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return;
        }

        match tokens[0] {
            "0" => self.parse_meta(line_no, line, &tokens),
            "1" | "2" | "3" | "4" | "5" => {
                let (branch, texmap) = match self.stack.last() {
                    Some(frame) if frame.fallback => (TexmapBranch::FallbackOnly, None),
                    Some(frame) => (TexmapBranch::Shared, frame.mapping),
                    None => (TexmapBranch::Shared, None),
                };
                self.parse_geometry(line_no, line, &tokens, texmap, branch);
                self.close_next();
            }
            other => log::trace!("{}:{}: ignoring line type {}", self.file.filename, line_no, other),
        }
    }

    fn parse_meta(&mut self, line_no: usize, line: &str, tokens: &[&str]) {
        let keyword = tokens[1];
        let args = || tokens[2..].iter().map(|s| s.to_string()).collect::<Vec<_>>();

        match keyword {
            "//" => {}
            "!:" => self.parse_textured_line(line_no, line),
            "!TEXMAP" => self.parse_texmap(line_no, tokens),
            "!LDRAW_ORG" | "LDRAW_ORG" => {
                set_once(&mut self.file.header.declared_type, line_tail(line, 2))
            }
            "!COLOUR" => match ColorDefinition::parse(&tokens[2..]) {
                Ok(definition) => self.file.colors.push(definition),
                Err(e) => self.malformed(line_no, ParseError::from(e)),
            },
            "!LEOCAD" => self.parse_leocad(line_no, tokens),
            "STEP" => self.directive(DirectiveKind::Step, Vec::new(), line_no),
            "SAVE" => self.directive(DirectiveKind::Save, Vec::new(), line_no),
            "CLEAR" => self.directive(DirectiveKind::Clear, Vec::new(), line_no),
            "PAUSE" => self.directive(DirectiveKind::Pause, Vec::new(), line_no),
            "PRINT" => self.directive(DirectiveKind::Print, args(), line_no),
            "WRITE" => self.directive(DirectiveKind::Write, args(), line_no),
            "GROUP" => self.directive(DirectiveKind::Group, args(), line_no),
            "MLCAD" if tokens.get(2) == Some(&"BTG") => {
                let name = line_tail(line, 3).to_string();
                self.directive(DirectiveKind::BelongsToGroup, vec![name], line_no)
            }
            k if k.eq_ignore_ascii_case("Name:") => set_once(&mut self.file.header.name, line_tail(line, 2)),
            k if k.eq_ignore_ascii_case("Author:") => {
                set_once(&mut self.file.header.author, line_tail(line, 2))
            }
            k if k.eq_ignore_ascii_case("Unofficial") || k.eq_ignore_ascii_case("Un-official") => {
                set_once(&mut self.file.header.declared_type, line_tail(line, 1))
            }
            k if k.starts_with('!') || matches!(k, "BFC" | "FILE" | "NOFILE" | "MLCAD") => {
                log::trace!("{}:{}: ignoring meta {}", self.file.filename, line_no, k)
            }
            _ => set_once(&mut self.file.header.description, line_tail(line, 1)),
        }
    }

    fn parse_leocad(&mut self, line_no: usize, tokens: &[&str]) {
        let sub = tokens.get(2).map(|s| s.to_ascii_uppercase());
        match sub.as_deref() {
            Some("GROUP") => match tokens.get(3).map(|s| s.to_ascii_uppercase()).as_deref() {
                Some("BEGIN") => {
                    let name = tokens[4..].join(" ");
                    self.directive(DirectiveKind::GroupBegin, vec![name], line_no)
                }
                Some("END") => self.directive(DirectiveKind::GroupEnd, Vec::new(), line_no),
                _ => log::trace!("{}:{}: unknown LeoCAD group command", self.file.filename, line_no),
            },
            Some("CAMERA") => {
                let args = tokens[3..].iter().map(|s| s.to_string()).collect();
                self.directive(DirectiveKind::Camera, args, line_no)
            }
            _ => log::trace!("{}:{}: ignoring LeoCAD meta", self.file.filename, line_no),
        }
    }

    fn parse_texmap(&mut self, line_no: usize, tokens: &[&str]) {
        let command = tokens.get(2).map(|s| s.to_ascii_uppercase());
        match command.as_deref() {
            Some(command @ ("START" | "NEXT")) => {
                let mapping = match self.ctx.register_texmap(&tokens[3..]) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        self.malformed(line_no, ParseError::from(e));
                        None
                    }
                };
                // An invalid mapping still opens a frame so END stays balanced
                self.stack.push(TexmapFrame {
                    mapping,
                    next: command == "NEXT",
                    fallback: false,
                });
            }
            Some("FALLBACK") => {
                if let Some(frame) = self.stack.last_mut() {
                    frame.fallback = true;
                }
            }
            Some("END") => {
                if self.stack.pop().is_none() {
                    log::trace!("{}:{}: TEXMAP END without START", self.file.filename, line_no);
                }
            }
            _ => self.malformed(
                line_no,
                ParseError::Arity {
                    expected: 3,
                    found: tokens.len(),
                },
            ),
        }
    }

    /// `0 !: <line>`: geometry for texture-capable renderers only.
    fn parse_textured_line(&mut self, line_no: usize, line: &str) {
        let Some(mapping) = self.stack.last().map(|frame| frame.mapping) else {
            log::trace!("{}:{}: '!:' outside TEXMAP", self.file.filename, line_no);
            return;
        };
        let inner = line_tail(line, 2);
        let tokens: Vec<&str> = inner.split_whitespace().collect();
        if tokens.len() < 2 || !matches!(tokens[0], "1" | "2" | "3" | "4" | "5") {
            return;
        }
        self.parse_geometry(line_no, inner, &tokens, mapping, TexmapBranch::TexturedOnly);
        self.close_next();
    }

    fn parse_geometry(
        &mut self,
        line_no: usize,
        line: &str,
        tokens: &[&str],
        texmap: Option<TexmapId>,
        branch: TexmapBranch,
    ) {
        let result = match tokens[0] {
            "1" => self
                .parse_reference(line_no, line, tokens, texmap, branch)
                .map(|child| self.push_child(child)),
            "2" => parse_polygon(line_no, tokens, 2, texmap, branch).map(|edge| {
                let target = self.geometry_target(texmap);
                target.edges.push(edge)
            }),
            "3" | "4" => {
                let count = if tokens[0] == "3" { 3 } else { 4 };
                parse_polygon(line_no, tokens, count, texmap, branch).map(|face| {
                    let target = self.geometry_target(texmap);
                    target.faces.push(face)
                })
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.malformed(line_no, e);
        }
    }

    fn parse_reference(
        &mut self,
        line_no: usize,
        line: &str,
        tokens: &[&str],
        texmap: Option<TexmapId>,
        branch: TexmapBranch,
    ) -> ParseResult<ChildReference> {
        if tokens.len() < 15 {
            return Err(ParseError::Arity {
                expected: 15,
                found: tokens.len(),
            });
        }
        let v = parse_floats(&tokens[2..14])?;
        let filename = self.substitute_logo(line_tail(line, 14));

        Ok(ChildReference {
            filename,
            color_code: tokens[1].to_string(),
            transform: ldraw_matrix(
                [v[0], v[1], v[2]],
                [v[3], v[4], v[5], v[6], v[7], v[8], v[9], v[10], v[11]],
            ),
            texmap,
            branch,
            line: line_no,
        })
    }

    /// Replace `stud.dat` by its logo variant when logos are displayed and
    /// the variant exists.
    fn substitute_logo(&mut self, filename: &str) -> String {
        let config = self.ctx.config();
        if !config.display_logo || !STUD_FILES.contains(&normalize_name(filename).as_str()) {
            return filename.to_string();
        }
        let Some((stem, ext)) = filename.rsplit_once('.') else {
            return filename.to_string();
        };
        let candidate = format!("{}-{}.{}", stem, config.chosen_logo, ext);
        if self.ctx.exists(&candidate) {
            candidate
        } else {
            log::debug!("Logo stud {} not found, keeping {}", candidate, filename);
            filename.to_string()
        }
    }

    fn push_child(&mut self, child: ChildReference) {
        if self.model_like {
            let fragment = self
                .ctx
                .part_type_of(&child.filename)
                .is_some_and(PartType::is_fragment);
            if fragment {
                self.extra(child.texmap).children.push(child);
                return;
            }
        }
        self.file.children.push(child);
    }

    /// Bucket that receives direct faces and edges.
    fn geometry_target(&mut self, texmap: Option<TexmapId>) -> &mut ParsedFile {
        if self.model_like {
            self.extra(texmap)
        } else {
            &mut self.file
        }
    }

    fn extra(&mut self, texmap: Option<TexmapId>) -> &mut ParsedFile {
        let index = match self.extras.iter().position(|(id, _)| *id == texmap) {
            Some(index) => index,
            None => {
                let mut part = ParsedFile::new(synthetic_name(&self.file.filename, texmap), PartType::Part);
                part.is_synthetic = true;
                self.extras.push((texmap, part));
                self.extras.len() - 1
            }
        };
        &mut self.extras[index].1
    }

    fn close_next(&mut self) {
        if self.stack.last().is_some_and(|frame| frame.next) {
            self.stack.pop();
        }
    }

    fn directive(&mut self, kind: DirectiveKind, args: Vec<String>, line: usize) {
        self.file.directives.push(Directive {
            kind,
            args,
            child_index: self.file.children.len(),
            line,
        });
    }

    fn malformed(&mut self, line: usize, error: ParseError) {
        let warning = Warning::new(
            self.file.filename.clone(),
            line,
            WarningKind::MalformedLine(error.to_string()),
        );
        log::warn!("{}", warning);
        self.ctx.warn(warning);
    }

    fn finish(mut self) -> ParsedFile {
        for (_, part) in self.extras.drain(..) {
            self.file.children.push(ChildReference {
                filename: part.filename.clone(),
                color_code: MAIN_COLOR.to_string(),
                transform: Mat4::IDENTITY,
                texmap: None,
                branch: TexmapBranch::Shared,
                line: 0,
            });
            self.file.synthetic.push(Arc::new(part));
        }
        self.file
    }
}

/// Name of the synthetic part holding a model's direct geometry.
pub fn synthetic_name(owner: &str, texmap: Option<TexmapId>) -> String {
    match texmap {
        Some(id) => format!("{}#extra:{}", owner, id),
        None => format!("{}#extra", owner),
    }
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

fn parse_floats(tokens: &[&str]) -> ParseResult<Vec<f32>> {
    tokens
        .iter()
        .map(|s| {
            s.parse::<f32>()
                .map_err(|_| ParseError::InvalidNumber(s.to_string()))
        })
        .collect()
}

/// Parse a type-2/3/4 line with `count` vertices.
fn parse_polygon(
    line: usize,
    tokens: &[&str],
    count: usize,
    texmap: Option<TexmapId>,
    branch: TexmapBranch,
) -> ParseResult<FaceRecord> {
    let expected = 2 + count * 3;
    if tokens.len() < expected {
        return Err(ParseError::Arity {
            expected,
            found: tokens.len(),
        });
    }
    let values = parse_floats(&tokens[2..expected])?;
    let vertices = values
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect();

    Ok(FaceRecord {
        color_code: tokens[1].to_string(),
        vertices,
        texmap,
        branch,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texmap::TexmapRegistry;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestContext {
        config: SessionConfig,
        types: HashMap<String, PartType>,
        registry: TexmapRegistry,
        warnings: Vec<Warning>,
    }

    impl TestContext {
        fn with_type(mut self, name: &str, part_type: PartType) -> Self {
            self.types.insert(normalize_name(name), part_type);
            self
        }
    }

    impl ParseContext for TestContext {
        fn config(&self) -> &SessionConfig {
            &self.config
        }

        fn part_type_of(&mut self, filename: &str) -> Option<PartType> {
            self.types.get(&normalize_name(filename)).copied()
        }

        fn exists(&mut self, filename: &str) -> bool {
            self.types.contains_key(&normalize_name(filename))
        }

        fn register_texmap(&mut self, tokens: &[&str]) -> TexmapResult<TexmapId> {
            self.registry.register(tokens)
        }

        fn warn(&mut self, warning: Warning) {
            self.warnings.push(warning);
        }
    }

    fn doc(name: &str, text: &str) -> LogicalDocument {
        LogicalDocument::new(name, text.lines().map(str::to_string).collect())
    }

    #[test]
    fn test_parse_part_header_and_geometry() {
        let text = r#"0 Brick 1 x 1
0 Name: 3005.dat
0 Author: James Jessiman
0 !LDRAW_ORG Part UPDATE 2002-03
0 // a comment
0 BFC CERTIFY CCW
2 24 0 0 0 20 0 0
3 16 0 0 0 20 0 0 20 0 20
4 4 0 0 0 20 0 0 20 0 20 0 0 20
1 16 10 0 10 1 0 0 0 1 0 0 0 1 stud.dat
"#;
        let mut ctx = TestContext::default();
        let file = parse_document(&doc("3005.dat", text), &mut ctx);

        assert_eq!(file.part_type, PartType::Part);
        assert_eq!(file.header.description.as_deref(), Some("Brick 1 x 1"));
        assert_eq!(file.header.name.as_deref(), Some("3005.dat"));
        assert_eq!(file.header.author.as_deref(), Some("James Jessiman"));
        assert_eq!(file.edges.len(), 1);
        assert_eq!(file.faces.len(), 2);
        assert_eq!(file.faces[1].vertices.len(), 4);
        assert_eq!(file.faces[1].color_code, "4");
        assert_eq!(file.children.len(), 1);
        assert_eq!(file.children[0].filename, "stud.dat");
        assert_eq!(file.children[0].line, 10);
        assert!(file.synthetic.is_empty());
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_first_declaration_wins() {
        let text = "0 !LDRAW_ORG Subpart\n0 !LDRAW_ORG Part\n";
        let file = parse_document(&doc("s/foo.dat", text), &mut TestContext::default());
        assert_eq!(file.part_type, PartType::Subpart);
        assert_eq!(file.header.declared_type.as_deref(), Some("Subpart"));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = r#"0 !LDRAW_ORG Part
3 16 0 0 0 1 0 0 oops 1 0
3 16 0 0 0 1 0 0
1 16 0 0 0 1 0 0 0 1 0 0 0 1
3 16 0 0 0 1 0 0 0 1 0
x
"#;
        let mut ctx = TestContext::default();
        let file = parse_document(&doc("bad.dat", text), &mut ctx);

        assert_eq!(file.faces.len(), 1);
        assert!(file.children.is_empty());
        assert_eq!(ctx.warnings.len(), 3);
        assert_eq!(ctx.warnings[0].line, 2);
        assert!(matches!(ctx.warnings[0].kind, WarningKind::MalformedLine(_)));
    }

    #[test]
    fn test_reference_filename_with_spaces() {
        let text = "1 4 1 2 3 1 0 0 0 1 0 0 0 1 My Sub Model.ldr\n";
        let file = parse_document(&doc("main.ldr", text), &mut TestContext::default());
        let child = &file.children[0];
        assert_eq!(child.filename, "My Sub Model.ldr");
        assert_eq!(child.color_code, "4");
        let p = child.transform.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).length() < 0.001);
    }

    #[test]
    fn test_model_direct_geometry_goes_to_synthetic_part() {
        let text = r#"0 !LDRAW_ORG Model
1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat
3 16 0 0 0 1 0 0 0 1 0
1 16 0 0 0 1 0 0 0 1 0 0 0 1 4-4disc.dat
"#;
        let mut ctx = TestContext::default()
            .with_type("3001.dat", PartType::Part)
            .with_type("4-4disc.dat", PartType::Primitive);
        let file = parse_document(&doc("house.ldr", text), &mut ctx);

        assert!(file.faces.is_empty());
        assert_eq!(file.children.len(), 2);
        assert_eq!(file.children[0].filename, "3001.dat");
        assert_eq!(file.children[1].filename, "house.ldr#extra");
        assert_eq!(file.children[1].color_code, "16");

        assert_eq!(file.synthetic.len(), 1);
        let extra = &file.synthetic[0];
        assert!(extra.is_synthetic);
        assert_eq!(extra.part_type, PartType::Part);
        assert_eq!(extra.faces.len(), 1);
        assert_eq!(extra.children.len(), 1);
        assert_eq!(extra.children[0].filename, "4-4disc.dat");
    }

    #[test]
    fn test_texmap_start_end_tags_enclosed_lines() {
        let text = r#"0 !LDRAW_ORG Part
3 16 0 0 0 1 0 0 0 1 0
0 !TEXMAP START PLANAR 0 0 0 1 0 0 0 1 0 tex.png
3 16 0 0 0 1 0 0 0 1 0
0 !TEXMAP END
3 16 0 0 0 1 0 0 0 1 0
0 !TEXMAP END
"#;
        let mut ctx = TestContext::default();
        let file = parse_document(&doc("printed.dat", text), &mut ctx);

        let tags: Vec<_> = file.faces.iter().map(|f| f.texmap).collect();
        assert_eq!(tags, vec![None, Some(TexmapId(0)), None]);
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_texmap_next_applies_to_one_line() {
        let text = r#"0 !LDRAW_ORG Part
0 !TEXMAP NEXT PLANAR 0 0 0 1 0 0 0 1 0 tex.png
1 16 0 0 0 1 0 0 0 1 0 0 0 1 s/sticker.dat
3 16 0 0 0 1 0 0 0 1 0
"#;
        let file = parse_document(&doc("p.dat", text), &mut TestContext::default());
        assert_eq!(file.children[0].texmap, Some(TexmapId(0)));
        assert_eq!(file.faces[0].texmap, None);
    }

    #[test]
    fn test_texmap_next_pops_to_enclosing_start() {
        let text = r#"0 !LDRAW_ORG Part
0 !TEXMAP START PLANAR 0 0 0 1 0 0 0 1 0 outer.png
0 !TEXMAP NEXT PLANAR 0 0 0 2 0 0 0 2 0 inner.png
3 16 0 0 0 1 0 0 0 1 0
3 16 0 0 0 2 0 0 0 2 0
0 !TEXMAP END
3 16 0 0 0 3 0 0 0 3 0
"#;
        let file = parse_document(&doc("p.dat", text), &mut TestContext::default());
        let tags: Vec<_> = file.faces.iter().map(|f| f.texmap).collect();
        assert_eq!(tags, vec![Some(TexmapId(1)), Some(TexmapId(0)), None]);
    }

    #[test]
    fn test_texmap_fallback_and_textured_lines() {
        let text = r#"0 !LDRAW_ORG Part
0 !TEXMAP START PLANAR 0 0 0 1 0 0 0 1 0 tex.png
0 !: 3 16 0 0 0 1 0 0 0 1 0
3 16 0 0 0 2 0 0 0 2 0
0 !TEXMAP FALLBACK
3 16 0 0 0 3 0 0 0 3 0
0 !TEXMAP END
"#;
        let file = parse_document(&doc("p.dat", text), &mut TestContext::default());
        let branches: Vec<_> = file.faces.iter().map(|f| (f.branch, f.texmap)).collect();
        assert_eq!(
            branches,
            vec![
                (TexmapBranch::TexturedOnly, Some(TexmapId(0))),
                (TexmapBranch::Shared, Some(TexmapId(0))),
                (TexmapBranch::FallbackOnly, None),
            ]
        );
    }

    #[test]
    fn test_invalid_texmap_keeps_stack_balanced() {
        let text = r#"0 !LDRAW_ORG Part
0 !TEXMAP START PLANAR 0 0 0 0 0 0 0 1 0 tex.png
0 !TEXMAP START PLANAR 0 0 0 1 0 0 0 1 0 tex.png
3 16 0 0 0 1 0 0 0 1 0
0 !TEXMAP END
3 16 0 0 0 1 0 0 0 1 0
0 !TEXMAP END
3 16 0 0 0 1 0 0 0 1 0
"#;
        let mut ctx = TestContext::default();
        let file = parse_document(&doc("p.dat", text), &mut ctx);

        let tags: Vec<_> = file.faces.iter().map(|f| f.texmap).collect();
        assert_eq!(tags, vec![Some(TexmapId(0)), None, None]);
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn test_model_texmap_extras_split_per_mapping() {
        let text = r#"0 !LDRAW_ORG Model
3 16 0 0 0 1 0 0 0 1 0
0 !TEXMAP START PLANAR 0 0 0 1 0 0 0 1 0 tex.png
3 16 0 0 0 1 0 0 0 1 0
0 !TEXMAP END
"#;
        let file = parse_document(&doc("m.ldr", text), &mut TestContext::default());
        let names: Vec<_> = file.children.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["m.ldr#extra", "m.ldr#extra:texmap0"]);
        assert_eq!(file.synthetic[1].faces[0].texmap, Some(TexmapId(0)));
    }

    #[test]
    fn test_directives_and_colours() {
        let text = r#"0 Model
0 !COLOUR Test_Red CODE 900 VALUE #C91A09 EDGE #333333
0 !COLOUR Broken CODE 901
1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat
0 STEP
0 !LEOCAD GROUP BEGIN Left wing
1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat
0 !LEOCAD GROUP END
0 MLCAD BTG Tail
0 PRINT hello world
"#;
        let mut ctx = TestContext::default().with_type("3001.dat", PartType::Part);
        let file = parse_document(&doc("m.ldr", text), &mut ctx);

        assert_eq!(file.part_type, PartType::Model);
        assert_eq!(file.colors.len(), 1);
        assert_eq!(file.colors[0].code, "900");
        assert_eq!(ctx.warnings.len(), 1);

        let kinds: Vec<_> = file.directives.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                DirectiveKind::Step,
                DirectiveKind::GroupBegin,
                DirectiveKind::GroupEnd,
                DirectiveKind::BelongsToGroup,
                DirectiveKind::Print,
            ]
        );
        assert_eq!(file.directives[0].child_index, 1);
        assert_eq!(file.directives[1].args, vec!["Left wing"]);
        assert_eq!(file.directives[2].child_index, 2);
        assert_eq!(file.directives[4].args, vec!["hello", "world"]);
    }

    #[test]
    fn test_logo_substitution() {
        let text = "1 16 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 stud2.dat\n";
        let mut ctx = TestContext::default().with_type("stud-logo3.dat", PartType::Primitive);
        ctx.config.display_logo = true;

        let file = parse_document(&doc("3001.dat", text), &mut ctx);
        assert_eq!(file.children[0].filename, "stud-logo3.dat");
        // Missing variant falls back to the requested name
        assert_eq!(file.children[1].filename, "stud2.dat");
    }

    #[test]
    fn test_stud_and_logo_names() {
        assert!(is_stud_file("STUD.DAT"));
        assert!(is_stud_file("stud-logo3.dat"));
        assert!(!is_stud_file("stud4.dat"));
        assert!(is_edge_logo("logo2.dat"));
        assert!(!is_edge_logo("logo3.dat"));
    }

    #[test]
    fn test_scan_declared_type() {
        let lines: Vec<String> = ["0 Title", "0 Unofficial Model", "0 !LDRAW_ORG Part"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(scan_declared_type(&lines).as_deref(), Some("Unofficial Model"));
        assert_eq!(scan_declared_type(&lines[..1]), None);
    }
}
