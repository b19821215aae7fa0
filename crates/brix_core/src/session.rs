//! Import session: configuration and every per-session cache.
//!
//! A [`Session`] owns the document store, the parsed-file cache, the
//! resolved-geometry cache, the colour table and the texture mapping
//! registry. [`Session::import`] resets all of them before resolving, so two
//! imports never see each other's entries; [`Session::resolve`] reuses them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::color::ColorTable;
use crate::geometry::{GeometryKey, ResolvedGeometry};
use crate::ldraw::loader::{self, LoadResult};
use crate::ldraw::parser::{
    classify_document, parse_document, ParseContext, ParseError, Warning, WarningKind,
};
use crate::ldraw::part_type::PartType;
use crate::ldraw::store::{DocumentStore, FileResolver, StoreResult};
use crate::ldraw::types::{normalize_name, ParsedFile};
use crate::scene::Scene;
use crate::texmap::{TexmapId, TexmapRegistry, TexmapResult};

/// How synthetic parts built from a model's direct geometry are coloured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPartColoring {
    /// One cached geometry per inherited colour, colours baked into faces
    #[default]
    PerColor,
    /// One cached geometry per synthetic part; 16/24 stay unresolved in the
    /// face metadata and the placement carries the colour
    Shared,
}

/// Import options, read once per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Read `LDCfgalt.ldr` instead of `LDConfig.ldr`
    pub use_alt_colors: bool,

    /// Substitute logo stud variants
    pub display_logo: bool,

    /// Logo variant name (`logo`, `logo2` ... `logo5`, `high-contrast`)
    pub chosen_logo: String,

    /// Skip stud references entirely
    pub no_studs: bool,

    /// Shortcuts behave like models
    pub treat_shortcut_as_model: bool,

    /// Accumulate type-2 edge geometry
    pub import_edges: bool,

    /// Accumulate edges for sharp-edge marking
    pub use_freestyle_edges: bool,

    /// Renderer supports textures
    pub texture_support: bool,

    pub extra_part_coloring: ExtraPartColoring,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            use_alt_colors: false,
            display_logo: false,
            chosen_logo: "logo3".to_string(),
            no_studs: false,
            treat_shortcut_as_model: false,
            import_edges: false,
            use_freestyle_edges: false,
            texture_support: true,
            extra_part_coloring: ExtraPartColoring::PerColor,
        }
    }
}

impl SessionConfig {
    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load options from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&text)?)
    }

    /// Serialize options to pretty JSON.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// True when type-2 edges are accumulated for ordinary geometry.
    pub fn wants_edges(&self) -> bool {
        self.import_edges || self.use_freestyle_edges
    }
}

/// Session state shared by every component call.
pub struct Session<R: FileResolver> {
    pub(crate) config: SessionConfig,
    pub(crate) store: DocumentStore<R>,
    pub(crate) parsed: HashMap<String, Arc<ParsedFile>>,
    pub(crate) geometry: HashMap<GeometryKey, Arc<ResolvedGeometry>>,
    pub(crate) colors: Option<ColorTable>,
    pub(crate) texmaps: TexmapRegistry,
    pub(crate) warnings: Vec<Warning>,
}

impl<R: FileResolver> Session<R> {
    pub fn new(resolver: R, config: SessionConfig) -> Self {
        Self {
            config,
            store: DocumentStore::new(resolver),
            parsed: HashMap::new(),
            geometry: HashMap::new(),
            colors: None,
            texmaps: TexmapRegistry::new(),
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the configuration; takes effect from a clean state.
    pub fn reset_with(&mut self, config: SessionConfig) {
        self.config = config;
        self.reset();
    }

    /// Drop every cached document, geometry, colour and texture mapping.
    pub fn reset(&mut self) {
        self.store.clear();
        self.parsed.clear();
        self.geometry.clear();
        self.colors = None;
        self.texmaps.clear();
        self.warnings.clear();
    }

    /// Reset, then resolve `root` into a scene.
    pub fn import(&mut self, root: &str) -> LoadResult<Scene> {
        self.reset();
        self.resolve(root)
    }

    /// Resolve `root` reusing whatever this session already cached.
    pub fn resolve(&mut self, root: &str) -> LoadResult<Scene> {
        loader::resolve(self, root)
    }

    /// Parsed form of a document, parsing it on first request.
    pub fn parsed(&mut self, name: &str) -> StoreResult<Arc<ParsedFile>> {
        let key = normalize_name(name);
        if let Some(file) = self.parsed.get(&key) {
            return Ok(Arc::clone(file));
        }

        let doc = self.store.get(name)?;
        let doc_key = doc.key();
        if let Some(file) = self.parsed.get(&doc_key).cloned() {
            self.parsed.insert(key, Arc::clone(&file));
            return Ok(file);
        }

        // Inline colours extend the session table, so load it first
        self.colors();
        let file = parse_document(&doc, self);
        if let Some(table) = self.colors.as_mut() {
            table.extend(file.colors.iter().cloned());
        }
        for synthetic in &file.synthetic {
            self.parsed
                .insert(synthetic.filename.clone(), Arc::clone(synthetic));
        }

        let file = Arc::new(file);
        if key != doc_key {
            self.parsed.insert(key, Arc::clone(&file));
        }
        self.parsed.insert(doc_key, Arc::clone(&file));
        Ok(file)
    }

    /// The session colour table, loaded on first use.
    ///
    /// The alternate table falls back to the standard one when missing;
    /// with neither available the table is empty and every lookup falls
    /// back to the default colour. Rejected definitions become warnings.
    pub fn colors(&mut self) -> &ColorTable {
        if self.colors.is_none() {
            let names = [
                ColorTable::table_name(self.config.use_alt_colors),
                ColorTable::table_name(false),
            ];
            let table = match names.iter().find_map(|name| self.store.get(name).ok()) {
                Some(doc) => {
                    let (table, errors) = ColorTable::parse_with_errors(&doc.lines);
                    for (index, error) in errors {
                        let reason = ParseError::from(error).to_string();
                        self.push_warning(Warning::new(
                            doc.key(),
                            doc.first_line + index,
                            WarningKind::MalformedLine(reason),
                        ));
                    }
                    table
                }
                None => {
                    log::debug!("No colour table found, using default colours");
                    ColorTable::new()
                }
            };
            self.colors = Some(table);
        }
        self.colors.get_or_insert_with(ColorTable::new)
    }

    pub fn texmaps(&self) -> &TexmapRegistry {
        &self.texmaps
    }

    /// Cached geometry of a key, if it was resolved in this session.
    pub fn cached_geometry(&self, key: &GeometryKey) -> Option<&Arc<ResolvedGeometry>> {
        self.geometry.get(key)
    }

    pub fn geometry_cache_len(&self) -> usize {
        self.geometry.len()
    }

    /// Every warning recorded since the last reset.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub(crate) fn push_warning(&mut self, warning: Warning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

impl<R: FileResolver> ParseContext for Session<R> {
    fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn part_type_of(&mut self, filename: &str) -> Option<PartType> {
        if let Some(file) = self.parsed.get(&normalize_name(filename)) {
            return Some(file.part_type);
        }
        // Header scan only, so classification never recurses
        self.store
            .get(filename)
            .ok()
            .map(|doc| classify_document(&doc))
    }

    fn exists(&mut self, filename: &str) -> bool {
        self.store.exists(filename)
    }

    fn register_texmap(&mut self, tokens: &[&str]) -> TexmapResult<TexmapId> {
        self.texmaps.register(tokens)
    }

    fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldraw::store::MemoryResolver;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.chosen_logo, "logo3");
        assert!(config.texture_support);
        assert!(!config.wants_edges());
        assert_eq!(config.extra_part_coloring, ExtraPartColoring::PerColor);
    }

    #[test]
    fn test_config_from_json() {
        let config = SessionConfig::from_json_str(
            r#"{ "import_edges": true, "chosen_logo": "logo5", "extra_part_coloring": "shared" }"#,
        )
        .unwrap();
        assert!(config.import_edges);
        assert!(config.wants_edges());
        assert_eq!(config.chosen_logo, "logo5");
        assert_eq!(config.extra_part_coloring, ExtraPartColoring::Shared);
        assert!(config.texture_support);

        let json = config.to_json_string().unwrap();
        assert_eq!(SessionConfig::from_json_str(&json).unwrap(), config);
        assert!(SessionConfig::from_json_str("{ \"no_studs\": 3 }").is_err());
    }

    #[test]
    fn test_colors_loaded_once() {
        let resolver = MemoryResolver::new()
            .with_file("LDConfig.ldr", "0 !COLOUR Red CODE 4 VALUE #C91A09 EDGE #333333\n")
            .with_file("LDCfgalt.ldr", "0 !COLOUR Red CODE 4 VALUE #FF0000 EDGE #000000\n");
        let mut session = Session::new(resolver, SessionConfig::default());

        assert!(session.colors().is_known("4"));
        let standard = session.colors().lookup("4").color;

        session.reset_with(SessionConfig {
            use_alt_colors: true,
            ..Default::default()
        });
        let alternate = session.colors().lookup("4").color;
        assert!((standard - alternate).length() > 0.01);
    }

    #[test]
    fn test_parsed_cache_and_inline_colours() {
        let resolver = MemoryResolver::new().with_file(
            "m.ldr",
            "0 !COLOUR Custom CODE 900 VALUE #123456 EDGE #000000\n3 900 0 0 0 1 0 0 0 1 0\n",
        );
        let mut session = Session::new(resolver, SessionConfig::default());

        let first = session.parsed("M.LDR").unwrap();
        let second = session.parsed("m.ldr").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(session.colors().is_known("900"));
        assert!(session.parsed("m.ldr#extra").is_ok());
        assert!(session.parsed("missing.dat").is_err());
    }
}
