use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::info;

use crate::world::{
    Block, BlockCoord, CoverOverlay, Direction, LayoutFormat, MapDescriptor, MapId, MapKind,
    MapLayout, NpcDescriptor, NpcRosterDescriptor, QuestAnchors, MAX_MOBILE_NPCS,
};
use crate::AppPaths;

use super::catalog::WorldCatalog;
use super::discovery::collect_xml_files_sorted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    UnknownAttribute,
    DuplicateElement,
    MissingField,
    InvalidValue,
    InvalidLayout,
    DuplicateMapId,
    RosterFull,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

const MAP_ATTRIBUTES: &[&str] = &["id", "name", "kind", "width", "height", "boundary"];
const NPC_ATTRIBUTES: &[&str] = &["role", "graphic", "x", "y", "facing", "dialogue"];
const ANCHOR_ATTRIBUTES: &[&str] = &["x", "y"];

/// Compiles every world file under the content directory into one catalog.
pub fn compile_world_catalog(app_paths: &AppPaths) -> Result<WorldCatalog, ContentCompileError> {
    let xml_files =
        collect_xml_files_sorted(&app_paths.content_dir).map_err(|error| ContentCompileError {
            code: ContentErrorCode::ReadFile,
            message: format!("failed to list world content: {}", error.source),
            file_path: error.path,
            location: None,
        })?;

    let mut catalog = WorldCatalog::new();
    for xml_file in xml_files {
        let raw = fs::read_to_string(&xml_file).map_err(|source| ContentCompileError {
            code: ContentErrorCode::ReadFile,
            message: format!("failed to read XML file: {source}"),
            file_path: xml_file.clone(),
            location: None,
        })?;
        compile_world_source(&xml_file, &raw, &mut catalog)?;
    }

    info!(
        maps = catalog.len(),
        content_dir = %app_paths.content_dir.display(),
        "world_catalog_compiled"
    );
    Ok(catalog)
}

/// Parses one `<World>` document into `catalog`. Map ids must be unique
/// across everything already in the catalog.
pub fn compile_world_source(
    file_path: &Path,
    raw: &str,
    catalog: &mut WorldCatalog,
) -> Result<(), ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = ParseContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "World" {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <World>".to_string(),
            root,
        ));
    }

    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "Map" {
            return Err(ctx.error_at(
                ContentErrorCode::UnknownElement,
                format!(
                    "unsupported element <{}>; <World> holds only <Map>",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        let (map, roster) = ctx.parse_map(child)?;
        if catalog.contains(map.id) {
            return Err(ctx.error_at(
                ContentErrorCode::DuplicateMapId,
                format!("map id {} is defined more than once", map.id.0),
                child,
            ));
        }
        catalog.insert(map, roster);
    }
    Ok(())
}

struct ParseContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn parse_map(
        &self,
        node: Node<'_, '_>,
    ) -> Result<(MapDescriptor, NpcRosterDescriptor), ContentCompileError> {
        self.reject_unknown_attributes(node, MAP_ATTRIBUTES)?;
        let id = MapId(self.parsed_attribute::<u8>(node, "id")?);
        let name = self.required_attribute(node, "name")?.to_string();
        let kind_token = self.required_attribute(node, "kind")?;
        let kind = MapKind::from_token(kind_token).ok_or_else(|| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("invalid kind '{kind_token}'; allowed values: Outdoor, Town, Dungeon"),
                node,
            )
        })?;
        let width = self.parsed_attribute::<u16>(node, "width")?;
        let height = self.parsed_attribute::<u16>(node, "height")?;
        let boundary_token = self.required_attribute(node, "boundary")?;
        let boundary = Block::from_name(boundary_token).ok_or_else(|| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("unknown boundary block '{boundary_token}'"),
                node,
            )
        })?;

        let mut seen = HashSet::<&str>::new();
        let mut layout: Option<MapLayout> = None;
        let mut cover: Option<CoverOverlay> = None;
        let mut anchors = QuestAnchors::default();
        let mut roster = NpcRosterDescriptor::default();

        for child in node.children().filter(|child| child.is_element()) {
            let element = child.tag_name().name();
            if element != "Npc" && !seen.insert(element) {
                return Err(self.error_at(
                    ContentErrorCode::DuplicateElement,
                    format!("duplicate element <{element}> in <Map>"),
                    child,
                ));
            }
            match element {
                "Layout" => {
                    let bytes = self.hex_text(child, "Layout")?;
                    let parsed = match kind.layout_format() {
                        LayoutFormat::RunLengthRows => MapLayout::run_length(width, height, bytes),
                        LayoutFormat::NibbleGrid => MapLayout::nibble_grid(width, height, bytes),
                    };
                    layout = Some(parsed.map_err(|error| {
                        self.error_at(ContentErrorCode::InvalidLayout, error.to_string(), child)
                    })?);
                }
                "Cover" => {
                    let bits = self.hex_text(child, "Cover")?;
                    cover = Some(CoverOverlay::from_bytes(width, height, bits).map_err(
                        |error| {
                            self.error_at(ContentErrorCode::InvalidLayout, error.to_string(), child)
                        },
                    )?);
                }
                "Bridge" => {
                    anchors.bridge = Some(self.anchor(child, width, height)?);
                }
                "SecretPassage" => {
                    anchors.secret_passage = Some(self.anchor(child, width, height)?);
                }
                "Npc" => {
                    let (mobile, entry) = self.parse_npc(child, width, height)?;
                    if mobile {
                        if roster.mobile.len() == MAX_MOBILE_NPCS {
                            return Err(self.error_at(
                                ContentErrorCode::RosterFull,
                                format!(
                                    "map {} has more than {MAX_MOBILE_NPCS} mobile NPCs",
                                    id.0
                                ),
                                child,
                            ));
                        }
                        roster.mobile.push(entry);
                    } else {
                        roster.stationary.push(entry);
                    }
                }
                _ => {
                    return Err(self.error_at(
                        ContentErrorCode::UnknownElement,
                        format!("unknown element <{element}> in <Map>"),
                        child,
                    ))
                }
            }
        }

        let Some(layout) = layout else {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                "missing required element <Layout> in <Map>".to_string(),
                node,
            ));
        };

        let map = MapDescriptor {
            id,
            name,
            kind,
            boundary,
            layout,
            cover,
            anchors,
        };
        Ok((map, roster))
    }

    fn parse_npc(
        &self,
        node: Node<'_, '_>,
        width: u16,
        height: u16,
    ) -> Result<(bool, NpcDescriptor), ContentCompileError> {
        self.reject_unknown_attributes(node, NPC_ATTRIBUTES)?;
        let mobile = match self.required_attribute(node, "role")? {
            "Mobile" => true,
            "Stationary" => false,
            other => {
                return Err(self.error_at(
                    ContentErrorCode::InvalidValue,
                    format!("invalid role '{other}'; allowed values: Mobile, Stationary"),
                    node,
                ))
            }
        };
        let graphic = self.parsed_attribute::<u8>(node, "graphic")?;
        let position = self.anchor(node, width, height)?;
        let facing = match node.attribute("facing") {
            None => Direction::Down,
            Some(token) => Direction::from_token(token).ok_or_else(|| {
                self.error_at(
                    ContentErrorCode::InvalidValue,
                    format!("invalid facing '{token}'"),
                    node,
                )
            })?,
        };
        let dialogue = match node.attribute("dialogue") {
            None => 0,
            Some(_) => self.parsed_attribute::<u8>(node, "dialogue")?,
        };
        Ok((
            mobile,
            NpcDescriptor {
                graphic,
                position,
                facing,
                dialogue,
            },
        ))
    }

    fn anchor(
        &self,
        node: Node<'_, '_>,
        width: u16,
        height: u16,
    ) -> Result<BlockCoord, ContentCompileError> {
        if node.tag_name().name() != "Npc" {
            self.reject_unknown_attributes(node, ANCHOR_ATTRIBUTES)?;
        }
        let x = self.parsed_attribute::<u16>(node, "x")?;
        let y = self.parsed_attribute::<u16>(node, "y")?;
        if x >= width || y >= height {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("coordinate ({x}, {y}) is outside the {width}x{height} map"),
                node,
            ));
        }
        Ok(BlockCoord::new(x, y))
    }

    fn reject_unknown_attributes(
        &self,
        node: Node<'_, '_>,
        allowed: &[&str],
    ) -> Result<(), ContentCompileError> {
        match node
            .attributes()
            .find(|attribute| !allowed.contains(&attribute.name()))
        {
            Some(attribute) => Err(self.error_at(
                ContentErrorCode::UnknownAttribute,
                format!(
                    "unknown attribute '{}' on <{}>",
                    attribute.name(),
                    node.tag_name().name()
                ),
                node,
            )),
            None => Ok(()),
        }
    }

    fn required_attribute<'n>(
        &self,
        node: Node<'n, '_>,
        name: &str,
    ) -> Result<&'n str, ContentCompileError> {
        match node.attribute(name).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(self.error_at(
                ContentErrorCode::MissingField,
                format!(
                    "missing required attribute '{name}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            )),
        }
    }

    fn parsed_attribute<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        name: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.required_attribute(node, name)?;
        value.parse::<T>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("attribute '{name}' has invalid value '{value}'"),
                node,
            )
        })
    }

    fn hex_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<Vec<u8>, ContentCompileError> {
        let digits = node
            .text()
            .unwrap_or_default()
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<Vec<_>>();
        if digits.len() % 2 != 0 {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("<{field_name}> has an odd number of hex digits"),
                node,
            ));
        }
        digits
            .chunks(2)
            .map(|pair| {
                let high = pair[0].to_digit(16);
                let low = pair[1].to_digit(16);
                match (high, low) {
                    (Some(high), Some(low)) => Ok((high * 16 + low) as u8),
                    _ => Err(self.error_at(
                        ContentErrorCode::InvalidValue,
                        format!("<{field_name}> contains non-hex characters"),
                        node,
                    )),
                }
            })
            .collect()
    }

    fn error_at(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::world::{BlockResolver, QuestState, Viewer};

    fn setup_app_paths(root: &Path) -> AppPaths {
        let content = root.join("assets").join("world");
        fs::create_dir_all(&content).expect("content dir");
        AppPaths {
            root: root.to_path_buf(),
            content_dir: content.clone(),
            session_config_path: content.join("session.json"),
            tile_atlas_path: root.join("assets").join("tiles.png"),
        }
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn compile_str(raw: &str) -> Result<WorldCatalog, ContentCompileError> {
        let mut catalog = WorldCatalog::new();
        compile_world_source(Path::new("world.xml"), raw, &mut catalog)?;
        Ok(catalog)
    }

    #[test]
    fn outdoor_map_with_anchors_and_npcs_compiles() {
        // Two rows of width 4: grass x3 + water, then water x4.
        let catalog = compile_str(
            r#"<World>
                <Map id="1" name="overworld" kind="Outdoor" width="4" height="2" boundary="Water">
                    <Layout>02 40  43</Layout>
                    <Bridge x="3" y="0"/>
                    <Npc role="Mobile" graphic="2" x="1" y="0" facing="Left" dialogue="17"/>
                    <Npc role="Stationary" graphic="5" x="0" y="0"/>
                </Map>
            </World>"#,
        )
        .expect("compile");

        let map = catalog.map(MapId(1)).expect("map 1");
        assert_eq!(map.name, "overworld");
        assert_eq!((map.width(), map.height()), (4, 2));
        assert_eq!(map.anchors.bridge, Some(BlockCoord::new(3, 0)));
        let quest = QuestState::new();
        let resolver = BlockResolver::new(map, &quest, Viewer::at(BlockCoord::new(0, 0)));
        assert_eq!(resolver.terrain(2, 0), Block::Grass);
        assert!(matches!(resolver.terrain(3, 1), Block::Water | Block::Shore(_)));

        let roster = catalog.roster(MapId(1));
        assert_eq!(roster.mobile.len(), 1);
        assert_eq!(roster.mobile[0].facing, Direction::Left);
        assert_eq!(roster.mobile[0].dialogue, 17);
        assert_eq!(roster.stationary[0].facing, Direction::Down);
    }

    #[test]
    fn town_cover_bitmap_is_attached() {
        let catalog = compile_str(
            r#"<World>
                <Map id="3" name="town" kind="Town" width="3" height="2" boundary="Grass">
                    <Layout>6660 6660</Layout>
                    <Cover>20 00</Cover>
                </Map>
            </World>"#,
        )
        .expect("compile");
        let map = catalog.map(MapId(3)).expect("map 3");
        assert!(map.is_covered(BlockCoord::new(2, 0)));
        assert!(!map.is_covered(BlockCoord::new(1, 0)));
        assert!(!map.is_covered(BlockCoord::new(2, 1)));
    }

    #[test]
    fn layout_row_overrun_reports_invalid_layout_with_location() {
        let err = compile_str(
            "<World>\n<Map id=\"1\" name=\"o\" kind=\"Outdoor\" width=\"2\" height=\"1\" boundary=\"Water\">\n<Layout>03</Layout>\n</Map>\n</World>",
        )
        .expect_err("overrun");
        assert_eq!(err.code, ContentErrorCode::InvalidLayout);
        assert_eq!(err.location.map(|loc| loc.line), Some(3));
    }

    #[test]
    fn missing_layout_errors() {
        let err = compile_str(
            r#"<World><Map id="1" name="d" kind="Dungeon" width="2" height="2" boundary="Stone"/></World>"#,
        )
        .expect_err("missing layout");
        assert_eq!(err.code, ContentErrorCode::MissingField);
    }

    #[test]
    fn unknown_attribute_and_element_error() {
        let attribute = compile_str(
            r#"<World><Map id="1" name="d" kind="Dungeon" width="2" height="1" boundary="Stone" music="3"><Layout>22</Layout></Map></World>"#,
        )
        .expect_err("unknown attribute");
        assert_eq!(attribute.code, ContentErrorCode::UnknownAttribute);

        let element = compile_str(
            r#"<World><Map id="1" name="d" kind="Dungeon" width="2" height="1" boundary="Stone"><Layout>22</Layout><Music/></Map></World>"#,
        )
        .expect_err("unknown element");
        assert_eq!(element.code, ContentErrorCode::UnknownElement);
    }

    #[test]
    fn invalid_kind_and_boundary_error() {
        let kind = compile_str(
            r#"<World><Map id="1" name="d" kind="Cellar" width="2" height="1" boundary="Stone"><Layout>22</Layout></Map></World>"#,
        )
        .expect_err("bad kind");
        assert_eq!(kind.code, ContentErrorCode::InvalidValue);

        let boundary = compile_str(
            r#"<World><Map id="1" name="d" kind="Dungeon" width="2" height="1" boundary="Lava"><Layout>22</Layout></Map></World>"#,
        )
        .expect_err("bad boundary");
        assert_eq!(boundary.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn eleventh_mobile_npc_is_rejected() {
        let npcs = (0..11)
            .map(|x| format!(r#"<Npc role="Mobile" graphic="1" x="{x}" y="0"/>"#))
            .collect::<String>();
        let raw = format!(
            r#"<World><Map id="2" name="t" kind="Town" width="12" height="1" boundary="Grass"><Layout>666666666666</Layout>{npcs}</Map></World>"#
        );
        let err = compile_str(&raw).expect_err("roster full");
        assert_eq!(err.code, ContentErrorCode::RosterFull);
    }

    #[test]
    fn npc_outside_map_is_rejected() {
        let err = compile_str(
            r#"<World><Map id="2" name="t" kind="Town" width="2" height="1" boundary="Grass"><Layout>66</Layout><Npc role="Mobile" graphic="1" x="2" y="0"/></Map></World>"#,
        )
        .expect_err("outside");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn duplicate_map_ids_across_files_error() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        let map = r#"<World><Map id="4" name="d" kind="Dungeon" width="2" height="1" boundary="Stone"><Layout>22</Layout></Map></World>"#;
        write_file(&app.content_dir.join("a.xml"), map);
        write_file(&app.content_dir.join("nested").join("b.xml"), map);

        let err = compile_world_catalog(&app).expect_err("duplicate");
        assert_eq!(err.code, ContentErrorCode::DuplicateMapId);
        assert!(err.file_path.ends_with(Path::new("nested").join("b.xml")));
        assert!(err.location.is_some());
    }

    #[test]
    fn malformed_xml_reports_location() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(&app.content_dir.join("world.xml"), "<World><Map></World>");
        let err = compile_world_catalog(&app).expect_err("malformed");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn wrong_root_is_rejected() {
        let err = compile_str("<Defs/>").expect_err("root");
        assert_eq!(err.code, ContentErrorCode::InvalidRoot);
    }
}
