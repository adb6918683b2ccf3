use std::io::Write;
use std::path::PathBuf;

use tile_engine::world::{
    BlockCoord, BlockResolver, MapDescriptor, MapId, QuestFlags, QuestState, Viewer,
};
use tile_engine::{app_paths_at, compile_world_catalog, resolve_app_paths, WorldCatalog};

pub const DEFAULT_LIGHT_RADIUS: u8 = 1;

#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Project root; falls back to the engine's root discovery.
    pub root: Option<PathBuf>,
    /// Light radius for dungeon maps; `None` uses [`DEFAULT_LIGHT_RADIUS`].
    pub light: Option<u8>,
    pub under_cover: bool,
    /// Print collision terrain instead of the viewer-relative display.
    pub terrain_only: bool,
    pub flags: QuestFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    List,
    Render {
        map: String,
        at: Option<BlockCoord>,
    },
    Probe {
        map: String,
        x: i32,
        y: i32,
    },
}

pub fn run(kind: CommandKind, options: DumpOptions, out: &mut dyn Write) -> Result<(), String> {
    let paths = match options.root.as_deref() {
        Some(root) => app_paths_at(root),
        None => resolve_app_paths(),
    }
    .map_err(|error| error.to_string())?;
    let catalog = compile_world_catalog(&paths).map_err(|error| error.to_string())?;
    run_with_catalog(&kind, &options, &catalog, out)
}

pub fn run_with_catalog(
    kind: &CommandKind,
    options: &DumpOptions,
    catalog: &WorldCatalog,
    out: &mut dyn Write,
) -> Result<(), String> {
    let mut quest = QuestState::default();
    quest.flags = options.flags;
    match kind {
        CommandKind::List => list_maps(catalog, out),
        CommandKind::Render { map, at } => {
            let map = select_map(catalog, map)?;
            let at = at.unwrap_or_else(|| map_center(map));
            if !map.contains(i32::from(at.x), i32::from(at.y)) {
                return Err(format!("viewer {},{} is outside {}", at.x, at.y, map.name));
            }
            let resolver = BlockResolver::new(map, &quest, viewer(options, at));
            render_map(&resolver, options.terrain_only, out)
        }
        CommandKind::Probe { map, x, y } => {
            let map = select_map(catalog, map)?;
            let resolver = BlockResolver::new(map, &quest, viewer(options, map_center(map)));
            probe_block(&resolver, *x, *y, out)
        }
    }
}

/// Accepts a numeric map id or a map name.
pub fn select_map<'a>(catalog: &'a WorldCatalog, token: &str) -> Result<&'a MapDescriptor, String> {
    let by_id = token.parse::<u8>().ok().and_then(|id| catalog.map(MapId(id)));
    by_id
        .or_else(|| catalog.map_by_name(token))
        .ok_or_else(|| format!("unknown map '{token}'"))
}

fn viewer(options: &DumpOptions, at: BlockCoord) -> Viewer {
    Viewer {
        under_cover: options.under_cover,
        light_radius: options.light.unwrap_or(DEFAULT_LIGHT_RADIUS),
        ..Viewer::at(at)
    }
}

fn map_center(map: &MapDescriptor) -> BlockCoord {
    BlockCoord::new(map.width() / 2, map.height() / 2)
}

fn list_maps(catalog: &WorldCatalog, out: &mut dyn Write) -> Result<(), String> {
    for map in catalog.maps() {
        let roster = catalog.roster(map.id);
        writeln!(
            out,
            "{} name={} kind={:?} size={}x{} mobile={} stationary={} cover={}",
            map.id.0,
            map.name,
            map.kind,
            map.width(),
            map.height(),
            roster.mobile.len(),
            roster.stationary.len(),
            map.cover.is_some()
        )
        .map_err(|error| format!("failed to write output: {error}"))?;
    }
    Ok(())
}

/// One glyph per block, with a one-block ring of boundary around the map.
fn render_map(
    resolver: &BlockResolver<'_>,
    terrain_only: bool,
    out: &mut dyn Write,
) -> Result<(), String> {
    let map = resolver.map();
    let viewer = resolver.viewer();
    writeln!(
        out,
        "{} {} {:?} {}x{} viewer={},{} light={} under_cover={}",
        map.id,
        map.name,
        map.kind,
        map.width(),
        map.height(),
        viewer.x,
        viewer.y,
        viewer.light_radius,
        viewer.under_cover
    )
    .map_err(|error| format!("failed to write output: {error}"))?;

    for y in -1..=i32::from(map.height()) {
        let row = (-1..=i32::from(map.width()))
            .map(|x| {
                if terrain_only {
                    resolver.terrain(x, y).glyph()
                } else {
                    resolver.resolve(x, y).block.glyph()
                }
            })
            .collect::<String>();
        writeln!(out, "{}", row.trim_end())
            .map_err(|error| format!("failed to write output: {error}"))?;
    }
    Ok(())
}

fn probe_block(
    resolver: &BlockResolver<'_>,
    x: i32,
    y: i32,
    out: &mut dyn Write,
) -> Result<(), String> {
    let map = resolver.map();
    let resolved = resolver.resolve(x, y);
    let coord = map.in_bounds(x, y);
    writeln!(
        out,
        "map={} x={x} y={y} in_bounds={} terrain={} resolved={} fog={:#04x} covered={} walkable={}",
        map.id.0,
        coord.is_some(),
        resolver.terrain(x, y).name(),
        resolved.block.name(),
        resolved.fog.bits(),
        coord.is_some_and(|coord| map.is_covered(coord)),
        coord.is_some_and(|coord| resolver.is_walkable(coord))
    )
    .map_err(|error| format!("failed to write output: {error}"))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;
    use tile_engine::compile_world_source;

    use super::*;

    const WORLD: &str = r#"<World>
  <Map id="1" name="isle" kind="Outdoor" width="4" height="3" boundary="Water">
    <Layout>03 41 01 43</Layout>
  </Map>
  <Map id="2" name="crypt" kind="Dungeon" width="4" height="4" boundary="Stone">
    <Layout>0000 0220 0240 0000</Layout>
  </Map>
  <Map id="3" name="hamlet" kind="Town" width="4" height="2" boundary="Stone">
    <Layout>0300 0000</Layout>
    <Cover>80 00</Cover>
    <Npc role="Stationary" graphic="1" x="1" y="1" dialogue="2"/>
  </Map>
</World>"#;

    fn catalog() -> WorldCatalog {
        let mut catalog = WorldCatalog::new();
        compile_world_source(Path::new("world.xml"), WORLD, &mut catalog).expect("world");
        catalog
    }

    fn dump(kind: CommandKind, options: &DumpOptions) -> String {
        let mut out = Vec::new();
        run_with_catalog(&kind, options, &catalog(), &mut out).expect("dump");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn list_prints_one_line_per_map_in_id_order() {
        let text = dump(CommandKind::List, &DumpOptions::default());
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("1 name=isle kind=Outdoor size=4x3"));
        assert!(lines[2].ends_with("mobile=0 stationary=1 cover=true"));
    }

    #[test]
    fn select_map_accepts_ids_and_names() {
        let catalog = catalog();

        assert_eq!(select_map(&catalog, "2").expect("id").name, "crypt");
        assert_eq!(select_map(&catalog, "hamlet").expect("name").id, MapId(3));
        assert!(select_map(&catalog, "9").is_err());
    }

    #[test]
    fn dungeon_render_blanks_outside_the_light() {
        let options = DumpOptions {
            light: Some(1),
            ..DumpOptions::default()
        };
        let text = dump(
            CommandKind::Render {
                map: "crypt".to_string(),
                at: Some(BlockCoord::new(1, 1)),
            },
            &options,
        );
        let rows = text.lines().skip(1).collect::<Vec<_>>();

        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], "######");
        assert_eq!(rows[1], "#### #");
        assert_eq!(rows[2], "##__ #");
        assert_eq!(rows[3], "##_$ #");
        assert_eq!(rows[4], "#    #");
    }

    #[test]
    fn terrain_only_render_ignores_light() {
        let options = DumpOptions {
            light: Some(0),
            terrain_only: true,
            ..DumpOptions::default()
        };
        let text = dump(
            CommandKind::Render {
                map: "crypt".to_string(),
                at: None,
            },
            &options,
        );
        let rows = text.lines().skip(1).collect::<Vec<_>>();

        assert_eq!(rows[0], "######");
        assert_eq!(rows[3], "##_$##");
    }

    #[test]
    fn render_rejects_viewer_outside_map() {
        let mut out = Vec::new();
        let kind = CommandKind::Render {
            map: "crypt".to_string(),
            at: Some(BlockCoord::new(9, 0)),
        };
        let error = run_with_catalog(&kind, &DumpOptions::default(), &catalog(), &mut out)
            .expect_err("outside");

        assert!(error.contains("outside crypt"));
    }

    #[test]
    fn probe_reports_cover_filler_and_walkability() {
        let text = dump(
            CommandKind::Probe {
                map: "hamlet".to_string(),
                x: 0,
                y: 0,
            },
            &DumpOptions::default(),
        );

        assert!(text.contains("terrain=Grass"));
        assert!(text.contains("resolved=SmallTiles"));
        assert!(text.contains("covered=true walkable=true"));
    }

    #[test]
    fn probe_outside_bounds_reports_boundary() {
        let text = dump(
            CommandKind::Probe {
                map: "2".to_string(),
                x: -3,
                y: 1,
            },
            &DumpOptions::default(),
        );

        assert!(text.contains("in_bounds=false terrain=Stone"));
        assert!(text.ends_with("walkable=false\n"));
    }

    #[test]
    fn run_reads_content_below_an_explicit_root() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        let world_dir = temp.path().join("assets").join("world");
        fs::create_dir_all(&world_dir).expect("world dir");
        fs::write(world_dir.join("world.xml"), WORLD).expect("world xml");

        let options = DumpOptions {
            root: Some(temp.path().to_path_buf()),
            ..DumpOptions::default()
        };
        let mut out = Vec::new();
        run(CommandKind::List, options, &mut out).expect("run");

        assert_eq!(String::from_utf8(out).expect("utf8").lines().count(), 3);
    }
}
