use tile_engine::world::{QuestState, WorldSession};
use tile_engine::{compile_world_catalog, resolve_app_paths, AppPaths, Game, LoopConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::session_config::{load_session_config, start_override_from_env};
use super::world_game::{find_spawn, WorldGame};

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) paths: AppPaths,
    pub(crate) game: Box<dyn Game>,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Tile World Startup ===");

    let paths = resolve_app_paths().map_err(|error| error.to_string())?;
    info!(
        root = %paths.root.display(),
        content_dir = %paths.content_dir.display(),
        session_config = %paths.session_config_path.display(),
        "startup"
    );
    let session_config = load_session_config(&paths.session_config_path)?;
    let catalog = compile_world_catalog(&paths).map_err(|error| error.to_string())?;

    let start = start_override_from_env()?;
    let start_map = start.map_or(session_config.start_map, |start| start.map);
    let map = catalog
        .map(start_map)
        .ok_or_else(|| format!("start map {start_map} is not defined in the world content"))?;
    let spawn = start
        .and_then(|start| start.spawn)
        .or(session_config.spawn)
        .or_else(|| find_spawn(map))
        .ok_or_else(|| format!("start map {start_map} has no walkable block"))?;

    let session = WorldSession::new(
        catalog,
        session_config.world,
        start_map,
        spawn,
        QuestState::default(),
    )
    .map_err(|error| error.to_string())?;

    Ok(AppWiring {
        config: session_config.loop_config,
        paths,
        game: Box::new(WorldGame::new(session)),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tile_engine::world::{BlockCoord, MapId, MapKind};
    use tile_engine::{compile_world_source, WorldCatalog};

    use super::super::session_config::parse_session_config;
    use super::*;

    const SHIPPED_WORLD: &str = include_str!("../../../../assets/world/world.xml");
    const SHIPPED_SESSION: &str = include_str!("../../../../assets/world/session.json");

    #[test]
    fn shipped_content_starts_a_session() {
        let mut catalog = WorldCatalog::new();
        compile_world_source(Path::new("world.xml"), SHIPPED_WORLD, &mut catalog)
            .expect("shipped world");
        let config = parse_session_config(SHIPPED_SESSION).expect("shipped session");

        let kinds = catalog.maps().map(|map| map.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![MapKind::Outdoor, MapKind::Town, MapKind::Dungeon]);
        assert_eq!(config.start_map, MapId(2));
        assert_eq!(config.spawn, Some(BlockCoord::new(4, 6)));

        let session = WorldSession::new(
            catalog,
            config.world,
            config.start_map,
            BlockCoord::new(4, 6),
            QuestState::default(),
        )
        .expect("session");
        assert_eq!(session.roster().mobile().len(), 3);
    }

    #[test]
    fn every_shipped_map_has_a_spawn() {
        let mut catalog = WorldCatalog::new();
        compile_world_source(Path::new("world.xml"), SHIPPED_WORLD, &mut catalog)
            .expect("shipped world");

        for map in catalog.maps() {
            assert!(find_spawn(map).is_some(), "{} has no spawn", map.name);
        }
    }
}
