use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tile_engine::world::{BlockCoord, MapId, WorldConfig};
use tile_engine::LoopConfig;
use tracing::info;

pub(crate) const START_MAP_ENV_VAR: &str = "TILEWORLD_START_MAP";

/// Contents of `assets/world/session.json`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionConfig {
    #[serde(rename = "loop")]
    pub(crate) loop_config: LoopConfig,
    pub(crate) world: WorldConfig,
    pub(crate) start_map: MapId,
    /// Spawn block; the nearest walkable block to the map centre when absent.
    pub(crate) spawn: Option<BlockCoord>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            loop_config: LoopConfig::default(),
            world: WorldConfig::default(),
            start_map: MapId(1),
            spawn: None,
        }
    }
}

/// Start override parsed from `TILEWORLD_START_MAP`: `"<id>"` or `"<id>:<x>,<y>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StartOverride {
    pub(crate) map: MapId,
    pub(crate) spawn: Option<BlockCoord>,
}

pub(crate) fn load_session_config(path: &Path) -> Result<SessionConfig, String> {
    match fs::read_to_string(path) {
        Ok(raw) => parse_session_config(&raw)
            .map_err(|error| format!("session config '{}': {error}", path.display())),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "session_config_missing_using_defaults");
            Ok(SessionConfig::default())
        }
        Err(error) => Err(format!(
            "read session config '{}': {error}",
            path.display()
        )),
    }
}

pub(crate) fn parse_session_config(raw: &str) -> Result<SessionConfig, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, SessionConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse session json: {source}"))
            } else {
                Err(format!("parse session json at {path}: {source}"))
            }
        }
    }
}

pub(crate) fn start_override_from_env() -> Result<Option<StartOverride>, String> {
    match std::env::var(START_MAP_ENV_VAR) {
        Ok(raw) => parse_start_override(&raw).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(error) => Err(format!("read {START_MAP_ENV_VAR}: {error}")),
    }
}

pub(crate) fn parse_start_override(raw: &str) -> Result<StartOverride, String> {
    let invalid =
        || format!("invalid {START_MAP_ENV_VAR} value '{raw}' (expected <id> or <id>:<x>,<y>)");
    let (map_part, spawn_part) = match raw.trim().split_once(':') {
        Some((map, spawn)) => (map, Some(spawn)),
        None => (raw.trim(), None),
    };
    let map = map_part.trim().parse::<u8>().map_err(|_| invalid())?;
    let spawn = match spawn_part {
        Some(spawn) => {
            let (x, y) = spawn.split_once(',').ok_or_else(invalid)?;
            let x = x.trim().parse::<u16>().map_err(|_| invalid())?;
            let y = y.trim().parse::<u16>().map_err(|_| invalid())?;
            Some(BlockCoord::new(x, y))
        }
        None => None,
    };
    Ok(StartOverride {
        map: MapId(map),
        spawn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_object_uses_defaults() {
        let config = parse_session_config("{}").expect("config");
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn nested_sections_are_read() {
        let config = parse_session_config(
            r#"{
                "loop": { "target_tps": 30 },
                "world": { "npc_seed": 7, "light_radius": 2 },
                "start_map": 3,
                "spawn": { "x": 4, "y": 5 }
            }"#,
        )
        .expect("config");

        assert_eq!(config.loop_config.target_tps, 30);
        assert_eq!(config.world.npc_seed, 7);
        assert_eq!(config.world.light_radius, 2);
        assert_eq!(config.start_map, MapId(3));
        assert_eq!(config.spawn, Some(BlockCoord::new(4, 5)));
    }

    #[test]
    fn errors_name_the_offending_field() {
        let error = parse_session_config(r#"{ "world": { "npc_sub_steps": "fast" } }"#)
            .expect_err("string is not a number");
        assert!(error.contains("world.npc_sub_steps"), "{error}");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let temp = TempDir::new().expect("temp");
        let config = load_session_config(&temp.path().join("session.json")).expect("defaults");
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn start_override_accepts_map_and_optional_spawn() {
        assert_eq!(
            parse_start_override("2").expect("map only"),
            StartOverride {
                map: MapId(2),
                spawn: None
            }
        );
        assert_eq!(
            parse_start_override("3:10, 12").expect("map and spawn"),
            StartOverride {
                map: MapId(3),
                spawn: Some(BlockCoord::new(10, 12))
            }
        );
        assert!(parse_start_override("town").is_err());
        assert!(parse_start_override("3:10").is_err());
    }
}
