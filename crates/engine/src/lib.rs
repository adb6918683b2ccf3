use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;
pub mod world;

pub use app::{
    run_app, run_app_with_metrics, AppError, FrameView, Game, GameCommand, InputAction,
    InputSnapshot, LoopConfig, LoopMetricsSnapshot, MetricsHandle, Renderer, SCREEN_HEIGHT_PX,
    SCREEN_WIDTH_PX, SLOW_FRAME_ENV_VAR,
};
pub use content::{
    compile_world_catalog, compile_world_source, ContentCompileError, ContentErrorCode,
    SourceLocation, WorldCatalog,
};

pub const ROOT_ENV_VAR: &str = "TILEWORLD_ROOT";

/// Filesystem locations the engine reads from, all below the project root.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    /// Directory scanned for `*.xml` world definitions.
    pub content_dir: PathBuf,
    pub session_config_path: PathBuf,
    pub tile_atlas_path: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        let assets = root.join("assets");
        let content_dir = assets.join("world");
        Self {
            session_config_path: content_dir.join("session.json"),
            tile_atlas_path: assets.join("tiles.png"),
            content_dir,
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{env_var} is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot {
        path: PathBuf,
        env_var: &'static str,
    },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/tile-world\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
    #[error("world content directory is missing: {0}")]
    MissingContentDir(PathBuf),
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let paths = AppPaths::from_root(resolve_root()?);
    if !paths.content_dir.is_dir() {
        return Err(StartupError::MissingContentDir(paths.content_dir));
    }
    Ok(paths)
}

/// Resolves paths below an explicit root, as tools taking `--root` do.
pub fn app_paths_at(root: &Path) -> Result<AppPaths, StartupError> {
    let normalized = normalize_path(root);
    if !is_repo_marker(&normalized) {
        return Err(StartupError::InvalidEnvRoot {
            path: normalized,
            env_var: ROOT_ENV_VAR,
        });
    }
    Ok(AppPaths::from_root(normalized))
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    env_var: ROOT_ENV_VAR,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
