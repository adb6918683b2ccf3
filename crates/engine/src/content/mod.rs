mod catalog;
mod compiler;
mod discovery;

pub use catalog::WorldCatalog;
pub use compiler::{
    compile_world_catalog, compile_world_source, ContentCompileError, ContentErrorCode,
    SourceLocation,
};
