mod block;
mod cover;
mod geometry;
mod map;
mod npc;
mod quest;
mod resolver;
mod session;
mod viewport;
mod window;

#[cfg(test)]
pub(crate) mod test_support;

pub use block::{
    Block, BlockGraphics, ShoreSides, TileCell, DUNGEON_BLOCKS, FLOOR_BLOCK, OUTDOOR_BLOCKS,
    PALETTE_EARTH, PALETTE_LAND, PALETTE_STONE, PALETTE_WATER, SHORELINE_BLOCKS, TOWN_BLOCKS,
};
pub use cover::{CoverOverlay, CoverOverlayError, CoverState, CoverTransition};
pub use geometry::{BlockCoord, Direction, ScreenCell};
pub use map::{
    LayoutFormat, MapDescriptor, MapId, MapKind, MapLayout, MapLayoutError, QuestAnchors,
};
pub use npc::{
    DirectionSource, MoveRejection, Npc, NpcContext, NpcDescriptor, NpcMotion, NpcRoster,
    NpcRosterDescriptor, NpcScheduler, NpcTickReport, NpcUpdate, RandomDirections,
    ScriptedDirections, MAX_MOBILE_NPCS,
};
pub use quest::{
    QuestFlags, QuestState, QuestStateError, MAX_DOORS_PER_MAP, MAX_TREASURES_PER_MAP,
};
pub use resolver::{BlockResolver, FogMask, ResolvedBlock, Viewer};
pub use session::{AvatarState, TickReport, WorldConfig, WorldError, WorldEvent, WorldSession};
pub use viewport::{
    BlockCell, DisplayBuffer, Scroll, Settled, StreamJobKind, ViewportStreamer, AVATAR_SCREEN_CELL,
    BLOCK_PIXELS, BUFFER_COLS, BUFFER_ROWS, TILE_PIXELS, VIEW_COLS, VIEW_ROWS,
};
pub use window::{NoWindows, WindowOverlay, WindowRect, WindowRects};
