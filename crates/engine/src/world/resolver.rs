use super::block::{Block, BlockGraphics, ShoreSides, TileCell, FLOOR_BLOCK, SHORELINE_BLOCKS};
use super::geometry::BlockCoord;
use super::map::{MapDescriptor, MapKind};
use super::quest::QuestState;

/// Tiles of a 2x2 block to blank out, one bit per tile in
/// top-left, top-right, bottom-left, bottom-right order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FogMask(u8);

impl FogMask {
    pub const NONE: FogMask = FogMask(0);
    pub const RIGHT_COLUMN: FogMask = FogMask(0b1010);
    pub const BOTTOM_ROW: FogMask = FogMask(0b1100);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn hides_tile(self, tile_index: usize) -> bool {
        tile_index < 4 && self.0 & (1 << tile_index) != 0
    }

    pub fn union(self, other: FogMask) -> FogMask {
        FogMask(self.0 | other.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedBlock {
    pub block: Block,
    pub fog: FogMask,
}

impl ResolvedBlock {
    pub fn plain(block: Block) -> Self {
        Self {
            block,
            fog: FogMask::NONE,
        }
    }

    /// Tiles to draw, with half-fogged tiles replaced by the blank tile.
    pub fn tiles(&self) -> [TileCell; 4] {
        let BlockGraphics { mut tiles } = self.block.graphics();
        for (index, tile) in tiles.iter_mut().enumerate() {
            if self.fog.hides_tile(index) {
                *tile = TileCell::BLANK;
            }
        }
        tiles
    }
}

/// The actor the screen is drawn for: light radius and cover filler are
/// computed relative to this position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub x: i32,
    pub y: i32,
    pub under_cover: bool,
    pub light_radius: u8,
}

impl Viewer {
    pub fn at(coord: BlockCoord) -> Self {
        let (x, y) = coord.signed();
        Self {
            x,
            y,
            under_cover: false,
            light_radius: 0,
        }
    }
}

/// Turns map coordinates into drawable blocks for one map under the current
/// quest, cover and light state. Every query is total.
#[derive(Clone, Copy)]
pub struct BlockResolver<'a> {
    map: &'a MapDescriptor,
    quest: &'a QuestState,
    viewer: Viewer,
}

impl<'a> BlockResolver<'a> {
    pub fn new(map: &'a MapDescriptor, quest: &'a QuestState, viewer: Viewer) -> Self {
        Self { map, quest, viewer }
    }

    pub fn map(&self) -> &'a MapDescriptor {
        self.map
    }

    pub fn viewer(&self) -> Viewer {
        self.viewer
    }

    /// Full display resolution: terrain, then cover filler, then light.
    pub fn resolve(&self, x: i32, y: i32) -> ResolvedBlock {
        let Some(coord) = self.map.in_bounds(x, y) else {
            return ResolvedBlock::plain(self.boundary_block(x, y));
        };
        if self.quest.flags.final_battle_active {
            return ResolvedBlock::plain(Block::Blank);
        }
        let block = self.terrain_in_bounds(coord);
        let block = self.apply_cover(coord, block);
        self.apply_light(x, y, block)
    }

    /// Terrain identity without the viewer-relative cover and light rules;
    /// this is what collision checks see.
    pub fn terrain(&self, x: i32, y: i32) -> Block {
        let Some(coord) = self.map.in_bounds(x, y) else {
            return self.boundary_block(x, y);
        };
        if self.quest.flags.final_battle_active {
            return Block::Blank;
        }
        self.terrain_in_bounds(coord)
    }

    pub fn is_walkable(&self, coord: BlockCoord) -> bool {
        let (x, y) = coord.signed();
        self.map.contains(x, y) && self.terrain(x, y).is_walkable()
    }

    fn boundary_block(&self, x: i32, y: i32) -> Block {
        if self.map.kind == MapKind::Outdoor && self.map.boundary == Block::Water {
            return SHORELINE_BLOCKS[self.shore_mask(x, y) as usize];
        }
        self.map.boundary
    }

    fn terrain_in_bounds(&self, coord: BlockCoord) -> Block {
        let block = self.base_block(coord);
        if self.map.kind == MapKind::Outdoor && block == Block::Water {
            let (x, y) = coord.signed();
            return SHORELINE_BLOCKS[self.shore_mask(x, y) as usize];
        }
        block
    }

    fn base_block(&self, coord: BlockCoord) -> Block {
        let raw = self.map.layout.terrain_at(coord.x, coord.y);
        let block = self.map.kind.conversion_table()[raw as usize & 0x0f];
        let flags = &self.quest.flags;
        let block = match block {
            Block::Chest if self.quest.is_treasure_taken(self.map.id, coord) => FLOOR_BLOCK,
            Block::Door if self.quest.is_door_opened(self.map.id, coord) => FLOOR_BLOCK,
            Block::Princess if flags.princess_rescued => FLOOR_BLOCK,
            other => other,
        };
        let anchors = &self.map.anchors;
        if anchors.bridge == Some(coord) && flags.bridge_built {
            return Block::Bridge;
        }
        if anchors.secret_passage == Some(coord) {
            return if flags.secret_passage_found {
                Block::StairDown
            } else {
                Block::ForceField
            };
        }
        block
    }

    /// Land on a side sets that side's bit. Neighbors outside the map, including
    /// ones past the `i32` range, count as open water, so an out-of-bounds cell
    /// only ever sees its one in-bounds neighbor.
    fn shore_mask(&self, x: i32, y: i32) -> u8 {
        let sides = [
            (0, -1, ShoreSides::TOP),
            (-1, 0, ShoreSides::LEFT),
            (1, 0, ShoreSides::RIGHT),
            (0, 1, ShoreSides::BOTTOM),
        ];
        let mut mask = 0u8;
        for (dx, dy, bit) in sides {
            let neighbor = x
                .checked_add(dx)
                .zip(y.checked_add(dy))
                .and_then(|(nx, ny)| self.map.in_bounds(nx, ny));
            let Some(neighbor) = neighbor else {
                continue;
            };
            if !self.base_block(neighbor).is_water_like() {
                mask |= bit;
            }
        }
        mask
    }

    fn apply_cover(&self, coord: BlockCoord, block: Block) -> Block {
        let Some(overlay) = self.map.cover.as_ref() else {
            return block;
        };
        let covered = overlay.is_covered(coord.x, coord.y);
        match (covered, self.viewer.under_cover) {
            (true, false) => Block::SmallTiles,
            (false, true) => Block::Blank,
            _ => block,
        }
    }

    fn apply_light(&self, x: i32, y: i32, block: Block) -> ResolvedBlock {
        if self.map.kind != MapKind::Dungeon {
            return ResolvedBlock::plain(block);
        }
        let radius = u32::from(self.viewer.light_radius);
        let dx = x.abs_diff(self.viewer.x);
        let dy = y.abs_diff(self.viewer.y);
        if dx > radius || dy > radius {
            return ResolvedBlock::plain(Block::Blank);
        }
        // The edge fog is not mirrored: both horizontal edges lose the right
        // column and both vertical edges the bottom row.
        let mut fog = FogMask::NONE;
        if dx == radius {
            fog = fog.union(FogMask::RIGHT_COLUMN);
        }
        if dy == radius {
            fog = fog.union(FogMask::BOTTOM_ROW);
        }
        ResolvedBlock { block, fog }
    }
}
