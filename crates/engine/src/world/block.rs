use std::fmt;

/// Sides of a water block that border land, packed as shoreline mask bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShoreSides(u8);

impl ShoreSides {
    pub const TOP: u8 = 1;
    pub const LEFT: u8 = 2;
    pub const RIGHT: u8 = 4;
    pub const BOTTOM: u8 = 8;
    pub const ALL: ShoreSides = ShoreSides(0x0f);

    pub const fn from_mask(mask: u8) -> Self {
        Self(mask & 0x0f)
    }

    pub const fn mask(self) -> u8 {
        self.0
    }

    pub const fn has(self, side: u8) -> bool {
        self.0 & side != 0
    }
}

/// Resolved, drawable block identity. Never stored in the world: the resolver
/// recomputes it from layout and game state on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    Grass,
    Sand,
    Hill,
    Mountain,
    Water,
    Shore(ShoreSides),
    Stone,
    Trees,
    Swamp,
    Town,
    Cave,
    Castle,
    Bridge,
    StairUp,
    StairDown,
    Brick,
    Chest,
    Door,
    ForceField,
    ShopWeapon,
    ShopInn,
    LargeTile,
    SmallTiles,
    Blank,
    Princess,
}

/// Floor every taken chest, opened door and vacated rescue spot turns into.
pub const FLOOR_BLOCK: Block = Block::Brick;

pub const SHORELINE_BLOCKS: [Block; 16] = build_shoreline_table();

const fn build_shoreline_table() -> [Block; 16] {
    let mut table = [Block::Water; 16];
    let mut mask = 1;
    while mask < 16 {
        table[mask] = Block::Shore(ShoreSides::from_mask(mask as u8));
        mask += 1;
    }
    table
}

pub const OUTDOOR_BLOCKS: [Block; 16] = [
    Block::Grass,
    Block::Sand,
    Block::Hill,
    Block::Mountain,
    Block::Water,
    Block::Stone,
    Block::Trees,
    Block::Swamp,
    Block::Town,
    Block::Cave,
    Block::Castle,
    Block::Bridge,
    Block::StairDown,
    Block::Grass,
    Block::Grass,
    Block::Grass,
];

pub const TOWN_BLOCKS: [Block; 16] = [
    Block::Grass,
    Block::Sand,
    Block::Water,
    Block::Chest,
    Block::Stone,
    Block::StairUp,
    Block::Brick,
    Block::StairDown,
    Block::Trees,
    Block::Swamp,
    Block::ForceField,
    Block::Door,
    Block::ShopWeapon,
    Block::ShopInn,
    Block::Bridge,
    Block::LargeTile,
];

pub const DUNGEON_BLOCKS: [Block; 16] = [
    Block::Stone,
    Block::StairUp,
    Block::Brick,
    Block::StairDown,
    Block::Chest,
    Block::Door,
    Block::Princess,
    Block::Blank,
    Block::Stone,
    Block::Stone,
    Block::Stone,
    Block::Stone,
    Block::Stone,
    Block::Stone,
    Block::Stone,
    Block::Stone,
];

/// One 8x8 tile of a display buffer: pattern index plus palette group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileCell {
    pub pattern: u8,
    pub palette: u8,
}

impl TileCell {
    pub const BLANK: TileCell = TileCell {
        pattern: 0,
        palette: PALETTE_STONE,
    };
}

pub const PALETTE_LAND: u8 = 0;
pub const PALETTE_EARTH: u8 = 1;
pub const PALETTE_WATER: u8 = 2;
pub const PALETTE_STONE: u8 = 3;

const SHORE_PATTERN_BASE: u8 = 0x80;

/// Tiles of one block in top-left, top-right, bottom-left, bottom-right order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGraphics {
    pub tiles: [TileCell; 4],
}

impl Block {
    pub fn is_walkable(self) -> bool {
        !matches!(
            self,
            Block::Water
                | Block::Shore(_)
                | Block::Mountain
                | Block::Stone
                | Block::Door
                | Block::ShopWeapon
                | Block::ShopInn
                | Block::Blank
                | Block::Princess
        )
    }

    /// Water for shoreline purposes: open water and anything spanning it.
    pub fn is_water_like(self) -> bool {
        matches!(self, Block::Water | Block::Shore(_) | Block::Bridge)
    }

    pub fn palette(self) -> u8 {
        match self {
            Block::Grass | Block::Hill | Block::Trees | Block::Swamp => PALETTE_LAND,
            Block::Water | Block::Shore(_) => PALETTE_WATER,
            Block::Stone | Block::ForceField | Block::Blank => PALETTE_STONE,
            _ => PALETTE_EARTH,
        }
    }

    pub fn graphics(self) -> BlockGraphics {
        if self == Block::Blank {
            return BlockGraphics {
                tiles: [TileCell::BLANK; 4],
            };
        }
        let palette = self.palette();
        let base = match self {
            Block::Shore(sides) => SHORE_PATTERN_BASE + sides.mask() * 4,
            other => other.ordinal() * 4,
        };
        let tile = |offset: u8| TileCell {
            pattern: base + offset,
            palette,
        };
        BlockGraphics {
            tiles: [tile(0), tile(1), tile(2), tile(3)],
        }
    }

    fn ordinal(self) -> u8 {
        match self {
            Block::Blank => 0,
            Block::Grass => 1,
            Block::Sand => 2,
            Block::Hill => 3,
            Block::Mountain => 4,
            Block::Water => 5,
            Block::Stone => 6,
            Block::Trees => 7,
            Block::Swamp => 8,
            Block::Town => 9,
            Block::Cave => 10,
            Block::Castle => 11,
            Block::Bridge => 12,
            Block::StairUp => 13,
            Block::StairDown => 14,
            Block::Brick => 15,
            Block::Chest => 16,
            Block::Door => 17,
            Block::ForceField => 18,
            Block::ShopWeapon => 19,
            Block::ShopInn => 20,
            Block::LargeTile => 21,
            Block::SmallTiles => 22,
            Block::Princess => 23,
            Block::Shore(_) => 24,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Block::Grass => "Grass",
            Block::Sand => "Sand",
            Block::Hill => "Hill",
            Block::Mountain => "Mountain",
            Block::Water => "Water",
            Block::Shore(_) => "Shore",
            Block::Stone => "Stone",
            Block::Trees => "Trees",
            Block::Swamp => "Swamp",
            Block::Town => "Town",
            Block::Cave => "Cave",
            Block::Castle => "Castle",
            Block::Bridge => "Bridge",
            Block::StairUp => "StairUp",
            Block::StairDown => "StairDown",
            Block::Brick => "Brick",
            Block::Chest => "Chest",
            Block::Door => "Door",
            Block::ForceField => "ForceField",
            Block::ShopWeapon => "ShopWeapon",
            Block::ShopInn => "ShopInn",
            Block::LargeTile => "LargeTile",
            Block::SmallTiles => "SmallTiles",
            Block::Blank => "Blank",
            Block::Princess => "Princess",
        }
    }

    /// Parses a plain block name; shoreline variants are never named directly.
    pub fn from_name(name: &str) -> Option<Block> {
        let block = match name {
            "Grass" => Block::Grass,
            "Sand" => Block::Sand,
            "Hill" => Block::Hill,
            "Mountain" => Block::Mountain,
            "Water" => Block::Water,
            "Stone" => Block::Stone,
            "Trees" => Block::Trees,
            "Swamp" => Block::Swamp,
            "Town" => Block::Town,
            "Cave" => Block::Cave,
            "Castle" => Block::Castle,
            "Bridge" => Block::Bridge,
            "StairUp" => Block::StairUp,
            "StairDown" => Block::StairDown,
            "Brick" => Block::Brick,
            "Chest" => Block::Chest,
            "Door" => Block::Door,
            "ForceField" => Block::ForceField,
            "ShopWeapon" => Block::ShopWeapon,
            "ShopInn" => Block::ShopInn,
            "LargeTile" => Block::LargeTile,
            "SmallTiles" => Block::SmallTiles,
            "Blank" => Block::Blank,
            "Princess" => Block::Princess,
            _ => return None,
        };
        Some(block)
    }

    /// Single character used by text dumps of a resolved map.
    pub fn glyph(self) -> char {
        match self {
            Block::Grass => '.',
            Block::Sand => ':',
            Block::Hill => 'n',
            Block::Mountain => '^',
            Block::Water => '~',
            Block::Shore(_) => '=',
            Block::Stone => '#',
            Block::Trees => 'T',
            Block::Swamp => '%',
            Block::Town => 'o',
            Block::Cave => 'C',
            Block::Castle => 'K',
            Block::Bridge => 'H',
            Block::StairUp => '<',
            Block::StairDown => '>',
            Block::Brick => '_',
            Block::Chest => '$',
            Block::Door => '+',
            Block::ForceField => '!',
            Block::ShopWeapon => 'W',
            Block::ShopInn => 'I',
            Block::LargeTile => 'L',
            Block::SmallTiles => 'r',
            Block::Blank => ' ',
            Block::Princess => 'P',
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Shore(sides) => write!(f, "Shore({:#06b})", sides.mask()),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shoreline_table_has_sixteen_entries_with_water_and_full_shore_ends() {
        assert_eq!(SHORELINE_BLOCKS.len(), 16);
        assert_eq!(SHORELINE_BLOCKS[0], Block::Water);
        assert_eq!(SHORELINE_BLOCKS[15], Block::Shore(ShoreSides::ALL));
        for (mask, block) in SHORELINE_BLOCKS.iter().enumerate().skip(1) {
            assert_eq!(*block, Block::Shore(ShoreSides::from_mask(mask as u8)));
        }
    }

    #[test]
    fn shoreline_bit_weights_match_sides() {
        assert_eq!(ShoreSides::TOP, 1);
        assert_eq!(ShoreSides::LEFT, 2);
        assert_eq!(ShoreSides::RIGHT, 4);
        assert_eq!(ShoreSides::BOTTOM, 8);
        let all = ShoreSides::ALL;
        assert!(all.has(ShoreSides::TOP) && all.has(ShoreSides::BOTTOM));
        assert!(!ShoreSides::from_mask(ShoreSides::LEFT).has(ShoreSides::RIGHT));
    }

    #[test]
    fn blocked_terrain_is_not_walkable() {
        for block in [
            Block::Water,
            Block::Shore(ShoreSides::ALL),
            Block::Mountain,
            Block::Stone,
            Block::Door,
            Block::Blank,
        ] {
            assert!(!block.is_walkable(), "{block} should block");
        }
        for block in [Block::Grass, Block::Bridge, Block::Brick, Block::Chest] {
            assert!(block.is_walkable(), "{block} should be walkable");
        }
    }

    #[test]
    fn block_names_parse_back() {
        for block in OUTDOOR_BLOCKS
            .iter()
            .chain(TOWN_BLOCKS.iter())
            .chain(DUNGEON_BLOCKS.iter())
        {
            assert_eq!(Block::from_name(block.name()), Some(*block));
        }
        assert_eq!(Block::from_name("Lava"), None);
    }

    #[test]
    fn graphics_are_distinct_per_block_and_blank_is_blank() {
        assert_eq!(Block::Blank.graphics().tiles, [TileCell::BLANK; 4]);
        let grass = Block::Grass.graphics();
        let sand = Block::Sand.graphics();
        assert_ne!(grass.tiles[0].pattern, sand.tiles[0].pattern);
        let shore_a = Block::Shore(ShoreSides::from_mask(3)).graphics();
        let shore_b = Block::Shore(ShoreSides::from_mask(4)).graphics();
        assert_ne!(shore_a.tiles[0].pattern, shore_b.tiles[0].pattern);
        assert_eq!(shore_a.tiles[0].palette, PALETTE_WATER);
    }
}
