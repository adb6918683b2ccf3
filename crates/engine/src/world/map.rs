use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::block::{Block, DUNGEON_BLOCKS, OUTDOOR_BLOCKS, TOWN_BLOCKS};
use super::cover::CoverOverlay;
use super::geometry::BlockCoord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub u8);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKind {
    Outdoor,
    Town,
    Dungeon,
}

impl MapKind {
    pub fn layout_format(self) -> LayoutFormat {
        match self {
            MapKind::Outdoor => LayoutFormat::RunLengthRows,
            MapKind::Town | MapKind::Dungeon => LayoutFormat::NibbleGrid,
        }
    }

    pub(crate) fn conversion_table(self) -> &'static [Block; 16] {
        match self {
            MapKind::Outdoor => &OUTDOOR_BLOCKS,
            MapKind::Town => &TOWN_BLOCKS,
            MapKind::Dungeon => &DUNGEON_BLOCKS,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Outdoor" => Some(MapKind::Outdoor),
            "Town" => Some(MapKind::Town),
            "Dungeon" => Some(MapKind::Dungeon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutFormat {
    /// High nibble terrain class, low nibble run length minus one.
    RunLengthRows,
    /// One terrain nibble per block, two blocks per byte.
    NibbleGrid,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapLayoutError {
    #[error("map dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u16, height: u16 },
    #[error("row {row} overruns the map width {width} (runs sum to {covered})")]
    RowOverrun { row: u16, width: u16, covered: u32 },
    #[error("layout ends inside row {row} after {covered} of {width} blocks")]
    TruncatedRow { row: u16, width: u16, covered: u32 },
    #[error("layout has {extra} trailing bytes after the last row")]
    TrailingBytes { extra: usize },
    #[error("nibble grid needs {expected} bytes for {width}x{height}, got {actual}")]
    GridSizeMismatch {
        width: u16,
        height: u16,
        expected: usize,
        actual: usize,
    },
}

/// Compressed terrain layout of one map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLayout {
    format: LayoutFormat,
    width: u16,
    height: u16,
    bytes: Vec<u8>,
    row_offsets: Vec<usize>,
}

impl MapLayout {
    pub fn run_length(width: u16, height: u16, bytes: Vec<u8>) -> Result<Self, MapLayoutError> {
        ensure_dimensions(width, height)?;
        let mut row_offsets = Vec::with_capacity(height as usize);
        let mut cursor = 0usize;
        for row in 0..height {
            row_offsets.push(cursor);
            let mut covered = 0u32;
            while covered < u32::from(width) {
                let Some(&byte) = bytes.get(cursor) else {
                    return Err(MapLayoutError::TruncatedRow {
                        row,
                        width,
                        covered,
                    });
                };
                covered += u32::from(byte & 0x0f) + 1;
                cursor += 1;
            }
            if covered != u32::from(width) {
                return Err(MapLayoutError::RowOverrun {
                    row,
                    width,
                    covered,
                });
            }
        }
        if cursor != bytes.len() {
            return Err(MapLayoutError::TrailingBytes {
                extra: bytes.len() - cursor,
            });
        }
        Ok(Self {
            format: LayoutFormat::RunLengthRows,
            width,
            height,
            bytes,
            row_offsets,
        })
    }

    pub fn nibble_grid(width: u16, height: u16, bytes: Vec<u8>) -> Result<Self, MapLayoutError> {
        ensure_dimensions(width, height)?;
        let expected = nibble_stride(width) * height as usize;
        if bytes.len() != expected {
            return Err(MapLayoutError::GridSizeMismatch {
                width,
                height,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            format: LayoutFormat::NibbleGrid,
            width,
            height,
            bytes,
            row_offsets: Vec::new(),
        })
    }

    pub fn format(&self) -> LayoutFormat {
        self.format
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Raw terrain index in `[0, 15]`. Callers bounds-check; anything outside
    /// the layout decodes as index 0.
    pub fn terrain_at(&self, x: u16, y: u16) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        match self.format {
            LayoutFormat::RunLengthRows => self.decode_run_length(x, y),
            LayoutFormat::NibbleGrid => self.decode_nibble(x, y),
        }
    }

    fn decode_run_length(&self, x: u16, y: u16) -> u8 {
        let mut cursor = self.row_offsets[y as usize];
        let mut run_end = 0u32;
        while let Some(&byte) = self.bytes.get(cursor) {
            run_end += u32::from(byte & 0x0f) + 1;
            if u32::from(x) < run_end {
                return byte >> 4;
            }
            cursor += 1;
        }
        0
    }

    fn decode_nibble(&self, x: u16, y: u16) -> u8 {
        let index = y as usize * nibble_stride(self.width) + x as usize / 2;
        let byte = self.bytes.get(index).copied().unwrap_or(0);
        if x % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0f
        }
    }
}

fn ensure_dimensions(width: u16, height: u16) -> Result<(), MapLayoutError> {
    if width == 0 || height == 0 {
        return Err(MapLayoutError::EmptyDimensions { width, height });
    }
    Ok(())
}

fn nibble_stride(width: u16) -> usize {
    (width as usize + 1) / 2
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestAnchors {
    pub bridge: Option<BlockCoord>,
    pub secret_passage: Option<BlockCoord>,
}

/// Row of the map descriptor table.
#[derive(Debug, Clone)]
pub struct MapDescriptor {
    pub id: MapId,
    pub name: String,
    pub kind: MapKind,
    pub boundary: Block,
    pub layout: MapLayout,
    pub cover: Option<CoverOverlay>,
    pub anchors: QuestAnchors,
}

impl MapDescriptor {
    pub fn width(&self) -> u16 {
        self.layout.width()
    }

    pub fn height(&self) -> u16 {
        self.layout.height()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < i32::from(self.width()) && y < i32::from(self.height())
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> Option<BlockCoord> {
        self.contains(x, y).then(|| BlockCoord::new(x as u16, y as u16))
    }

    pub fn is_covered(&self, coord: BlockCoord) -> bool {
        self.cover
            .as_ref()
            .is_some_and(|overlay| overlay.is_covered(coord.x, coord.y))
    }
}
