use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "up" | "north" => Some(Direction::Up),
            "right" | "east" => Some(Direction::Right),
            "down" | "south" => Some(Direction::Down),
            "left" | "west" => Some(Direction::Left),
            _ => None,
        }
    }
}

/// Map-relative block position. Always inside the owning map once stored on
/// an actor; signed arithmetic goes through [`BlockCoord::offset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockCoord {
    pub x: u16,
    pub y: u16,
}

impl BlockCoord {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    pub fn signed(self) -> (i32, i32) {
        (i32::from(self.x), i32::from(self.y))
    }

    /// Neighbor one block away, or `None` when it would leave `width` x `height`.
    pub fn step(self, direction: Direction, width: u16, height: u16) -> Option<BlockCoord> {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy, width, height)
    }

    pub fn offset(self, dx: i32, dy: i32, width: u16, height: u16) -> Option<BlockCoord> {
        let x = i32::from(self.x) + dx;
        let y = i32::from(self.y) + dy;
        if x < 0 || y < 0 || x >= i32::from(width) || y >= i32::from(height) {
            return None;
        }
        Some(BlockCoord {
            x: x as u16,
            y: y as u16,
        })
    }
}

/// Block-sized cell of the visible screen, `(0, 0)` top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenCell {
    pub col: u8,
    pub row: u8,
}

impl ScreenCell {
    pub const fn new(col: u8, row: u8) -> Self {
        Self { col, row }
    }
}
