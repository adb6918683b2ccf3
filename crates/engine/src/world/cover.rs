use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cover bitmap for {width}x{height} needs {expected} bytes, got {actual}")]
pub struct CoverOverlayError {
    pub width: u16,
    pub height: u16,
    pub expected: usize,
    pub actual: usize,
}

/// One marker bit per block, MSB-first within each byte, rows padded to whole
/// bytes. A set bit means the block lies under a covering structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverOverlay {
    width: u16,
    height: u16,
    bits: Vec<u8>,
}

impl CoverOverlay {
    pub fn from_bytes(width: u16, height: u16, bits: Vec<u8>) -> Result<Self, CoverOverlayError> {
        let expected = row_stride(width) * height as usize;
        if bits.len() != expected {
            return Err(CoverOverlayError {
                width,
                height,
                expected,
                actual: bits.len(),
            });
        }
        Ok(Self {
            width,
            height,
            bits,
        })
    }

    pub fn empty(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            bits: vec![0; row_stride(width) * height as usize],
        }
    }

    pub fn set_covered(&mut self, x: u16, y: u16, covered: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (index, mask) = bit_position(self.width, x, y);
        if covered {
            self.bits[index] |= mask;
        } else {
            self.bits[index] &= !mask;
        }
    }

    /// Out-of-range positions are never covered.
    pub fn is_covered(&self, x: u16, y: u16) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let (index, mask) = bit_position(self.width, x, y);
        self.bits.get(index).is_some_and(|byte| byte & mask != 0)
    }
}

fn row_stride(width: u16) -> usize {
    (width as usize + 7) / 8
}

fn bit_position(width: u16, x: u16, y: u16) -> (usize, u8) {
    let index = y as usize * row_stride(width) + x as usize / 8;
    let mask = 0x80u8 >> (x % 8);
    (index, mask)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverTransition {
    Entered,
    Left,
}

/// Whether one actor currently stands under cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverState {
    under_cover: bool,
}

impl CoverState {
    pub fn new(under_cover: bool) -> Self {
        Self { under_cover }
    }

    pub fn under_cover(self) -> bool {
        self.under_cover
    }

    /// Feeds the marker bit at the actor's new position; reports a transition
    /// only when it differs from the previous value.
    pub fn observe(&mut self, marker: bool) -> Option<CoverTransition> {
        if marker == self.under_cover {
            return None;
        }
        self.under_cover = marker;
        Some(if marker {
            CoverTransition::Entered
        } else {
            CoverTransition::Left
        })
    }
}
