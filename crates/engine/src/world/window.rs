use super::geometry::ScreenCell;

/// Answers whether a UI window currently sits on top of a screen cell.
/// Viewport writes and NPC moves leave such cells alone.
pub trait WindowOverlay {
    fn covers(&self, cell: ScreenCell) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoWindows;

impl WindowOverlay for NoWindows {
    fn covers(&self, _cell: ScreenCell) -> bool {
        false
    }
}

/// Rectangle of screen cells, `cols` x `rows` starting at `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub origin: ScreenCell,
    pub cols: u8,
    pub rows: u8,
}

impl WindowRect {
    pub fn new(col: u8, row: u8, cols: u8, rows: u8) -> Self {
        Self {
            origin: ScreenCell::new(col, row),
            cols,
            rows,
        }
    }

    pub fn contains(&self, cell: ScreenCell) -> bool {
        let col = u16::from(cell.col);
        let row = u16::from(cell.row);
        let left = u16::from(self.origin.col);
        let top = u16::from(self.origin.row);
        col >= left
            && row >= top
            && col < left + u16::from(self.cols)
            && row < top + u16::from(self.rows)
    }

    pub fn cells(&self) -> impl Iterator<Item = ScreenCell> + '_ {
        (0..self.rows).flat_map(move |dy| {
            (0..self.cols).map(move |dx| {
                ScreenCell::new(
                    self.origin.col.saturating_add(dx),
                    self.origin.row.saturating_add(dy),
                )
            })
        })
    }
}

/// Stack of open windows. Closing one hands back the cells that need their
/// map content restored.
#[derive(Debug, Clone, Default)]
pub struct WindowRects {
    open: Vec<WindowRect>,
}

impl WindowRects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, rect: WindowRect) {
        self.open.push(rect);
    }

    pub fn close_top(&mut self) -> Option<WindowRect> {
        self.open.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowRect> {
        self.open.iter()
    }
}

impl WindowOverlay for WindowRects {
    fn covers(&self, cell: ScreenCell) -> bool {
        self.open.iter().any(|rect| rect.contains(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_only_its_cells() {
        let rect = WindowRect::new(2, 3, 4, 2);
        assert!(rect.contains(ScreenCell::new(2, 3)));
        assert!(rect.contains(ScreenCell::new(5, 4)));
        assert!(!rect.contains(ScreenCell::new(6, 4)));
        assert!(!rect.contains(ScreenCell::new(2, 5)));
        assert!(!rect.contains(ScreenCell::new(1, 3)));
        assert_eq!(rect.cells().count(), 8);
    }

    #[test]
    fn closing_top_window_uncovers_cells() {
        let mut windows = WindowRects::new();
        windows.open(WindowRect::new(0, 0, 16, 4));
        windows.open(WindowRect::new(10, 10, 2, 2));
        assert!(windows.covers(ScreenCell::new(11, 11)));

        let closed = windows.close_top().expect("window open");
        assert_eq!(closed, WindowRect::new(10, 10, 2, 2));
        assert!(!windows.covers(ScreenCell::new(11, 11)));
        assert!(windows.covers(ScreenCell::new(15, 3)));
        assert!(!NoWindows.covers(ScreenCell::new(0, 0)));
    }
}
