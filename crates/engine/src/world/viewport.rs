use std::ops::Range;

use tracing::debug;

use super::block::TileCell;
use super::geometry::{Direction, ScreenCell};
use super::map::MapKind;
use super::resolver::{BlockResolver, ResolvedBlock};
use super::window::WindowOverlay;

pub const VIEW_COLS: usize = 16;
pub const VIEW_ROWS: usize = 15;
pub const BUFFER_COLS: usize = VIEW_COLS + 2;
pub const BUFFER_ROWS: usize = VIEW_ROWS + 2;
pub const AVATAR_SCREEN_CELL: ScreenCell = ScreenCell::new(8, 7);
pub const TILE_PIXELS: u32 = 8;
pub const BLOCK_PIXELS: u32 = TILE_PIXELS * 2;

const SCROLL_STEPS_PER_BLOCK: u8 = 2;
const HALF_COLS: usize = BUFFER_COLS / 2;

/// One block worth of buffer tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCell {
    pub tiles: [TileCell; 4],
}

impl From<ResolvedBlock> for BlockCell {
    fn from(resolved: ResolvedBlock) -> Self {
        Self {
            tiles: resolved.tiles(),
        }
    }
}

/// Screen-sized grid of block cells plus a one-block margin on every side.
/// `origin` is the map coordinate shown in buffer cell `(0, 0)`.
#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    origin: (i32, i32),
    cells: Vec<BlockCell>,
}

impl DisplayBuffer {
    fn new(anchor: (i32, i32)) -> Self {
        Self {
            origin: origin_for(anchor),
            cells: vec![BlockCell::default(); BUFFER_COLS * BUFFER_ROWS],
        }
    }

    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    /// Map coordinate drawn under the avatar when this buffer is shown unscrolled.
    pub fn anchor(&self) -> (i32, i32) {
        (
            self.origin.0 + 1 + i32::from(AVATAR_SCREEN_CELL.col),
            self.origin.1 + 1 + i32::from(AVATAR_SCREEN_CELL.row),
        )
    }

    pub fn cell(&self, col: usize, row: usize) -> Option<BlockCell> {
        if col >= BUFFER_COLS || row >= BUFFER_ROWS {
            return None;
        }
        Some(self.cells[row * BUFFER_COLS + col])
    }

    pub fn cell_at_map(&self, x: i32, y: i32) -> Option<BlockCell> {
        let (col, row) = self.buffer_position(x, y)?;
        self.cell(col, row)
    }

    fn buffer_position(&self, x: i32, y: i32) -> Option<(usize, usize)> {
        let col = x - self.origin.0;
        let row = y - self.origin.1;
        if col < 0 || row < 0 || col >= BUFFER_COLS as i32 || row >= BUFFER_ROWS as i32 {
            return None;
        }
        Some((col as usize, row as usize))
    }

    fn screen_cell(col: usize, row: usize) -> Option<ScreenCell> {
        if col == 0 || row == 0 || col > VIEW_COLS || row > VIEW_ROWS {
            return None;
        }
        Some(ScreenCell::new((col - 1) as u8, (row - 1) as u8))
    }

    fn write(&mut self, col: usize, row: usize, cell: BlockCell, windows: &dyn WindowOverlay) {
        if let Some(screen) = Self::screen_cell(col, row) {
            if windows.covers(screen) {
                return;
            }
        }
        self.cells[row * BUFFER_COLS + col] = cell;
    }

    fn paint_row(
        &mut self,
        row: usize,
        cols: Range<usize>,
        resolver: &BlockResolver<'_>,
        windows: &dyn WindowOverlay,
    ) {
        let y = self.origin.1 + row as i32;
        for col in cols {
            let x = self.origin.0 + col as i32;
            self.write(col, row, resolver.resolve(x, y).into(), windows);
        }
    }

    fn paint_all(&mut self, resolver: &BlockResolver<'_>, windows: &dyn WindowOverlay) {
        for row in 0..BUFFER_ROWS {
            self.paint_row(row, 0..BUFFER_COLS, resolver, windows);
        }
    }

    /// Re-targets this buffer one block further along `direction` than
    /// `source`, reusing every overlapping cell and resolving the rest.
    /// Source cells under a window may be stale and are resolved again.
    fn shift_from(
        &mut self,
        source: &DisplayBuffer,
        direction: Direction,
        resolver: &BlockResolver<'_>,
        windows: &dyn WindowOverlay,
    ) {
        let (dx, dy) = direction.delta();
        self.origin = (source.origin.0 + dx, source.origin.1 + dy);
        for row in 0..BUFFER_ROWS {
            for col in 0..BUFFER_COLS {
                let source_col = col as i32 + dx;
                let source_row = row as i32 + dy;
                let reused = if source_col >= 0 && source_row >= 0 {
                    let (source_col, source_row) = (source_col as usize, source_row as usize);
                    let hidden = Self::screen_cell(source_col, source_row)
                        .is_some_and(|screen| windows.covers(screen));
                    source.cell(source_col, source_row).filter(|_| !hidden)
                } else {
                    None
                };
                let cell = match reused {
                    Some(cell) => cell,
                    None => resolver
                        .resolve(self.origin.0 + col as i32, self.origin.1 + row as i32)
                        .into(),
                };
                self.write(col, row, cell, windows);
            }
        }
    }
}

fn origin_for(anchor: (i32, i32)) -> (i32, i32) {
    (
        anchor.0 - 1 - i32::from(AVATAR_SCREEN_CELL.col),
        anchor.1 - 1 - i32::from(AVATAR_SCREEN_CELL.row),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scroll {
    pub direction: Direction,
    /// Half-block increments already applied.
    pub offset: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamJobKind {
    Step,
    DungeonStep,
    Rebuild,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferHalf {
    Left,
    Right,
}

impl BufferHalf {
    fn columns(self) -> Range<usize> {
        match self {
            BufferHalf::Left => 0..HALF_COLS,
            BufferHalf::Right => HALF_COLS..BUFFER_COLS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamJob {
    Step {
        destination: (i32, i32),
    },
    DungeonStep {
        destination: (i32, i32),
    },
    Rebuild {
        anchor: (i32, i32),
        half: BufferHalf,
        next_row: usize,
    },
    Refresh {
        next_row: usize,
    },
}

impl StreamJob {
    fn kind(&self) -> StreamJobKind {
        match self {
            StreamJob::Step { .. } => StreamJobKind::Step,
            StreamJob::DungeonStep { .. } => StreamJobKind::DungeonStep,
            StreamJob::Rebuild { .. } => StreamJobKind::Rebuild,
            StreamJob::Refresh { .. } => StreamJobKind::Refresh,
        }
    }
}

/// Reported by [`ViewportStreamer::advance`] on the tick a job toggles buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    pub kind: StreamJobKind,
    pub anchor: (i32, i32),
}

/// Double-buffered viewport. The active buffer is what the renderer shows;
/// every job writes only the inactive one and finishes by toggling.
#[derive(Debug, Clone)]
pub struct ViewportStreamer {
    buffers: [DisplayBuffer; 2],
    active: usize,
    anchor: (i32, i32),
    scroll: Option<Scroll>,
    job: Option<StreamJob>,
    refresh_rows_per_tick: usize,
}

impl ViewportStreamer {
    /// Paints both buffers around `anchor` immediately.
    pub fn new(
        anchor: (i32, i32),
        refresh_rows_per_tick: usize,
        resolver: &BlockResolver<'_>,
        windows: &dyn WindowOverlay,
    ) -> Self {
        let mut front = DisplayBuffer::new(anchor);
        front.paint_all(resolver, windows);
        let back = front.clone();
        Self {
            buffers: [front, back],
            active: 0,
            anchor,
            scroll: None,
            job: None,
            refresh_rows_per_tick: refresh_rows_per_tick.max(1),
        }
    }

    pub fn anchor(&self) -> (i32, i32) {
        self.anchor
    }

    pub fn active_buffer(&self) -> &DisplayBuffer {
        &self.buffers[self.active]
    }

    pub fn inactive_buffer(&self) -> &DisplayBuffer {
        &self.buffers[1 - self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn scroll(&self) -> Option<Scroll> {
        self.scroll
    }

    /// Pixel shift to apply when drawing the active buffer.
    pub fn scroll_pixels(&self) -> (i32, i32) {
        let Some(scroll) = self.scroll else {
            return (0, 0);
        };
        let (dx, dy) = scroll.direction.delta();
        let distance = i32::from(scroll.offset) * TILE_PIXELS as i32;
        (dx * distance, dy * distance)
    }

    pub fn job_kind(&self) -> Option<StreamJobKind> {
        self.job.as_ref().map(StreamJob::kind)
    }

    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    /// Starts a one-block scroll. Outdoor and town maps shift the visible
    /// buffer into the inactive one and resolve only the entering strip;
    /// dungeons rebuild the inactive buffer in halves around the destination.
    pub fn begin_step(
        &mut self,
        direction: Direction,
        kind: MapKind,
        resolver: &BlockResolver<'_>,
        windows: &dyn WindowOverlay,
    ) -> bool {
        if self.job.is_some() {
            return false;
        }
        let (dx, dy) = direction.delta();
        let destination = (self.anchor.0 + dx, self.anchor.1 + dy);
        let active = self.active;
        let [first, second] = &mut self.buffers;
        let (source, target) = if active == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };

        self.job = Some(match kind {
            MapKind::Dungeon => {
                target.origin = origin_for(destination);
                for row in 0..BUFFER_ROWS {
                    target.paint_row(row, BufferHalf::Left.columns(), resolver, windows);
                }
                StreamJob::DungeonStep { destination }
            }
            MapKind::Outdoor | MapKind::Town => {
                target.shift_from(source, direction, resolver, windows);
                StreamJob::Step { destination }
            }
        });
        self.scroll = Some(Scroll {
            direction,
            offset: 1,
        });
        true
    }

    /// Drops an in-flight step. The inactive buffer's partial content is
    /// never shown, so nothing needs undoing.
    pub fn cancel_step(&mut self) {
        if matches!(
            self.job,
            Some(StreamJob::Step { .. } | StreamJob::DungeonStep { .. })
        ) {
            debug!(anchor = ?self.anchor, "viewport_step_cancelled");
            self.job = None;
            self.scroll = None;
        }
    }

    /// Full-screen rebuild around a new anchor, one half-row per tick.
    pub fn begin_rebuild(&mut self, anchor: (i32, i32)) {
        if self.job.is_some() {
            debug!(job = ?self.job_kind(), "viewport_job_superseded");
        }
        self.scroll = None;
        self.buffers[1 - self.active].origin = origin_for(anchor);
        self.job = Some(StreamJob::Rebuild {
            anchor,
            half: BufferHalf::Left,
            next_row: 0,
        });
    }

    /// Repaints the current view into the inactive buffer in row chunks.
    pub fn begin_refresh(&mut self) -> bool {
        if self.job.is_some() {
            return false;
        }
        self.buffers[1 - self.active].origin = origin_for(self.anchor);
        self.job = Some(StreamJob::Refresh { next_row: 0 });
        true
    }

    /// Runs one tick of the in-flight job.
    pub fn advance(
        &mut self,
        resolver: &BlockResolver<'_>,
        windows: &dyn WindowOverlay,
    ) -> Option<Settled> {
        let job = self.job?;
        let target = &mut self.buffers[1 - self.active];
        match job {
            StreamJob::Step { destination } => self.finish_scroll(job.kind(), destination),
            StreamJob::DungeonStep { destination } => {
                for row in 0..BUFFER_ROWS {
                    target.paint_row(row, BufferHalf::Right.columns(), resolver, windows);
                }
                self.finish_scroll(job.kind(), destination)
            }
            StreamJob::Rebuild {
                anchor,
                half,
                next_row,
            } => {
                target.paint_row(next_row, half.columns(), resolver, windows);
                let next_row = next_row + 1;
                if next_row < BUFFER_ROWS {
                    self.job = Some(StreamJob::Rebuild {
                        anchor,
                        half,
                        next_row,
                    });
                    return None;
                }
                if half == BufferHalf::Left {
                    self.job = Some(StreamJob::Rebuild {
                        anchor,
                        half: BufferHalf::Right,
                        next_row: 0,
                    });
                    return None;
                }
                Some(self.toggle(job.kind(), anchor))
            }
            StreamJob::Refresh { next_row } => {
                let end = (next_row + self.refresh_rows_per_tick).min(BUFFER_ROWS);
                for row in next_row..end {
                    target.paint_row(row, 0..BUFFER_COLS, resolver, windows);
                }
                if end < BUFFER_ROWS {
                    self.job = Some(StreamJob::Refresh { next_row: end });
                    return None;
                }
                Some(self.toggle(job.kind(), self.anchor))
            }
        }
    }

    fn finish_scroll(&mut self, kind: StreamJobKind, destination: (i32, i32)) -> Option<Settled> {
        let scroll = self.scroll.get_or_insert(Scroll {
            direction: Direction::Down,
            offset: 0,
        });
        scroll.offset += 1;
        if scroll.offset < SCROLL_STEPS_PER_BLOCK {
            return None;
        }
        Some(self.toggle(kind, destination))
    }

    fn toggle(&mut self, kind: StreamJobKind, anchor: (i32, i32)) -> Settled {
        self.active = 1 - self.active;
        self.anchor = anchor;
        self.scroll = None;
        self.job = None;
        debug!(job = ?kind, anchor = ?anchor, active = self.active, "viewport_settled");
        Settled { kind, anchor }
    }

    /// Repaints one map block wherever either buffer currently holds it.
    pub fn redraw_block(
        &mut self,
        x: i32,
        y: i32,
        resolver: &BlockResolver<'_>,
        windows: &dyn WindowOverlay,
    ) {
        let cell = BlockCell::from(resolver.resolve(x, y));
        for buffer in &mut self.buffers {
            if let Some((col, row)) = buffer.buffer_position(x, y) {
                buffer.write(col, row, cell, windows);
            }
        }
    }

    /// Map coordinate currently drawn at a screen cell.
    pub fn block_under_screen_cell(&self, cell: ScreenCell) -> (i32, i32) {
        (
            self.anchor.0 + i32::from(cell.col) - i32::from(AVATAR_SCREEN_CELL.col),
            self.anchor.1 + i32::from(cell.row) - i32::from(AVATAR_SCREEN_CELL.row),
        )
    }

    /// Puts the true map content back under a screen cell a window has
    /// released. Writes regardless of the window predicate.
    pub fn restore_screen_cell(&mut self, cell: ScreenCell, resolver: &BlockResolver<'_>) {
        let (x, y) = self.block_under_screen_cell(cell);
        let resolved = BlockCell::from(resolver.resolve(x, y));
        for buffer in &mut self.buffers {
            if let Some((col, row)) = buffer.buffer_position(x, y) {
                buffer.cells[row * BUFFER_COLS + col] = resolved;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::block::Block;
    use crate::world::map::MapDescriptor;
    use crate::world::quest::QuestState;
    use crate::world::resolver::Viewer;
    use crate::world::test_support::{flat_map, map_from_rows};
    use crate::world::window::{NoWindows, WindowRect, WindowRects};

    fn striped_town() -> MapDescriptor {
        let rows = (0..40)
            .map(|y| {
                (0..48)
                    .map(|x| std::char::from_digit((x + y) % 16, 16).expect("nibble"))
                    .collect::<String>()
            })
            .collect::<Vec<_>>();
        let rows = rows.iter().map(String::as_str).collect::<Vec<_>>();
        map_from_rows(4, MapKind::Town, Block::Grass, &rows)
    }

    fn viewer(anchor: (i32, i32)) -> Viewer {
        Viewer {
            x: anchor.0,
            y: anchor.1,
            under_cover: false,
            light_radius: 2,
        }
    }

    fn assert_buffer_matches(buffer: &DisplayBuffer, resolver: &BlockResolver<'_>) {
        let (ox, oy) = buffer.origin();
        for row in 0..BUFFER_ROWS {
            for col in 0..BUFFER_COLS {
                let x = ox + col as i32;
                let y = oy + row as i32;
                assert_eq!(
                    buffer.cell(col, row),
                    Some(BlockCell::from(resolver.resolve(x, y))),
                    "cell at map ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn new_viewport_centers_anchor_on_avatar_cell() {
        let map = striped_town();
        let quest = QuestState::new();
        let anchor = (20, 20);
        let resolver = BlockResolver::new(&map, &quest, viewer(anchor));
        let viewport = ViewportStreamer::new(anchor, 4, &resolver, &NoWindows);

        assert_eq!(viewport.active_buffer().anchor(), anchor);
        assert_eq!(viewport.block_under_screen_cell(AVATAR_SCREEN_CELL), anchor);
        assert_eq!(
            viewport.block_under_screen_cell(ScreenCell::new(0, 0)),
            (12, 13)
        );
        assert_buffer_matches(viewport.active_buffer(), &resolver);
    }

    #[test]
    fn step_scrolls_half_block_then_toggles_on_next_tick() {
        let map = striped_town();
        let quest = QuestState::new();
        let anchor = (20, 20);
        let resolver = BlockResolver::new(&map, &quest, viewer(anchor));
        let mut viewport = ViewportStreamer::new(anchor, 4, &resolver, &NoWindows);
        let shown_before = viewport.active_index();

        assert!(viewport.begin_step(Direction::Right, MapKind::Town, &resolver, &NoWindows));
        assert_eq!(viewport.active_index(), shown_before);
        assert_eq!(viewport.scroll_pixels(), (TILE_PIXELS as i32, 0));
        assert_eq!(viewport.job_kind(), Some(StreamJobKind::Step));
        assert_buffer_matches(viewport.inactive_buffer(), &resolver);

        let settled = viewport.advance(&resolver, &NoWindows).expect("settles");
        assert_eq!(settled.anchor, (21, 20));
        assert_eq!(settled.kind, StreamJobKind::Step);
        assert_ne!(viewport.active_index(), shown_before);
        assert_eq!(viewport.scroll(), None);
        assert_eq!(viewport.active_buffer().anchor(), (21, 20));
        assert_buffer_matches(viewport.active_buffer(), &resolver);
    }

    #[test]
    fn step_resolves_only_entering_strip() {
        let map = striped_town();
        let mut quest = QuestState::new();
        quest.flags.final_battle_active = true;
        let anchor = (20, 20);
        let blank = BlockResolver::new(&map, &quest, viewer(anchor));
        let mut viewport = ViewportStreamer::new(anchor, 4, &blank, &NoWindows);

        // Resolving with different state marks which cells were freshly written.
        let fresh_quest = QuestState::new();
        let fresh = BlockResolver::new(&map, &fresh_quest, viewer(anchor));
        assert!(viewport.begin_step(Direction::Up, MapKind::Town, &fresh, &NoWindows));

        let buffer = viewport.inactive_buffer();
        let (ox, oy) = buffer.origin();
        for col in 0..BUFFER_COLS {
            let x = ox + col as i32;
            assert_eq!(
                buffer.cell(col, 0),
                Some(BlockCell::from(fresh.resolve(x, oy)))
            );
            assert_eq!(
                buffer.cell(col, 1),
                Some(BlockCell::from(blank.resolve(x, oy + 1)))
            );
        }
    }

    #[test]
    fn cancelled_step_leaves_display_untouched() {
        let map = striped_town();
        let quest = QuestState::new();
        let anchor = (20, 20);
        let resolver = BlockResolver::new(&map, &quest, viewer(anchor));
        let mut viewport = ViewportStreamer::new(anchor, 4, &resolver, &NoWindows);
        let shown_before = viewport.active_index();

        assert!(viewport.begin_step(Direction::Left, MapKind::Town, &resolver, &NoWindows));
        viewport.cancel_step();

        assert!(!viewport.is_busy());
        assert_eq!(viewport.scroll_pixels(), (0, 0));
        assert_eq!(viewport.anchor(), anchor);
        assert_eq!(viewport.active_index(), shown_before);
        assert_eq!(viewport.advance(&resolver, &NoWindows), None);
    }

    #[test]
    fn second_step_is_refused_while_one_is_in_flight() {
        let map = striped_town();
        let quest = QuestState::new();
        let resolver = BlockResolver::new(&map, &quest, viewer((20, 20)));
        let mut viewport = ViewportStreamer::new((20, 20), 4, &resolver, &NoWindows);
        assert!(viewport.begin_step(Direction::Down, MapKind::Town, &resolver, &NoWindows));
        assert!(!viewport.begin_step(Direction::Down, MapKind::Town, &resolver, &NoWindows));
        assert!(!viewport.begin_refresh());
    }

    #[test]
    fn dungeon_step_rebuilds_one_half_per_tick() {
        // Terrain varies by row so a one-row shift changes cell content.
        let rows = (0..30)
            .map(|y| {
                let digit = std::char::from_digit(y % 4, 16).expect("nibble");
                std::iter::repeat(digit).take(30).collect::<String>()
            })
            .collect::<Vec<_>>();
        let rows = rows.iter().map(String::as_str).collect::<Vec<_>>();
        let map = map_from_rows(6, MapKind::Dungeon, Block::Stone, &rows);
        let quest = QuestState::new();
        let anchor = (15, 15);
        let resolver = BlockResolver::new(&map, &quest, viewer(anchor));
        let mut viewport = ViewportStreamer::new(anchor, 4, &resolver, &NoWindows);

        let destination = (15, 16);
        let at_destination = BlockResolver::new(&map, &quest, viewer(destination));
        assert!(viewport.begin_step(
            Direction::Down,
            MapKind::Dungeon,
            &at_destination,
            &NoWindows
        ));
        assert_eq!(viewport.job_kind(), Some(StreamJobKind::DungeonStep));

        let buffer = viewport.inactive_buffer();
        let (ox, oy) = buffer.origin();
        assert_eq!(buffer.anchor(), destination);
        // Lit block just right of the destination lies in the right half.
        let right = (destination.0 + 1, destination.1);
        let right_col = (right.0 - ox) as usize;
        assert!(right_col >= HALF_COLS);
        assert_ne!(
            buffer.cell(right_col, (right.1 - oy) as usize),
            Some(BlockCell::from(at_destination.resolve(right.0, right.1)))
        );
        for row in 0..BUFFER_ROWS {
            for col in 0..HALF_COLS {
                let (x, y) = (ox + col as i32, oy + row as i32);
                assert_eq!(
                    buffer.cell(col, row),
                    Some(BlockCell::from(at_destination.resolve(x, y)))
                );
            }
        }

        let settled = viewport
            .advance(&at_destination, &NoWindows)
            .expect("settles on second tick");
        assert_eq!(settled.anchor, destination);
        assert_buffer_matches(viewport.active_buffer(), &at_destination);
    }

    #[test]
    fn map_change_rebuild_yields_after_every_row() {
        let old_map = striped_town();
        let new_map = flat_map(5, MapKind::Town, Block::Grass, 30, 30, 6);
        let quest = QuestState::new();
        let old_resolver = BlockResolver::new(&old_map, &quest, viewer((20, 20)));
        let mut viewport = ViewportStreamer::new((20, 20), 4, &old_resolver, &NoWindows);
        let shown_before = viewport.active_index();

        let new_resolver = BlockResolver::new(&new_map, &quest, viewer((3, 4)));
        viewport.begin_rebuild((3, 4));
        let mut ticks = 0;
        let settled = loop {
            ticks += 1;
            if let Some(settled) = viewport.advance(&new_resolver, &NoWindows) {
                break settled;
            }
            assert_eq!(viewport.active_index(), shown_before);
            assert_eq!(viewport.anchor(), (20, 20));
            assert!(ticks < 100, "rebuild never finished");
        };

        assert_eq!(ticks, 2 * BUFFER_ROWS);
        assert_eq!(settled.kind, StreamJobKind::Rebuild);
        assert_eq!(viewport.anchor(), (3, 4));
        assert_buffer_matches(viewport.active_buffer(), &new_resolver);
    }

    #[test]
    fn refresh_is_chunked_by_configured_rows() {
        let map = striped_town();
        let quest = QuestState::new();
        let resolver = BlockResolver::new(&map, &quest, viewer((20, 20)));
        let mut viewport = ViewportStreamer::new((20, 20), 4, &resolver, &NoWindows);

        assert!(viewport.begin_refresh());
        let mut ticks = 1;
        while viewport.advance(&resolver, &NoWindows).is_none() {
            ticks += 1;
        }
        assert_eq!(ticks, BUFFER_ROWS.div_ceil(4));
        assert!(!viewport.is_busy());
    }

    #[test]
    fn writes_skip_window_covered_cells_until_restored() {
        let map = striped_town();
        let quest = QuestState::new();
        let old_resolver = BlockResolver::new(&map, &quest, viewer((20, 20)));
        let mut viewport = ViewportStreamer::new((20, 20), 4, &old_resolver, &NoWindows);

        let mut windows = WindowRects::new();
        windows.open(WindowRect::new(0, 0, 1, 1));
        viewport.begin_rebuild((30, 30));
        while viewport.advance(&old_resolver, &windows).is_none() {}

        let covered_map = viewport.block_under_screen_cell(ScreenCell::new(0, 0));
        let expected = BlockCell::from(old_resolver.resolve(covered_map.0, covered_map.1));
        // Buffer cell (1, 1) is screen cell (0, 0).
        assert_ne!(viewport.active_buffer().cell(1, 1), Some(expected));
        assert_eq!(
            viewport.active_buffer().cell(0, 0),
            Some(BlockCell::from(old_resolver.resolve(covered_map.0 - 1, covered_map.1 - 1)))
        );

        viewport.restore_screen_cell(ScreenCell::new(0, 0), &old_resolver);
        assert_eq!(viewport.active_buffer().cell(1, 1), Some(expected));
    }

    #[test]
    fn step_does_not_carry_window_hidden_cells_out_from_under_the_window() {
        let map = striped_town();
        let quest = QuestState::new();
        let start = BlockResolver::new(&map, &quest, viewer((20, 20)));
        let mut viewport = ViewportStreamer::new((20, 20), 4, &start, &NoWindows);

        let mut windows = WindowRects::new();
        windows.open(WindowRect::new(5, 5, 1, 1));
        let rebuilt = BlockResolver::new(&map, &quest, viewer((25, 22)));
        viewport.begin_rebuild((25, 22));
        while viewport.advance(&rebuilt, &windows).is_none() {}

        let stepped = BlockResolver::new(&map, &quest, viewer((26, 22)));
        assert!(viewport.begin_step(Direction::Right, MapKind::Town, &stepped, &windows));
        viewport.advance(&stepped, &windows).expect("settles");

        let rect = windows.close_top().expect("window");
        for cell in rect.cells() {
            viewport.restore_screen_cell(cell, &stepped);
        }
        assert_buffer_matches(viewport.active_buffer(), &stepped);
    }

    #[test]
    fn redraw_block_updates_both_buffers() {
        let map = striped_town();
        let mut quest = QuestState::new();
        let anchor = (20, 20);
        let resolver = BlockResolver::new(&map, &quest, viewer(anchor));
        let mut viewport = ViewportStreamer::new(anchor, 4, &resolver, &NoWindows);

        quest.flags.final_battle_active = true;
        let changed = BlockResolver::new(&map, &quest, viewer(anchor));
        viewport.redraw_block(21, 20, &changed, &NoWindows);

        let blank = Some(BlockCell::from(changed.resolve(21, 20)));
        assert_eq!(viewport.active_buffer().cell_at_map(21, 20), blank);
        assert_eq!(viewport.inactive_buffer().cell_at_map(21, 20), blank);
        assert_ne!(viewport.active_buffer().cell_at_map(22, 20), blank);
    }
}
