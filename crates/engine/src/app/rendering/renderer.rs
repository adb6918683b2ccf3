use std::path::Path;
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::{info, warn};
use winit::window::Window;

use crate::app::FrameView;
use crate::world::{
    DisplayBuffer, Npc, ScreenCell, TileCell, WindowOverlay, AVATAR_SCREEN_CELL, BLOCK_PIXELS,
    BUFFER_COLS, BUFFER_ROWS, PALETTE_EARTH, PALETTE_LAND, PALETTE_WATER, TILE_PIXELS, VIEW_COLS,
    VIEW_ROWS,
};

pub const SCREEN_WIDTH_PX: u32 = VIEW_COLS as u32 * BLOCK_PIXELS;
pub const SCREEN_HEIGHT_PX: u32 = VIEW_ROWS as u32 * BLOCK_PIXELS;

const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];
const WINDOW_FILL_COLOR: [u8; 4] = [12, 12, 40, 255];
const WINDOW_BORDER_COLOR: [u8; 4] = [236, 236, 236, 255];
const AVATAR_COLOR: [u8; 4] = [248, 216, 120, 255];
const NPC_COLORS: [[u8; 4]; 4] = [
    [228, 92, 16, 255],
    [140, 220, 255, 255],
    [200, 120, 230, 255],
    [120, 230, 120, 255],
];
const MARKER_HALF_SIZE_PX: i32 = 5;
const ATLAS_TILES_PER_ROW: u32 = 16;

/// Two shades per palette group; odd patterns get the darker one.
const FALLBACK_PALETTES: [[[u8; 4]; 2]; 4] = [
    [[64, 160, 56, 255], [40, 116, 36, 255]],
    [[176, 128, 80, 255], [128, 88, 52, 255]],
    [[56, 96, 216, 255], [32, 64, 160, 255]],
    [[132, 132, 132, 255], [84, 84, 92, 255]],
];

/// Tile patterns laid out left to right, top to bottom, 8x8 pixels each.
struct TileAtlas {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl TileAtlas {
    fn tile_origin(&self, pattern: u8) -> Option<(u32, u32)> {
        let x = (u32::from(pattern) % ATLAS_TILES_PER_ROW) * TILE_PIXELS;
        let y = (u32::from(pattern) / ATLAS_TILES_PER_ROW) * TILE_PIXELS;
        if x + TILE_PIXELS > self.width || y + TILE_PIXELS > self.height {
            return None;
        }
        Some((x, y))
    }
}

/// Presents the active display buffer at the native 256x240 resolution;
/// `pixels` scales it to the window surface.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    atlas: Option<TileAtlas>,
}

impl Renderer {
    pub fn new(window: Arc<Window>, atlas_path: &Path) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        let atlas = match load_tile_atlas(atlas_path) {
            Ok(atlas) => {
                info!(
                    path = %atlas_path.display(),
                    width = atlas.width,
                    height = atlas.height,
                    "renderer_tile_atlas_loaded"
                );
                Some(atlas)
            }
            Err(reason) => {
                warn!(
                    path = %atlas_path.display(),
                    reason = reason.as_str(),
                    "renderer_tile_atlas_unavailable_using_palette_fallback"
                );
                None
            }
        };
        Ok(Self {
            window,
            pixels,
            atlas,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width.max(1), height.max(1), window);
        Pixels::new(SCREEN_WIDTH_PX, SCREEN_HEIGHT_PX, surface)
    }

    pub(crate) fn render_frame(&mut self, view: FrameView<'_>) -> Result<(), Error> {
        compose_frame(self.pixels.frame_mut(), view, self.atlas.as_ref());
        self.pixels.render()
    }
}

fn compose_frame(frame: &mut [u8], view: FrameView<'_>, atlas: Option<&TileAtlas>) {
    for chunk in frame.chunks_exact_mut(4) {
        chunk.copy_from_slice(&CLEAR_COLOR);
    }

    let session = view.session;
    let viewport = session.viewport();
    let buffer = viewport.active_buffer();
    let scroll = viewport.scroll_pixels();
    draw_buffer(frame, buffer, scroll, atlas);

    let sub_steps = session.scheduler().sub_steps();
    for npc in session.visible_npcs() {
        if let Some((x, y)) = npc_screen_center(npc, buffer, scroll, sub_steps) {
            let color = NPC_COLORS[usize::from(npc.graphic) % NPC_COLORS.len()];
            draw_square(frame, x, y, MARKER_HALF_SIZE_PX, color);
        }
    }

    let (avatar_x, avatar_y) = screen_cell_center(AVATAR_SCREEN_CELL);
    draw_square(frame, avatar_x, avatar_y, MARKER_HALF_SIZE_PX, AVATAR_COLOR);

    draw_windows(frame, view.windows);
}

/// Buffer cell `(col, row)` lands one block up-left of its screen cell; the
/// margin ring only shows while a scroll is in progress.
fn draw_buffer(
    frame: &mut [u8],
    buffer: &DisplayBuffer,
    scroll: (i32, i32),
    atlas: Option<&TileAtlas>,
) {
    let block = BLOCK_PIXELS as i32;
    let tile = TILE_PIXELS as i32;
    for row in 0..BUFFER_ROWS {
        for col in 0..BUFFER_COLS {
            let Some(cell) = buffer.cell(col, row) else {
                continue;
            };
            let left = (col as i32 - 1) * block - scroll.0;
            let top = (row as i32 - 1) * block - scroll.1;
            for (index, tile_cell) in cell.tiles.iter().enumerate() {
                let tile_left = left + (index as i32 % 2) * tile;
                let tile_top = top + (index as i32 / 2) * tile;
                draw_tile(frame, tile_left, tile_top, *tile_cell, atlas);
            }
        }
    }
}

fn draw_tile(frame: &mut [u8], left: i32, top: i32, cell: TileCell, atlas: Option<&TileAtlas>) {
    let tile = TILE_PIXELS as i32;
    if left + tile <= 0
        || top + tile <= 0
        || left >= SCREEN_WIDTH_PX as i32
        || top >= SCREEN_HEIGHT_PX as i32
    {
        return;
    }
    let atlas_origin =
        atlas.and_then(|atlas| atlas.tile_origin(cell.pattern).map(|origin| (atlas, origin)));
    match atlas_origin {
        Some((atlas, (src_x, src_y))) => {
            for dy in 0..tile {
                let src_row = (src_y + dy as u32) * atlas.width;
                for dx in 0..tile {
                    let src = ((src_row + src_x + dx as u32) * 4) as usize;
                    let Some(texel) = atlas.rgba.get(src..src + 4) else {
                        continue;
                    };
                    if texel[3] == 0 {
                        continue;
                    }
                    let color = [texel[0], texel[1], texel[2], 255];
                    write_pixel_rgba_clipped(frame, left + dx, top + dy, color);
                }
            }
        }
        None => {
            let color = fallback_tile_color(cell);
            for dy in 0..tile {
                for dx in 0..tile {
                    write_pixel_rgba_clipped(frame, left + dx, top + dy, color);
                }
            }
        }
    }
}

fn fallback_tile_color(cell: TileCell) -> [u8; 4] {
    let group = match cell.palette {
        PALETTE_LAND => 0,
        PALETTE_EARTH => 1,
        PALETTE_WATER => 2,
        _ => 3,
    };
    if cell == TileCell::BLANK {
        return CLEAR_COLOR;
    }
    FALLBACK_PALETTES[group][usize::from(cell.pattern & 1)]
}

fn screen_cell_center(cell: ScreenCell) -> (i32, i32) {
    let block = BLOCK_PIXELS as i32;
    (
        i32::from(cell.col) * block + block / 2,
        i32::from(cell.row) * block + block / 2,
    )
}

fn npc_screen_center(
    npc: &Npc,
    buffer: &DisplayBuffer,
    scroll: (i32, i32),
    sub_steps: u8,
) -> Option<(i32, i32)> {
    let block = BLOCK_PIXELS as i32;
    let (origin_x, origin_y) = buffer.origin();
    let (x, y) = npc.position().signed();
    let (offset_x, offset_y) = npc.pixel_offset(sub_steps, BLOCK_PIXELS);
    let center_x = (x - origin_x - 1) * block + block / 2 + offset_x - scroll.0;
    let center_y = (y - origin_y - 1) * block + block / 2 + offset_y - scroll.1;
    let on_screen = center_x > -block
        && center_y > -block
        && center_x < SCREEN_WIDTH_PX as i32 + block
        && center_y < SCREEN_HEIGHT_PX as i32 + block;
    on_screen.then_some((center_x, center_y))
}

fn draw_windows(frame: &mut [u8], windows: &dyn WindowOverlay) {
    let block = BLOCK_PIXELS as i32;
    for row in 0..VIEW_ROWS as u8 {
        for col in 0..VIEW_COLS as u8 {
            let cell = ScreenCell::new(col, row);
            if !windows.covers(cell) {
                continue;
            }
            let left = i32::from(col) * block;
            let top = i32::from(row) * block;
            for dy in 0..block {
                for dx in 0..block {
                    write_pixel_rgba_clipped(frame, left + dx, top + dy, WINDOW_FILL_COLOR);
                }
            }
            let neighbour_open = |dc: i32, dr: i32| {
                let c = i32::from(col) + dc;
                let r = i32::from(row) + dr;
                c < 0
                    || r < 0
                    || !windows.covers(ScreenCell::new(c.min(255) as u8, r.min(255) as u8))
            };
            if neighbour_open(0, -1) {
                draw_horizontal_span(frame, left, left + block, top + 1, WINDOW_BORDER_COLOR);
            }
            if neighbour_open(0, 1) {
                let y = top + block - 2;
                draw_horizontal_span(frame, left, left + block, y, WINDOW_BORDER_COLOR);
            }
            if neighbour_open(-1, 0) {
                draw_vertical_span(frame, left + 1, top, top + block, WINDOW_BORDER_COLOR);
            }
            if neighbour_open(1, 0) {
                let x = left + block - 2;
                draw_vertical_span(frame, x, top, top + block, WINDOW_BORDER_COLOR);
            }
        }
    }
}

fn draw_horizontal_span(frame: &mut [u8], from_x: i32, to_x: i32, y: i32, color: [u8; 4]) {
    for x in from_x..to_x {
        write_pixel_rgba_clipped(frame, x, y, color);
    }
}

fn draw_vertical_span(frame: &mut [u8], x: i32, from_y: i32, to_y: i32, color: [u8; 4]) {
    for y in from_y..to_y {
        write_pixel_rgba_clipped(frame, x, y, color);
    }
}

fn draw_square(frame: &mut [u8], cx: i32, cy: i32, half_size: i32, color: [u8; 4]) {
    for y in (cy - half_size)..=(cy + half_size) {
        for x in (cx - half_size)..=(cx + half_size) {
            write_pixel_rgba_clipped(frame, x, y, color);
        }
    }
}

fn write_pixel_rgba_clipped(frame: &mut [u8], x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= SCREEN_WIDTH_PX as i32 || y >= SCREEN_HEIGHT_PX as i32 {
        return;
    }
    let offset = (y as usize * SCREEN_WIDTH_PX as usize + x as usize) * 4;
    if let Some(pixel) = frame.get_mut(offset..offset + 4) {
        pixel.copy_from_slice(&color);
    }
}

fn load_tile_atlas(path: &Path) -> Result<TileAtlas, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    if image.width() < TILE_PIXELS || image.height() < TILE_PIXELS {
        return Err(format!(
            "atlas_too_small:{}x{}",
            image.width(),
            image.height()
        ));
    }
    Ok(TileAtlas {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}
