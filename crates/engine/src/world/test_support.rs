use super::block::Block;
use super::cover::CoverOverlay;
use super::map::{MapDescriptor, MapId, MapKind, MapLayout, QuestAnchors};

/// Builds a map from rows of hex digits, one raw terrain index per block.
/// Outdoor maps are run-length encoded, others packed as nibble grids.
pub(crate) fn map_from_rows(
    id: u8,
    kind: MapKind,
    boundary: Block,
    rows: &[&str],
) -> MapDescriptor {
    let height = rows.len() as u16;
    let width = rows.first().map(|row| row.len()).unwrap_or(0) as u16;
    let grid = rows
        .iter()
        .map(|row| {
            row.chars()
                .map(|ch| ch.to_digit(16).expect("hex digit") as u8)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let layout = match kind {
        MapKind::Outdoor => MapLayout::run_length(width, height, encode_runs(&grid)),
        MapKind::Town | MapKind::Dungeon => {
            MapLayout::nibble_grid(width, height, pack_nibbles(&grid))
        }
    }
    .expect("valid test layout");
    MapDescriptor {
        id: MapId(id),
        name: format!("test-{id}"),
        kind,
        boundary,
        layout,
        cover: None,
        anchors: QuestAnchors::default(),
    }
}

/// Uniform map of one raw terrain index.
pub(crate) fn flat_map(
    id: u8,
    kind: MapKind,
    boundary: Block,
    width: u16,
    height: u16,
    terrain: u8,
) -> MapDescriptor {
    let digit = std::char::from_digit(u32::from(terrain), 16).expect("nibble");
    let row = std::iter::repeat(digit).take(width as usize).collect::<String>();
    let rows = vec![row.as_str(); height as usize];
    map_from_rows(id, kind, boundary, &rows)
}

/// Cover overlay from rows where `#` marks a covered block.
pub(crate) fn cover_from_rows(rows: &[&str]) -> CoverOverlay {
    let height = rows.len() as u16;
    let width = rows.first().map(|row| row.len()).unwrap_or(0) as u16;
    let mut overlay = CoverOverlay::empty(width, height);
    for (y, row) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            if ch == '#' {
                overlay.set_covered(x as u16, y as u16, true);
            }
        }
    }
    overlay
}

fn encode_runs(grid: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for row in grid {
        let mut index = 0;
        while index < row.len() {
            let class = row[index];
            let mut run = 1;
            while run < 16 && index + run < row.len() && row[index + run] == class {
                run += 1;
            }
            bytes.push((class << 4) | (run as u8 - 1));
            index += run;
        }
    }
    bytes
}

fn pack_nibbles(grid: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for row in grid {
        for pair in row.chunks(2) {
            let high = pair[0] << 4;
            let low = pair.get(1).copied().unwrap_or(0);
            bytes.push(high | low);
        }
    }
    bytes
}
