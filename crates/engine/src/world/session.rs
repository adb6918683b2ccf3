use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::content::WorldCatalog;

use super::cover::{CoverState, CoverTransition};
use super::geometry::{BlockCoord, Direction, ScreenCell};
use super::map::{MapDescriptor, MapId, MapKind};
use super::npc::{
    DirectionSource, Npc, NpcContext, NpcRoster, NpcScheduler, NpcTickReport, RandomDirections,
};
use super::quest::{QuestState, QuestStateError};
use super::resolver::{BlockResolver, ResolvedBlock, Viewer};
use super::viewport::{Settled, StreamJobKind, ViewportStreamer};
use super::window::{NoWindows, WindowOverlay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    pub decision_interval_ticks: u64,
    pub npc_sub_steps: u8,
    pub refresh_rows_per_tick: usize,
    pub npc_seed: u64,
    pub light_radius: u8,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            decision_interval_ticks: 16,
            npc_sub_steps: 16,
            refresh_rows_per_tick: 4,
            npc_seed: 0x5eed,
            light_radius: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("map {map} is not in the world catalog")]
    UnknownMap { map: MapId },
    #[error("spawn ({x}, {y}) lies outside map {map} ({width}x{height})")]
    SpawnOutOfBounds {
        map: MapId,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvatarState {
    pub position: BlockCoord,
    pub facing: Direction,
    /// Destination of the step being scrolled in, if any.
    pub pending: Option<BlockCoord>,
    pub cover: CoverState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    /// The avatar walked into something; play the blocked cue.
    Bump { facing: Direction },
    AvatarMoved { position: BlockCoord },
    CoverChanged { transition: CoverTransition },
    ViewportSettled { job: StreamJobKind },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<WorldEvent>,
    pub npcs: NpcTickReport,
}

impl TickReport {
    pub fn bumped(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, WorldEvent::Bump { .. }))
    }
}

/// All mutable world state, advanced one display-refresh tick at a time.
/// Every call to [`WorldSession::tick`] returns with buffers, NPC table and
/// anchor mutually consistent.
pub struct WorldSession {
    catalog: WorldCatalog,
    config: WorldConfig,
    map: MapDescriptor,
    quest: QuestState,
    avatar: AvatarState,
    light_radius: u8,
    roster: NpcRoster,
    scheduler: NpcScheduler,
    viewport: ViewportStreamer,
    directions: Box<dyn DirectionSource>,
    tick: u64,
    refresh_pending: bool,
}

impl WorldSession {
    pub fn new(
        catalog: WorldCatalog,
        config: WorldConfig,
        map_id: MapId,
        spawn: BlockCoord,
        quest: QuestState,
    ) -> Result<Self, WorldError> {
        let map = spawn_map(&catalog, map_id, spawn)?;
        let avatar = AvatarState {
            position: spawn,
            facing: Direction::Down,
            pending: None,
            cover: CoverState::new(map.is_covered(spawn)),
        };
        let roster = NpcRoster::load(catalog.roster(map_id), &map);
        let viewer = viewer_for(&avatar, config.light_radius);
        let viewport = ViewportStreamer::new(
            spawn.signed(),
            config.refresh_rows_per_tick,
            &BlockResolver::new(&map, &quest, viewer),
            &NoWindows,
        );
        info!(
            map = %map.id,
            name = %map.name,
            x = spawn.x,
            y = spawn.y,
            "world_session_started"
        );
        Ok(Self {
            scheduler: NpcScheduler::new(config.decision_interval_ticks, config.npc_sub_steps),
            directions: Box::new(RandomDirections::new(config.npc_seed)),
            light_radius: config.light_radius,
            catalog,
            config,
            map,
            quest,
            avatar,
            roster,
            viewport,
            tick: 0,
            refresh_pending: false,
        })
    }

    pub fn with_directions(mut self, directions: Box<dyn DirectionSource>) -> Self {
        self.directions = directions;
        self
    }

    pub fn catalog(&self) -> &WorldCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn map(&self) -> &MapDescriptor {
        &self.map
    }

    pub fn avatar(&self) -> &AvatarState {
        &self.avatar
    }

    pub fn roster(&self) -> &NpcRoster {
        &self.roster
    }

    pub fn scheduler(&self) -> &NpcScheduler {
        &self.scheduler
    }

    pub fn viewport(&self) -> &ViewportStreamer {
        &self.viewport
    }

    pub fn quest(&self) -> &QuestState {
        &self.quest
    }

    /// Direct quest access for gameplay logic. Blocks already on screen keep
    /// their old look until [`WorldSession::redraw_block`] or a refresh.
    pub fn quest_mut(&mut self) -> &mut QuestState {
        &mut self.quest
    }

    pub fn light_radius(&self) -> u8 {
        self.light_radius
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn viewer(&self) -> Viewer {
        viewer_for(&self.avatar, self.light_radius)
    }

    pub fn resolver(&self) -> BlockResolver<'_> {
        BlockResolver::new(&self.map, &self.quest, self.viewer())
    }

    pub fn tick(&mut self, input: Option<Direction>, windows: &dyn WindowOverlay) -> TickReport {
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        if self.viewport.is_busy() {
            let viewer = self.viewer();
            let resolver = BlockResolver::new(&self.map, &self.quest, viewer);
            if let Some(settled) = self.viewport.advance(&resolver, windows) {
                self.on_settled(settled, &mut report.events);
            }
        } else if let Some(direction) = input {
            self.try_step(direction, windows, &mut report.events);
        }

        if self.viewport.job_kind() != Some(StreamJobKind::Rebuild) {
            let context = NpcContext {
                resolver: BlockResolver::new(&self.map, &self.quest, self.viewer()),
                avatar: self.avatar.position,
                avatar_pending: self.avatar.pending,
                avatar_under_cover: self.avatar.cover.under_cover(),
                viewport_anchor: self.viewport.anchor(),
                windows,
                tick: self.tick,
            };
            report.npcs = self
                .scheduler
                .tick(&mut self.roster, &context, self.directions.as_mut());
        }

        self.tick += 1;
        report
    }

    fn try_step(
        &mut self,
        direction: Direction,
        windows: &dyn WindowOverlay,
        events: &mut Vec<WorldEvent>,
    ) {
        self.avatar.facing = direction;
        let (x, y) = self.avatar.position.signed();
        let (dx, dy) = direction.delta();
        let (tx, ty) = (x + dx, y + dy);
        let target = self.map.in_bounds(tx, ty);
        self.avatar.pending = target;

        let viewer = Viewer {
            x: tx,
            y: ty,
            under_cover: self.avatar.cover.under_cover(),
            light_radius: self.light_radius,
        };
        let resolver = BlockResolver::new(&self.map, &self.quest, viewer);
        self.viewport
            .begin_step(direction, self.map.kind, &resolver, windows);

        let blocked = match target {
            None => Some("out_of_bounds"),
            Some(coord) if !resolver.is_walkable(coord) => Some("not_walkable"),
            Some(coord) if self.roster.is_occupied(coord) => Some("npc"),
            Some(_) => None,
        };
        if let Some(reason) = blocked {
            self.viewport.cancel_step();
            self.avatar.pending = None;
            debug!(x = tx, y = ty, reason, "avatar_bumped");
            events.push(WorldEvent::Bump { facing: direction });
        }
    }

    fn on_settled(&mut self, settled: Settled, events: &mut Vec<WorldEvent>) {
        events.push(WorldEvent::ViewportSettled { job: settled.kind });
        if matches!(
            settled.kind,
            StreamJobKind::Step | StreamJobKind::DungeonStep
        ) {
            if let Some(position) = self.avatar.pending.take() {
                self.avatar.position = position;
                events.push(WorldEvent::AvatarMoved { position });
                let marker = self.map.is_covered(position);
                if let Some(transition) = self.avatar.cover.observe(marker) {
                    debug!(?transition, x = position.x, y = position.y, "cover_transition");
                    events.push(WorldEvent::CoverChanged { transition });
                    self.refresh_pending = true;
                }
            }
        }
        if self.refresh_pending && self.viewport.begin_refresh() {
            self.refresh_pending = false;
        }
    }

    /// Moves the avatar to another map and streams the new view in over the
    /// following ticks.
    pub fn change_map(&mut self, map_id: MapId, spawn: BlockCoord) -> Result<(), WorldError> {
        let map = spawn_map(&self.catalog, map_id, spawn)?;
        self.avatar = AvatarState {
            position: spawn,
            facing: self.avatar.facing,
            pending: None,
            cover: CoverState::new(map.is_covered(spawn)),
        };
        self.roster = NpcRoster::load(self.catalog.roster(map_id), &map);
        self.map = map;
        self.refresh_pending = false;
        self.viewport.begin_rebuild(spawn.signed());
        info!(
            map = %self.map.id,
            name = %self.map.name,
            kind = ?self.map.kind,
            x = spawn.x,
            y = spawn.y,
            "map_changed"
        );
        Ok(())
    }

    /// Dungeon light radius changes repaint the whole view.
    pub fn set_light_radius(&mut self, radius: u8) {
        if radius == self.light_radius {
            return;
        }
        self.light_radius = radius;
        if self.map.kind == MapKind::Dungeon && !self.viewport.begin_refresh() {
            self.refresh_pending = true;
        }
    }

    pub fn take_treasure(
        &mut self,
        coord: BlockCoord,
        windows: &dyn WindowOverlay,
    ) -> Result<(), QuestStateError> {
        self.quest.record_treasure_taken(self.map.id, coord)?;
        self.redraw_block(coord, windows);
        Ok(())
    }

    pub fn open_door(
        &mut self,
        coord: BlockCoord,
        windows: &dyn WindowOverlay,
    ) -> Result<(), QuestStateError> {
        self.quest.record_door_opened(self.map.id, coord)?;
        self.redraw_block(coord, windows);
        Ok(())
    }

    pub fn build_bridge(&mut self, windows: &dyn WindowOverlay) {
        self.quest.flags.bridge_built = true;
        if let Some(anchor) = self.map.anchors.bridge {
            self.redraw_block(anchor, windows);
            for direction in Direction::ALL {
                if let Some(neighbor) = anchor.step(direction, self.map.width(), self.map.height())
                {
                    self.redraw_block(neighbor, windows);
                }
            }
        }
    }

    pub fn redraw_block(&mut self, coord: BlockCoord, windows: &dyn WindowOverlay) {
        let viewer = self.viewer();
        let resolver = BlockResolver::new(&self.map, &self.quest, viewer);
        let (x, y) = coord.signed();
        self.viewport.redraw_block(x, y, &resolver, windows);
    }

    /// True content under a screen cell, as a window would restore it.
    pub fn block_under_screen_cell(&self, cell: ScreenCell) -> ResolvedBlock {
        let (x, y) = self.viewport.block_under_screen_cell(cell);
        self.resolver().resolve(x, y)
    }

    pub fn restore_screen_cell(&mut self, cell: ScreenCell) {
        let viewer = self.viewer();
        let resolver = BlockResolver::new(&self.map, &self.quest, viewer);
        self.viewport.restore_screen_cell(cell, &resolver);
    }

    /// NPCs the renderer should draw: those sharing the avatar's cover state,
    /// and none while a map change is still streaming in.
    pub fn visible_npcs(&self) -> impl Iterator<Item = &Npc> {
        let rebuilding = self.viewport.job_kind() == Some(StreamJobKind::Rebuild);
        let under_cover = self.avatar.cover.under_cover();
        self.roster
            .iter()
            .filter(move |npc| !rebuilding && npc.under_cover() == under_cover)
    }
}

fn spawn_map(
    catalog: &WorldCatalog,
    map_id: MapId,
    spawn: BlockCoord,
) -> Result<MapDescriptor, WorldError> {
    let map = catalog
        .map(map_id)
        .ok_or(WorldError::UnknownMap { map: map_id })?;
    let (x, y) = spawn.signed();
    if !map.contains(x, y) {
        return Err(WorldError::SpawnOutOfBounds {
            map: map_id,
            x: spawn.x,
            y: spawn.y,
            width: map.width(),
            height: map.height(),
        });
    }
    Ok(map.clone())
}

fn viewer_for(avatar: &AvatarState, light_radius: u8) -> Viewer {
    let (x, y) = avatar.pending.unwrap_or(avatar.position).signed();
    Viewer {
        x,
        y,
        under_cover: avatar.cover.under_cover(),
        light_radius,
    }
}
