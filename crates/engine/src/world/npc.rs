use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::cover::CoverState;
use super::geometry::{BlockCoord, Direction, ScreenCell};
use super::map::MapDescriptor;
use super::resolver::BlockResolver;
use super::viewport::{AVATAR_SCREEN_CELL, VIEW_COLS, VIEW_ROWS};
use super::window::WindowOverlay;

pub const MAX_MOBILE_NPCS: usize = 10;
pub const NPCS_PER_TICK: usize = 2;
const SCHEDULER_SLOTS: u8 = (MAX_MOBILE_NPCS / NPCS_PER_TICK) as u8;

/// Roster entry as stored in content, consumed once at map load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcDescriptor {
    pub graphic: u8,
    pub position: BlockCoord,
    pub facing: Direction,
    /// Opaque byte handed to the dialogue system.
    pub dialogue: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NpcRosterDescriptor {
    pub mobile: Vec<NpcDescriptor>,
    pub stationary: Vec<NpcDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcMotion {
    Idle,
    Moving {
        direction: Direction,
        destination: BlockCoord,
        sub_step: u8,
    },
}

#[derive(Debug, Clone)]
pub struct Npc {
    pub graphic: u8,
    pub dialogue: u8,
    position: BlockCoord,
    facing: Direction,
    motion: NpcMotion,
    cover: CoverState,
    last_decision_tick: Option<u64>,
}

impl Npc {
    fn spawn(descriptor: &NpcDescriptor, map: &MapDescriptor) -> Self {
        Self {
            graphic: descriptor.graphic,
            dialogue: descriptor.dialogue,
            position: descriptor.position,
            facing: descriptor.facing,
            motion: NpcMotion::Idle,
            cover: CoverState::new(map.is_covered(descriptor.position)),
            last_decision_tick: None,
        }
    }

    pub fn position(&self) -> BlockCoord {
        self.position
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn motion(&self) -> NpcMotion {
        self.motion
    }

    pub fn under_cover(&self) -> bool {
        self.cover.under_cover()
    }

    pub fn destination(&self) -> Option<BlockCoord> {
        match self.motion {
            NpcMotion::Idle => None,
            NpcMotion::Moving { destination, .. } => Some(destination),
        }
    }

    /// Base cell, plus the destination while a move is in flight.
    pub fn occupies(&self, coord: BlockCoord) -> bool {
        self.position == coord || self.destination() == Some(coord)
    }

    /// Pixel offset from the base cell for a block `block_pixels` wide.
    pub fn pixel_offset(&self, sub_steps: u8, block_pixels: u32) -> (i32, i32) {
        let NpcMotion::Moving {
            direction,
            sub_step,
            ..
        } = self.motion
        else {
            return (0, 0);
        };
        let (dx, dy) = direction.delta();
        let travelled = i32::from(sub_step) * block_pixels as i32 / i32::from(sub_steps.max(1));
        (dx * travelled, dy * travelled)
    }
}

/// NPCs of the current map. Stationary entries never move but still block
/// the cells they stand on.
#[derive(Debug, Clone, Default)]
pub struct NpcRoster {
    mobile: Vec<Npc>,
    stationary: Vec<Npc>,
}

impl NpcRoster {
    pub fn load(descriptor: &NpcRosterDescriptor, map: &MapDescriptor) -> Self {
        if descriptor.mobile.len() > MAX_MOBILE_NPCS {
            warn!(
                map = %map.id,
                mobile = descriptor.mobile.len(),
                max = MAX_MOBILE_NPCS,
                "npc_roster_truncated"
            );
        }
        let mobile = descriptor
            .mobile
            .iter()
            .take(MAX_MOBILE_NPCS)
            .map(|entry| Npc::spawn(entry, map))
            .collect::<Vec<_>>();
        let stationary = descriptor
            .stationary
            .iter()
            .map(|entry| Npc::spawn(entry, map))
            .collect::<Vec<_>>();
        debug!(
            map = %map.id,
            mobile = mobile.len(),
            stationary = stationary.len(),
            "npc_roster_loaded"
        );
        Self { mobile, stationary }
    }

    pub fn mobile(&self) -> &[Npc] {
        &self.mobile
    }

    pub fn stationary(&self) -> &[Npc] {
        &self.stationary
    }

    pub fn iter(&self) -> impl Iterator<Item = &Npc> {
        self.mobile.iter().chain(self.stationary.iter())
    }

    pub fn is_occupied(&self, coord: BlockCoord) -> bool {
        self.iter().any(|npc| npc.occupies(coord))
    }

    fn is_occupied_by_other(&self, coord: BlockCoord, mobile_index: usize) -> bool {
        let other_mobile = self
            .mobile
            .iter()
            .enumerate()
            .any(|(index, npc)| index != mobile_index && npc.occupies(coord));
        other_mobile || self.stationary.iter().any(|npc| npc.occupies(coord))
    }
}

/// Supplies the facing an idle NPC tries next.
pub trait DirectionSource {
    fn next_direction(&mut self) -> Direction;
}

pub struct RandomDirections {
    rng: StdRng,
}

impl RandomDirections {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DirectionSource for RandomDirections {
    fn next_direction(&mut self) -> Direction {
        Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())]
    }
}

/// Replays a fixed sequence of directions, wrapping at the end.
#[derive(Debug, Clone)]
pub struct ScriptedDirections {
    script: Vec<Direction>,
    cursor: usize,
}

impl ScriptedDirections {
    pub fn new(script: Vec<Direction>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl DirectionSource for ScriptedDirections {
    fn next_direction(&mut self) -> Direction {
        let Some(direction) = self.script.get(self.cursor).copied() else {
            return Direction::Down;
        };
        self.cursor = (self.cursor + 1) % self.script.len();
        direction
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    OutOfBounds,
    Avatar,
    Npc,
    NotWalkable,
    Window,
    CoverBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcUpdate {
    Started {
        index: usize,
        direction: Direction,
    },
    Rejected {
        index: usize,
        direction: Direction,
        reason: MoveRejection,
    },
    Arrived {
        index: usize,
        position: BlockCoord,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NpcTickReport {
    pub serviced: Vec<usize>,
    pub updates: Vec<NpcUpdate>,
}

/// What the scheduler needs to know about the rest of the world for one tick.
pub struct NpcContext<'a> {
    pub resolver: BlockResolver<'a>,
    pub avatar: BlockCoord,
    pub avatar_pending: Option<BlockCoord>,
    pub avatar_under_cover: bool,
    pub viewport_anchor: (i32, i32),
    pub windows: &'a dyn WindowOverlay,
    pub tick: u64,
}

impl NpcContext<'_> {
    fn screen_cell(&self, coord: BlockCoord) -> Option<ScreenCell> {
        let (x, y) = coord.signed();
        let col = x - self.viewport_anchor.0 + i32::from(AVATAR_SCREEN_CELL.col);
        let row = y - self.viewport_anchor.1 + i32::from(AVATAR_SCREEN_CELL.row);
        if col < 0 || row < 0 || col >= VIEW_COLS as i32 || row >= VIEW_ROWS as i32 {
            return None;
        }
        Some(ScreenCell::new(col as u8, row as u8))
    }
}

/// Round-robin driver for the mobile roster: each tick services the pair
/// `(2c, 2c + 1)` and moves the cursor `c` on.
#[derive(Debug, Clone)]
pub struct NpcScheduler {
    cursor: u8,
    decision_interval_ticks: u64,
    sub_steps: u8,
}

impl NpcScheduler {
    pub fn new(decision_interval_ticks: u64, sub_steps: u8) -> Self {
        Self {
            cursor: 0,
            decision_interval_ticks,
            sub_steps: sub_steps.max(1),
        }
    }

    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    pub fn sub_steps(&self) -> u8 {
        self.sub_steps
    }

    pub fn tick(
        &mut self,
        roster: &mut NpcRoster,
        context: &NpcContext<'_>,
        directions: &mut dyn DirectionSource,
    ) -> NpcTickReport {
        let mut report = NpcTickReport::default();
        let first = usize::from(self.cursor) * NPCS_PER_TICK;
        for index in first..first + NPCS_PER_TICK {
            if index >= roster.mobile.len() {
                continue;
            }
            report.serviced.push(index);
            if let Some(update) = self.service(roster, index, context, directions) {
                report.updates.push(update);
            }
        }
        self.cursor = (self.cursor + 1) % SCHEDULER_SLOTS;
        report
    }

    fn service(
        &self,
        roster: &mut NpcRoster,
        index: usize,
        context: &NpcContext<'_>,
        directions: &mut dyn DirectionSource,
    ) -> Option<NpcUpdate> {
        let npc = &mut roster.mobile[index];
        match npc.motion {
            NpcMotion::Moving {
                direction,
                destination,
                sub_step,
            } => {
                let sub_step = sub_step + 1;
                if sub_step < self.sub_steps {
                    npc.motion = NpcMotion::Moving {
                        direction,
                        destination,
                        sub_step,
                    };
                    return None;
                }
                npc.position = destination;
                npc.motion = NpcMotion::Idle;
                npc.cover.observe(context.resolver.map().is_covered(destination));
                Some(NpcUpdate::Arrived {
                    index,
                    position: destination,
                })
            }
            NpcMotion::Idle => {
                let due = npc.last_decision_tick.map_or(true, |last| {
                    context.tick.saturating_sub(last) >= self.decision_interval_ticks
                });
                if !due {
                    return None;
                }
                npc.last_decision_tick = Some(context.tick);
                let direction = directions.next_direction();
                match validate_move(roster, index, direction, context) {
                    Ok(destination) => {
                        let npc = &mut roster.mobile[index];
                        npc.facing = direction;
                        npc.motion = NpcMotion::Moving {
                            direction,
                            destination,
                            sub_step: 0,
                        };
                        Some(NpcUpdate::Started { index, direction })
                    }
                    Err(reason) => Some(NpcUpdate::Rejected {
                        index,
                        direction,
                        reason,
                    }),
                }
            }
        }
    }
}

fn validate_move(
    roster: &NpcRoster,
    index: usize,
    direction: Direction,
    context: &NpcContext<'_>,
) -> Result<BlockCoord, MoveRejection> {
    let npc = &roster.mobile[index];
    let map = context.resolver.map();
    let target = npc
        .position
        .step(direction, map.width(), map.height())
        .ok_or(MoveRejection::OutOfBounds)?;
    if target == context.avatar || context.avatar_pending == Some(target) {
        return Err(MoveRejection::Avatar);
    }
    if roster.is_occupied_by_other(target, index) {
        return Err(MoveRejection::Npc);
    }
    if !context.resolver.is_walkable(target) {
        return Err(MoveRejection::NotWalkable);
    }
    if context
        .screen_cell(target)
        .is_some_and(|cell| context.windows.covers(cell))
    {
        return Err(MoveRejection::Window);
    }
    let target_covered = map.is_covered(target);
    if target_covered != npc.under_cover() && target_covered != context.avatar_under_cover {
        return Err(MoveRejection::CoverBoundary);
    }
    Ok(target)
}
