use tile_engine::world::{
    Block, BlockCoord, BlockResolver, MapDescriptor, QuestState, TickReport, Viewer, WindowRect,
    WindowRects, WorldEvent, WorldSession,
};
use tile_engine::{FrameView, Game, GameCommand, InputAction, InputSnapshot};
use tracing::{info, warn};

pub(crate) const DIALOGUE_TICKS: u32 = 90;
const MAX_LIGHT_RADIUS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dialogue {
    line: u8,
    ticks_left: u32,
}

/// Demo gameplay on top of the world session: walking, talking to NPCs,
/// opening doors and chests, plus debug keys for map cycling, light radius
/// and the bridge flag.
pub(crate) struct WorldGame {
    session: WorldSession,
    windows: WindowRects,
    dialogue: Option<Dialogue>,
}

impl WorldGame {
    pub(crate) fn new(session: WorldSession) -> Self {
        Self {
            session,
            windows: WindowRects::new(),
            dialogue: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> &WorldSession {
        &self.session
    }

    fn apply_debug_keys(&mut self, input: &InputSnapshot) {
        if input.was_pressed(InputAction::NextMap) {
            self.close_dialogue();
            self.advance_map();
        }
        if input.was_pressed(InputAction::CycleLight) {
            let radius = self.session.light_radius() % MAX_LIGHT_RADIUS + 1;
            self.session.set_light_radius(radius);
            info!(radius, "light_radius_changed");
        }
        let bridge_pending = !self.session.quest().flags.bridge_built;
        if input.was_pressed(InputAction::ToggleBridge) && bridge_pending {
            self.session.build_bridge(&self.windows);
            info!(map = %self.session.map().id, "bridge_built");
        }
    }

    fn advance_map(&mut self) {
        let current = self.session.map().id;
        let Some(next) = self.session.catalog().next_map_id(current) else {
            return;
        };
        let spawn = self.session.catalog().map(next).and_then(find_spawn);
        let Some(spawn) = spawn else {
            warn!(map = %next, "map_has_no_walkable_block");
            return;
        };
        if let Err(error) = self.session.change_map(next, spawn) {
            warn!(error = %error, "map_change_failed");
        }
    }

    fn react(&mut self, report: &TickReport) {
        for event in &report.events {
            match *event {
                WorldEvent::Bump { facing } => {
                    let avatar = self.session.avatar().position;
                    let map = self.session.map();
                    if let Some(target) = avatar.step(facing, map.width(), map.height()) {
                        self.interact(target);
                    }
                }
                WorldEvent::AvatarMoved { position } => self.pick_up(position),
                _ => {}
            }
        }
    }

    fn interact(&mut self, target: BlockCoord) {
        let line = self
            .session
            .roster()
            .iter()
            .find(|npc| npc.occupies(target))
            .map(|npc| npc.dialogue);
        if let Some(line) = line {
            self.open_dialogue(line);
            return;
        }
        let (x, y) = target.signed();
        let terrain = self.session.resolver().terrain(x, y);
        match terrain {
            Block::Door => match self.session.open_door(target, &self.windows) {
                Ok(()) => info!(x = target.x, y = target.y, "door_opened"),
                Err(error) => warn!(error = %error, "door_not_recorded"),
            },
            Block::Princess => {
                self.session.quest_mut().flags.princess_rescued = true;
                self.session.redraw_block(target, &self.windows);
                info!(x = target.x, y = target.y, "princess_rescued");
            }
            _ => {}
        }
    }

    fn pick_up(&mut self, position: BlockCoord) {
        let (x, y) = position.signed();
        if self.session.resolver().terrain(x, y) != Block::Chest {
            return;
        }
        match self.session.take_treasure(position, &self.windows) {
            Ok(()) => info!(x = position.x, y = position.y, "treasure_taken"),
            Err(error) => warn!(error = %error, "treasure_not_recorded"),
        }
    }

    fn open_dialogue(&mut self, line: u8) {
        if self.dialogue.is_some() {
            return;
        }
        self.windows.open(WindowRect::new(1, 10, 14, 4));
        self.dialogue = Some(Dialogue {
            line,
            ticks_left: DIALOGUE_TICKS,
        });
        info!(line, "dialogue_opened");
    }

    fn tick_dialogue(&mut self) {
        let Some(dialogue) = self.dialogue.as_mut() else {
            return;
        };
        dialogue.ticks_left = dialogue.ticks_left.saturating_sub(1);
        if dialogue.ticks_left == 0 {
            self.close_dialogue();
        }
    }

    fn close_dialogue(&mut self) {
        if self.dialogue.take().is_none() {
            return;
        }
        if let Some(rect) = self.windows.close_top() {
            for cell in rect.cells() {
                self.session.restore_screen_cell(cell);
            }
        }
    }
}

impl Game for WorldGame {
    fn update(&mut self, input: &InputSnapshot) -> GameCommand {
        if input.quit_requested() || input.was_pressed(InputAction::Quit) {
            return GameCommand::Quit;
        }
        self.apply_debug_keys(input);
        let movement = if self.dialogue.is_some() {
            None
        } else {
            input.movement()
        };
        let report = self.session.tick(movement, &self.windows);
        self.react(&report);
        self.tick_dialogue();
        GameCommand::Continue(report)
    }

    fn frame(&self) -> FrameView<'_> {
        FrameView {
            session: &self.session,
            windows: &self.windows,
        }
    }

    fn debug_title(&self) -> Option<String> {
        let map = self.session.map();
        let avatar = self.session.avatar().position;
        let mut title = format!(
            "Tile World | {} ({}) | {},{} | light {}",
            map.name,
            map.id,
            avatar.x,
            avatar.y,
            self.session.light_radius()
        );
        if let Some(dialogue) = self.dialogue {
            title.push_str(&format!(" | dialogue #{}", dialogue.line));
        }
        Some(title)
    }

    fn shutdown(&mut self) {
        let quest = self.session.quest();
        info!(
            ticks = self.session.ticks(),
            treasures = quest.treasures_taken(self.session.map().id).len(),
            princess_rescued = quest.flags.princess_rescued,
            "game_shutdown"
        );
    }
}

/// Walkable block closest to the map centre, scanning rows top to bottom
/// to break ties.
pub(crate) fn find_spawn(map: &MapDescriptor) -> Option<BlockCoord> {
    let quest = QuestState::default();
    let center_x = i32::from(map.width()) / 2;
    let center_y = i32::from(map.height()) / 2;
    let mut candidates = (0..map.height())
        .flat_map(|y| (0..map.width()).map(move |x| BlockCoord::new(x, y)))
        .collect::<Vec<_>>();
    candidates.sort_by_key(|coord| {
        let (x, y) = coord.signed();
        ((x - center_x).abs() + (y - center_y).abs(), coord.y, coord.x)
    });
    candidates
        .into_iter()
        .find(|coord| BlockResolver::new(map, &quest, Viewer::at(*coord)).is_walkable(*coord))
}
