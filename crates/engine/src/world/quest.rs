use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::BlockCoord;
use super::map::MapId;

pub const MAX_TREASURES_PER_MAP: usize = 8;
pub const MAX_DOORS_PER_MAP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuestStateError {
    #[error("{map} already records {max} taken treasures", max = MAX_TREASURES_PER_MAP)]
    TreasureSlotsFull { map: MapId },
    #[error("{map} already records {max} opened doors", max = MAX_DOORS_PER_MAP)]
    DoorSlotsFull { map: MapId },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestFlags {
    pub bridge_built: bool,
    pub secret_passage_found: bool,
    pub princess_rescued: bool,
    pub final_battle_active: bool,
    pub final_boss_defeated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct MapQuestRecord {
    treasures_taken: Vec<BlockCoord>,
    doors_opened: Vec<BlockCoord>,
}

/// Quest progress the block resolver reads. Written only by gameplay logic
/// outside this crate; records are permanent once made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestState {
    pub flags: QuestFlags,
    maps: BTreeMap<MapId, MapQuestRecord>,
}

impl QuestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_treasure_taken(
        &mut self,
        map: MapId,
        coord: BlockCoord,
    ) -> Result<(), QuestStateError> {
        let record = self.maps.entry(map).or_default();
        if record.treasures_taken.contains(&coord) {
            return Ok(());
        }
        if record.treasures_taken.len() >= MAX_TREASURES_PER_MAP {
            return Err(QuestStateError::TreasureSlotsFull { map });
        }
        record.treasures_taken.push(coord);
        Ok(())
    }

    pub fn record_door_opened(
        &mut self,
        map: MapId,
        coord: BlockCoord,
    ) -> Result<(), QuestStateError> {
        let record = self.maps.entry(map).or_default();
        if record.doors_opened.contains(&coord) {
            return Ok(());
        }
        if record.doors_opened.len() >= MAX_DOORS_PER_MAP {
            return Err(QuestStateError::DoorSlotsFull { map });
        }
        record.doors_opened.push(coord);
        Ok(())
    }

    pub fn is_treasure_taken(&self, map: MapId, coord: BlockCoord) -> bool {
        self.maps
            .get(&map)
            .is_some_and(|record| record.treasures_taken.contains(&coord))
    }

    pub fn is_door_opened(&self, map: MapId, coord: BlockCoord) -> bool {
        self.maps
            .get(&map)
            .is_some_and(|record| record.doors_opened.contains(&coord))
    }

    pub fn treasures_taken(&self, map: MapId) -> &[BlockCoord] {
        self.maps
            .get(&map)
            .map(|record| record.treasures_taken.as_slice())
            .unwrap_or_default()
    }

    pub fn doors_opened(&self, map: MapId) -> &[BlockCoord] {
        self.maps
            .get(&map)
            .map(|record| record.doors_opened.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn treasure_records_are_per_map_and_idempotent() {
        let mut quest = QuestState::new();
        let chest = BlockCoord::new(3, 4);
        quest.record_treasure_taken(MapId(2), chest).expect("record");
        quest.record_treasure_taken(MapId(2), chest).expect("again");

        assert!(quest.is_treasure_taken(MapId(2), chest));
        assert!(!quest.is_treasure_taken(MapId(3), chest));
        assert_eq!(quest.treasures_taken(MapId(2)).len(), 1);
        assert!(quest.treasures_taken(MapId(9)).is_empty());
    }

    #[test]
    fn ninth_record_on_a_map_is_rejected() {
        let mut quest = QuestState::new();
        for x in 0..MAX_DOORS_PER_MAP as u16 {
            quest
                .record_door_opened(MapId(1), BlockCoord::new(x, 0))
                .expect("slot");
        }
        let error = quest
            .record_door_opened(MapId(1), BlockCoord::new(20, 0))
            .expect_err("full");
        assert_eq!(error, QuestStateError::DoorSlotsFull { map: MapId(1) });
        quest
            .record_door_opened(MapId(2), BlockCoord::new(20, 0))
            .expect("other map has room");
    }

    #[test]
    fn quest_state_survives_json_round_trip() {
        let mut quest = QuestState::new();
        quest.flags.bridge_built = true;
        quest
            .record_treasure_taken(MapId(4), BlockCoord::new(1, 1))
            .expect("record");
        let raw = serde_json::to_string(&quest).expect("encode");
        let restored: QuestState = serde_json::from_str(&raw).expect("decode");
        assert_eq!(restored, quest);
    }
}
