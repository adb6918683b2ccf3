use std::collections::BTreeMap;

use crate::world::{MapDescriptor, MapId, NpcRosterDescriptor};

/// Map descriptor table plus the NPC roster table keyed by the same ids.
#[derive(Debug, Default, Clone)]
pub struct WorldCatalog {
    maps: BTreeMap<MapId, MapDescriptor>,
    rosters: BTreeMap<MapId, NpcRosterDescriptor>,
}

impl WorldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a map and its roster; returns the replaced map.
    pub fn insert(
        &mut self,
        map: MapDescriptor,
        roster: NpcRosterDescriptor,
    ) -> Option<MapDescriptor> {
        let id = map.id;
        self.rosters.insert(id, roster);
        self.maps.insert(id, map)
    }

    pub fn map(&self, id: MapId) -> Option<&MapDescriptor> {
        self.maps.get(&id)
    }

    /// Empty roster for maps without NPCs.
    pub fn roster(&self, id: MapId) -> &NpcRosterDescriptor {
        static EMPTY: NpcRosterDescriptor = NpcRosterDescriptor {
            mobile: Vec::new(),
            stationary: Vec::new(),
        };
        self.rosters.get(&id).unwrap_or(&EMPTY)
    }

    pub fn contains(&self, id: MapId) -> bool {
        self.maps.contains_key(&id)
    }

    pub fn map_ids(&self) -> impl Iterator<Item = MapId> + '_ {
        self.maps.keys().copied()
    }

    pub fn maps(&self) -> impl Iterator<Item = &MapDescriptor> {
        self.maps.values()
    }

    pub fn map_by_name(&self, name: &str) -> Option<&MapDescriptor> {
        self.maps.values().find(|map| map.name == name)
    }

    /// Id after `id` in ascending order, wrapping to the first.
    pub fn next_map_id(&self, id: MapId) -> Option<MapId> {
        self.maps
            .range(MapId(id.0.saturating_add(1))..)
            .next()
            .filter(|(next, _)| **next != id)
            .or_else(|| self.maps.iter().next())
            .map(|(next, _)| *next)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
