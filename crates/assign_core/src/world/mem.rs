use std::collections::{BTreeMap, HashSet};

use super::{Entity, EntityState, Spawn, World};
use crate::types::{PlayerId, TargetId, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub header: String,
    pub sub: Option<String>,
}

#[derive(Debug, Clone)]
struct Slot {
    entity: Entity,
    /// `None` when the entity has no scan node at all.
    label: Option<Label>,
    armed: bool,
}

/// In-memory world: a flat entity table plus the few level facts the logic
/// asks about. Used by the tests and the demo peer.
#[derive(Debug, Clone, Default)]
pub struct MemWorld {
    slots: BTreeMap<TargetId, Slot>,
    next_id: u64,
    entrance: Option<Vec3>,
    vents: Vec<Vec3>,
    blocked: Vec<Vec3>,
    spawnable: HashSet<String>,
    players: BTreeMap<PlayerId, Vec3>,
    synced: Vec<(Vec<TargetId>, Vec<i32>)>,
}

impl MemWorld {
    pub fn new() -> Self {
        Self {
            next_id: 1000,
            ..Self::default()
        }
    }

    fn insert(&mut self, name: &str, position: Vec3, state: EntityState) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        let entity = Entity {
            id,
            name: name.to_string(),
            position,
            spawned: true,
            owner: None,
            state,
        };
        self.slots.insert(
            id,
            Slot {
                label: Some(Label {
                    header: entity.name.clone(),
                    sub: None,
                }),
                entity,
                armed: false,
            },
        );
        id
    }

    pub fn add_scrap(&mut self, name: &str, value: i32, position: Vec3) -> TargetId {
        self.insert(
            name,
            position,
            EntityState::Item {
                value,
                is_scrap: true,
                persisted: false,
                collected: false,
                in_ship: false,
            },
        )
    }

    pub fn add_tool(&mut self, name: &str, position: Vec3) -> TargetId {
        self.insert(
            name,
            position,
            EntityState::Item {
                value: 0,
                is_scrap: false,
                persisted: false,
                collected: false,
                in_ship: false,
            },
        )
    }

    pub fn add_enemy(&mut self, name: &str, position: Vec3) -> TargetId {
        self.insert(name, position, EntityState::Enemy { dead: false })
    }

    pub fn add_valve(&mut self, position: Vec3) -> TargetId {
        self.insert(
            "Steam valve",
            position,
            EntityState::Valve {
                interactable: false,
            },
        )
    }

    pub fn set_entrance(&mut self, position: Vec3) {
        self.entrance = Some(position);
    }

    pub fn add_vent(&mut self, position: Vec3) {
        self.vents.push(position);
    }

    /// Make a spot unreachable for spawning.
    pub fn block(&mut self, position: Vec3) {
        self.blocked.push(position);
    }

    pub fn allow_spawn(&mut self, enemy: &str) {
        self.spawnable.insert(enemy.to_ascii_lowercase());
    }

    pub fn set_player(&mut self, player: PlayerId, position: Vec3) {
        self.players.insert(player, position);
    }

    pub fn remove_player(&mut self, player: PlayerId) {
        self.players.remove(&player);
    }

    pub fn players(&self) -> Vec<(PlayerId, Vec3)> {
        self.players.iter().map(|(p, v)| (*p, *v)).collect()
    }

    fn state_mut(&mut self, id: TargetId) -> Option<(&mut EntityState, &mut Option<PlayerId>)> {
        let slot = self.slots.get_mut(&id)?;
        Some((&mut slot.entity.state, &mut slot.entity.owner))
    }

    pub fn set_persisted(&mut self, id: TargetId) {
        if let Some((EntityState::Item { persisted, .. }, _)) = self.state_mut(id) {
            *persisted = true;
        }
    }

    /// `by` carries the item back to the ship.
    pub fn collect(&mut self, id: TargetId, by: PlayerId) -> bool {
        match self.state_mut(id) {
            Some((
                EntityState::Item {
                    collected, in_ship, ..
                },
                owner,
            )) => {
                *collected = true;
                *in_ship = true;
                *owner = Some(by);
                true
            }
            _ => false,
        }
    }

    pub fn kill(&mut self, id: TargetId) -> bool {
        match self.state_mut(id) {
            Some((EntityState::Enemy { dead }, _)) => {
                *dead = true;
                true
            }
            _ => false,
        }
    }

    pub fn repair(&mut self, id: TargetId, by: PlayerId) -> bool {
        match self.state_mut(id) {
            Some((EntityState::Valve { interactable }, owner)) => {
                *interactable = false;
                *owner = Some(by);
                true
            }
            _ => false,
        }
    }

    pub fn despawn(&mut self, id: TargetId) -> bool {
        self.slots.remove(&id).is_some()
    }

    pub fn set_spawned(&mut self, id: TargetId, spawned: bool) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.entity.spawned = spawned;
        }
    }

    /// Drop the scan node so labelling fails.
    pub fn strip_label(&mut self, id: TargetId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.label = None;
        }
    }

    pub fn label(&self, id: TargetId) -> Option<&Label> {
        self.slots.get(&id)?.label.as_ref()
    }

    pub fn is_armed(&self, id: TargetId) -> bool {
        self.slots.get(&id).is_some_and(|s| s.armed)
    }

    pub fn reward_value(&self, id: TargetId) -> Option<i32> {
        match self.slots.get(&id)?.entity.state {
            EntityState::Item { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn synced(&self) -> &[(Vec<TargetId>, Vec<i32>)] {
        &self.synced
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl World for MemWorld {
    fn find_entities(&self, pred: &dyn Fn(&Entity) -> bool) -> Vec<Entity> {
        self.slots
            .values()
            .filter(|s| pred(&s.entity))
            .map(|s| s.entity.clone())
            .collect()
    }

    fn entity(&self, id: TargetId) -> Option<Entity> {
        self.slots.get(&id).map(|s| s.entity.clone())
    }

    fn spawn(&mut self, spawn: Spawn, position: Vec3) -> Option<TargetId> {
        match spawn {
            Spawn::Enemy { name } => {
                if !self.spawnable.contains(&name.to_ascii_lowercase()) {
                    return None;
                }
                Some(self.add_enemy(&name, position))
            }
            Spawn::Item { name, value } => Some(self.add_scrap(&name, value, position)),
        }
    }

    fn set_reward(&mut self, id: TargetId, value: i32) -> bool {
        match self.state_mut(id) {
            Some((EntityState::Item { value: v, .. }, _)) => {
                *v = value;
                true
            }
            _ => false,
        }
    }

    fn is_reachable(&self, position: Vec3) -> Option<Vec3> {
        if self.blocked.iter().any(|b| b.distance(position) < 0.01) {
            return None;
        }
        Some(position)
    }

    fn nearest_player_distance(&self, position: Vec3) -> Option<f32> {
        self.players
            .values()
            .map(|p| p.distance(position))
            .min_by(|a, b| a.total_cmp(b))
    }

    fn main_entrance(&self) -> Option<Vec3> {
        self.entrance
    }

    fn vents(&self) -> Vec<Vec3> {
        self.vents.clone()
    }

    fn label_target(&mut self, id: TargetId, header: &str, sub: Option<&str>) -> bool {
        match self.slots.get_mut(&id).and_then(|s| s.label.as_mut()) {
            Some(label) => {
                label.header = header.to_string();
                label.sub = sub.map(str::to_string);
                true
            }
            None => false,
        }
    }

    fn arm_hazard(&mut self, id: TargetId) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        let EntityState::Valve { interactable } = &mut slot.entity.state else {
            return false;
        };
        *interactable = true;
        slot.armed = true;
        true
    }

    fn sync_reward_values(&mut self, targets: &[TargetId], values: &[i32]) {
        self.synced.push((targets.to_vec(), values.to_vec()));
    }
}
