//! The narrow view of the game world the assignment logic needs.

mod mem;

pub use mem::MemWorld;

use crate::types::{PlayerId, TargetId, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: TargetId,
    pub name: String,
    pub position: Vec3,
    /// Live on the network; unspawned entities are leftovers being torn down.
    pub spawned: bool,
    /// Last player to hold or interact with it.
    pub owner: Option<PlayerId>,
    pub state: EntityState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    Item {
        value: i32,
        /// False for tools and other grabbables that are not loot.
        is_scrap: bool,
        /// Carried over from an earlier round.
        persisted: bool,
        collected: bool,
        in_ship: bool,
    },
    Enemy {
        dead: bool,
    },
    Valve {
        interactable: bool,
    },
}

impl Entity {
    pub fn is_enemy(&self) -> bool {
        matches!(self.state, EntityState::Enemy { .. })
    }

    pub fn is_valve(&self) -> bool {
        matches!(self.state, EntityState::Valve { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Spawn {
    Enemy { name: String },
    Item { name: String, value: i32 },
}

pub trait World {
    /// Every entity matching `pred`, in the world's stable order.
    fn find_entities(&self, pred: &dyn Fn(&Entity) -> bool) -> Vec<Entity>;

    fn entity(&self, id: TargetId) -> Option<Entity> {
        self.find_entities(&|e| e.id == id).into_iter().next()
    }

    /// `None` when the world cannot produce that kind of thing here.
    fn spawn(&mut self, spawn: Spawn, position: Vec3) -> Option<TargetId>;

    fn set_reward(&mut self, id: TargetId, value: i32) -> bool;

    /// Nearest navigable position to `position`, if there is one close by.
    fn is_reachable(&self, position: Vec3) -> Option<Vec3>;

    /// Distance from `position` to the closest connected player.
    fn nearest_player_distance(&self, position: Vec3) -> Option<f32>;

    fn main_entrance(&self) -> Option<Vec3>;

    fn vents(&self) -> Vec<Vec3>;

    /// Set the scan label shown for `id`. False when the entity or its label
    /// component is missing.
    fn label_target(&mut self, id: TargetId, header: &str, sub: Option<&str>) -> bool;

    /// Force a hazard into its broken state right away.
    fn arm_hazard(&mut self, id: TargetId) -> bool;

    /// One batched push of item values to every client.
    fn sync_reward_values(&mut self, targets: &[TargetId], values: &[i32]);
}
