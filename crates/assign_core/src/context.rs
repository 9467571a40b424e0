use std::collections::HashSet;

use crate::assignment::Assignment;
use crate::config::AssignConfig;
use crate::types::{PlayerId, TargetId};

/// Session state shared by the manager and the per-kind logic.
///
/// The round-scoped half (`active`, `completed`, `exclude_targets`,
/// `pending_rewards`) is wiped by [`Context::reset_round`]; the configuration
/// half is fixed for the session. Only the tick loop touches it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub is_host: bool,

    pub active: Vec<Assignment>,
    pub completed: Vec<Assignment>,
    pub exclude_targets: HashSet<TargetId>,
    pub pending_rewards: Vec<(TargetId, i32)>,

    pub assignment_whitelist: Vec<String>,
    pub assignment_weights: Vec<u32>,
    pub enemy_whitelist: Vec<String>,
    pub enemy_weights: Vec<u32>,
    pub enemy_rewards: Vec<i32>,
    pub assign_all_players: bool,
    pub all_players_can_complete: bool,
}

impl Context {
    pub fn new(cfg: &AssignConfig, is_host: bool) -> Self {
        Self {
            is_host,
            assignment_whitelist: cfg.assignment_whitelist(),
            assignment_weights: cfg.assignment_weights(),
            enemy_whitelist: cfg.enemy_whitelist(),
            enemy_weights: cfg.enemy_weights(),
            enemy_rewards: cfg.enemy_rewards(),
            assign_all_players: cfg.assign_all_players,
            all_players_can_complete: cfg.all_players_can_complete,
            ..Self::default()
        }
    }

    pub fn reset_round(&mut self) {
        self.active.clear();
        self.completed.clear();
        self.exclude_targets.clear();
        self.pending_rewards.clear();
    }

    pub fn is_round_empty(&self) -> bool {
        self.active.is_empty()
            && self.completed.is_empty()
            && self.exclude_targets.is_empty()
            && self.pending_rewards.is_empty()
    }

    pub fn is_excluded(&self, id: TargetId) -> bool {
        self.exclude_targets.contains(&id)
    }

    /// Returns false if the target was already taken this round.
    pub fn exclude(&mut self, id: TargetId) -> bool {
        self.exclude_targets.insert(id)
    }

    /// Whether `actor` finishing the target counts for the assigned player.
    pub fn may_complete(&self, assigned: PlayerId, actor: Option<PlayerId>) -> bool {
        self.all_players_can_complete || actor == Some(assigned)
    }

    pub fn queue_reward(&mut self, id: TargetId, value: i32) {
        self.pending_rewards.push((id, value));
    }
}
