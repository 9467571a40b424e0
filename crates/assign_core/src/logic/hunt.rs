use rand::Rng;
use rand::RngCore;
use tracing::{debug, warn};

use super::{AssignmentLogic, Progress, REWARD_ITEM, TARGET_LABEL};
use crate::assignment::Assignment;
use crate::context::Context;
use crate::types::Vec3;
use crate::weighted::weighted_index;
use crate::world::{EntityState, Spawn, World};

/// A kill only counts if someone was this close to the body.
pub const MAX_PLAYER_DISTANCE: f32 = 10.0;
pub const SPAWN_ATTEMPTS: usize = 5;

/// Hunt down one marked enemy.
pub struct HuntKillLogic;

/// Farthest half of the vents (at least one), farthest first.
fn far_vents(world: &dyn World) -> Vec<Vec3> {
    let entrance = world.main_entrance().unwrap_or_default();
    let mut vents = world.vents();
    vents.sort_by(|a, b| b.distance(entrance).total_cmp(&a.distance(entrance)));
    let half = (vents.len() / 2).max(1);
    vents.truncate(half);
    vents
}

fn spawn_point(world: &dyn World, rng: &mut dyn RngCore) -> Option<Vec3> {
    let vents = far_vents(world);
    if vents.is_empty() {
        return None;
    }
    for _ in 0..SPAWN_ATTEMPTS {
        let vent = vents[rng.gen_range(0..vents.len())];
        if let Some(pos) = world.is_reachable(vent) {
            return Some(pos);
        }
    }
    None
}

impl AssignmentLogic for HuntKillLogic {
    fn server_setup(
        &self,
        ctx: &mut Context,
        world: &mut dyn World,
        rng: &mut dyn RngCore,
        a: &mut Assignment,
    ) -> bool {
        let Some(idx) = weighted_index(rng, &ctx.enemy_weights) else {
            return false;
        };
        let Some(enemy_name) = ctx.enemy_whitelist.get(idx).cloned() else {
            return false;
        };
        a.cash_reward = ctx.enemy_rewards.get(idx).copied().unwrap_or(0);

        let alive = world.find_entities(&|e| {
            e.spawned
                && matches!(e.state, EntityState::Enemy { dead: false })
                && e.name == enemy_name
                && !ctx.is_excluded(e.id)
        });
        let target = match alive.into_iter().next() {
            Some(e) => e,
            None => {
                let Some(pos) = spawn_point(world, rng) else {
                    debug!(enemy = %enemy_name, "no reachable vent for hunt target");
                    return false;
                };
                let Some(id) = world.spawn(
                    Spawn::Enemy {
                        name: enemy_name.clone(),
                    },
                    pos,
                ) else {
                    debug!(enemy = %enemy_name, "level cannot spawn hunt target");
                    return false;
                };
                match world.entity(id) {
                    Some(e) => e,
                    None => return false,
                }
            }
        };

        a.set_target(target.id);
        a.target_text = target.name.to_uppercase();
        ctx.exclude(target.id);
        world.label_target(target.id, TARGET_LABEL, None);
        true
    }

    fn handle_allocation(
        &self,
        _ctx: &Context,
        world: &mut dyn World,
        a: &mut Assignment,
        _is_local: bool,
    ) -> bool {
        // The enemy may not have replicated yet; the host's target text stands.
        if let Some(enemy) = a.target().and_then(|id| world.entity(id)) {
            a.target_text = enemy.name.to_uppercase();
            world.label_target(enemy.id, TARGET_LABEL, None);
        }
        true
    }

    fn check_completion(&self, _ctx: &Context, world: &dyn World, a: &Assignment) -> Progress {
        let Some(enemy) = a.target().and_then(|id| world.entity(id)) else {
            return Progress::InProgress;
        };
        if !matches!(enemy.state, EntityState::Enemy { dead: true }) {
            return Progress::InProgress;
        }
        match world.nearest_player_distance(enemy.position) {
            Some(d) if d < MAX_PLAYER_DISTANCE => Progress::Complete,
            _ => Progress::Failed,
        }
    }

    fn complete(&self, ctx: &mut Context, world: &mut dyn World, a: &mut Assignment, _is_local: bool) {
        if !ctx.is_host {
            return;
        }
        let Some(enemy) = a.target().and_then(|id| world.entity(id)) else {
            return;
        };
        let reward = Spawn::Item {
            name: REWARD_ITEM.to_string(),
            value: a.cash_reward,
        };
        match world.spawn(reward, enemy.position) {
            Some(id) => ctx.queue_reward(id, a.cash_reward),
            None => warn!(round_id = a.id, "could not spawn hunt reward"),
        }
    }
}
