use rand::RngCore;
use tracing::warn;

use super::{AssignmentLogic, Progress, REWARD_ITEM};
use crate::assignment::Assignment;
use crate::context::Context;
use crate::world::{EntityState, Spawn, World};

pub struct RepairValveLogic;

impl AssignmentLogic for RepairValveLogic {
    fn server_setup(
        &self,
        ctx: &mut Context,
        world: &mut dyn World,
        _rng: &mut dyn RngCore,
        a: &mut Assignment,
    ) -> bool {
        let entrance = world.main_entrance().unwrap_or_default();
        let mut valves = world.find_entities(&|e| e.is_valve() && e.spawned);
        valves.sort_by(|x, y| {
            y.position
                .distance(entrance)
                .total_cmp(&x.position.distance(entrance))
        });
        let Some(valve) = valves.into_iter().find(|v| !ctx.is_excluded(v.id)) else {
            return false;
        };

        a.set_target(valve.id);
        a.fixed_target_position = Some(valve.position);
        ctx.exclude(valve.id);
        if !world.arm_hazard(valve.id) {
            warn!(target = %valve.id, "valve refused to break");
        }
        true
    }

    fn handle_allocation(
        &self,
        _ctx: &Context,
        _world: &mut dyn World,
        _a: &mut Assignment,
        _is_local: bool,
    ) -> bool {
        true
    }

    fn check_completion(&self, ctx: &Context, world: &dyn World, a: &Assignment) -> Progress {
        let Some(valve) = a.target().and_then(|id| world.entity(id)) else {
            return Progress::InProgress;
        };
        match valve.state {
            EntityState::Valve {
                interactable: false,
            } => {
                if ctx.may_complete(a.player_id, valve.owner) {
                    Progress::Complete
                } else {
                    Progress::Failed
                }
            }
            _ => Progress::InProgress,
        }
    }

    fn complete(&self, ctx: &mut Context, world: &mut dyn World, a: &mut Assignment, _is_local: bool) {
        if !ctx.is_host {
            return;
        }
        let at = match a.target().and_then(|id| world.entity(id)) {
            Some(valve) => valve.position,
            None => match a.fixed_target_position {
                Some(p) => p,
                None => return,
            },
        };
        let reward = Spawn::Item {
            name: REWARD_ITEM.to_string(),
            value: a.cash_reward,
        };
        match world.spawn(reward, at) {
            Some(id) => ctx.queue_reward(id, a.cash_reward),
            None => warn!(round_id = a.id, "could not spawn valve reward"),
        }
    }
}
