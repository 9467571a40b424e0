use rand::RngCore;
use tracing::warn;

use super::{AssignmentLogic, Progress, TARGET_LABEL};
use crate::assignment::Assignment;
use crate::context::Context;
use crate::world::{EntityState, World};

/// Bring a marked piece of scrap back to the ship.
pub struct CollectScrapLogic;

impl AssignmentLogic for CollectScrapLogic {
    fn server_setup(
        &self,
        ctx: &mut Context,
        world: &mut dyn World,
        _rng: &mut dyn RngCore,
        a: &mut Assignment,
    ) -> bool {
        let candidates = world.find_entities(&|e| {
            matches!(
                e.state,
                EntityState::Item {
                    is_scrap: true,
                    persisted: false,
                    ..
                }
            )
        });
        let Some(item) = candidates.into_iter().find(|e| !ctx.is_excluded(e.id)) else {
            return false;
        };

        a.set_target(item.id);
        a.target_text = item.name.to_uppercase();
        ctx.exclude(item.id);
        true
    }

    fn handle_allocation(
        &self,
        _ctx: &Context,
        world: &mut dyn World,
        a: &mut Assignment,
        is_local: bool,
    ) -> bool {
        if !is_local {
            return false;
        }
        let Some(item) = a.target().and_then(|id| world.entity(id)) else {
            warn!(round_id = a.id, target = ?a.target(), "assigned scrap not found locally");
            return false;
        };

        a.target_text = item.name.to_uppercase();
        if !world.label_target(item.id, TARGET_LABEL, Some("Value : ???")) {
            warn!(target = %item.id, item = %item.name, "scan node missing for assigned scrap");
            return false;
        }
        true
    }

    fn check_completion(&self, ctx: &Context, world: &dyn World, a: &Assignment) -> Progress {
        let Some(item) = a.target().and_then(|id| world.entity(id)) else {
            return Progress::InProgress;
        };
        match item.state {
            EntityState::Item {
                collected: true,
                in_ship: true,
                ..
            } => {
                if ctx.may_complete(a.player_id, item.owner) {
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
        let Some(item) = a.target().and_then(|id| world.entity(id)) else {
            return;
        };
        let EntityState::Item { value, .. } = item.state else {
            return;
        };

        let total = value.saturating_add(a.cash_reward);
        world.set_reward(item.id, total);
        world.label_target(item.id, &item.name, None);
        ctx.queue_reward(item.id, total);
    }
}
