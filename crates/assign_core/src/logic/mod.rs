//! Per-kind assignment behaviour.
//!
//! Every kind implements the same four steps; the manager looks the
//! implementation up by [`AssignmentKind::index`] and never branches on kind
//! itself.

mod collect;
mod hunt;
mod valve;

pub use collect::CollectScrapLogic;
pub use hunt::HuntKillLogic;
pub use valve::RepairValveLogic;

use rand::RngCore;

use crate::assignment::Assignment;
use crate::catalog::AssignmentKind;
use crate::context::Context;
use crate::world::World;

pub const TARGET_LABEL: &str = "ASSIGNMENT TARGET";
pub const REWARD_ITEM: &str = "Gold bar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    InProgress,
    Complete,
    Failed,
}

pub trait AssignmentLogic {
    /// Host only. Pick and claim a target for `a`; false if nothing is eligible.
    fn server_setup(
        &self,
        ctx: &mut Context,
        world: &mut dyn World,
        rng: &mut dyn RngCore,
        a: &mut Assignment,
    ) -> bool;

    /// Any peer. Mark the target locally; false if it cannot be resolved here.
    fn handle_allocation(
        &self,
        ctx: &Context,
        world: &mut dyn World,
        a: &mut Assignment,
        is_local: bool,
    ) -> bool;

    /// Host only, once per tick while `a` is active.
    fn check_completion(&self, ctx: &Context, world: &dyn World, a: &Assignment) -> Progress;

    /// Materialize the reward. Does nothing on clients.
    fn complete(&self, ctx: &mut Context, world: &mut dyn World, a: &mut Assignment, is_local: bool);
}

pub struct Registry {
    logic: [Box<dyn AssignmentLogic>; 3],
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            logic: [
                Box::new(CollectScrapLogic),
                Box::new(HuntKillLogic),
                Box::new(RepairValveLogic),
            ],
        }
    }

    pub fn get(&self, kind: AssignmentKind) -> &dyn AssignmentLogic {
        self.logic[kind.index()].as_ref()
    }
}
