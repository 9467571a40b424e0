//! Round orchestration: generation on the host, event dispatch everywhere.
//!
//! The host never mutates client-visible state directly. Every decision goes
//! out as an event to all peers, the host included (it receives its own
//! broadcasts through loopback), and each peer applies events to its own view
//! in [`AssignmentManager::tick`].

use std::time::{Duration, Instant};

use assignproto::ProtoError;
use assignproto::envelope::Envelope;
use assignproto::event::{Allocation, Complete, Event, Failed, parse_event};
use assignproto::tags;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::assignment::{Assignment, Status};
use crate::catalog::Catalog;
use crate::config::AssignConfig;
use crate::context::Context;
use crate::logic::{Progress, Registry};
use crate::phase::Phase;
use crate::transport::Transport;
use crate::types::{PlayerId, TargetId};
use crate::weighted::weighted_index;
use crate::world::World;

pub const REWARD_SYNC_DELAY: Duration = Duration::from_secs(1);
/// Failed setups tolerated per generation batch before giving up.
pub const MAX_SETUP_FAILURES: usize = 5;

/// Something the local player should be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Assigned(Assignment),
    Completed(Assignment),
    Failed { reason: String },
    Cleared,
}

impl Notice {
    /// `(speaker, body)` for the dialogue overlay. `Cleared` only hides it.
    pub fn dialogue(&self) -> Option<(String, String)> {
        match self {
            Notice::Assigned(a) => Some((
                format!("ASSIGNMENT:{}", a.name),
                format!("YOU HAVE BEEN SELECTED BY THE COMPANY FOR ASSIGNMENT, {}", a.body()),
            )),
            Notice::Completed(_) => Some((
                "ASSIGNMENT COMPLETE".to_string(),
                "YOU HAVE COMPLETED THE ASSIGNMENT, WELL DONE. THE COMPANY VALUES YOUR LOYALTY"
                    .to_string(),
            )),
            Notice::Failed { reason } => Some((
                "ASSIGNMENT FAILED".to_string(),
                format!("YOU FAILED TO COMPLETE THE ASSIGNMENT. REASON: {reason}"),
            )),
            Notice::Cleared => None,
        }
    }
}

/// How many players get an assignment out of `connected`.
pub fn assignment_count(connected: usize, min: usize, max: usize, assign_all: bool) -> usize {
    if assign_all {
        return connected;
    }
    (connected / 2).min(max).max(min).min(connected)
}

pub struct AssignmentManager<T: Transport> {
    catalog: Catalog,
    registry: Registry,
    ctx: Context,
    transport: T,
    rng: StdRng,

    min_players: usize,
    max_players: usize,

    phase: Phase,
    current: Option<Assignment>,
    generated: bool,
    reward_sync_due: Option<Instant>,
    notices: Vec<Notice>,
    was_connected: bool,
}

impl<T: Transport> AssignmentManager<T> {
    pub fn new(cfg: &AssignConfig, transport: T) -> Self {
        let is_host = transport.is_host();
        let was_connected = transport.is_connected();
        Self {
            catalog: Catalog::with_rewards(cfg.scrap_reward, cfg.valve_reward),
            registry: Registry::new(),
            ctx: Context::new(cfg, is_host),
            transport,
            rng: StdRng::from_entropy(),
            min_players: cfg.min_assigned_players,
            max_players: cfg.max_assigned_players,
            phase: Phase::default(),
            current: None,
            generated: false,
            reward_sync_due: None,
            notices: Vec::new(),
            was_connected,
        }
    }

    /// Replace the entropy-seeded generator, for reproducible rounds.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The local player's assignment, if they have one this round.
    pub fn current(&self) -> Option<&Assignment> {
        self.current.as_ref()
    }

    pub fn generated(&self) -> bool {
        self.generated
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// When the queued reward values go out, if a batch is scheduled.
    pub fn reward_sync_due(&self) -> Option<Instant> {
        self.reward_sync_due
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn set_phase(&mut self, phase: Phase, world: &mut dyn World) {
        if phase == self.phase {
            return;
        }
        debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;

        match phase {
            Phase::MainMenu | Phase::Hub => self.clear_all(),
            Phase::Orbit => self.clear_local(),
            Phase::InLevel => {
                if self.ctx.is_host && !self.generated {
                    self.generate(world);
                }
            }
        }
    }

    /// Drop the round everywhere. On the host this also tells every client
    /// to forget theirs; clients only clear their own view. Peers that never
    /// see the phase themselves rely on the host calling this at take-off.
    pub fn clear_all(&mut self) {
        if self.ctx.is_host {
            self.broadcast(Event::Reset);
        }
        self.clear_local();
    }

    pub fn tick(&mut self, world: &mut dyn World, now: Instant) {
        self.process_inbound(world);

        let connected = self.transport.is_connected();
        if self.was_connected && !connected {
            warn!(player = %self.transport.local_player(), "connection lost, clearing assignments");
            self.clear_local();
        }
        self.was_connected = connected;

        if self.ctx.is_host {
            self.poll_reward_sync(world, now);
            if self.phase == Phase::InLevel && !self.ctx.active.is_empty() {
                self.check_completed(world);
            }
        }
    }

    /// Host only. Hand out this round's assignments; returns how many were
    /// allocated.
    pub fn generate(&mut self, world: &mut dyn World) -> usize {
        if !self.ctx.is_host {
            return 0;
        }
        self.ctx.reset_round();
        self.generated = true;

        if self.ctx.assignment_weights.iter().all(|w| *w == 0) {
            warn!("assignment weights sum to zero, nothing to generate");
            return 0;
        }

        let mut pool = self.transport.connected_players();
        let count = assignment_count(
            pool.len(),
            self.min_players,
            self.max_players,
            self.ctx.assign_all_players,
        );

        let mut made = 0;
        let mut failures = 0;
        let mut next_id: u8 = 1;
        while made < count && !pool.is_empty() && failures < MAX_SETUP_FAILURES {
            let pick = self.rng.gen_range(0..pool.len());
            let player = pool[pick];
            let Some(a) = self.try_setup(player, next_id, world) else {
                failures += 1;
                continue;
            };

            info!(
                player = %player,
                round_id = a.id,
                uid = %a.uid,
                target = ?a.target(),
                "assignment allocated"
            );
            self.broadcast(Event::Allocation(a.allocation_event()));
            self.ctx.active.push(a);
            pool.swap_remove(pick);
            made += 1;
            next_id = next_id.wrapping_add(1);
        }

        if failures >= MAX_SETUP_FAILURES {
            warn!(made, wanted = count, "too many failed setups, generation stopped");
        }
        made
    }

    fn try_setup(&mut self, player: PlayerId, id: u8, world: &mut dyn World) -> Option<Assignment> {
        let idx = weighted_index(&mut self.rng, &self.ctx.assignment_weights)?;
        let Some(uid) = self.ctx.assignment_whitelist.get(idx) else {
            debug!(idx, "assignment weight has no whitelist entry");
            return None;
        };
        let Some(template) = self.catalog.lookup(uid) else {
            debug!(uid = %uid, "unknown assignment uid in whitelist");
            return None;
        };

        let mut a = template.instantiate();
        a.id = id;
        a.player_id = player;
        let logic = self.registry.get(a.kind);
        if !logic.server_setup(&mut self.ctx, world, &mut self.rng, &mut a) {
            debug!(player = %player, uid = %a.uid, "no eligible target");
            return None;
        }
        a.status = Status::Allocated;
        Some(a)
    }

    /// Host only. Move finished assignments to `completed` and announce them.
    pub fn check_completed(&mut self, world: &dyn World) {
        for i in (0..self.ctx.active.len()).rev() {
            let a = &self.ctx.active[i];
            let status = match self.registry.get(a.kind).check_completion(&self.ctx, world, a) {
                Progress::InProgress => continue,
                Progress::Complete => Status::Complete,
                Progress::Failed => Status::Failed,
            };

            let mut a = self.ctx.active.remove(i);
            a.status = status;
            debug_assert!(a.status.is_terminal());
            let ev = if status == Status::Complete {
                Event::Complete(a.complete_event())
            } else {
                Event::Failed(a.failed_event())
            };
            info!(player = %a.player_id, round_id = a.id, uid = %a.uid, ?status, "assignment finished");
            self.broadcast(ev);
            self.ctx.completed.push(a);
        }
    }

    fn poll_reward_sync(&mut self, world: &mut dyn World, now: Instant) {
        match self.reward_sync_due {
            None if !self.ctx.pending_rewards.is_empty() => {
                self.reward_sync_due = Some(now + REWARD_SYNC_DELAY);
            }
            Some(due) if now >= due => self.flush_rewards(world),
            _ => {}
        }
    }

    fn flush_rewards(&mut self, world: &mut dyn World) {
        let pending = std::mem::take(&mut self.ctx.pending_rewards);
        let (targets, values): (Vec<TargetId>, Vec<i32>) = pending
            .into_iter()
            .filter(|(id, _)| world.entity(*id).is_some())
            .unzip();
        if !targets.is_empty() {
            debug!(count = targets.len(), "syncing reward values");
            world.sync_reward_values(&targets, &values);
        }
        self.reward_sync_due = None;
    }

    fn broadcast(&self, ev: Event) {
        self.transport.send_to_all(ev.tag(), ev.encode());
    }

    fn process_inbound(&mut self, world: &mut dyn World) {
        while let Some(frame) = self.transport.try_recv() {
            let env = match Envelope::open(frame) {
                Ok(env) => env,
                Err(ProtoError::ChecksumMismatch) => {
                    debug!("dropping envelope with bad checksum");
                    continue;
                }
                Err(e) => {
                    warn!(err = %e, "dropping unreadable envelope");
                    continue;
                }
            };
            if !tags::is_assignment_tag(&env.tag) {
                continue;
            }

            let ev = match parse_event(&env.tag, env.payload) {
                Ok(ev) => ev,
                Err(ProtoError::UnknownTag(_)) => continue,
                Err(e) => {
                    warn!(tag = %env.tag, err = %e, "malformed assignment event");
                    continue;
                }
            };
            match ev {
                // The host cleared itself when it sent this.
                Event::Reset if self.ctx.is_host => {}
                Event::Reset => self.clear_local(),
                Event::Allocation(e) => self.on_allocation(e, world),
                Event::Complete(e) => self.on_complete(e, world),
                Event::Failed(e) => self.on_failed(e),
            }
        }
    }

    /// Forget everything about the current round on this peer.
    fn clear_local(&mut self) {
        self.ctx.reset_round();
        self.generated = false;
        if self.current.take().is_some() {
            self.notices.push(Notice::Cleared);
        }
    }

    fn is_current(&self, round_id: u8, player: PlayerId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.id == round_id && c.player_id == player)
    }

    fn on_allocation(&mut self, e: Allocation, world: &mut dyn World) {
        let Some(template) = self.catalog.lookup(&e.uid) else {
            warn!(uid = %e.uid, "allocation for unknown assignment");
            return;
        };
        let mut a = template.instantiate();
        a.apply_allocation(&e);

        let is_local = a.player_id == self.transport.local_player();
        let ok = self
            .registry
            .get(a.kind)
            .handle_allocation(&self.ctx, world, &mut a, is_local);
        if is_local && ok {
            info!(round_id = a.id, uid = %a.uid, target = %a.target_text, "assigned to local player");
            self.notices.push(Notice::Assigned(a.clone()));
            self.current = Some(a);
        }
    }

    fn on_complete(&mut self, e: Complete, world: &mut dyn World) {
        let Some(template) = self.catalog.lookup(&e.uid) else {
            warn!(uid = %e.uid, "completion for unknown assignment");
            return;
        };
        let mut a = template.instantiate();
        a.apply_complete(&e);
        if let Some(done) = self
            .ctx
            .completed
            .iter()
            .find(|c| c.id == a.id && c.player_id == a.player_id)
        {
            a.fixed_target_position = done.fixed_target_position;
        }

        let is_local = a.player_id == self.transport.local_player();
        self.registry
            .get(a.kind)
            .complete(&mut self.ctx, world, &mut a, is_local);

        if is_local && self.is_current(a.id, a.player_id) {
            self.current = None;
            self.notices.push(Notice::Completed(a));
        }
    }

    fn on_failed(&mut self, e: Failed) {
        let player = PlayerId(e.player_id);
        if player == self.transport.local_player() && self.is_current(e.round_id, player) {
            self.current = None;
            self.notices.push(Notice::Failed { reason: e.reason });
        }
    }
}
