use std::cell::Cell;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use assign_core::transport::lock_peers;
use assign_core::world::{Entity, MemWorld, Spawn};
use assign_core::{
    AssignConfig, AssignmentManager, ChannelTransport, Hub, Notice, Phase, PlayerId, Status,
    TargetId, Transport, Vec3, World,
};
use assignproto::envelope::Envelope;
use assignproto::event::{Allocation, Complete, Event};
use assignproto::tags;
use bytes::{Bytes, BytesMut};
use rand::SeedableRng;
use rand::rngs::StdRng;

type Peer = AssignmentManager<ChannelTransport>;

/// Host is `PlayerId(1)` at index 0; clients follow as 2, 3, ...
fn lobby(cfg: &AssignConfig, clients: u64) -> (Hub, Vec<Peer>) {
    let mut hub = Hub::new();
    let mut peers = vec![
        AssignmentManager::new(cfg, hub.host(PlayerId(1))).with_rng(StdRng::seed_from_u64(42)),
    ];
    for i in 0..clients {
        let t = hub.client(PlayerId(i + 2));
        peers.push(AssignmentManager::new(cfg, t).with_rng(StdRng::seed_from_u64(i)));
    }
    (hub, peers)
}

fn collect_only() -> AssignConfig {
    AssignConfig {
        assignment_weights: "1,0,0".to_string(),
        ..AssignConfig::default()
    }
}

fn set_phase_all(peers: &mut [Peer], phase: Phase, w: &mut MemWorld) {
    for p in peers.iter_mut() {
        p.set_phase(phase, w);
    }
}

fn tick_all(peers: &mut [Peer], w: &mut MemWorld, now: Instant) {
    for p in peers.iter_mut() {
        p.tick(w, now);
    }
}

fn index_of(player: PlayerId) -> usize {
    (player.0 - 1) as usize
}

/// Push a raw frame straight into a client's inbox.
fn inject(host: &Peer, to: PlayerId, frame: Bytes) {
    let peers = lock_peers(host.transport().peers());
    peers.get(&to).unwrap().send(frame).unwrap();
}

fn allocation_frame(to: PlayerId, target: TargetId) -> Bytes {
    let ev = Event::Allocation(Allocation {
        round_id: 1,
        player_id: to.0,
        uid: "collect_scrap".to_string(),
        target_ids: vec![target.0],
        reward: 100,
        target_name: "LARGE AXLE".to_string(),
    });
    Envelope::seal(ev.tag(), to.0, ev.encode()).encode()
}

#[test]
fn collect_scrap_happy_path() {
    let (_hub, mut peers) = lobby(&collect_only(), 1);
    let mut w = MemWorld::new();
    let scrap = w.add_scrap("Large axle", 40, Vec3::new(3.0, 0.0, 0.0));
    let t0 = Instant::now();

    set_phase_all(&mut peers, Phase::InLevel, &mut w);
    tick_all(&mut peers, &mut w, t0);

    let a = peers[0].context().active[0].clone();
    assert_eq!(a.target(), Some(scrap));
    let owner = index_of(a.player_id);
    assert_eq!(peers[owner].current().map(|c| c.id), Some(a.id));
    assert!(matches!(
        peers[owner].drain_notices().as_slice(),
        [Notice::Assigned(_)]
    ));

    w.collect(scrap, a.player_id);
    tick_all(&mut peers, &mut w, t0);
    tick_all(&mut peers, &mut w, t0);

    let done = &peers[0].context().completed;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].status, Status::Complete);
    assert!(peers[0].context().active.is_empty());
    assert_eq!(w.reward_value(scrap), Some(140));
    assert_eq!(peers[0].context().pending_rewards, vec![(scrap, 140)]);

    assert!(peers[owner].current().is_none());
    let notices = peers[owner].drain_notices();
    assert!(matches!(notices.as_slice(), [Notice::Completed(_)]));
    let (speaker, _) = notices[0].dialogue().unwrap();
    assert_eq!(speaker, "ASSIGNMENT COMPLETE");

    // Batched value sync lands one second after the reward was queued.
    tick_all(&mut peers, &mut w, t0 + Duration::from_millis(500));
    assert!(w.synced().is_empty());
    tick_all(&mut peers, &mut w, t0 + Duration::from_secs(1));
    assert_eq!(w.synced(), &[(vec![scrap], vec![140])]);
    assert!(peers[0].context().pending_rewards.is_empty());
}

#[test]
fn wrong_collector_fails_the_assignment() {
    let (_hub, mut peers) = lobby(&collect_only(), 1);
    let mut w = MemWorld::new();
    let scrap = w.add_scrap("Large axle", 40, Vec3::default());
    let t0 = Instant::now();

    set_phase_all(&mut peers, Phase::InLevel, &mut w);
    tick_all(&mut peers, &mut w, t0);
    let a = peers[0].context().active[0].clone();
    let owner = index_of(a.player_id);
    let thief = if a.player_id == PlayerId(1) {
        PlayerId(2)
    } else {
        PlayerId(1)
    };
    peers[owner].drain_notices();

    w.collect(scrap, thief);
    tick_all(&mut peers, &mut w, t0);
    tick_all(&mut peers, &mut w, t0);

    assert_eq!(peers[0].context().completed[0].status, Status::Failed);
    assert_eq!(w.reward_value(scrap), Some(40));
    assert!(peers[0].context().pending_rewards.is_empty());
    assert_eq!(
        peers[owner].drain_notices(),
        vec![Notice::Failed {
            reason: "ANOTHER EMPLOYEE COLLECTED THE ITEM".to_string()
        }]
    );
    assert!(peers[owner].current().is_none());
    assert!(peers[index_of(thief)].drain_notices().is_empty());
}

#[test]
fn tampered_frame_reaches_no_handler() {
    let (_hub, mut peers) = lobby(&collect_only(), 1);
    let mut w = MemWorld::new();
    let scrap = w.add_scrap("Large axle", 40, Vec3::default());
    let now = Instant::now();

    let frame = allocation_frame(PlayerId(2), scrap);
    let mut bad = BytesMut::from(&frame[..]);
    let last = bad.len() - 1;
    bad[last] ^= 0x01;
    inject(&peers[0], PlayerId(2), bad.freeze());

    peers[1].tick(&mut w, now);
    assert!(peers[1].current().is_none());
    assert!(peers[1].drain_notices().is_empty());
    assert_eq!(w.label(scrap).unwrap().header, "Large axle");

    inject(&peers[0], PlayerId(2), frame);
    peers[1].tick(&mut w, now);
    assert_eq!(peers[1].current().unwrap().target(), Some(scrap));
    assert_eq!(w.label(scrap).unwrap().header, "ASSIGNMENT TARGET");
}

#[test]
fn foreign_tags_are_ignored() {
    let (_hub, mut peers) = lobby(&collect_only(), 1);
    let mut w = MemWorld::new();
    inject(
        &peers[0],
        PlayerId(2),
        Envelope::seal("chat", 2, Bytes::from_static(b"hello")).encode(),
    );
    inject(
        &peers[0],
        PlayerId(2),
        Envelope::seal("EA-Unknown", 2, Bytes::new()).encode(),
    );
    peers[1].tick(&mut w, Instant::now());
    assert!(peers[1].drain_notices().is_empty());
    assert!(peers[1].context().is_round_empty());
}

#[test]
fn reset_is_idempotent() {
    let (_hub, mut peers) = lobby(&collect_only(), 1);
    let mut w = MemWorld::new();
    let scrap = w.add_scrap("Large axle", 40, Vec3::default());
    let now = Instant::now();
    let reset = || Envelope::seal(tags::RESET, 2, Bytes::new()).encode();

    inject(&peers[0], PlayerId(2), allocation_frame(PlayerId(2), scrap));
    peers[1].tick(&mut w, now);
    assert!(peers[1].current().is_some());
    peers[1].drain_notices();

    inject(&peers[0], PlayerId(2), reset());
    peers[1].tick(&mut w, now);
    assert_eq!(peers[1].drain_notices(), vec![Notice::Cleared]);
    assert!(peers[1].current().is_none());
    assert!(peers[1].context().is_round_empty());
    assert!(!peers[1].generated());

    inject(&peers[0], PlayerId(2), reset());
    peers[1].tick(&mut w, now);
    assert!(peers[1].drain_notices().is_empty());
    assert!(peers[1].current().is_none());
    assert!(peers[1].context().is_round_empty());
}

#[test]
fn hub_landing_resets_every_peer() {
    let (_hub, mut peers) = lobby(&collect_only(), 2);
    let mut w = MemWorld::new();
    for i in 0..3 {
        w.add_scrap(&format!("Scrap {i}"), 10, Vec3::default());
    }
    let now = Instant::now();

    set_phase_all(&mut peers, Phase::InLevel, &mut w);
    tick_all(&mut peers, &mut w, now);
    assert!(!peers[0].context().active.is_empty());

    set_phase_all(&mut peers, Phase::Hub, &mut w);
    tick_all(&mut peers, &mut w, now);
    for p in &peers {
        assert!(p.current().is_none());
        assert!(p.context().is_round_empty());
    }
}

/// Counts lookups so the retry bound can be observed.
struct CountingWorld {
    inner: MemWorld,
    lookups: Cell<usize>,
}

impl World for CountingWorld {
    fn find_entities(&self, pred: &dyn Fn(&Entity) -> bool) -> Vec<Entity> {
        self.lookups.set(self.lookups.get() + 1);
        self.inner.find_entities(pred)
    }

    fn spawn(&mut self, spawn: Spawn, position: Vec3) -> Option<TargetId> {
        self.inner.spawn(spawn, position)
    }

    fn set_reward(&mut self, id: TargetId, value: i32) -> bool {
        self.inner.set_reward(id, value)
    }

    fn is_reachable(&self, position: Vec3) -> Option<Vec3> {
        self.inner.is_reachable(position)
    }

    fn nearest_player_distance(&self, position: Vec3) -> Option<f32> {
        self.inner.nearest_player_distance(position)
    }

    fn main_entrance(&self) -> Option<Vec3> {
        self.inner.main_entrance()
    }

    fn vents(&self) -> Vec<Vec3> {
        self.inner.vents()
    }

    fn label_target(&mut self, id: TargetId, header: &str, sub: Option<&str>) -> bool {
        self.inner.label_target(id, header, sub)
    }

    fn arm_hazard(&mut self, id: TargetId) -> bool {
        self.inner.arm_hazard(id)
    }

    fn sync_reward_values(&mut self, targets: &[TargetId], values: &[i32]) {
        self.inner.sync_reward_values(targets, values)
    }
}

#[test]
fn setup_failures_stop_at_five() {
    let (_hub, mut peers) = lobby(&collect_only(), 7);
    let mut w = CountingWorld {
        inner: MemWorld::new(),
        lookups: Cell::new(0),
    };

    assert_eq!(peers[0].generate(&mut w), 0);
    assert_eq!(w.lookups.get(), 5);
    assert!(peers[0].generated());
}

#[test]
fn targets_are_never_shared_within_a_round() {
    let cfg = AssignConfig {
        assign_all_players: true,
        assignment_weights: "1,0,1".to_string(),
        ..AssignConfig::default()
    };
    let (_hub, mut peers) = lobby(&cfg, 9);
    let mut w = MemWorld::new();
    for i in 0..5 {
        w.add_scrap(&format!("Scrap {i}"), 10, Vec3::default());
        w.add_valve(Vec3::new(i as f32 * 10.0, 0.0, 0.0));
    }

    let made = peers[0].generate(&mut w);
    let ctx = peers[0].context();
    assert_eq!(made, ctx.active.len());
    assert!(made > 0);

    let targets: HashSet<TargetId> = ctx.active.iter().filter_map(|a| a.target()).collect();
    assert_eq!(targets.len(), made);
    assert_eq!(ctx.exclude_targets, targets);

    let players: HashSet<PlayerId> = ctx.active.iter().map(|a| a.player_id).collect();
    assert_eq!(players.len(), made);
}

#[test]
fn hunt_reward_spawns_and_syncs() {
    let cfg = AssignConfig {
        assignment_weights: "0,1,0".to_string(),
        enemy_whitelist: "Crawler".to_string(),
        enemy_weights: "1".to_string(),
        enemy_rewards: "300".to_string(),
        ..AssignConfig::default()
    };
    let (_hub, mut peers) = lobby(&cfg, 0);
    let mut w = MemWorld::new();
    w.set_entrance(Vec3::default());
    w.allow_spawn("Crawler");
    w.add_vent(Vec3::new(40.0, 0.0, 0.0));
    let t0 = Instant::now();

    set_phase_all(&mut peers, Phase::InLevel, &mut w);
    tick_all(&mut peers, &mut w, t0);
    let enemy = peers[0].current().unwrap().target().unwrap();
    assert_eq!(peers[0].current().unwrap().cash_reward, 300);
    assert_eq!(peers[0].current().unwrap().target_text, "CRAWLER");

    w.kill(enemy);
    w.set_player(PlayerId(1), Vec3::new(38.0, 0.0, 0.0));
    tick_all(&mut peers, &mut w, t0);
    tick_all(&mut peers, &mut w, t0);

    let (bar, value) = peers[0].context().pending_rewards[0];
    assert_eq!(value, 300);
    assert_eq!(w.entity(bar).unwrap().name, "Gold bar");

    tick_all(&mut peers, &mut w, t0 + Duration::from_secs(1));
    assert_eq!(w.synced(), &[(vec![bar], vec![300])]);
}

#[test]
fn losing_the_host_clears_the_client() {
    let (mut hub, mut peers) = lobby(&collect_only(), 1);
    let mut w = MemWorld::new();
    let scrap = w.add_scrap("Large axle", 40, Vec3::default());
    let now = Instant::now();

    inject(&peers[0], PlayerId(2), allocation_frame(PlayerId(2), scrap));
    peers[1].tick(&mut w, now);
    peers[1].drain_notices();

    hub.disconnect(PlayerId(2));
    peers[1].tick(&mut w, now);
    assert!(!peers[1].transport().is_connected());
    assert!(peers[1].current().is_none());
    assert_eq!(peers[1].drain_notices(), vec![Notice::Cleared]);
}

#[test]
fn host_ignores_events_sent_by_clients() {
    let (_hub, mut peers) = lobby(&collect_only(), 1);
    let mut w = MemWorld::new();
    let scrap = w.add_scrap("Large axle", 40, Vec3::default());
    let now = Instant::now();

    set_phase_all(&mut peers, Phase::InLevel, &mut w);
    tick_all(&mut peers, &mut w, now);
    let a = peers[0].context().active[0].clone();
    let entities = w.len();

    let forged = Event::Complete(Complete {
        round_id: a.id,
        player_id: a.player_id.0,
        uid: a.uid.clone(),
        target_ids: vec![scrap.0],
        reward: 99_999,
    });
    let client = peers[1].transport();
    client.send_to(PlayerId(1), tags::RESET, Bytes::new());
    client.send_to(PlayerId(1), forged.tag(), forged.encode());
    peers[0].tick(&mut w, now);

    let host = peers[0].context();
    assert_eq!(host.active, vec![a]);
    assert!(host.completed.is_empty());
    assert!(host.pending_rewards.is_empty());
    assert!(peers[0].generated());
    assert_eq!(w.len(), entities);
    assert_eq!(w.reward_value(scrap), Some(40));
}

#[test]
fn takeoff_clears_a_client_stuck_in_orbit() {
    let (_hub, mut peers) = lobby(&collect_only(), 1);
    let mut w = MemWorld::new();
    let scrap = w.add_scrap("Large axle", 40, Vec3::default());
    let now = Instant::now();

    // Clients only ever see orbit.
    peers[1].set_phase(Phase::Orbit, &mut w);
    inject(&peers[0], PlayerId(2), allocation_frame(PlayerId(2), scrap));
    peers[1].tick(&mut w, now);
    assert!(peers[1].current().is_some());
    peers[1].drain_notices();

    peers[0].set_phase(Phase::Orbit, &mut w);
    peers[0].clear_all();
    tick_all(&mut peers, &mut w, now);
    assert!(peers[1].current().is_none());
    assert_eq!(peers[1].drain_notices(), vec![Notice::Cleared]);
    assert!(peers[1].context().is_round_empty());

    peers[0].set_phase(Phase::InLevel, &mut w);
    tick_all(&mut peers, &mut w, now);
    let active = &peers[0].context().active;
    assert_eq!(active.len(), 1);
    match peers[1].current() {
        Some(cur) => assert_eq!((cur.id, cur.player_id), (active[0].id, active[0].player_id)),
        None => assert_ne!(active[0].player_id, PlayerId(2)),
    }
}

/// Host alone, its own scrap assignment completed and the reward queued.
fn completed_collect() -> (Hub, Vec<Peer>, MemWorld, TargetId, Instant) {
    let (hub, mut peers) = lobby(&collect_only(), 0);
    let mut w = MemWorld::new();
    let scrap = w.add_scrap("Large axle", 40, Vec3::default());
    let t0 = Instant::now();

    set_phase_all(&mut peers, Phase::InLevel, &mut w);
    tick_all(&mut peers, &mut w, t0);
    w.collect(scrap, PlayerId(1));
    tick_all(&mut peers, &mut w, t0);
    tick_all(&mut peers, &mut w, t0);

    assert_eq!(peers[0].context().pending_rewards, vec![(scrap, 140)]);
    assert_eq!(peers[0].reward_sync_due(), Some(t0 + Duration::from_secs(1)));
    (hub, peers, w, scrap, t0)
}

#[test]
fn reward_sync_skips_targets_that_are_gone() {
    let (_hub, mut peers, mut w, scrap, t0) = completed_collect();

    assert!(w.despawn(scrap));
    tick_all(&mut peers, &mut w, t0 + Duration::from_secs(1));

    assert!(w.synced().is_empty());
    assert!(peers[0].context().pending_rewards.is_empty());
    assert_eq!(peers[0].reward_sync_due(), None);
}

#[test]
fn reset_leaves_a_scheduled_sync_to_fire_empty() {
    let (_hub, mut peers, mut w, _scrap, t0) = completed_collect();

    peers[0].set_phase(Phase::Hub, &mut w);
    assert!(peers[0].context().pending_rewards.is_empty());
    assert_eq!(peers[0].reward_sync_due(), Some(t0 + Duration::from_secs(1)));

    tick_all(&mut peers, &mut w, t0 + Duration::from_secs(1));
    assert!(w.synced().is_empty());
    assert_eq!(peers[0].reward_sync_due(), None);
}
