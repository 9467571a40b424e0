//! A stand-in level and players so a peer can run without a game attached.

use std::time::{Duration, Instant};

use assign_core::phase::HUB_LEVEL;
use assign_core::world::{EntityState, MemWorld};
use assign_core::{PlayerId, SessionSignals, Vec3, World};
use rand::Rng;
use rand::rngs::StdRng;

pub const DEMO_LEVEL: &str = "Experimentation";

/// Odds per tick that some player does something useful.
const ACTION_CHANCE: f64 = 0.05;

const SCRAP: [(&str, i32); 8] = [
    ("Large axle", 58),
    ("Cash register", 80),
    ("Bottles", 44),
    ("Gold cup", 72),
    ("Old phone", 31),
    ("Brass bell", 50),
    ("Whoopie cushion", 12),
    ("Toy robot", 64),
];

/// Same layout on every peer, so entity ids line up without replication.
pub fn demo_world(enemies: &[String]) -> MemWorld {
    let mut w = MemWorld::new();
    w.set_entrance(Vec3::default());
    for (i, (name, value)) in SCRAP.iter().enumerate() {
        let x = 10.0 + i as f32 * 9.0;
        w.add_scrap(name, *value, Vec3::new(x, 0.0, (i % 3) as f32 * 6.0));
    }
    w.add_tool("Flashlight", Vec3::new(2.0, 0.0, 0.0));
    w.add_tool("Shovel", Vec3::new(3.0, 0.0, 1.0));
    for x in [15.0, 45.0, 70.0] {
        w.add_valve(Vec3::new(x, -4.0, 0.0));
    }
    for (i, x) in [20.0, 35.0, 50.0, 65.0, 80.0, 95.0].into_iter().enumerate() {
        w.add_vent(Vec3::new(x, 0.0, i as f32 * 4.0));
    }
    for name in enemies {
        w.allow_spawn(name);
    }
    w.add_enemy("Crawler", Vec3::new(60.0, 0.0, 10.0));
    w
}

/// Players wander in, leave when they disconnect, and occasionally collect,
/// kill or repair something.
pub fn simulate(world: &mut MemWorld, players: &[PlayerId], rng: &mut StdRng) {
    let known: Vec<PlayerId> = world.players().into_iter().map(|(p, _)| p).collect();
    for p in &known {
        if !players.contains(p) {
            world.remove_player(*p);
        }
    }
    if players.is_empty() {
        return;
    }
    for p in players {
        if !known.contains(p) {
            world.set_player(*p, Vec3::default());
        }
    }
    if !rng.gen_bool(ACTION_CHANCE) {
        return;
    }

    let actor = players[rng.gen_range(0..players.len())];
    match rng.gen_range(0..3) {
        0 => {
            let loot = world.find_entities(&|e| {
                matches!(
                    e.state,
                    EntityState::Item {
                        is_scrap: true,
                        collected: false,
                        ..
                    }
                )
            });
            if !loot.is_empty() {
                let item = &loot[rng.gen_range(0..loot.len())];
                world.collect(item.id, actor);
            }
        }
        1 => {
            let alive = world.find_entities(&|e| matches!(e.state, EntityState::Enemy { dead: false }));
            if !alive.is_empty() {
                let enemy = &alive[rng.gen_range(0..alive.len())];
                world.set_player(actor, enemy.position);
                world.kill(enemy.id);
            }
        }
        _ => {
            let broken = world.find_entities(&|e| matches!(e.state, EntityState::Valve { interactable: true }));
            if let Some(valve) = broken.first() {
                world.repair(valve.id, actor);
            }
        }
    }
}

/// Drives the host through rounds: a quarter of each round in orbit, the
/// rest landed. Every third round lands at the company instead.
pub struct RoundClock {
    start: Instant,
    round_len: Duration,
}

impl RoundClock {
    pub fn new(start: Instant, round_len: Duration) -> Self {
        Self { start, round_len }
    }

    pub fn signals(&self, now: Instant) -> SessionSignals {
        let elapsed = now.saturating_duration_since(self.start).as_millis();
        let len = self.round_len.as_millis().max(1);
        let round = elapsed / len;
        let landed = elapsed % len >= len / 4;
        let level = if round % 3 == 2 { HUB_LEVEL } else { DEMO_LEVEL };
        SessionSignals {
            connected: true,
            in_ship_phase: !landed,
            ship_landed: landed,
            level_name: level.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assign_core::{Phase, PhaseTracker};
    use rand::SeedableRng;

    #[test]
    fn clock_cycles_orbit_level_and_hub() {
        let t0 = Instant::now();
        let clock = RoundClock::new(t0, Duration::from_secs(40));
        let mut tracker = PhaseTracker::new();
        let at = |s: u64| clock.signals(t0 + Duration::from_secs(s));

        assert_eq!(tracker.observe(&at(0)), Some(Phase::Orbit));
        assert_eq!(tracker.observe(&at(10)), Some(Phase::InLevel));
        assert_eq!(tracker.observe(&at(40)), Some(Phase::Orbit));
        assert_eq!(tracker.observe(&at(50)), Some(Phase::InLevel));
        assert_eq!(tracker.observe(&at(80)), Some(Phase::Orbit));
        assert_eq!(tracker.observe(&at(90)), Some(Phase::Hub));
    }

    #[test]
    fn demo_world_is_deterministic() {
        let names = vec!["Crawler".to_string()];
        let a = demo_world(&names);
        let b = demo_world(&names);
        let ids = |w: &MemWorld| -> Vec<_> { w.find_entities(&|_| true).into_iter().map(|e| e.id).collect() };
        assert_eq!(ids(&a), ids(&b));
        assert!(!a.vents().is_empty());
    }

    #[test]
    fn simulate_registers_players() {
        let mut w = demo_world(&[]);
        let mut rng = StdRng::seed_from_u64(1);
        simulate(&mut w, &[PlayerId(1), PlayerId(2)], &mut rng);
        assert_eq!(w.players().len(), 2);

        simulate(&mut w, &[PlayerId(1)], &mut rng);
        let left: Vec<PlayerId> = w.players().into_iter().map(|(p, _)| p).collect();
        assert_eq!(left, vec![PlayerId(1)]);
    }
}
