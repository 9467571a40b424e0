use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use assign_core::{AssignConfig, AssignmentManager, Notice, Phase, PhaseTracker, SessionSignals, Transport};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn, Level};

mod demo;
mod net;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Host,
    Client,
}

#[derive(Clone, Debug)]
struct Config {
    role: Role,
    bind: SocketAddr,
    host_addr: SocketAddr,
    tick_ms: u64,
    round_secs: u64,
    seed: Option<u64>,
    config_path: Option<PathBuf>,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "assign_peer\n\n\
USAGE:\n  assign_peer [--role host|client] [--bind HOST:PORT] [--host-addr HOST:PORT] [--config PATH]\n\n\
ENV:\n  EA_ROLE        default host\n  EA_BIND        default 127.0.0.1:4700 (host)\n  EA_HOST_ADDR   default 127.0.0.1:4700 (client)\n  EA_TICK_MS     default 100\n  EA_ROUND_SECS  default 60 (host round clock)\n  EA_SEED        unset = entropy\n  EA_CONFIG      JSON assignment config; unset = EA_* overrides on defaults\n"
    );
    std::process::exit(2);
}

fn parse_role(v: &str) -> Option<Role> {
    match v.trim() {
        "host" => Some(Role::Host),
        "client" => Some(Role::Client),
        _ => None,
    }
}

fn parse_args() -> Config {
    let mut role = std::env::var("EA_ROLE")
        .ok()
        .map(|v| parse_role(&v).unwrap_or_else(|| usage_and_exit()))
        .unwrap_or(Role::Host);
    let mut bind: SocketAddr = std::env::var("EA_BIND")
        .unwrap_or_else(|_| "127.0.0.1:4700".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());
    let mut host_addr: SocketAddr = std::env::var("EA_HOST_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:4700".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());
    let tick_ms: u64 = std::env::var("EA_TICK_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100)
        .max(10);
    let round_secs: u64 = std::env::var("EA_ROUND_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60)
        .max(4);
    let seed: Option<u64> = std::env::var("EA_SEED").ok().and_then(|v| v.parse().ok());
    let mut config_path: Option<PathBuf> = std::env::var("EA_CONFIG").ok().map(PathBuf::from);

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--role" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                role = parse_role(&v).unwrap_or_else(|| usage_and_exit());
            }
            "--bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "--host-addr" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                host_addr = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "--config" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                config_path = Some(PathBuf::from(v));
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        role,
        bind,
        host_addr,
        tick_ms,
        round_secs,
        seed,
        config_path,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,assign_peer=info".into()),
        )
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cfg = parse_args();
    let assign = match &cfg.config_path {
        Some(p) => AssignConfig::load(p)?,
        None => AssignConfig::from_env(),
    };

    let transport = match cfg.role {
        Role::Host => net::start_host(cfg.bind).await?,
        Role::Client => net::connect_client(cfg.host_addr).await?,
    };
    let is_host = transport.is_host();

    let mut mgr = AssignmentManager::new(&assign, transport);
    let mut sim_rng = match cfg.seed {
        Some(seed) => {
            mgr = mgr.with_rng(StdRng::seed_from_u64(seed));
            StdRng::seed_from_u64(seed.wrapping_add(1))
        }
        None => StdRng::from_entropy(),
    };

    let enemies = assign.enemy_whitelist();
    let mut world = demo::demo_world(&enemies);
    let mut tracker = PhaseTracker::new();
    let clock = demo::RoundClock::new(Instant::now(), Duration::from_secs(cfg.round_secs));
    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.tick_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(role = ?cfg.role, tick_ms = cfg.tick_ms, "peer running");
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }

        let now = Instant::now();
        // Clients only know whether they are connected; the host's events do the rest.
        let signals = if is_host {
            clock.signals(now)
        } else {
            SessionSignals {
                connected: mgr.transport().is_connected(),
                in_ship_phase: true,
                ..SessionSignals::default()
            }
        };
        if let Some(phase) = tracker.observe(&signals) {
            info!(?phase, "phase changed");
            if phase == Phase::Orbit {
                world = demo::demo_world(&enemies);
            }
            mgr.set_phase(phase, &mut world);
            // Clients never leave orbit on their own, so take-off resets them.
            if is_host && phase == Phase::Orbit {
                mgr.clear_all();
            }
        }

        if is_host && mgr.phase() == Phase::InLevel {
            let players = mgr.transport().connected_players();
            demo::simulate(&mut world, &players, &mut sim_rng);
        }
        mgr.tick(&mut world, now);

        for notice in mgr.drain_notices() {
            if let Notice::Assigned(a) = &notice {
                info!(hud = %a.short(), "assignment hud");
            }
            match notice.dialogue() {
                Some((speaker, body)) => info!(%speaker, %body, "notice"),
                None => info!("assignment cleared"),
            }
        }

        if !is_host && !mgr.transport().is_connected() {
            warn!("host went away");
            break;
        }
    }
    Ok(())
}
