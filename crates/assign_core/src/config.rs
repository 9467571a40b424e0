use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ASSIGNMENT_WHITELIST: &str = "collect_scrap,hunt_kill,repair_valve";
pub const DEFAULT_ASSIGNMENT_WEIGHTS: &str = "50,25,25";
pub const DEFAULT_ENEMY_WHITELIST: &str = "Centipede,Bunker Spider,Hoarding bug,Crawler";
pub const DEFAULT_ENEMY_WEIGHTS: &str = "50,25,50,25";
pub const DEFAULT_ENEMY_REWARDS: &str = "100,200,100,200";

/// Host-side knobs. Clients ignore everything here; the host's decisions
/// reach them through events.
///
/// List-valued options stay as the raw comma separated strings they are
/// configured as; the accessors below parse them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignConfig {
    pub max_assigned_players: usize,
    pub min_assigned_players: usize,
    pub assign_all_players: bool,
    pub all_players_can_complete: bool,

    pub assignment_whitelist: String,
    pub assignment_weights: String,

    pub scrap_reward: i32,
    pub valve_reward: i32,

    pub enemy_whitelist: String,
    pub enemy_weights: String,
    pub enemy_rewards: String,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            max_assigned_players: 10,
            min_assigned_players: 1,
            assign_all_players: false,
            all_players_can_complete: false,

            assignment_whitelist: DEFAULT_ASSIGNMENT_WHITELIST.to_string(),
            assignment_weights: DEFAULT_ASSIGNMENT_WEIGHTS.to_string(),

            scrap_reward: 100,
            valve_reward: 100,

            enemy_whitelist: DEFAULT_ENEMY_WHITELIST.to_string(),
            enemy_weights: DEFAULT_ENEMY_WEIGHTS.to_string(),
            enemy_rewards: DEFAULT_ENEMY_REWARDS.to_string(),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
}

impl AssignConfig {
    /// Defaults overridden by `EA_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.max_assigned_players = std::env::var("EA_MAX_ASSIGNED_PLAYERS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(cfg.max_assigned_players);
        cfg.min_assigned_players = std::env::var("EA_MIN_ASSIGNED_PLAYERS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(cfg.min_assigned_players);
        cfg.assign_all_players =
            env_flag("EA_ASSIGN_ALL_PLAYERS").unwrap_or(cfg.assign_all_players);
        cfg.all_players_can_complete =
            env_flag("EA_ALL_PLAYERS_CAN_COMPLETE").unwrap_or(cfg.all_players_can_complete);
        cfg.scrap_reward = std::env::var("EA_SCRAP_REWARD")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(cfg.scrap_reward);
        cfg.valve_reward = std::env::var("EA_VALVE_REWARD")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(cfg.valve_reward);

        for (var, slot) in [
            ("EA_ASSIGNMENT_WHITELIST", &mut cfg.assignment_whitelist),
            ("EA_ASSIGNMENT_WEIGHTS", &mut cfg.assignment_weights),
            ("EA_ENEMY_WHITELIST", &mut cfg.enemy_whitelist),
            ("EA_ENEMY_WEIGHTS", &mut cfg.enemy_weights),
            ("EA_ENEMY_REWARDS", &mut cfg.enemy_rewards),
        ] {
            if let Ok(v) = std::env::var(var) {
                *slot = v;
            }
        }
        cfg
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("bad config json in {}", path.display()))
    }

    pub fn assignment_whitelist(&self) -> Vec<String> {
        parse_str_list(&self.assignment_whitelist, DEFAULT_ASSIGNMENT_WHITELIST)
    }

    pub fn assignment_weights(&self) -> Vec<u32> {
        weights(parse_int_list(&self.assignment_weights, DEFAULT_ASSIGNMENT_WEIGHTS))
    }

    pub fn enemy_whitelist(&self) -> Vec<String> {
        parse_str_list(&self.enemy_whitelist, DEFAULT_ENEMY_WHITELIST)
    }

    pub fn enemy_weights(&self) -> Vec<u32> {
        weights(parse_int_list(&self.enemy_weights, DEFAULT_ENEMY_WEIGHTS))
    }

    pub fn enemy_rewards(&self) -> Vec<i32> {
        parse_int_list(&self.enemy_rewards, DEFAULT_ENEMY_REWARDS)
    }
}

fn or_default<'a>(raw: &'a str, default: &'a str) -> &'a str {
    if raw.trim().is_empty() { default } else { raw }
}

/// Comma separated, trimmed, empty entries dropped. A blank value falls back
/// to `default`.
pub fn parse_str_list(raw: &str, default: &str) -> Vec<String> {
    or_default(raw, default)
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Like [`parse_str_list`], with entries that are not integers read as 0.
pub fn parse_int_list(raw: &str, default: &str) -> Vec<i32> {
    or_default(raw, default)
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(0))
        .collect()
}

fn weights(v: Vec<i32>) -> Vec<u32> {
    v.into_iter().map(|w| w.max(0) as u32).collect()
}
