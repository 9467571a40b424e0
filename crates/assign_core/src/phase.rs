/// Level the ship lands on to sell loot. Landing there is not a round.
pub const HUB_LEVEL: &str = "CompanyBuilding";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    MainMenu,
    Orbit,
    Hub,
    InLevel,
}

/// Raw session state as the game reports it each tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSignals {
    pub connected: bool,
    pub in_ship_phase: bool,
    pub ship_landed: bool,
    pub level_name: String,
}

/// Turns [`SessionSignals`] into phase transitions.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    phase: Phase,
    landed: bool,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the new phase only when it differs from the last one reported.
    pub fn observe(&mut self, s: &SessionSignals) -> Option<Phase> {
        let next = if !s.connected {
            self.landed = false;
            Phase::MainMenu
        } else if s.ship_landed && !s.in_ship_phase {
            self.landed = true;
            if s.level_name == HUB_LEVEL {
                Phase::Hub
            } else {
                Phase::InLevel
            }
        } else if s.in_ship_phase && self.landed {
            self.landed = false;
            Phase::Orbit
        } else if self.phase == Phase::MainMenu {
            // Joined a session already sitting in orbit.
            Phase::Orbit
        } else {
            self.phase
        };

        if next == self.phase {
            return None;
        }
        self.phase = next;
        Some(next)
    }
}
