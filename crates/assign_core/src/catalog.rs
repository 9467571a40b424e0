use crate::assignment::{Assignment, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentKind {
    CollectScrap,
    HuntKill,
    RepairValve,
}

impl AssignmentKind {
    pub const ALL: [AssignmentKind; 3] = [
        AssignmentKind::CollectScrap,
        AssignmentKind::HuntKill,
        AssignmentKind::RepairValve,
    ];

    /// Ordinal used to index per-kind tables.
    pub fn index(self) -> usize {
        match self {
            AssignmentKind::CollectScrap => 0,
            AssignmentKind::HuntKill => 1,
            AssignmentKind::RepairValve => 2,
        }
    }

    pub fn uid(self) -> &'static str {
        match self {
            AssignmentKind::CollectScrap => "collect_scrap",
            AssignmentKind::HuntKill => "hunt_kill",
            AssignmentKind::RepairValve => "repair_valve",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTemplate {
    pub uid: &'static str,
    pub name: &'static str,
    /// `{0}` is replaced by the target text.
    pub body_text: &'static str,
    pub short_text: &'static str,
    /// Fixed target text for kinds whose target is always the same thing.
    pub target_text: &'static str,
    pub failure_reason: &'static str,
    pub cash_reward: i32,
    pub kind: AssignmentKind,
}

impl AssignmentTemplate {
    pub fn instantiate(&self) -> Assignment {
        Assignment {
            uid: self.uid.to_string(),
            name: self.name.to_string(),
            kind: self.kind,
            id: 0,
            player_id: crate::PlayerId(0),
            body_text: self.body_text.to_string(),
            short_text: self.short_text.to_string(),
            target_text: self.target_text.to_string(),
            failure_reason: self.failure_reason.to_string(),
            cash_reward: self.cash_reward,
            target_ids: Vec::new(),
            fixed_target_position: None,
            status: Status::Pending,
        }
    }
}

/// Read-only template table, one entry per [`AssignmentKind`].
#[derive(Debug, Clone)]
pub struct Catalog {
    templates: [AssignmentTemplate; 3],
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            templates: [
                AssignmentTemplate {
                    uid: AssignmentKind::CollectScrap.uid(),
                    name: "SCRAP RETRIEVAL",
                    body_text: "YOU MUST COLLECT THE FOLLOWING SCRAP ITEM: [{0}] IT WILL BE MARKED AS [ASSIGNMENT TARGET]",
                    short_text: "FIND THE [{0}] MARKED 'ASSIGNMENT TARGET'",
                    target_text: "",
                    failure_reason: "ANOTHER EMPLOYEE COLLECTED THE ITEM",
                    cash_reward: 100,
                    kind: AssignmentKind::CollectScrap,
                },
                AssignmentTemplate {
                    uid: AssignmentKind::HuntKill.uid(),
                    name: "HUNT & KILL",
                    body_text: "YOU MUST HUNT AND KILL THE FOLLOWING ENEMY: [{0}] IT WILL BE MARKED AS [ASSIGNMENT TARGET]",
                    short_text: "FIND AND KILL THE [{0}]",
                    target_text: "",
                    failure_reason: "THE ENEMY WAS NOT KILLED",
                    cash_reward: 200,
                    kind: AssignmentKind::HuntKill,
                },
                AssignmentTemplate {
                    uid: AssignmentKind::RepairValve.uid(),
                    name: "REPAIR VALVE",
                    body_text: "YOU MUST FIND AND REPAIR THE BROKEN VALVE",
                    short_text: "FIND AND REPAIR THE BROKEN VALVE",
                    target_text: "BROKEN VALVE",
                    failure_reason: "THE BROKEN VALVE WAS NOT FIXED",
                    cash_reward: 100,
                    kind: AssignmentKind::RepairValve,
                },
            ],
        }
    }

    /// Catalog with the configured scrap and valve rewards baked in.
    /// Hunt rewards come from the enemy table at setup time instead.
    pub fn with_rewards(scrap_reward: i32, valve_reward: i32) -> Self {
        let mut c = Self::new();
        c.templates[AssignmentKind::CollectScrap.index()].cash_reward = scrap_reward;
        c.templates[AssignmentKind::RepairValve.index()].cash_reward = valve_reward;
        c
    }

    pub fn lookup(&self, uid: &str) -> Option<&AssignmentTemplate> {
        let uid = uid.trim();
        self.templates.iter().find(|t| t.uid == uid)
    }

    pub fn get(&self, kind: AssignmentKind) -> &AssignmentTemplate {
        &self.templates[kind.index()]
    }
}
