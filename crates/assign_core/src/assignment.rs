use assignproto::event::{Allocation, Complete, Failed};

use crate::catalog::AssignmentKind;
use crate::types::{PlayerId, TargetId, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Pending,
    Allocated,
    Complete,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Complete | Status::Failed)
    }
}

/// One assignment instance. Plain value: the host keeps its copy in the
/// context, every peer rebuilds its own from the catalog plus event fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub uid: String,
    pub name: String,
    pub kind: AssignmentKind,
    /// Round-scoped id, unique among the active assignments of a round.
    pub id: u8,
    pub player_id: PlayerId,
    pub body_text: String,
    pub short_text: String,
    pub target_text: String,
    pub failure_reason: String,
    pub cash_reward: i32,
    pub target_ids: Vec<TargetId>,
    pub fixed_target_position: Option<Vec3>,
    pub status: Status,
}

fn fill(template: &str, target: &str) -> String {
    template.replace("{0}", target)
}

impl Assignment {
    pub fn target(&self) -> Option<TargetId> {
        self.target_ids.first().copied()
    }

    pub fn set_target(&mut self, id: TargetId) {
        self.target_ids = vec![id];
    }

    pub fn body(&self) -> String {
        fill(&self.body_text, &self.target_text)
    }

    pub fn short(&self) -> String {
        fill(&self.short_text, &self.target_text)
    }

    pub fn allocation_event(&self) -> Allocation {
        Allocation {
            round_id: self.id,
            player_id: self.player_id.0,
            uid: self.uid.clone(),
            target_ids: self.target_ids.iter().map(|t| t.0).collect(),
            reward: self.cash_reward,
            target_name: self.target_text.clone(),
        }
    }

    pub fn complete_event(&self) -> Complete {
        Complete {
            round_id: self.id,
            player_id: self.player_id.0,
            uid: self.uid.clone(),
            target_ids: self.target_ids.iter().map(|t| t.0).collect(),
            reward: self.cash_reward,
        }
    }

    pub fn failed_event(&self) -> Failed {
        Failed {
            round_id: self.id,
            player_id: self.player_id.0,
            reason: self.failure_reason.clone(),
        }
    }

    pub fn apply_allocation(&mut self, e: &Allocation) {
        self.id = e.round_id;
        self.player_id = PlayerId(e.player_id);
        self.target_ids = e.target_ids.iter().copied().map(TargetId).collect();
        self.cash_reward = e.reward;
        self.target_text = e.target_name.clone();
        self.status = Status::Allocated;
    }

    pub fn apply_complete(&mut self, e: &Complete) {
        self.id = e.round_id;
        self.player_id = PlayerId(e.player_id);
        self.target_ids = e.target_ids.iter().copied().map(TargetId).collect();
        self.cash_reward = e.reward;
        self.status = Status::Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use assignproto::event::{Event, parse_event};

    #[test]
    fn allocation_round_trips_through_the_wire() {
        let catalog = Catalog::new();
        let mut src = catalog.get(AssignmentKind::CollectScrap).instantiate();
        src.id = 4;
        src.player_id = PlayerId(77);
        src.set_target(TargetId(1234));
        src.cash_reward = 150;
        src.target_text = "LARGE AXLE".to_string();

        let ev = Event::Allocation(src.allocation_event());
        let Event::Allocation(got) = parse_event(ev.tag(), ev.encode()).unwrap() else {
            panic!("expected allocation");
        };

        let mut dst = catalog.lookup(&got.uid).unwrap().instantiate();
        dst.apply_allocation(&got);
        assert_eq!(dst.id, src.id);
        assert_eq!(dst.player_id, src.player_id);
        assert_eq!(dst.target_ids, src.target_ids);
        assert_eq!(dst.cash_reward, src.cash_reward);
        assert_eq!(dst.target_text, src.target_text);
        assert_eq!(dst.status, Status::Allocated);
    }

    #[test]
    fn texts_fill_the_target_slot() {
        let mut a = Catalog::new().get(AssignmentKind::HuntKill).instantiate();
        a.target_text = "CRAWLER".to_string();
        assert_eq!(a.short(), "FIND AND KILL THE [CRAWLER]");
        assert!(a.body().contains("[CRAWLER]"));
    }

    #[test]
    fn terminal_states() {
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Allocated.is_terminal());
        assert!(Status::Complete.is_terminal());
        assert!(Status::Failed.is_terminal());
    }
}
