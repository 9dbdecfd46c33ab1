//! Shared-layout stacks.
//!
//! Every node mounted with the same `layout_id` joins one [`SharedStack`].
//! Exactly one member is the lead at a time; the rest are followers that
//! crossfade into it. The stack only tracks ids; the tree applies a
//! [`Promotion`] to the nodes themselves.

use super::NodeId;

/// A lead change: `lead` takes over from `previous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub lead: NodeId,
    pub previous: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct SharedStack {
    members: Vec<NodeId>,
    lead: Option<NodeId>,
    prev_lead: Option<NodeId>,
}

impl SharedStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn lead(&self) -> Option<NodeId> {
        self.lead
    }

    pub fn prev_lead(&self) -> Option<NodeId> {
        self.prev_lead
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    pub fn add(&mut self, id: NodeId) {
        if !self.contains(id) {
            self.members.push(id);
        }
    }

    /// Make `id` the lead. `None` if it already is.
    pub fn promote(&mut self, id: NodeId) -> Option<Promotion> {
        if self.lead == Some(id) {
            return None;
        }
        self.add(id);
        let previous = self.lead;
        self.prev_lead = previous;
        self.lead = Some(id);
        Some(Promotion { lead: id, previous })
    }

    /// Hand the lead back to the closest earlier member still present.
    ///
    /// `None` when no such member exists, in which case `id` keeps the lead.
    pub fn relegate(&mut self, id: NodeId, is_present: impl Fn(NodeId) -> bool) -> Option<Promotion> {
        let index = self.members.iter().position(|m| *m == id)?;
        let candidate = self.members[..index].iter().rev().copied().find(|m| is_present(*m))?;
        self.promote(candidate)
    }

    /// Remove `id`; when it was the lead, the newest remaining member leads.
    pub fn remove(&mut self, id: NodeId) -> Option<Promotion> {
        self.members.retain(|m| *m != id);
        if self.prev_lead == Some(id) {
            self.prev_lead = None;
        }
        if self.lead != Some(id) {
            return None;
        }
        self.lead = None;
        let next = *self.members.last()?;
        self.promote(next).map(|promotion| Promotion {
            previous: None,
            ..promotion
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_tracks_previous_lead() {
        let mut stack = SharedStack::new();
        assert_eq!(stack.promote(NodeId(1)), Some(Promotion { lead: NodeId(1), previous: None }));
        assert_eq!(stack.promote(NodeId(1)), None);
        assert_eq!(
            stack.promote(NodeId(2)),
            Some(Promotion {
                lead: NodeId(2),
                previous: Some(NodeId(1))
            })
        );
        assert_eq!(stack.lead(), Some(NodeId(2)));
        assert_eq!(stack.prev_lead(), Some(NodeId(1)));
        assert_eq!(stack.members(), &[NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_relegate_skips_absent_members() {
        let mut stack = SharedStack::new();
        for id in 1..=3 {
            stack.promote(NodeId(id));
        }
        let promotion = stack.relegate(NodeId(3), |id| id != NodeId(2));
        assert_eq!(promotion.map(|p| p.lead), Some(NodeId(1)));
        assert_eq!(stack.lead(), Some(NodeId(1)));

        assert_eq!(stack.relegate(NodeId(1), |_| true), None);
    }

    #[test]
    fn test_remove_lead_promotes_newest() {
        let mut stack = SharedStack::new();
        stack.promote(NodeId(1));
        stack.promote(NodeId(2));
        let promotion = stack.remove(NodeId(2));
        assert_eq!(promotion, Some(Promotion { lead: NodeId(1), previous: None }));
        assert_eq!(stack.lead(), Some(NodeId(1)));
        assert_eq!(stack.prev_lead(), None);

        assert_eq!(stack.remove(NodeId(1)), None);
        assert!(stack.is_empty());
        assert_eq!(stack.lead(), None);
    }
}
