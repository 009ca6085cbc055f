//! Meeting Participation Reconciler.
//!
//! Diffs a meeting's current participant set against a desired set supplied
//! by the organizer. The organizer is pinned to `Accepted` whatever the input
//! says, and only the organizer may reconcile.

use std::collections::{HashMap, HashSet};

use crate::schema::{Meeting, Participant, ParticipantStatus};

/// Minimal changes that turn the current participant set into the desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantDiff {
    pub added: Vec<Participant>,
    pub updated: Vec<Participant>,
    pub removed: Vec<String>,
}

impl ParticipantDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Apply the diff to an in-memory participant list.
    pub fn apply(&self, participants: &mut Vec<Participant>) {
        let removed: HashSet<&str> = self.removed.iter().map(String::as_str).collect();
        participants.retain(|p| !removed.contains(p.contact_id.as_str()));

        let updated: HashMap<&str, ParticipantStatus> = self
            .updated
            .iter()
            .map(|p| (p.contact_id.as_str(), p.status))
            .collect();
        for participant in participants.iter_mut() {
            if let Some(status) = updated.get(participant.contact_id.as_str()) {
                participant.status = *status;
            }
        }

        participants.extend(self.added.iter().cloned());
    }
}

/// Deduplicate the incoming list (last occurrence wins, first-seen order kept)
/// and force the organizer to `Accepted`.
fn desired_participants(incoming: &[Participant], organizer_id: &str) -> Vec<Participant> {
    let mut desired: Vec<Participant> = Vec::with_capacity(incoming.len() + 1);
    let mut index: HashMap<&str, usize> = HashMap::new();

    for participant in incoming {
        let seen = index.get(participant.contact_id.as_str()).copied();
        match seen {
            Some(i) => desired[i].status = participant.status,
            None => {
                index.insert(participant.contact_id.as_str(), desired.len());
                desired.push(participant.clone());
            }
        }
    }

    match index.get(organizer_id).copied() {
        Some(i) => desired[i].status = ParticipantStatus::Accepted,
        None => desired.push(Participant::new(organizer_id, ParticipantStatus::Accepted)),
    }

    desired
}

/// Compute the diff for `meeting`. Returns `None` when `organizer_id` is not
/// the meeting's creator.
pub fn plan_reconciliation(
    meeting: &Meeting,
    incoming: &[Participant],
    organizer_id: &str,
) -> Option<ParticipantDiff> {
    if meeting.creator_id != organizer_id {
        return None;
    }

    let desired = desired_participants(incoming, organizer_id);
    let wanted: HashMap<&str, ParticipantStatus> = desired
        .iter()
        .map(|p| (p.contact_id.as_str(), p.status))
        .collect();

    let mut diff = ParticipantDiff::default();
    let mut consumed: HashSet<&str> = HashSet::new();

    for existing in &meeting.participants {
        let contact = existing.contact_id.as_str();
        if !consumed.insert(contact) {
            continue;
        }

        if contact == organizer_id {
            if existing.status != ParticipantStatus::Accepted {
                diff.updated
                    .push(Participant::new(contact, ParticipantStatus::Accepted));
            }
            continue;
        }

        match wanted.get(contact) {
            None => diff.removed.push(contact.to_string()),
            Some(&status) if status != existing.status => {
                diff.updated.push(Participant::new(contact, status));
            }
            Some(_) => {}
        }
    }

    // New participants. The organizer only lands here when the stored set
    // had lost it, in which case re-adding restores the invariant.
    diff.added = desired
        .into_iter()
        .filter(|p| !consumed.contains(p.contact_id.as_str()))
        .collect();

    Some(diff)
}

/// Reconcile `meeting.participants` in place. Returns `false` without
/// touching the meeting when `organizer_id` is not its creator.
pub fn reconcile(meeting: &mut Meeting, incoming: &[Participant], organizer_id: &str) -> bool {
    match plan_reconciliation(meeting, incoming, organizer_id) {
        Some(diff) => {
            diff.apply(&mut meeting.participants);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    use crate::schema::ParticipantStatus::{Accepted, Declined, Pending};

    fn meeting(participants: Vec<Participant>) -> Meeting {
        let now = Utc::now();
        Meeting {
            id: 1,
            creator_id: "org".into(),
            title: "Planning".into(),
            description: None,
            starts_at: now,
            ends_at: now,
            created_at: now,
            participants,
        }
    }

    fn statuses(pairs: &[(&str, ParticipantStatus)]) -> BTreeMap<String, ParticipantStatus> {
        pairs.iter().map(|(c, s)| (c.to_string(), *s)).collect()
    }

    #[test]
    fn test_update_and_add() {
        let mut m = meeting(vec![
            Participant::new("org", Accepted),
            Participant::new("p1", Pending),
        ]);
        let incoming = vec![Participant::new("p1", Accepted), Participant::new("p2", Declined)];

        assert!(reconcile(&mut m, &incoming, "org"));
        assert_eq!(
            m.statuses(),
            statuses(&[("org", Accepted), ("p1", Accepted), ("p2", Declined)])
        );
    }

    #[test]
    fn test_empty_incoming_leaves_only_organizer() {
        let mut m = meeting(vec![
            Participant::new("org", Accepted),
            Participant::new("p1", Pending),
        ]);
        assert!(reconcile(&mut m, &[], "org"));
        assert_eq!(m.statuses(), statuses(&[("org", Accepted)]));
    }

    #[test]
    fn test_organizer_status_is_pinned() {
        let mut m = meeting(vec![Participant::new("org", Declined)]);
        let incoming = vec![Participant::new("org", Declined), Participant::pending("p1")];

        let diff = plan_reconciliation(&m, &incoming, "org").unwrap();
        assert_eq!(diff.updated, vec![Participant::new("org", Accepted)]);
        assert_eq!(diff.added, vec![Participant::pending("p1")]);
        assert!(diff.removed.is_empty());

        assert!(reconcile(&mut m, &incoming, "org"));
        assert_eq!(m.statuses(), statuses(&[("org", Accepted), ("p1", Pending)]));
    }

    #[test]
    fn test_missing_organizer_is_restored() {
        let mut m = meeting(vec![Participant::pending("p1")]);
        assert!(reconcile(&mut m, &[Participant::pending("p1")], "org"));
        assert_eq!(m.statuses(), statuses(&[("org", Accepted), ("p1", Pending)]));
    }

    #[test]
    fn test_duplicates_last_write_wins() {
        let mut m = meeting(vec![Participant::new("org", Accepted)]);
        let incoming = vec![
            Participant::new("p1", Accepted),
            Participant::new("p2", Pending),
            Participant::new("p1", Declined),
        ];
        assert!(reconcile(&mut m, &incoming, "org"));
        assert_eq!(m.participants.len(), 3);
        assert_eq!(m.participant("p1").unwrap().status, Declined);
    }

    #[test]
    fn test_non_organizer_cannot_reconcile() {
        let mut m = meeting(vec![
            Participant::new("org", Accepted),
            Participant::new("p1", Pending),
        ]);
        let before = m.statuses();
        assert!(plan_reconciliation(&m, &[], "p1").is_none());
        assert!(!reconcile(&mut m, &[], "p1"));
        assert_eq!(m.statuses(), before);
    }

    #[test]
    fn test_unchanged_set_yields_empty_diff() {
        let m = meeting(vec![
            Participant::new("org", Accepted),
            Participant::new("p1", Declined),
        ]);
        let diff = plan_reconciliation(&m, &[Participant::new("p1", Declined)], "org").unwrap();
        assert!(diff.is_empty());
    }
}
