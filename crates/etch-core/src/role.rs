//! Participant roles.
//!
//! The protocol performs no access checks: any peer that can publish to the
//! room can broadcast `clear_all`. Roles exist so callers can gate the UI
//! affordances before invoking the controller.

/// Role of a participant in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParticipantRole {
    /// Owns the session; may clear every stroke
    Host,
    /// Regular participant
    #[default]
    Participant,
}

impl ParticipantRole {
    /// Whether this role may clear the whole canvas.
    pub fn can_clear_all(self) -> bool {
        matches!(self, Self::Host)
    }

    /// Whether this role may delete a stroke drawn by `author_id`.
    ///
    /// Hosts may delete anything; participants only their own strokes.
    pub fn can_delete(self, local_peer_id: &str, author_id: &str) -> bool {
        self.can_clear_all() || local_peer_id == author_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_host_clears() {
        assert!(ParticipantRole::Host.can_clear_all());
        assert!(!ParticipantRole::Participant.can_clear_all());
    }

    #[test]
    fn participants_delete_own_strokes() {
        assert!(ParticipantRole::Participant.can_delete("alice", "alice"));
        assert!(!ParticipantRole::Participant.can_delete("alice", "bob"));
        assert!(ParticipantRole::Host.can_delete("alice", "bob"));
    }
}
