//! Shared cross-platform state types.

/// Unified sync state used by desktop, mobile, and CLI clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

/// Snapshot of the engine's observable status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Whether the host reports network connectivity
    pub is_online: bool,
    /// Whether a full sync cycle is running
    pub is_syncing: bool,
    /// Number of queued changes not yet confirmed remotely
    pub pending: usize,
    /// Message of the most recent failed push or sync, cleared on success
    pub last_error: Option<String>,
}

impl SyncStatus {
    /// Collapse the status into the single indicator the UI shows.
    pub const fn state(&self) -> SyncState {
        if !self.is_online {
            SyncState::Offline
        } else if self.is_syncing {
            SyncState::Syncing
        } else if self.last_error.is_some() {
            SyncState::Error
        } else {
            SyncState::Synced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_wins_over_other_flags() {
        let status = SyncStatus {
            is_online: false,
            is_syncing: true,
            pending: 3,
            last_error: Some("boom".to_string()),
        };
        assert_eq!(status.state(), SyncState::Offline);
    }

    #[test]
    fn error_shown_only_when_idle() {
        let mut status = SyncStatus {
            is_online: true,
            last_error: Some("rejected".to_string()),
            ..SyncStatus::default()
        };
        assert_eq!(status.state(), SyncState::Error);

        status.is_syncing = true;
        assert_eq!(status.state(), SyncState::Syncing);

        status.is_syncing = false;
        status.last_error = None;
        assert_eq!(status.state(), SyncState::Synced);
    }
}
