//! Last-writer-wins resolution between a pulled row and the local row

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::util::parse_timestamp;

/// Outcome of comparing an incoming remote row with the local one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Remote is newer or equally new: overwrite local
    ApplyRemote,
    /// Remote wins but is identical to local; nothing to write
    Unchanged,
    /// Local is strictly newer: leave it untouched
    KeepLocal,
}

/// Timestamp a row is compared by: `updated_at`, else `created_at`.
pub fn comparison_timestamp(row: &Value) -> Option<DateTime<Utc>> {
    row.get("updated_at")
        .and_then(Value::as_str)
        .or_else(|| row.get("created_at").and_then(Value::as_str))
        .and_then(parse_timestamp)
}

/// Decide whether `remote` replaces `local`.
///
/// Ties favour the remote. A row whose timestamp is missing or unreadable on
/// either side also favours the remote, which is authoritative.
pub fn resolve(local: Option<&Value>, remote: &Value) -> Resolution {
    let Some(local) = local else {
        return Resolution::ApplyRemote;
    };

    let remote_wins = match (comparison_timestamp(remote), comparison_timestamp(local)) {
        (Some(remote_at), Some(local_at)) => remote_at >= local_at,
        _ => true,
    };

    if !remote_wins {
        Resolution::KeepLocal
    } else if local == remote {
        Resolution::Unchanged
    } else {
        Resolution::ApplyRemote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const T0: &str = "2024-01-01T00:00:00.000Z";
    const T1: &str = "2024-01-02T00:00:00.000Z";

    #[test]
    fn missing_local_applies_remote() {
        let remote = json!({"id": "a", "updated_at": T0});
        assert_eq!(resolve(None, &remote), Resolution::ApplyRemote);
    }

    #[test]
    fn newer_remote_wins() {
        let local = json!({"id": "a", "title": "old", "updated_at": T0});
        let remote = json!({"id": "a", "title": "new", "updated_at": T1});
        assert_eq!(resolve(Some(&local), &remote), Resolution::ApplyRemote);
    }

    #[test]
    fn older_remote_loses() {
        let local = json!({"id": "a", "title": "local", "updated_at": T1});
        let remote = json!({"id": "a", "title": "remote", "updated_at": T0});
        assert_eq!(resolve(Some(&local), &remote), Resolution::KeepLocal);
    }

    #[test]
    fn tie_favours_remote() {
        let local = json!({"id": "a", "title": "local", "updated_at": T0});
        let remote = json!({"id": "a", "title": "remote", "updated_at": T0});
        assert_eq!(resolve(Some(&local), &remote), Resolution::ApplyRemote);
    }

    #[test]
    fn identical_rows_are_unchanged() {
        let row = json!({"id": "a", "title": "same", "updated_at": T0});
        assert_eq!(resolve(Some(&row.clone()), &row), Resolution::Unchanged);
    }

    #[test]
    fn falls_back_to_created_at() {
        let local = json!({"id": "a", "created_at": T1});
        let remote = json!({"id": "a", "created_at": T0, "file_name": "x"});
        assert_eq!(resolve(Some(&local), &remote), Resolution::KeepLocal);
    }

    #[test]
    fn unreadable_timestamps_favour_remote() {
        let local = json!({"id": "a", "updated_at": "not a date"});
        let remote = json!({"id": "a", "updated_at": T0});
        assert_eq!(resolve(Some(&local), &remote), Resolution::ApplyRemote);
    }

    #[test]
    fn compares_instants_not_text() {
        // Same instant as T1 written with an offset; text order would call it older
        let local = json!({"id": "a", "title": "local", "updated_at": T1});
        let remote = json!({"id": "a", "title": "remote", "updated_at": "2024-01-01T22:00:00.000-02:00"});
        assert_eq!(resolve(Some(&local), &remote), Resolution::ApplyRemote);
    }
}
