//! The sync decision table.

use filesync_entity::file::FileVersion;
use filesync_entity::sync::SyncStatus;

/// Classify a device's local copy against the file's latest version.
///
/// A latest version without a content hash never matches.
pub fn classify_sync(latest: Option<&FileVersion>, device_id: &str, claimed_hash: &str) -> SyncStatus {
    let Some(latest) = latest else {
        return SyncStatus::FileNotFound;
    };

    let claimed = claimed_hash.trim();
    let matches = latest
        .content_hash
        .as_deref()
        .is_some_and(|hash| hash.eq_ignore_ascii_case(claimed));

    match (matches, latest.origin_device_id == device_id) {
        (true, _) => SyncStatus::Synced,
        (false, true) => SyncStatus::NeedsUpdate,
        (false, false) => SyncStatus::Conflict,
    }
}
