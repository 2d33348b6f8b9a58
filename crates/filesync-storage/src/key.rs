//! Storage key derivation.

use uuid::Uuid;

/// Derive the blob store key for one version of a file uploaded by a device.
///
/// The key is a pure function of its inputs. Path segments of `file_name`
/// are kept, while empty, `.` and `..` segments are dropped so a key can
/// never escape its device prefix. The content hash is the last segment, so
/// a re-upload with different bytes never overwrites an earlier version.
pub fn storage_key(user_id: Uuid, device_id: &str, file_name: &str, content_hash: &str) -> String {
    let name = sanitize_segments(file_name);
    let device = sanitize_segments(device_id).replace('/', "_");
    let hash = sanitize_segments(content_hash).replace('/', "_");
    format!("users/{user_id}/devices/{device}/{name}/{hash}")
}

fn sanitize_segments(raw: &str) -> String {
    raw.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let user = Uuid::new_v4();
        assert_eq!(
            storage_key(user, "laptop", "docs/report.txt", "ab12"),
            storage_key(user, "laptop", "docs/report.txt", "ab12")
        );
        assert_eq!(
            storage_key(user, "laptop", "report.txt", "ab12"),
            format!("users/{user}/devices/laptop/report.txt/ab12")
        );
    }

    #[test]
    fn test_key_differs_per_device() {
        let user = Uuid::new_v4();
        assert_ne!(
            storage_key(user, "laptop", "report.txt", "ab12"),
            storage_key(user, "phone", "report.txt", "ab12")
        );
    }

    #[test]
    fn test_key_differs_per_content() {
        let user = Uuid::new_v4();
        assert_ne!(
            storage_key(user, "laptop", "report.txt", "ab12"),
            storage_key(user, "laptop", "report.txt", "cd34")
        );
    }

    #[test]
    fn test_traversal_segments_are_dropped() {
        let user = Uuid::new_v4();
        assert_eq!(
            storage_key(user, "../x", "../../etc/passwd", "ff"),
            format!("users/{user}/devices/x/etc/passwd/ff")
        );
        assert_eq!(
            storage_key(user, "a", "C:\\work\\.\\plan.md", "../ff"),
            format!("users/{user}/devices/a/C:/work/plan.md/ff")
        );
    }
}
