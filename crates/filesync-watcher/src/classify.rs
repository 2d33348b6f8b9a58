//! Classification of raw filesystem notifications.

use std::path::Path;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use uuid::Uuid;

use filesync_core::events::{ChangeEvent, ChangeType};

/// Map a raw notification kind to a change type. Kinds without a semantic
/// counterpart (access, metadata-only, unknown) yield `None`.
pub fn classify(kind: &EventKind) -> Option<ChangeType> {
    match kind {
        EventKind::Create(_) => Some(ChangeType::Created),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Some(ChangeType::Modified),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeType::Renamed),
        EventKind::Remove(_) => Some(ChangeType::Deleted),
        EventKind::Modify(ModifyKind::Metadata(_) | ModifyKind::Other)
        | EventKind::Access(_)
        | EventKind::Any
        | EventKind::Other => None,
    }
}

/// Whether the base name of `path` starts with the hidden-file `marker`.
pub fn is_hidden(path: &Path, marker: &str) -> bool {
    !marker.is_empty()
        && path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with(marker))
            .unwrap_or(false)
}

/// A file id that is the same every time a user's device reports `path`,
/// so all changes to one path share an ordering key.
pub fn stable_file_id(user_id: Uuid, path: &Path) -> Uuid {
    let name = format!("filesync:{user_id}:{}", path.to_string_lossy());
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

/// Turns raw notifications into change events stamped with a session's
/// user and device.
#[derive(Debug, Clone)]
pub struct EventTranslator {
    user_id: Uuid,
    device_id: String,
    hidden_prefix: String,
}

impl EventTranslator {
    /// Create a translator for one session.
    pub fn new(user_id: Uuid, device_id: impl Into<String>, hidden_prefix: impl Into<String>) -> Self {
        Self {
            user_id,
            device_id: device_id.into(),
            hidden_prefix: hidden_prefix.into(),
        }
    }

    /// Translate one raw notification into zero or more change events.
    ///
    /// A two-path rename becomes a single event for the destination path.
    pub fn translate(&self, event: &notify::Event) -> Vec<ChangeEvent> {
        let Some(change_type) = classify(&event.kind) else {
            return Vec::new();
        };

        let paths: Vec<&Path> = match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
                vec![event.paths[event.paths.len() - 1].as_path()]
            }
            _ => event.paths.iter().map(|p| p.as_path()).collect(),
        };

        paths
            .into_iter()
            .filter(|path| !is_hidden(path, &self.hidden_prefix))
            .map(|path| {
                ChangeEvent::new(
                    stable_file_id(self.user_id, path),
                    path.to_string_lossy(),
                    change_type,
                    self.user_id,
                    self.device_id.clone(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::path::PathBuf;

    fn raw(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    fn all_semantic_kinds() -> Vec<EventKind> {
        vec![
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            EventKind::Remove(RemoveKind::File),
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
        ]
    }

    #[test]
    fn test_classify_semantic_kinds() {
        let expected = [
            ChangeType::Created,
            ChangeType::Modified,
            ChangeType::Deleted,
            ChangeType::Renamed,
        ];
        for (kind, want) in all_semantic_kinds().iter().zip(expected) {
            assert_eq!(classify(kind), Some(want));
        }
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Any)),
            Some(ChangeType::Modified)
        );
    }

    #[test]
    fn test_classify_drops_other_kinds() {
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            None
        );
        assert_eq!(classify(&EventKind::Any), None);
        assert_eq!(classify(&EventKind::Other), None);
    }

    #[test]
    fn test_hidden_files_never_produce_events() {
        let translator = EventTranslator::new(Uuid::new_v4(), "laptop", ".");
        for kind in all_semantic_kinds() {
            let events = translator.translate(&raw(kind, &["/home/u/docs/.secret.swp"]));
            assert!(events.is_empty(), "hidden file produced an event for {kind:?}");
        }
    }

    #[test]
    fn test_hidden_directory_does_not_hide_visible_file() {
        assert!(!is_hidden(Path::new("/home/u/.config/app.toml"), "."));
        assert!(is_hidden(Path::new("/home/u/.bashrc"), "."));
        assert!(!is_hidden(Path::new("/home/u/.bashrc"), ""));
    }

    #[test]
    fn test_translate_stamps_session_identity() {
        let user = Uuid::new_v4();
        let translator = EventTranslator::new(user, "laptop", ".");
        let events = translator.translate(&raw(
            EventKind::Create(CreateKind::File),
            &["/home/u/docs/report.txt"],
        ));
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.change_type, ChangeType::Created);
        assert_eq!(event.origin_user_id, user);
        assert_eq!(event.origin_device_id, "laptop");
        assert_eq!(event.file_path, "/home/u/docs/report.txt");
        assert_eq!(
            event.file_id,
            stable_file_id(user, Path::new("/home/u/docs/report.txt"))
        );
    }

    #[test]
    fn test_two_path_rename_reports_destination() {
        let translator = EventTranslator::new(Uuid::new_v4(), "laptop", ".");
        let events = translator.translate(&raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/d/old.txt", "/d/new.txt"],
        ));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change_type, ChangeType::Renamed);
        assert_eq!(events[0].file_path, "/d/new.txt");
    }

    #[test]
    fn test_stable_file_id_depends_on_user_and_path() {
        let user = Uuid::new_v4();
        let a = stable_file_id(user, Path::new("/d/a.txt"));
        assert_eq!(a, stable_file_id(user, Path::new("/d/a.txt")));
        assert_ne!(a, stable_file_id(user, Path::new("/d/b.txt")));
        assert_ne!(a, stable_file_id(Uuid::new_v4(), Path::new("/d/a.txt")));
    }
}
