//! Filesystem change events.

use std::fmt;
use std::path::PathBuf;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    /// Moved or renamed. The event path is the destination.
    Moved,
}

impl ChangeKind {
    /// Whether the change can remove a file from the catalog.
    pub fn is_removal(self) -> bool {
        matches!(self, Self::Deleted | Self::Moved)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Moved => "moved",
        })
    }
}

/// A single change to an absolute path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Convert a raw notify event into change events.
    ///
    /// Renames reported as one event carry `[from, to]`; only the destination
    /// is kept. A rename reported from the source side alone is a deletion.
    pub fn from_notify(event: &notify::Event) -> Vec<Self> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                return event
                    .paths
                    .last()
                    .map(|to| vec![Self::new(ChangeKind::Moved, to.clone())])
                    .unwrap_or_default();
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Moved,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Deleted,
            _ => return Vec::new(),
        };

        event
            .paths
            .iter()
            .map(|path| Self::new(kind, path.clone()))
            .collect()
    }
}
