//! Classification of raw notify events
//!
//! Only two kinds of events can introduce a new file into the watched
//! directory: a creation and the destination half of a rename.

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::fmt;
use std::path::PathBuf;

/// How a candidate file appeared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Created,
    MovedTo,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::MovedTo => f.write_str("moved"),
        }
    }
}

/// A path that may be a newly arrived file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub kind: CandidateKind,
}

/// Extract candidate files from a notify event
///
/// Directory creations are skipped. On Linux a rename produces `From`, `To`
/// and `Both` notifications; only `To` is used so one move yields one
/// candidate. Backends that cannot tell the halves of a rename apart report
/// `Any`, which counts as a move-in for paths that currently exist.
pub fn candidates(event: &Event) -> Vec<Candidate> {
    let kind = match event.kind {
        EventKind::Create(CreateKind::Folder) => return Vec::new(),
        EventKind::Create(_) => CandidateKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => CandidateKind::MovedTo,
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            return event
                .paths
                .iter()
                .filter(|path| path.is_file())
                .map(|path| Candidate {
                    path: path.clone(),
                    kind: CandidateKind::MovedTo,
                })
                .collect();
        }
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|path| !path.is_dir())
        .map(|path| Candidate {
            path: path.clone(),
            kind,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, RemoveKind};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_file_creation_is_candidate() {
        let found = candidates(&event(
            EventKind::Create(CreateKind::File),
            &["/in/test_1.txt"],
        ));
        assert_eq!(
            found,
            vec![Candidate {
                path: PathBuf::from("/in/test_1.txt"),
                kind: CandidateKind::Created,
            }]
        );
    }

    #[test]
    fn test_folder_creation_ignored() {
        let found = candidates(&event(
            EventKind::Create(CreateKind::Folder),
            &["/in/test_1.txt"],
        ));
        assert!(found.is_empty());
    }

    #[test]
    fn test_rename_destination_is_candidate() {
        let found = candidates(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/in/test_2.txt"],
        ));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, CandidateKind::MovedTo);
    }

    #[test]
    fn test_rename_source_and_pair_ignored() {
        let from = candidates(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/in/test_3.txt"],
        ));
        let both = candidates(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/tmp/test_3.txt", "/in/test_3.txt"],
        ));
        assert!(from.is_empty());
        assert!(both.is_empty());
    }

    #[test]
    fn test_ambiguous_rename_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("test_4.txt");
        std::fs::write(&present, "x").unwrap();
        let gone = dir.path().join("test_5.txt");

        let mut raw = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)));
        raw = raw.add_path(gone).add_path(present.clone());

        let found = candidates(&raw);
        assert_eq!(
            found,
            vec![Candidate {
                path: present,
                kind: CandidateKind::MovedTo,
            }]
        );
    }

    #[test]
    fn test_writes_and_removals_ignored() {
        assert!(candidates(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/in/test_6.txt"],
        ))
        .is_empty());
        assert!(candidates(&event(
            EventKind::Remove(RemoveKind::File),
            &["/in/test_6.txt"],
        ))
        .is_empty());
    }
}
