//! Diff engine: file status, line counts, unified hunks, sync direction
//!
//! Everything here is read-only; the diff engine never mutates state or the
//! filesystem. Orientation convention throughout: the **target is the old
//! side and the source is the new side**, so a `+` line always means
//! "present in source but not yet applied to target". Reversing this would
//! silently invert the user-facing meaning of sync direction.

use similar::{ChangeTag, TextDiff};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

use crate::state::DriftKind;

/// Bytes inspected by the binary-content heuristic
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// File-level status of a declared file at one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Nothing to compare on either side
    Ok,
    /// Source present, target absent
    Missing,
    /// Target present, source absent
    Extra,
    /// Both present, at least one side looks binary
    Binary,
    /// Both present and text; consult the line counts to see whether they
    /// actually differ
    Modified,
}

/// Determine the file-level status for a resolved source/target pair.
pub fn file_status(source: &Path, target: &Path) -> FileStatus {
    match (source.exists(), target.exists()) {
        (true, false) => FileStatus::Missing,
        (false, true) => FileStatus::Extra,
        (false, false) => FileStatus::Ok,
        (true, true) => {
            if looks_binary(source) || looks_binary(target) {
                FileStatus::Binary
            } else {
                FileStatus::Modified
            }
        }
    }
}

/// Binary heuristic: a null byte within the first 8 KiB.
///
/// Unreadable files are treated as text; the caller will surface the read
/// error soon enough through other paths.
pub fn looks_binary(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut buf = vec![0u8; BINARY_SNIFF_LEN];
    let mut taken = file.take(BINARY_SNIFF_LEN as u64);
    let Ok(n) = taken.read(&mut buf) else {
        return false;
    };
    buf[..n].contains(&0)
}

/// Added/removed line tallies, the fast path for list views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub added: usize,
    pub removed: usize,
}

impl LineCounts {
    /// Zero added and removed lines means effectively in sync.
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Tally added and removed lines between target (`old`) and source (`new`)
/// text, without building hunks.
pub fn line_counts(old_target: &str, new_source: &str) -> LineCounts {
    let diff = TextDiff::from_lines(old_target, new_source);
    let mut counts = LineCounts::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => counts.added += 1,
            ChangeTag::Delete => counts.removed += 1,
            ChangeTag::Equal => {}
        }
    }
    counts
}

/// Tag of a single rendered diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    Add,
    Remove,
    Context,
}

/// One line of a unified-diff hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub content: String,
}

/// One unified-diff hunk with its `@@` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub header: String,
    pub lines: Vec<DiffLine>,
}

/// Build unified-diff hunks with 3 lines of context.
///
/// The slow path, computed lazily when a detail view opens. `old_target`
/// is the installed copy, `new_source` the canonical source.
pub fn unified_diff(old_target: &str, new_source: &str) -> Vec<DiffHunk> {
    let diff = TextDiff::from_lines(old_target, new_source);
    let mut hunks = Vec::new();

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        let lines = hunk
            .iter_changes()
            .map(|change| DiffLine {
                kind: match change.tag() {
                    ChangeTag::Insert => DiffLineKind::Add,
                    ChangeTag::Delete => DiffLineKind::Remove,
                    ChangeTag::Equal => DiffLineKind::Context,
                },
                content: change.value().trim_end_matches('\n').to_string(),
            })
            .collect();

        hunks.push(DiffHunk {
            header: hunk.header().to_string(),
            lines,
        });
    }
    hunks
}

/// Aggregate recommendation for which way a drifted set should flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Source into targets
    Forward,
    /// Targets back into source
    Pullback,
    /// Some of each
    Both,
    /// Not enough information
    Unknown,
}

/// Timestamp strategy: compare source vs target mtimes across a drifted
/// set. Used when no recorded state is available.
pub fn direction_from_mtimes(pairs: &[(Option<SystemTime>, Option<SystemTime>)]) -> SyncDirection {
    let mut source_newer = false;
    let mut target_newer = false;

    for (source, target) in pairs {
        match (source, target) {
            (Some(s), Some(t)) if s > t => source_newer = true,
            (Some(s), Some(t)) if t > s => target_newer = true,
            _ => {}
        }
    }

    match (source_newer, target_newer) {
        (true, true) => SyncDirection::Both,
        (true, false) => SyncDirection::Forward,
        (false, true) => SyncDirection::Pullback,
        (false, false) => SyncDirection::Unknown,
    }
}

/// Drift-kind strategy, preferred whenever recorded state exists.
pub fn direction_for_drift(kind: DriftKind) -> SyncDirection {
    match kind {
        DriftKind::InSync | DriftKind::SourceChanged => SyncDirection::Forward,
        DriftKind::TargetChanged => SyncDirection::Pullback,
        DriftKind::BothChanged => SyncDirection::Both,
        DriftKind::NeverSynced => SyncDirection::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn status_missing_when_target_absent() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.md");
        fs::write(&source, "content").unwrap();

        assert_eq!(
            file_status(&source, &dir.path().join("absent.md")),
            FileStatus::Missing
        );
    }

    #[test]
    fn status_extra_when_source_absent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tgt.md");
        fs::write(&target, "content").unwrap();

        assert_eq!(
            file_status(&dir.path().join("absent.md"), &target),
            FileStatus::Extra
        );
    }

    #[test]
    fn status_binary_on_null_byte() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.bin");
        let target = dir.path().join("tgt.md");
        fs::write(&source, b"text\0binary").unwrap();
        fs::write(&target, "text").unwrap();

        assert_eq!(file_status(&source, &target), FileStatus::Binary);
    }

    #[test]
    fn status_modified_for_text_pair_even_if_identical() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.md");
        let target = dir.path().join("tgt.md");
        fs::write(&source, "same").unwrap();
        fs::write(&target, "same").unwrap();

        assert_eq!(file_status(&source, &target), FileStatus::Modified);
        assert!(line_counts("same", "same").is_clean());
    }

    #[test]
    fn null_byte_past_sniff_window_is_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late-null");
        let mut content = vec![b'a'; BINARY_SNIFF_LEN];
        content.push(0);
        fs::write(&path, &content).unwrap();

        assert!(!looks_binary(&path));
    }

    #[test]
    fn line_counts_tally_adds_and_removes() {
        let counts = line_counts("a\nb\nc\n", "a\nx\nc\nd\n");
        assert_eq!(
            counts,
            LineCounts {
                added: 2,
                removed: 1
            }
        );
    }

    #[test]
    fn unified_diff_orientation_plus_means_source() {
        // Target lacks the line the source has: must render as Add.
        let hunks = unified_diff("line1\n", "line1\nline2\n");
        assert_eq!(hunks.len(), 1);
        let added: Vec<_> = hunks[0]
            .lines
            .iter()
            .filter(|l| l.kind == DiffLineKind::Add)
            .collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].content, "line2");
    }

    #[test]
    fn unified_diff_identical_text_has_no_hunks() {
        assert!(unified_diff("a\nb\n", "a\nb\n").is_empty());
    }

    #[test]
    fn unified_diff_keeps_three_context_lines() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n";
        let new = "1\n2\n3\n4\nX\n6\n7\n8\n9\n";
        let hunks = unified_diff(old, new);
        assert_eq!(hunks.len(), 1);

        let context = hunks[0]
            .lines
            .iter()
            .filter(|l| l.kind == DiffLineKind::Context)
            .count();
        assert_eq!(context, 6);
        assert!(hunks[0].header.starts_with("@@"));
    }

    #[test]
    fn mtime_direction_all_source_newer_is_forward() {
        let older = UNIX_EPOCH + Duration::from_secs(100);
        let newer = UNIX_EPOCH + Duration::from_secs(200);
        let pairs = vec![(Some(newer), Some(older)), (Some(newer), Some(older))];
        assert_eq!(direction_from_mtimes(&pairs), SyncDirection::Forward);
    }

    #[test]
    fn mtime_direction_mixed_is_both() {
        let older = UNIX_EPOCH + Duration::from_secs(100);
        let newer = UNIX_EPOCH + Duration::from_secs(200);
        let pairs = vec![(Some(newer), Some(older)), (Some(older), Some(newer))];
        assert_eq!(direction_from_mtimes(&pairs), SyncDirection::Both);
    }

    #[test]
    fn mtime_direction_no_timestamps_is_unknown() {
        assert_eq!(
            direction_from_mtimes(&[(None, None), (None, Some(UNIX_EPOCH))]),
            SyncDirection::Unknown
        );
    }

    #[test]
    fn drift_direction_mapping() {
        assert_eq!(
            direction_for_drift(DriftKind::SourceChanged),
            SyncDirection::Forward
        );
        assert_eq!(
            direction_for_drift(DriftKind::TargetChanged),
            SyncDirection::Pullback
        );
        assert_eq!(
            direction_for_drift(DriftKind::BothChanged),
            SyncDirection::Both
        );
        assert_eq!(
            direction_for_drift(DriftKind::NeverSynced),
            SyncDirection::Unknown
        );
        assert_eq!(
            direction_for_drift(DriftKind::InSync),
            SyncDirection::Forward
        );
    }
}
