//! Raw filesystem operations behind the tool surface.
//!
//! Every path reaching this module has already been resolved by
//! [`crate::sandbox::PathGuard`]; nothing here re-checks containment.
//! Files handled by the agent are small (source code, notes), so
//! synchronous `std::fs` is fine here.

use std::fs;
use std::path::Path;

use super::ToolError;

/// Maximum number of directory entries returned by a listing.
const MAX_DIR_ENTRIES: usize = 50;

fn read_to_string(path: &Path) -> Result<String, ToolError> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::NotFound(path.display().to_string())
        } else {
            ToolError::Io(e)
        }
    })
}

/// Reads a file and returns its content with 1-indexed line numbers.
///
/// When a range is given, both bounds are inclusive and 1-indexed;
/// lines outside the file are simply absent from the output.
pub fn view_file(path: &Path, range: Option<(usize, usize)>) -> Result<String, ToolError> {
    let content = read_to_string(path)?;

    let (start, end) = range.unwrap_or((1, usize::MAX));
    if start == 0 {
        return Err(ToolError::InvalidArguments(
            "line numbers are 1-indexed; start_line must be >= 1".to_string(),
        ));
    }

    let lines: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(n, _)| *n >= start && *n <= end)
        .map(|(n, line)| format!("{n}: {line}"))
        .collect();

    Ok(lines.join("\n"))
}

/// Lists a directory's non-hidden immediate entries, sorted
/// lexicographically and capped at [`MAX_DIR_ENTRIES`].
///
/// Directories are rendered with a trailing `/`.
pub fn list_dir(path: &Path) -> Result<String, ToolError> {
    let mut names: Vec<String> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            if entry.path().is_dir() {
                Some(format!("{name}/"))
            } else {
                Some(name)
            }
        })
        .collect();

    names.sort();
    let total = names.len();
    names.truncate(MAX_DIR_ENTRIES);

    let mut listing = names.join("\n");
    if total > MAX_DIR_ENTRIES {
        listing.push_str(&format!(
            "\n({} more entries not shown)",
            total - MAX_DIR_ENTRIES
        ));
    }
    Ok(listing)
}

/// Writes full content to a file, truncating or creating the target.
pub fn write_file(path: &Path, content: &str) -> Result<(), ToolError> {
    fs::write(path, content)?;
    Ok(())
}

/// Replaces `old` with `new`, succeeding only if `old` occurs in the
/// file exactly once.
///
/// Zero matches and multiple matches are both rejected: a silent
/// multi-replace would apply the model's edit somewhere it did not
/// intend.
pub fn edit_file(path: &Path, old: &str, new: &str) -> Result<(), ToolError> {
    let content = read_to_string(path)?;

    let occurrences = content.matches(old).count();
    if occurrences != 1 {
        return Err(ToolError::AmbiguousEdit(occurrences));
    }

    fs::write(path, content.replacen(old, new, 1))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_file_numbers_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "alpha\nbeta\ngamma").unwrap();

        assert_eq!(view_file(&file, None).unwrap(), "1: alpha\n2: beta\n3: gamma");
    }

    #[test]
    fn test_view_file_range_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "a\nb\nc\nd\ne").unwrap();

        assert_eq!(view_file(&file, Some((2, 4))).unwrap(), "2: b\n3: c\n4: d");
    }

    #[test]
    fn test_view_file_range_past_eof() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "a\nb").unwrap();

        assert_eq!(view_file(&file, Some((2, 10))).unwrap(), "2: b");
    }

    #[test]
    fn test_view_file_zero_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "a").unwrap();

        assert!(matches!(
            view_file(&file, Some((0, 3))),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_write_then_view_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");

        write_file(&file, "hello\nworld").unwrap();
        assert_eq!(view_file(&file, None).unwrap(), "1: hello\n2: world");
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello\nworld");
    }

    #[test]
    fn test_edit_exactly_one_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "ab c").unwrap();

        edit_file(&file, "ab", "new").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "new c");
    }

    #[test]
    fn test_edit_rejects_multiple_occurrences() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "ab ab").unwrap();

        assert!(matches!(
            edit_file(&file, "ab", "new"),
            Err(ToolError::AmbiguousEdit(2))
        ));
        // File untouched after rejection
        assert_eq!(fs::read_to_string(&file).unwrap(), "ab ab");
    }

    #[test]
    fn test_edit_rejects_zero_occurrences() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "hello").unwrap();

        assert!(matches!(
            edit_file(&file, "absent", "new"),
            Err(ToolError::AmbiguousEdit(0))
        ));
    }

    #[test]
    fn test_list_dir_sorted_capped_no_hidden() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..55 {
            fs::write(dir.path().join(format!("file_{i:03}.txt")), "").unwrap();
        }
        fs::write(dir.path().join(".hidden"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = list_dir(dir.path()).unwrap();
        let lines: Vec<&str> = listing.lines().collect();

        // 50 entries plus the truncation note
        assert_eq!(lines.len(), 51);
        assert!(lines.last().unwrap().contains("6 more entries"));
        assert!(!listing.contains(".hidden"));
        assert_eq!(lines[0], "file_000.txt");

        let mut sorted = lines[..50].to_vec();
        sorted.sort();
        assert_eq!(sorted, lines[..50].to_vec());
    }

    #[test]
    fn test_list_dir_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("file.txt"), "").unwrap();

        assert_eq!(list_dir(dir.path()).unwrap(), "file.txt\nsub/");
    }
}
