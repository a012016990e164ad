use crate::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// What to do with a line range that reaches past the end of the file.
/// Explicit by configuration, never silently wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Clamp `end_line` to the file length.
    Clamp,
    /// Reject the request with a range error.
    Reject,
}

/// Resolves repo-relative paths strictly under the repository root and
/// returns literal line ranges, preserving the file's own terminators.
pub struct FileEvidenceReader {
    root: PathBuf,
    range_policy: RangePolicy,
}

impl FileEvidenceReader {
    pub fn new(root: impl AsRef<Path>, range_policy: RangePolicy) -> Result<Self, ToolError> {
        let root = root.as_ref().canonicalize().map_err(|e| {
            ToolError::Internal(format!("repository root is not accessible: {e}"))
        })?;
        Ok(Self { root, range_policy })
    }

    /// Read the inclusive 1-based line range `[start_line, end_line]` of a
    /// repo-relative path, exactly as stored on disk.
    pub async fn read_lines(
        &self,
        rel_path: &str,
        start_line: usize,
        end_line: usize,
    ) -> Result<(String, usize), ToolError> {
        if start_line == 0 || end_line == 0 {
            return Err(ToolError::Validation(
                "line numbers are 1-based".to_string(),
            ));
        }
        if start_line > end_line {
            return Err(ToolError::Validation(format!(
                "invalid range: start_line {start_line} > end_line {end_line}"
            )));
        }

        let abs = self.resolve(rel_path)?;
        let bytes = tokio::fs::read(&abs)
            .await
            .map_err(|_| ToolError::NotFound(format!("no such file: {rel_path}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|_| ToolError::Validation(format!("not a text file: {rel_path}")))?;

        // split_inclusive keeps each line's own terminator (\n or \r\n).
        let lines: Vec<&str> = content.split_inclusive('\n').collect();

        if start_line > lines.len() {
            return Err(ToolError::NotFound(format!(
                "range starts past end of file: {rel_path} has {} line(s)",
                lines.len()
            )));
        }
        let end_line = if end_line > lines.len() {
            match self.range_policy {
                RangePolicy::Clamp => lines.len(),
                RangePolicy::Reject => {
                    return Err(ToolError::NotFound(format!(
                        "range exceeds file length: {rel_path} has {} line(s)",
                        lines.len()
                    )));
                }
            }
        } else {
            end_line
        };

        let text: String = lines[start_line - 1..end_line].concat();
        Ok((text, end_line))
    }

    /// Resolve a repo-relative path to an absolute path strictly under the
    /// root. Absolute inputs, `..` components and symlink escapes are
    /// rejected before any read, leaking only the rejected relative path.
    fn resolve(&self, rel_path: &str) -> Result<PathBuf, ToolError> {
        let candidate = Path::new(rel_path);
        if candidate.is_absolute() {
            return Err(ToolError::Security(format!(
                "absolute paths are not allowed: {rel_path}"
            )));
        }
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(ToolError::Security(format!(
                        "path escapes repository root: {rel_path}"
                    )));
                }
            }
        }

        let joined = self.root.join(candidate);
        // Canonicalize to catch symlinks pointing outside the root.
        let resolved = joined
            .canonicalize()
            .map_err(|_| ToolError::NotFound(format!("no such file: {rel_path}")))?;
        if !resolved.starts_with(&self.root) {
            return Err(ToolError::Security(format!(
                "path escapes repository root: {rel_path}"
            )));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_protocol::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn reader(dir: &TempDir, policy: RangePolicy) -> FileEvidenceReader {
        FileEvidenceReader::new(dir.path(), policy).unwrap()
    }

    #[tokio::test]
    async fn returns_exact_inclusive_range_with_terminators() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("four.txt"), "one\ntwo\nthree\nfour\n").unwrap();

        let (text, end) = reader(&dir, RangePolicy::Reject)
            .read_lines("four.txt", 2, 3)
            .await
            .unwrap();
        assert_eq!(text, "two\nthree\n");
        assert_eq!(end, 3);
    }

    #[tokio::test]
    async fn preserves_crlf_terminators() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("win.txt"), "a\r\nb\r\nc\r\n").unwrap();

        let (text, _) = reader(&dir, RangePolicy::Reject)
            .read_lines("win.txt", 1, 2)
            .await
            .unwrap();
        assert_eq!(text, "a\r\nb\r\n");
    }

    #[tokio::test]
    async fn last_line_without_terminator_is_verbatim() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tail.txt"), "a\nb").unwrap();

        let (text, _) = reader(&dir, RangePolicy::Reject)
            .read_lines("tail.txt", 1, 2)
            .await
            .unwrap();
        assert_eq!(text, "a\nb");
    }

    #[tokio::test]
    async fn dotdot_traversal_is_a_security_error() {
        let dir = TempDir::new().unwrap();
        let err = reader(&dir, RangePolicy::Reject)
            .read_lines("../../etc/passwd", 1, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
    }

    #[tokio::test]
    async fn absolute_path_is_a_security_error() {
        let dir = TempDir::new().unwrap();
        let err = reader(&dir, RangePolicy::Reject)
            .read_lines("/etc/passwd", 1, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escape_is_a_security_error() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret\n").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            dir.path().join("link.txt"),
        )
        .unwrap();

        let err = reader(&dir, RangePolicy::Reject)
            .read_lines("link.txt", 1, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
    }

    #[tokio::test]
    async fn inverted_range_is_validation_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f.txt"), "a\n").unwrap();
        let err = reader(&dir, RangePolicy::Reject)
            .read_lines("f.txt", 3, 2)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn over_length_range_rejected_or_clamped_per_policy() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f.txt"), "a\nb\n").unwrap();

        let err = reader(&dir, RangePolicy::Reject)
            .read_lines("f.txt", 1, 10)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let (text, end) = reader(&dir, RangePolicy::Clamp)
            .read_lines("f.txt", 1, 10)
            .await
            .unwrap();
        assert_eq!(text, "a\nb\n");
        assert_eq!(end, 2);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = reader(&dir, RangePolicy::Reject)
            .read_lines("ghost.rs", 1, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
