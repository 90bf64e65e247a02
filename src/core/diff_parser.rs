use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const DEV_NULL: &str = "/dev/null";

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap());

/// One file section of a unified diff.
///
/// `to` is `None` when the file was deleted, `from` is `None` when it was added.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiffFile {
    pub from: Option<String>,
    pub to: Option<String>,
    pub hunks: Vec<DiffHunk>,
    pub additions: usize,
    pub deletions: usize,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_binary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffHunk {
    pub header: String,
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    pub changes: Vec<DiffLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffLine {
    pub old_line_no: Option<usize>,
    pub new_line_no: Option<usize>,
    pub change_type: ChangeType,
    /// The line as it appears in the diff, marker included.
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ChangeType {
    Added,
    Removed,
    Context,
}

impl DiffFile {
    pub fn target_path(&self) -> Option<&str> {
        self.to.as_deref()
    }

    /// Path used for display and logging, falling back to the old side.
    pub fn display_path(&self) -> &str {
        self.to
            .as_deref()
            .or(self.from.as_deref())
            .unwrap_or(DEV_NULL)
    }
}

impl DiffLine {
    pub fn resolved_line_no(&self) -> Option<usize> {
        self.new_line_no.or(self.old_line_no)
    }
}

/// Decodes a path git wrote in C-quoted form (`"caf\303\251.txt"`).
/// Unquoted paths come back unchanged.
fn unquote_path(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut input = inner.bytes().peekable();
    while let Some(byte) = input.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        match input.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0c),
            Some(b'v') => bytes.push(0x0b),
            Some(digit @ b'0'..=b'7') => {
                let mut value = u32::from(digit - b'0');
                for _ in 0..2 {
                    match input.peek() {
                        Some(&next @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(next - b'0');
                            input.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

pub struct DiffParser;

impl DiffParser {
    pub fn parse_unified_diff(diff_content: &str) -> Result<Vec<DiffFile>> {
        let mut diffs = Vec::new();
        let lines: Vec<&str> = diff_content.lines().collect();
        let mut i = 0;

        while i < lines.len() {
            if lines[i].starts_with("diff --git") {
                let diff = Self::parse_single_file_diff(&lines, &mut i)?;
                diffs.push(diff);
            } else if lines[i].starts_with("--- ")
                && i + 1 < lines.len()
                && lines[i + 1].starts_with("+++ ")
            {
                let diff = Self::parse_simple_file_diff(&lines, &mut i)?;
                diffs.push(diff);
            } else {
                i += 1;
            }
        }

        Ok(diffs)
    }

    fn parse_single_file_diff(lines: &[&str], i: &mut usize) -> Result<DiffFile> {
        let (from, to) = Self::extract_git_header_paths(lines[*i])?;
        let mut file = DiffFile {
            from: Some(from),
            to: Some(to),
            ..DiffFile::default()
        };
        *i += 1;

        while *i < lines.len() && !lines[*i].starts_with("@@") && !lines[*i].starts_with("diff --git") {
            let line = lines[*i];
            if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
                file.is_binary = true;
            } else if line.starts_with("new file mode") {
                file.is_new = true;
                file.from = None;
            } else if line.starts_with("deleted file mode") {
                file.is_deleted = true;
                file.to = None;
            } else if let Some(path) = line.strip_prefix("rename from ") {
                file.from = Some(unquote_path(path.trim()));
            } else if let Some(path) = line.strip_prefix("rename to ") {
                file.to = Some(unquote_path(path.trim()));
            } else if line.starts_with("--- ") {
                file.from = Self::extract_path_from_header(line, "--- ")?;
            } else if line.starts_with("+++ ") {
                file.to = Self::extract_path_from_header(line, "+++ ")?;
            }
            *i += 1;
        }

        file.is_new |= file.from.is_none();
        file.is_deleted |= file.to.is_none();

        while *i < lines.len() && lines[*i].starts_with("@@") {
            let hunk = Self::parse_hunk(lines, i)?;
            Self::tally(&mut file, &hunk);
            file.hunks.push(hunk);
        }

        Ok(file)
    }

    fn parse_simple_file_diff(lines: &[&str], i: &mut usize) -> Result<DiffFile> {
        let from = Self::extract_path_from_header(lines[*i], "--- ")?;
        let to = Self::extract_path_from_header(lines[*i + 1], "+++ ")?;
        let mut file = DiffFile {
            is_new: from.is_none(),
            is_deleted: to.is_none(),
            from,
            to,
            ..DiffFile::default()
        };
        *i += 2;

        while *i < lines.len()
            && !lines[*i].starts_with("diff --git")
            && !(lines[*i].starts_with("--- ")
                && *i + 1 < lines.len()
                && lines[*i + 1].starts_with("+++ "))
        {
            if lines[*i].starts_with("Binary files") {
                file.is_binary = true;
            }
            if lines[*i].starts_with("@@") {
                let hunk = Self::parse_hunk(lines, i)?;
                Self::tally(&mut file, &hunk);
                file.hunks.push(hunk);
            } else {
                *i += 1;
            }
        }

        Ok(file)
    }

    fn tally(file: &mut DiffFile, hunk: &DiffHunk) {
        for change in &hunk.changes {
            match change.change_type {
                ChangeType::Added => file.additions += 1,
                ChangeType::Removed => file.deletions += 1,
                ChangeType::Context => {}
            }
        }
    }

    fn extract_git_header_paths(line: &str) -> Result<(String, String)> {
        let rest = line
            .strip_prefix("diff --git ")
            .ok_or_else(|| anyhow::anyhow!("Invalid diff header: {}", line))?;
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(a), Some(b)) => {
                let (a, b) = (unquote_path(a), unquote_path(b));
                Ok((
                    a.strip_prefix("a/").unwrap_or(&a).to_string(),
                    b.strip_prefix("b/").unwrap_or(&b).to_string(),
                ))
            }
            _ => anyhow::bail!("Invalid diff header: {}", line),
        }
    }

    fn extract_path_from_header(line: &str, prefix: &str) -> Result<Option<String>> {
        let raw = line
            .strip_prefix(prefix)
            .ok_or_else(|| anyhow::anyhow!("Invalid file header: {}", line))?
            .trim();
        // Timestamps follow a tab in non-git diffs.
        let path = unquote_path(raw.split('\t').next().unwrap_or(raw).trim());
        if path == DEV_NULL {
            return Ok(None);
        }
        let path = path
            .strip_prefix("a/")
            .or_else(|| path.strip_prefix("b/"))
            .unwrap_or(&path);
        Ok(Some(path.to_string()))
    }

    fn parse_hunk(lines: &[&str], i: &mut usize) -> Result<DiffHunk> {
        let header = lines[*i];
        let (old_start, old_lines, new_start, new_lines) = Self::parse_hunk_header(header)?;
        *i += 1;

        let mut changes = Vec::new();
        let mut old_line = old_start;
        let mut new_line = new_start;
        let mut old_remaining = old_lines;
        let mut new_remaining = new_lines;

        while *i < lines.len() && (old_remaining > 0 || new_remaining > 0) {
            let line = lines[*i];
            if line.starts_with("@@") || line.starts_with("diff --git") {
                break;
            }

            let diff_line = match line.chars().next() {
                Some('+') => {
                    let line_no = new_line;
                    new_line += 1;
                    new_remaining = new_remaining.saturating_sub(1);
                    DiffLine {
                        old_line_no: None,
                        new_line_no: Some(line_no),
                        change_type: ChangeType::Added,
                        content: line.to_string(),
                    }
                }
                Some('-') => {
                    let line_no = old_line;
                    old_line += 1;
                    old_remaining = old_remaining.saturating_sub(1);
                    DiffLine {
                        old_line_no: Some(line_no),
                        new_line_no: None,
                        change_type: ChangeType::Removed,
                        content: line.to_string(),
                    }
                }
                Some('\\') => {
                    *i += 1;
                    continue;
                }
                // Some tools strip the space from empty context lines.
                Some(' ') | None => {
                    let old_no = old_line;
                    let new_no = new_line;
                    old_line += 1;
                    new_line += 1;
                    old_remaining = old_remaining.saturating_sub(1);
                    new_remaining = new_remaining.saturating_sub(1);
                    DiffLine {
                        old_line_no: Some(old_no),
                        new_line_no: Some(new_no),
                        change_type: ChangeType::Context,
                        content: if line.is_empty() { " ".to_string() } else { line.to_string() },
                    }
                }
                Some(_) => break,
            };

            changes.push(diff_line);
            *i += 1;
        }

        // Trailing "no newline" marker after the last counted line.
        if *i < lines.len() && lines[*i].starts_with('\\') {
            *i += 1;
        }

        Ok(DiffHunk {
            header: header.to_string(),
            old_start,
            old_lines,
            new_start,
            new_lines,
            changes,
        })
    }

    fn parse_hunk_header(header: &str) -> Result<(usize, usize, usize, usize)> {
        let caps = HUNK_HEADER
            .captures(header)
            .ok_or_else(|| anyhow::anyhow!("Invalid hunk header: {}", header))?;

        let count = |idx: usize| -> Result<usize> {
            match caps.get(idx) {
                Some(m) => Ok(m.as_str().parse()?),
                None => Ok(1),
            }
        };

        Ok((count(1)?, count(2)?, count(3)?, count(4)?))
    }
}
