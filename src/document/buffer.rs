use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot replace from line {start} of a {len}-line buffer")]
    OutOfRange { start: usize, len: usize },
}

impl BufferError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// An ordered sequence of text lines with a replaceable tail.
pub trait TextBuffer {
    /// Every line, without line terminators.
    fn lines(&self) -> Vec<String>;

    /// Truncates the buffer to `start` lines and appends `lines`.
    fn replace_from(&mut self, start: usize, lines: Vec<String>) -> Result<(), BufferError>;

    fn line_count(&self) -> usize {
        self.lines().len()
    }

    /// Appends `lines` after the last line.
    fn append(&mut self, lines: Vec<String>) -> Result<(), BufferError> {
        let end = self.line_count();
        self.replace_from(end, lines)
    }
}

/// In-memory buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBuffer {
    lines: Vec<String>,
}

impl MemoryBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `text` on `\n`; a single trailing terminator does not add a line.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: split_lines(text),
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl TextBuffer for MemoryBuffer {
    fn lines(&self) -> Vec<String> {
        self.lines.clone()
    }

    fn replace_from(&mut self, start: usize, lines: Vec<String>) -> Result<(), BufferError> {
        replace_tail(&mut self.lines, start, lines)
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Buffer backed by a file, rewritten in full after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBuffer {
    path: PathBuf,
    lines: Vec<String>,
}

impl FileBuffer {
    /// Loads `path`. A missing file opens as an empty buffer and is created
    /// on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BufferError> {
        let path = path.into();
        let lines = match fs::read_to_string(&path) {
            Ok(content) => split_lines(&content),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(BufferError::io("reading buffer file", path, error)),
        };

        debug!(path = %path.display(), lines = lines.len(), "opened file buffer");
        Ok(Self { path, lines })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), BufferError> {
        let mut content = self.lines.join("\n");
        if !self.lines.is_empty() {
            content.push('\n');
        }
        fs::write(&self.path, content)
            .map_err(|error| BufferError::io("writing buffer file", &self.path, error))
    }
}

impl TextBuffer for FileBuffer {
    fn lines(&self) -> Vec<String> {
        self.lines.clone()
    }

    fn replace_from(&mut self, start: usize, lines: Vec<String>) -> Result<(), BufferError> {
        replace_tail(&mut self.lines, start, lines)?;
        self.flush()
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }
}

fn replace_tail(
    buffer: &mut Vec<String>,
    start: usize,
    lines: Vec<String>,
) -> Result<(), BufferError> {
    if start > buffer.len() {
        return Err(BufferError::OutOfRange {
            start,
            len: buffer.len(),
        });
    }

    buffer.truncate(start);
    buffer.extend(lines);
    Ok(())
}

fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn replace_from_truncates_then_appends() {
        let mut buffer = MemoryBuffer::from_text("a\nb\nc\n");
        buffer
            .replace_from(1, strings(&["x", "y"]))
            .expect("start within buffer");
        assert_eq!(buffer.lines(), strings(&["a", "x", "y"]));

        buffer.append(strings(&["z"])).expect("append at end");
        assert_eq!(buffer.text(), "a\nx\ny\nz");
    }

    #[test]
    fn replace_past_end_is_rejected() {
        let mut buffer = MemoryBuffer::from_text("a");
        assert!(matches!(
            buffer.replace_from(3, Vec::new()),
            Err(BufferError::OutOfRange { start: 3, len: 1 })
        ));
        assert_eq!(buffer.lines(), strings(&["a"]));
    }

    #[test]
    fn split_lines_keeps_interior_blank_lines() {
        assert_eq!(split_lines(""), Vec::<String>::new());
        assert_eq!(split_lines("\n"), strings(&[""]));
        assert_eq!(split_lines("a\r\n\r\nb"), strings(&["a", "", "b"]));
    }

    #[test]
    fn file_buffer_persists_every_mutation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chat.md");

        let mut buffer = FileBuffer::open(&path).expect("missing file opens empty");
        assert!(buffer.lines().is_empty());

        buffer
            .replace_from(0, strings(&["user", "---", "", "hi"]))
            .expect("write succeeds");
        assert_eq!(
            fs::read_to_string(&path).expect("file written"),
            "user\n---\n\nhi\n"
        );

        let reopened = FileBuffer::open(&path).expect("reopen");
        assert_eq!(reopened.lines(), buffer.lines());
        assert_eq!(reopened.path(), path.as_path());
    }
}
