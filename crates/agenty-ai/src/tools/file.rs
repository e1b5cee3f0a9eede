//! Built-in filesystem tools
//!
//! Every tool resolves its path argument to a canonical absolute path and
//! checks it against the configured allowed roots before touching the
//! filesystem.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AiError, Result};
use crate::tools::path::{clean_path, ensure_allowed};
use crate::tools::traits::{Tool, ToolDefinition, ToolParameters};

fn parse_args<'a, T: Deserialize<'a>>(arguments: &'a str) -> Result<T> {
    serde_json::from_str(arguments).map_err(|err| AiError::InvalidArguments(err.to_string()))
}

/// Read a file, optionally restricted to a 1-based inclusive line range.
pub struct ReadFileTool {
    roots: Arc<Vec<PathBuf>>,
}

impl ReadFileTool {
    pub fn new(roots: Arc<Vec<PathBuf>>) -> Self {
        Self { roots }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadFileArgs {
    path: String,
    #[serde(default)]
    start_line: Option<usize>,
    #[serde(default)]
    end_line: Option<usize>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description:
                "Read the contents of a file at the given path. Returns the file content as text."
                    .to_string(),
            parameters: ToolParameters::object()
                .property(
                    "path",
                    "string",
                    "The absolute or relative path to the file to read",
                )
                .property(
                    "startLine",
                    "integer",
                    "The line number to start reading from (1-based index). Optional, defaults to 1.",
                )
                .property(
                    "endLine",
                    "integer",
                    "The line number to stop reading at (1-based index). Optional, defaults to the end of the file.",
                )
                .required(&["path"]),
        }
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: ReadFileArgs = parse_args(arguments)?;

        let path = clean_path(&args.path, true)?;
        ensure_allowed(&self.roots, &path)?;

        if !path.exists() {
            return Err(AiError::Tool(format!("file does not exist: {}", args.path)));
        }

        let content = fs::read_to_string(&path)?;
        // Zero or missing bounds mean "unset".
        let start_line = args.start_line.filter(|v| *v > 0);
        let end_line = args.end_line.filter(|v| *v > 0);
        let (start, end) = match (start_line, end_line) {
            (None, None) => return Ok(content),
            (start, end) => (start.unwrap_or(1), end),
        };

        if let Some(end) = end {
            if start > end {
                return Err(AiError::InvalidArguments(format!(
                    "startLine {} is greater than endLine {}",
                    start, end
                )));
            }
        }

        let lines: Vec<&str> = content.lines().collect();
        if start > lines.len() {
            return Err(AiError::InvalidArguments(format!(
                "startLine {} exceeds file length {}",
                start,
                lines.len()
            )));
        }

        let end = end.unwrap_or(lines.len()).min(lines.len());
        Ok(lines[start - 1..end].join("\n"))
    }
}

/// Write content to a file, creating parent directories as needed.
pub struct WriteFileTool {
    roots: Arc<Vec<PathBuf>>,
}

impl WriteFileTool {
    pub fn new(roots: Arc<Vec<PathBuf>>) -> Self {
        Self { roots }
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".to_string(),
            description:
                "Write content to a file at the given path. Creates the file if it does not exist, or overwrites it if it does."
                    .to_string(),
            parameters: ToolParameters::object()
                .property(
                    "path",
                    "string",
                    "The absolute or relative path to the file to write",
                )
                .property("content", "string", "The content to write to the file")
                .required(&["path", "content"]),
        }
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: WriteFileArgs = parse_args(arguments)?;

        // Do not follow symlinks: the target may not exist yet.
        let path = clean_path(&args.path, false)?;
        ensure_allowed(&self.roots, &path)?;

        if let Some(parent) = path.parent() {
            create_dirs(parent)?;
        }
        write_with_mode(&path, args.content.as_bytes())?;

        Ok(format!(
            "successfully wrote {} bytes to {}",
            args.content.len(),
            path.display()
        ))
    }
}

#[cfg(unix)]
fn create_dirs(dir: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_dirs(dir: &std::path::Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_with_mode(path: &std::path::Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)?;
    file.write_all(content)
}

#[cfg(not(unix))]
fn write_with_mode(path: &std::path::Path, content: &[u8]) -> std::io::Result<()> {
    fs::write(path, content)
}

/// Replace an inclusive 1-based line range with new content.
pub struct ReplaceInFileTool {
    roots: Arc<Vec<PathBuf>>,
}

impl ReplaceInFileTool {
    pub fn new(roots: Arc<Vec<PathBuf>>) -> Self {
        Self { roots }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceInFileArgs {
    path: String,
    start_line: usize,
    end_line: usize,
    new_content: String,
}

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "replace_in_file".to_string(),
            description:
                "Replace a range of lines in a file with new content. Lines from startLine to endLine (inclusive, 1-based) are replaced."
                    .to_string(),
            parameters: ToolParameters::object()
                .property("path", "string", "The absolute or relative path to the file")
                .property(
                    "startLine",
                    "integer",
                    "The first line number to replace (1-based index)",
                )
                .property(
                    "endLine",
                    "integer",
                    "The last line number to replace (1-based index, inclusive)",
                )
                .property(
                    "newContent",
                    "string",
                    "The new content to replace the specified lines with",
                )
                .required(&["path", "startLine", "endLine", "newContent"]),
        }
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: ReplaceInFileArgs = parse_args(arguments)?;

        let path = clean_path(&args.path, true)?;
        ensure_allowed(&self.roots, &path)?;

        let metadata = fs::metadata(&path)
            .map_err(|_| AiError::Tool(format!("file does not exist: {}", args.path)))?;
        if metadata.is_dir() {
            return Err(AiError::Tool(format!(
                "path is a directory, not a file: {}",
                args.path
            )));
        }

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.split('\n').collect();
        let total = lines.len();

        if args.start_line < 1 || args.start_line > total {
            return Err(AiError::InvalidArguments(format!(
                "startLine {} out of range [1, {}]",
                args.start_line, total
            )));
        }
        if args.end_line < args.start_line || args.end_line > total {
            return Err(AiError::InvalidArguments(format!(
                "endLine {} out of range [{}, {}]",
                args.end_line, args.start_line, total
            )));
        }

        let mut result: Vec<&str> = Vec::with_capacity(total);
        result.extend(&lines[..args.start_line - 1]);
        result.extend(args.new_content.split('\n'));
        result.extend(&lines[args.end_line..]);

        // fs::write truncates in place, so the existing file mode survives.
        fs::write(&path, result.join("\n"))?;

        Ok(format!(
            "successfully replaced lines {}-{} in {}",
            args.start_line,
            args.end_line,
            path.display()
        ))
    }
}

/// List directory entries tagged as files or directories.
pub struct ListDirectoryTool {
    roots: Arc<Vec<PathBuf>>,
}

impl ListDirectoryTool {
    pub fn new(roots: Arc<Vec<PathBuf>>) -> Self {
        Self { roots }
    }
}

#[derive(Deserialize)]
struct ListDirectoryArgs {
    path: String,
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_directory".to_string(),
            description:
                "List the contents of a directory. Returns file and directory names with their types."
                    .to_string(),
            parameters: ToolParameters::object()
                .property(
                    "path",
                    "string",
                    "The absolute or relative path to the directory to list",
                )
                .required(&["path"]),
        }
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: ListDirectoryArgs = parse_args(arguments)?;

        let path = clean_path(&args.path, true)?;
        ensure_allowed(&self.roots, &path)?;

        let mut entries: Vec<(bool, String)> = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let is_dir = entry.file_type()?.is_dir();
            entries.push((is_dir, entry.file_name().to_string_lossy().into_owned()));
        }
        entries.sort_by(|a, b| a.1.cmp(&b.1));

        let mut output = String::new();
        for (is_dir, name) in entries {
            let kind = if is_dir { "dir" } else { "file" };
            output.push_str(&format!("[{}] {}\n", kind, name));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unrestricted() -> Arc<Vec<PathBuf>> {
        Arc::new(Vec::new())
    }

    fn rooted(root: &std::path::Path) -> Arc<Vec<PathBuf>> {
        Arc::new(vec![root.to_path_buf()])
    }

    #[tokio::test]
    async fn read_file_returns_whole_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "one\ntwo\nthree").unwrap();

        let tool = ReadFileTool::new(unrestricted());
        let args = format!("{{\"path\": \"{}\"}}", file.display());
        let content = tool.execute(&args).await.unwrap();
        assert_eq!(content, "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn read_file_honors_line_range() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "one\ntwo\nthree\nfour").unwrap();

        let tool = ReadFileTool::new(unrestricted());
        let args = format!(
            "{{\"path\": \"{}\", \"startLine\": 2, \"endLine\": 3}}",
            file.display()
        );
        let content = tool.execute(&args).await.unwrap();
        assert_eq!(content, "two\nthree");
    }

    #[tokio::test]
    async fn read_file_rejects_inverted_range() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "one\ntwo").unwrap();

        let tool = ReadFileTool::new(unrestricted());
        let args = format!(
            "{{\"path\": \"{}\", \"startLine\": 3, \"endLine\": 1}}",
            file.display()
        );
        assert!(tool.execute(&args).await.is_err());
    }

    #[tokio::test]
    async fn read_file_outside_roots_is_blocked_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, "hidden").unwrap();

        let tool = ReadFileTool::new(rooted(dir.path()));
        let args = format!("{{\"path\": \"{}\"}}", secret.display());
        let err = tool.execute(&args).await.unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[tokio::test]
    async fn write_file_creates_parents_and_reports_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deep/out.txt");

        let tool = WriteFileTool::new(rooted(dir.path()));
        let args = format!(
            "{{\"path\": \"{}\", \"content\": \"hello\"}}",
            target.display()
        );
        let output = tool.execute(&args).await.unwrap();

        assert!(output.contains("5 bytes"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
    }

    #[tokio::test]
    async fn write_file_outside_roots_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(rooted(dir.path()));
        let args = "{\"path\": \"/forbidden/out.txt\", \"content\": \"x\"}";

        let err = tool.execute(args).await.unwrap_err();
        assert!(err.to_string().contains("not allowed"));
        assert!(!std::path::Path::new("/forbidden/out.txt").exists());
    }

    #[tokio::test]
    async fn replace_in_file_splices_range() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "one\ntwo\nthree\nfour").unwrap();

        let tool = ReplaceInFileTool::new(rooted(dir.path()));
        let args = format!(
            "{{\"path\": \"{}\", \"startLine\": 2, \"endLine\": 3, \"newContent\": \"TWO\\nTHREE\"}}",
            file.display()
        );
        tool.execute(&args).await.unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "one\nTWO\nTHREE\nfour");
    }

    #[tokio::test]
    async fn replace_in_file_validates_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "one\ntwo").unwrap();

        let tool = ReplaceInFileTool::new(rooted(dir.path()));
        let args = format!(
            "{{\"path\": \"{}\", \"startLine\": 1, \"endLine\": 9, \"newContent\": \"x\"}}",
            file.display()
        );
        assert!(tool.execute(&args).await.is_err());
    }

    #[tokio::test]
    async fn list_directory_tags_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("a-dir")).unwrap();

        let tool = ListDirectoryTool::new(rooted(dir.path()));
        let args = format!("{{\"path\": \"{}\"}}", dir.path().display());
        let output = tool.execute(&args).await.unwrap();

        assert_eq!(output, "[dir] a-dir\n[file] b.txt\n");
    }
}
