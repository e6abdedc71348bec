//! External tool command description.

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

/// Program plus arguments for one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Short tool name for logs (`ffmpeg`, `x264`).
    tool: String,
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Create a command for `program`, naming the tool after the
    /// program's file stem.
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let tool = Path::new(&program)
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or(&program)
            .to_string();
        Self {
            tool,
            program,
            args: Vec::new(),
        }
    }

    /// Override the tool name used in logs.
    pub fn tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool = name.into();
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Shell-quoted command line for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| shell_quote(part))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Quote a word for POSIX shells when it contains special characters.
fn shell_quote(word: &str) -> String {
    let is_plain = !word.is_empty()
        && word.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '+')
        });

    if is_plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
