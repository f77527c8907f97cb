use forch_core::orchestrator::HandoffSink;
use forch_core::{ForchError, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Clipboard programs in preference order, with their arguments.
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("clip", &[]),
];

/// Copies through the first clipboard tool on `PATH` and announces
/// handoffs with a banner on stderr.
#[derive(Debug, Default)]
pub struct TerminalSink {
    tool: Option<(PathBuf, &'static [&'static str])>,
}

impl TerminalSink {
    pub fn detect() -> Self {
        let tool = CLIPBOARD_TOOLS.iter().find_map(|(name, args)| {
            which::which(name).ok().map(|path| (path, *args))
        });
        if tool.is_none() {
            tracing::debug!("no clipboard tool found on PATH");
        }
        Self { tool }
    }
}

impl HandoffSink for TerminalSink {
    fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
        let Some((program, args)) = &self.tool else {
            return Err(ForchError::Io(std::io::Error::other(
                "no clipboard tool found (pbcopy, wl-copy, xclip, clip)",
            )));
        };
        let mut child = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ForchError::SpawnFailed {
                command: program.display().to_string(),
                reason: e.to_string(),
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(ForchError::Io(std::io::Error::other(format!(
                "{} exited with {status}",
                program.display()
            ))));
        }
        Ok(())
    }

    fn notify(&mut self, message: &str) -> Result<()> {
        let rule = "=".repeat(message.chars().count().clamp(20, 72));
        let mut err = std::io::stderr().lock();
        writeln!(err, "\n{rule}\n{message}\n{rule}")?;
        Ok(())
    }
}
