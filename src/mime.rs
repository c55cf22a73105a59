//! Content-type detection for materialized files.
//!
//! Sniffing runs an external command (`file --brief --mime-type` by default)
//! against the staged copy. Any failure degrades to [`UNKNOWN_MIME`]; a file
//! is never skipped because its type could not be determined.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::interrupt::Interrupt;
use crate::process::{self, RunLimits};

pub const UNKNOWN_MIME: &str = "application/octet-stream";

const SNIFF_TIMEOUT: Duration = Duration::from_secs(10);
const SNIFF_OUTPUT_LIMIT: usize = 1024;

#[derive(Debug, Clone)]
pub struct MimeSniffer {
    command: Vec<String>,
    interrupt: Interrupt,
}

impl MimeSniffer {
    /// `command` is the program and its leading arguments; the path is appended
    pub fn new(command: Vec<String>, interrupt: Interrupt) -> Self {
        Self { command, interrupt }
    }

    pub async fn sniff(&self, path: &Path) -> String {
        let Some((program, args)) = self.command.split_first() else {
            return UNKNOWN_MIME.to_string();
        };

        let limits = RunLimits {
            timeout: SNIFF_TIMEOUT,
            max_output_bytes: SNIFF_OUTPUT_LIMIT,
            interrupt: self.interrupt.clone(),
        };
        let mut argv: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
        argv.push(path.as_os_str());

        match process::run_captured(Path::new(program), argv, None, &limits).await {
            Ok(captured) if captured.status.success() => match parse_mime(&captured.output) {
                Some(mime) => mime,
                None => {
                    debug!(
                        path = %path.display(),
                        output = %captured.output.trim(),
                        "Unrecognized type detector output"
                    );
                    UNKNOWN_MIME.to_string()
                }
            },
            Ok(captured) => {
                debug!(path = %path.display(), status = ?captured.status, "Type detector failed");
                UNKNOWN_MIME.to_string()
            }
            Err(failure) => {
                debug!(path = %path.display(), ?failure, "Type detector could not run");
                UNKNOWN_MIME.to_string()
            }
        }
    }
}

/// A single `type/subtype` token, parameters stripped
fn parse_mime(output: &str) -> Option<String> {
    let line = output.lines().next()?.trim();
    let essence = line.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    let valid = |part: &str| {
        !part.is_empty() && !part.chars().any(|c| c.is_whitespace() || c == '/')
    };
    (valid(kind) && valid(subtype)).then(|| essence.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mime() {
        assert_eq!(parse_mime("text/x-python\n"), Some("text/x-python".to_string()));
        assert_eq!(
            parse_mime("text/plain; charset=us-ascii"),
            Some("text/plain".to_string())
        );
        assert_eq!(parse_mime("cannot open `x' (No such file or directory)"), None);
        assert_eq!(parse_mime(""), None);
        assert_eq!(parse_mime("text/"), None);
    }

    #[tokio::test]
    async fn test_missing_detector_falls_back() {
        let sniffer = MimeSniffer::new(
            vec!["/nonexistent/file-detector".to_string()],
            Interrupt::never(),
        );
        assert_eq!(sniffer.sniff(Path::new("/tmp/x")).await, UNKNOWN_MIME);
    }

    #[tokio::test]
    async fn test_empty_command_falls_back() {
        let sniffer = MimeSniffer::new(Vec::new(), Interrupt::never());
        assert_eq!(sniffer.sniff(Path::new("/tmp/x")).await, UNKNOWN_MIME);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detector_output_is_used() {
        let sniffer = MimeSniffer::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo text/x-shellscript".to_string(),
                "sh".to_string(),
            ],
            Interrupt::never(),
        );
        assert_eq!(
            sniffer.sniff(Path::new("/tmp/script")).await,
            "text/x-shellscript"
        );
    }
}
