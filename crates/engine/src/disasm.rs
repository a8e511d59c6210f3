//! Class-file disassembly for content-normalized comparison.
//!
//! Compiled class files embed a timestamp and a source-path comment, so two
//! semantically identical recompilations rarely match byte-for-byte. The
//! comparator therefore diffs a disassembled rendering with the volatile
//! header stripped. Disassembly is delegated to the JDK's `javap`; when the
//! tool is unavailable the caller falls back to comparing the raw text.

use std::io::{self, Write};
use std::process::Command;

/// Renders class-file bytes to text via `javap` and strips the volatile
/// header lines.
pub fn class_to_text(bytes: &[u8], verbose: bool) -> io::Result<String> {
    let mut scratch = tempfile::Builder::new()
        .prefix("distdiff-class-")
        .suffix(".class")
        .tempfile()?;
    scratch.write_all(bytes)?;
    scratch.flush()?;

    let mut command = Command::new("javap");
    if verbose {
        command.arg("-v");
    }
    let output = command.arg(scratch.path()).output()?;
    if !output.status.success() {
        return Err(io::Error::other(format!(
            "javap failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(strip_volatile_header(&text, verbose))
}

/// Drops the rendering's volatile header: the leading file/timestamp/checksum
/// block in verbose mode, or only the source-path comment in brief mode.
#[must_use]
pub fn strip_volatile_header(text: &str, verbose: bool) -> String {
    let skip = if verbose { 3 } else { 1 };
    let mut lines = text.split('\n');
    for _ in 0..skip {
        lines.next();
    }
    lines.collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = "Classfile /tmp/App.class\n  Last modified Jan 1, 2026; size 423 bytes\n  MD5 checksum aa11bb22\n  Compiled from \"App.java\"\npublic class App\n  minor version: 0";

    #[test]
    fn verbose_mode_strips_three_header_lines() {
        let stripped = strip_volatile_header(RENDERED, true);
        assert!(stripped.starts_with("  Compiled from"));
        assert!(stripped.contains("public class App"));
    }

    #[test]
    fn brief_mode_strips_only_the_first_line() {
        let stripped = strip_volatile_header(RENDERED, false);
        assert!(stripped.starts_with("  Last modified"));
    }

    #[test]
    fn stripping_an_empty_rendering_is_empty() {
        assert_eq!(strip_volatile_header("", true), "");
    }
}
