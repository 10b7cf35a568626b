use std::{ffi::OsString, path::Path, sync::OnceLock};

use log::debug;
use regex_lite::Regex;

use crate::process::{CancellationToken, Invocation, ProcessError, ProcessRunner};

pub const PROGRAM: &str = "rg";

const SEARCH_ZIP: &str = "--search-zip";
const OUTPUT_FLAGS: &[&str] = &[
    "--no-heading",
    "--line-number",
    "--column",
    "--color=never",
    "--with-filename",
    "--null",
];

/// One output line of ripgrep, before the path is mapped back to an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub file: String,
    pub line: u64,
    /// 0 for context lines.
    pub column: u64,
    pub text: String,
}

fn match_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+):(\d+):(.*)$").expect("valid regex"))
}

fn context_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)-(.*)$").expect("valid regex"))
}

/// Parses `path\0line:column:text` match lines and `path\0line-text` context lines.
///
/// Paths are terminated by NUL (`--null`), so neither the path nor the text can
/// be mistaken for a separator.
pub fn parse_line(line: &str) -> Option<RawMatch> {
    let (file, rest) = line.split_once('\0')?;
    if file.is_empty() {
        return None;
    }
    if let Some(captures) = match_line().captures(rest) {
        return Some(RawMatch {
            file: file.to_string(),
            line: captures[1].parse().ok()?,
            column: captures[2].parse().ok()?,
            text: captures[3].to_string(),
        });
    }
    let captures = context_line().captures(rest)?;
    Some(RawMatch {
        file: file.to_string(),
        line: captures[1].parse().ok()?,
        column: 0,
        text: captures[2].to_string(),
    })
}

pub fn parse_output(stdout: &str) -> Vec<RawMatch> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(parse_line)
        .collect()
}

/// Builds a ripgrep call. Caller arguments go after the fixed flags, pattern and targets last.
pub fn invocation<T>(
    rg: &Path,
    search_zip: bool,
    file_glob: &str,
    extra_args: &[String],
    pattern: &str,
    targets: T,
) -> Invocation
where
    T: IntoIterator,
    T::Item: Into<OsString>,
{
    let mut invocation = Invocation::new(rg);
    if search_zip {
        invocation = invocation.arg(SEARCH_ZIP);
    }
    invocation
        .args(OUTPUT_FLAGS.iter().copied())
        .args(["-g", file_glob])
        .args(extra_args.iter())
        .arg(pattern)
        .args(targets)
}

/// Runs ripgrep and returns its stdout.
///
/// Exit code 1 means no matches and yields empty output. Other failures are errors
/// unless ripgrep still printed results.
pub fn run<R>(
    runner: &R,
    invocation: &Invocation,
    cancel: &CancellationToken,
) -> Result<String, ProcessError>
where
    R: ProcessRunner + ?Sized,
{
    let output = runner.run(invocation, cancel)?;
    match output.status.0 {
        Some(0) => Ok(output.stdout),
        Some(1) => {
            debug!("No matches");
            Ok(String::new())
        }
        _ if output.stdout.trim().is_empty() => Err(output.into_failure(invocation)),
        _ => {
            debug!(
                "rg exited with {} but produced output: {}",
                output.status,
                output.stderr.trim()
            );
            Ok(output.stdout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{exit, ScriptedRunner};

    use pretty_assertions::assert_eq;

    #[test]
    fn parse_zip_match_line() {
        assert_eq!(
            parse_line("/tmp/lib.jar:com/foo/Bar.kt\012:3:match text"),
            Some(RawMatch {
                file: "/tmp/lib.jar:com/foo/Bar.kt".to_string(),
                line: 12,
                column: 3,
                text: "match text".to_string(),
            })
        );
    }

    #[test]
    fn parse_keeps_separators_in_text() {
        let parsed = parse_line("/x/A.kt\04:9:val map = mapOf(1 to \"a:2:3:b\")").unwrap();
        assert_eq!(parsed.file, "/x/A.kt");
        assert_eq!(parsed.line, 4);
        assert_eq!(parsed.text, "val map = mapOf(1 to \"a:2:3:b\")");
    }

    #[test]
    fn parse_context_line() {
        assert_eq!(
            parse_line("/tmp/x/a/b.kt\07-    fun a() = 1 - 2"),
            Some(RawMatch {
                file: "/tmp/x/a/b.kt".to_string(),
                line: 7,
                column: 0,
                text: "    fun a() = 1 - 2".to_string(),
            })
        );
    }

    #[test]
    fn parse_skips_garbage() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("--"), None);
        assert_eq!(parse_line("no separators here"), None);
        assert_eq!(parse_line("/a.kt:1:1:x"), None);
        assert_eq!(parse_line("\01:1:x"), None);
        assert_eq!(parse_line("/a.kt\0x-y"), None);
        assert_eq!(parse_output("\n--\n/a.kt\01:1:x\n").len(), 1);
    }

    #[test]
    fn parse_context_line_with_numbered_path() {
        assert_eq!(
            parse_line(
                "/g/javax.inject/javax.inject/1/abc/javax.inject-1-sources.jar:\
                 javax/inject/Inject.java\012-import x;"
            ),
            Some(RawMatch {
                file: "/g/javax.inject/javax.inject/1/abc/javax.inject-1-sources.jar:\
                       javax/inject/Inject.java"
                    .to_string(),
                line: 12,
                column: 0,
                text: "import x;".to_string(),
            })
        );
    }

    #[test]
    fn parse_context_line_with_colon_numbers_in_text() {
        assert_eq!(
            parse_line("/x/a.jar:A.kt\03-val u = \"http:80:1:x\""),
            Some(RawMatch {
                file: "/x/a.jar:A.kt".to_string(),
                line: 3,
                column: 0,
                text: "val u = \"http:80:1:x\"".to_string(),
            })
        );
    }

    #[test]
    fn invocation_order() {
        let invocation = invocation(
            Path::new("rg"),
            true,
            "*.kt",
            &["-C".to_string(), "2".to_string()],
            "fun main",
            ["/a.jar", "/b.jar"],
        );
        assert_eq!(
            invocation.to_string(),
            "rg --search-zip --no-heading --line-number --column --color=never --with-filename \
             --null -g *.kt -C 2 fun main /a.jar /b.jar"
        );
    }

    #[test]
    fn exit_one_is_no_matches() {
        let mut runner = ScriptedRunner::default();
        runner.respond("", exit(1, "", ""));
        let stdout = run(&runner, &Invocation::new("rg"), &CancellationToken::new()).unwrap();
        assert_eq!(stdout, "");
    }

    #[test]
    fn other_failures_carry_stderr() {
        let mut runner = ScriptedRunner::default();
        runner.respond("", exit(2, "", "regex parse error"));
        let error = run(&runner, &Invocation::new("rg"), &CancellationToken::new()).unwrap_err();
        assert!(matches!(error, ProcessError::Failure { .. }));
        assert!(error.to_string().contains("regex parse error"));
    }

    #[test]
    fn partial_failure_with_output_is_kept() {
        let mut runner = ScriptedRunner::default();
        runner.respond("", exit(2, "/a.kt\01:1:x\n", "permission denied"));
        let stdout = run(&runner, &Invocation::new("rg"), &CancellationToken::new()).unwrap();
        assert_eq!(stdout, "/a.kt\01:1:x\n");
    }
}
