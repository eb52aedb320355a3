use std::backtrace::Backtrace;
use std::fmt::Write;
use std::path::Path;

use crate::util::source_line;

/// Maximum number of frames reported in a blurb.
const MAX_FRAMES: usize = 10;

/// Path prefixes of frames filtered out to keep the reported stack concise. Matched
/// against the start of the function path, so `my_std::run` or `app::contest` stay.
const EXCLUDED: &[&str] = &[
    "tagged_metrics::recorder::",
    "tagged_metrics::query::",
    "tagged_metrics::stack::",
    "std::",
    "core::",
    "alloc::",
    "test::",
    "backtrace::",
    "__rust",
    "_start",
    "__libc_start",
];

/// Printed by the backtrace for frames whose symbol couldn't be resolved.
const UNRESOLVED: &str = "<unknown>";

#[derive(Debug, PartialEq)]
pub(crate) struct Frame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<usize>,
}

/// Describes the code that led to a failing assertion: one entry per frame outside this
/// crate's internals, with the source line of the call when it can be read.
///
/// This is best effort; without debug info the blurb may be empty.
pub(crate) fn call_site_blurb() -> String {
    let trace = Backtrace::force_capture().to_string();
    render(&parse_frames(&trace))
}

/// Parses the output of `std::backtrace::Backtrace`'s `Display` implementation, which
/// prints frames as `N: function` followed by an optional `at file:line:column` line.
pub(crate) fn parse_frames(trace: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();
    for line in trace.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            let Some(frame) = frames.last_mut() else {
                continue;
            };
            if frame.file.is_some() {
                continue;
            }
            let mut parts = location.rsplitn(3, ':');
            let (_column, lineno, file) = (parts.next(), parts.next(), parts.next());
            if let (Some(lineno), Some(file)) = (lineno.and_then(|l| l.parse().ok()), file) {
                frame.file = Some(file.to_string());
                frame.line = Some(lineno);
            }
        } else if let Some((index, function)) = line.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(Frame {
                    function: strip_hash(function).to_string(),
                    file: None,
                    line: None,
                });
            }
        }
    }
    frames
}

/// Strips the `::h0123456789abcdef` suffix of legacy-mangled symbols.
fn strip_hash(function: &str) -> &str {
    match function.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => {
            head
        }
        _ => function,
    }
}

fn excluded(function: &str) -> bool {
    if function.is_empty() || function == UNRESOLVED {
        return true;
    }
    // trait impls print as `<core::iter::Map<I, F> as Iterator>::next`
    let path = function.trim_start_matches('<');
    EXCLUDED.iter().any(|prefix| path.starts_with(prefix))
}

fn render(frames: &[Frame]) -> String {
    let mut out = String::new();
    for frame in frames
        .iter()
        .filter(|frame| !excluded(&frame.function))
        .take(MAX_FRAMES)
    {
        match (&frame.file, frame.line) {
            (Some(file), Some(line)) => {
                let path = Path::new(file);
                let base = path
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_else(|| file.as_str().into());
                let _ = writeln!(
                    out,
                    "{} {}:{}\n\t{}",
                    frame.function,
                    base,
                    line,
                    source_line(path, line)
                );
            }
            _ => {
                let _ = writeln!(out, "{}", frame.function);
            }
        }
    }
    out
}
