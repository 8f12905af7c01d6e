//! Terminal output for search results

use std::path::Path;

use docseek_core::{Location, SearchHit};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

/// Longest content shown for a hit before it is cut.
const MAX_CONTENT_CHARS: usize = 300;

/// Pretty-print one search hit. `snippet_marks` says the index hits carry
/// FTS `[term]` marks.
pub fn print_hit(
    index: usize,
    hit: &SearchHit,
    highlighter: &SyntaxHighlighter,
    context: usize,
    snippet_marks: bool,
) {
    let location = match &hit.location {
        Location::Ai { score } => {
            let color = if *score > 0.7 {
                "\x1b[32m" // Green for high scores
            } else if *score > 0.5 {
                "\x1b[33m" // Yellow for medium scores
            } else {
                "\x1b[31m" // Red for low scores
            };
            format!("{color}{}\x1b[0m", hit.location)
        }
        other => format!("\x1b[33m{other}\x1b[0m"),
    };

    println!(
        "\x1b[1;36m[{}]\x1b[0m \x1b[35m{:<4}\x1b[0m \x1b[1m{}\x1b[0m  {}",
        index, hit.file_type, hit.path, location,
    );

    if let Location::Line(line) = hit.location {
        if let Some(block) = line_context(Path::new(&hit.path), line, context) {
            let extension = Path::new(&hit.path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("txt");
            println!("{}", highlighter.highlight(&block, extension));
            println!();
            return;
        }
    }

    println!("    {}", hit_text(hit, snippet_marks));
    println!();
}

/// Text shown below a hit header. Document text is printed as is; only FTS
/// snippets get their marks rendered.
fn hit_text(hit: &SearchHit, snippet_marks: bool) -> String {
    let text = shorten(&hit.content);
    match hit.location {
        Location::Indexed { .. } if snippet_marks => emphasize(&text),
        _ => text,
    }
}

/// Lines around `line` (1-based) of a text file, with numbers and a marker
/// on the matching line.
fn line_context(path: &Path, line: usize, context: usize) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let content = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = content.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }

    let start = line.saturating_sub(context + 1);
    let end = (line + context).min(lines.len());

    let mut display = String::new();
    for (i, text) in lines[start..end].iter().enumerate() {
        let number = start + i + 1;
        let prefix = if number == line { "│" } else { "┊" };
        display.push_str(&format!("{} {:4} │ {}\n", prefix, number, text));
    }
    Some(display)
}

fn shorten(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_CONTENT_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(MAX_CONTENT_CHARS).collect();
    cut.push_str("...");
    cut
}

/// Render `[term]` snippet marks in bold yellow. The trailing reset covers
/// a mark whose closing bracket was cut off.
fn emphasize(snippet: &str) -> String {
    let mut rendered = snippet
        .replace('[', "\x1b[1;33m")
        .replace(']', "\x1b[0m");
    rendered.push_str("\x1b[0m");
    rendered
}

/// Human readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Wrapper around syntect for syntax highlighting.
pub struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl SyntaxHighlighter {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    pub fn highlight(&self, text: &str, extension: &str) -> String {
        let syntax = self
            .syntax_set
            .find_syntax_by_extension(extension)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = &self.theme_set.themes["base16-ocean.dark"];
        let mut highlighter = HighlightLines::new(syntax, theme);

        let mut output = String::new();
        for line in LinesWithEndings::from(text) {
            match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(ranges) => output.push_str(&as_24_bit_terminal_escaped(&ranges[..], false)),
                Err(_) => output.push_str(line),
            }
        }
        output.push_str("\x1b[0m");
        output
    }
}
