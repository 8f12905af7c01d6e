//! Keyword helpers shared by the search modes

/// Quote each whitespace-separated token for an FTS5 `MATCH` expression.
///
/// Inner double quotes are doubled; tokens are joined with spaces, which
/// FTS5 reads as an implicit AND. Returns an empty string for blank input.
pub fn fts_query(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The default FTS5 tokenizer splits on non-ASCII text poorly, so such
/// keywords are matched with `LIKE` instead.
pub fn is_non_latin(keyword: &str) -> bool {
    keyword.chars().any(|c| !c.is_ascii())
}

/// A `LIKE` pattern matching `keyword` literally anywhere in a value.
/// Use with `ESCAPE '\'`.
pub fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// A window of `radius` characters around the first match of `keyword`.
///
/// Cut-off ends are marked with `...`. When the keyword is not found the
/// first 100 characters are returned.
pub fn context_snippet(content: &str, keyword: &str, radius: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    let lower: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();
    let needle: Vec<char> = keyword
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect();

    let found = if needle.is_empty() || needle.len() > lower.len() {
        None
    } else {
        lower.windows(needle.len()).position(|w| w == needle.as_slice())
    };

    let Some(pos) = found else {
        let head: String = chars.iter().take(100).collect();
        return if chars.len() > 100 {
            format!("{head}...")
        } else {
            head
        };
    };

    let start = pos.saturating_sub(radius);
    let end = (pos + needle.len() + radius).min(chars.len());
    let mut snippet: String = chars[start..end].iter().collect();
    if start > 0 {
        snippet.insert_str(0, "...");
    }
    if end < chars.len() {
        snippet.push_str("...");
    }
    snippet
}

/// Cut `text` to at most `max` characters, appending `...` when shortened.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_query_quotes_tokens() {
        assert_eq!(fts_query("budget report"), "\"budget\" \"report\"");
        assert_eq!(fts_query("say \"hi\""), "\"say\" \"\"\"hi\"\"\"");
        assert_eq!(fts_query("   "), "");
        assert_eq!(fts_query("AND OR"), "\"AND\" \"OR\"");
    }

    #[test]
    fn test_non_latin() {
        assert!(is_non_latin("小动物"));
        assert!(is_non_latin("café"));
        assert!(!is_non_latin("animal"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("小动物"), "%小动物%");
        assert_eq!(like_pattern("50%折"), "%50\\%折%");
        assert_eq!(like_pattern("价_"), "%价\\_%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_context_snippet() {
        let content = "The annual budget review is scheduled for March.";
        assert_eq!(context_snippet(content, "BUDGET", 4), "...ual budget rev...");
        assert_eq!(context_snippet("short", "short", 10), "short");

        let long = "x".repeat(150);
        let fallback = context_snippet(&long, "missing", 10);
        assert_eq!(fallback.chars().count(), 103);
        assert!(fallback.ends_with("..."));
    }

    #[test]
    fn test_context_snippet_multibyte() {
        let content = "我们的小动物园今天开放";
        assert_eq!(context_snippet(content, "小动物", 2), "...们的小动物园今...");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
    }
}
