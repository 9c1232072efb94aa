use std::sync::OnceLock;

use regex::Regex;

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^<!-- \S+ (?:start|end) \(\d+/\d+\) -->$").expect("valid marker regex")
    })
}

/// Surround a chunk body with start/end markers carrying its id and `index/total`.
pub fn wrap_chunk_text(chunk_id: &str, index: usize, total: usize, body: &str) -> String {
    let wrapped = format!(
        "<!-- {chunk_id} start ({index}/{total}) -->\n{body}\n\n<!-- {chunk_id} end ({index}/{total}) -->"
    );
    format!("{}\n", wrapped.trim())
}

/// Inverse of [`wrap_chunk_text`]. Text without markers on both its first and last line
/// is returned as is. Only the marker lines are dropped, so CRLF bodies keep their `\r`.
pub fn unwrap_chunk_text(text: &str) -> String {
    let content = text.strip_suffix('\n').unwrap_or(text);
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() >= 2 && is_marker_line(lines[0]) && is_marker_line(lines[lines.len() - 1]) {
        return lines[1..lines.len() - 1].join("\n").trim().to_string();
    }
    text.to_string()
}

fn is_marker_line(line: &str) -> bool {
    marker_re().is_match(line.trim_end())
}
