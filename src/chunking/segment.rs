use std::sync::OnceLock;

use regex::Regex;

use crate::tokenizer::{count_words, TokenCounter};

use super::types::ContentBlock;

/// Heading used for content that sits outside any markdown heading.
pub const ROOT_HEADING: &str = "Document";

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*)").expect("valid heading regex"))
}

#[derive(Debug)]
struct Section<'a> {
    // None for text before the first heading
    heading: Option<(usize, String)>,
    lines: Vec<(usize, &'a str)>,
}

#[derive(Debug, PartialEq)]
struct Paragraph {
    text: String,
    start_line: usize,
    end_line: usize,
}

/// Split markdown into heading-scoped paragraph blocks, in document order.
/// Heading lines belong to the section they open.
pub fn segment_blocks(markdown: &str, counter: &dyn TokenCounter) -> Vec<ContentBlock> {
    let sections = split_sections(markdown);
    let mut blocks = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();

    for section in sections {
        let path: Vec<String> = match section.heading {
            Some((level, title)) => {
                while stack.last().is_some_and(|(l, _)| *l >= level) {
                    stack.pop();
                }
                stack.push((level, title));
                stack.iter().map(|(_, t)| t.clone()).collect()
            }
            None => vec![ROOT_HEADING.to_string()],
        };

        for para in split_paragraphs(&section.lines) {
            if para.text.is_empty() {
                continue;
            }
            blocks.push(ContentBlock {
                tokens: counter.count_tokens(&para.text),
                words: count_words(&para.text),
                text: para.text,
                start_line: para.start_line,
                end_line: para.end_line,
                heading_path: path.clone(),
            });
        }
    }
    blocks
}

fn split_sections(markdown: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut current = Section { heading: None, lines: Vec::new() };

    for (idx, line) in markdown.lines().enumerate() {
        let line_no = idx + 1;
        let Some(caps) = heading_re().captures(line) else {
            current.lines.push((line_no, line));
            continue;
        };
        let level = caps[1].len();
        let title = caps[2].trim();
        let title = if title.is_empty() {
            format!("Untitled section (line {line_no})")
        } else {
            title.to_string()
        };
        let next = Section { heading: Some((level, title)), lines: vec![(line_no, line)] };
        let prev = std::mem::replace(&mut current, next);
        if !prev.lines.is_empty() {
            sections.push(prev);
        }
    }
    if !current.lines.is_empty() {
        sections.push(current);
    }
    sections
}

// blank lines delimit paragraphs; runs of blank lines collapse
fn split_paragraphs(lines: &[(usize, &str)]) -> Vec<Paragraph> {
    let mut out = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut start = 0usize;
    let mut last = 0usize;

    for &(line_no, text) in lines {
        if text.trim().is_empty() {
            flush(&mut out, &mut buffer, start, last);
            continue;
        }
        if buffer.is_empty() {
            start = line_no;
        }
        buffer.push(text);
        last = line_no;
    }
    flush(&mut out, &mut buffer, start, last);
    out
}

fn flush(out: &mut Vec<Paragraph>, buffer: &mut Vec<&str>, start: usize, end: usize) {
    if buffer.is_empty() {
        return;
    }
    out.push(Paragraph { text: buffer.join("\n").trim().to_string(), start_line: start, end_line: end });
    buffer.clear();
}
