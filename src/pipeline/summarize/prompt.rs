use crate::chunking::{MarkdownChunk, PromptVariant};

const HEADER_HEADINGS: usize = 3;

/// Structural header sent ahead of each chunk: ordinal, line span and leading sections.
pub fn chunk_header(chunk: &MarkdownChunk, total: usize) -> String {
    let mut header = format!(
        "Chunk {}/{} | lines {}-{}",
        chunk.index, total, chunk.start_line, chunk.end_line
    );
    let sections: Vec<&str> = chunk.headings.iter().take(HEADER_HEADINGS).map(String::as_str).collect();
    if !sections.is_empty() {
        header.push_str(" | sections: ");
        header.push_str(&sections.join(", "));
    }
    header
}

pub fn chunk_content(chunk: &MarkdownChunk, total: usize) -> String {
    format!("{}\n\n{}", chunk_header(chunk, total), chunk.text)
}

/// Substitute `{document_name}` and `{markdown_content}`. Other braces pass through.
pub fn render_user_prompt(template: &str, document_name: &str, content: &str) -> String {
    // name first so a document that mentions {document_name} is left alone
    template
        .replace("{document_name}", document_name)
        .replace("{markdown_content}", content)
}

pub fn merge_prompt_outputs(parts: &[(&PromptVariant, String)]) -> String {
    let mut out = String::new();
    for (variant, text) in parts {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("<!-- prompt {} ({}) -->\n\n{}", variant.label, variant.display, text.trim()));
    }
    out.push('\n');
    out
}

pub fn concatenate_chunk_outputs(parts: &[(&MarkdownChunk, String)], total: usize) -> String {
    let mut out = String::new();
    for (chunk, text) in parts {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("<!-- {} -->\n\n{}", chunk_header(chunk, total), text.trim()));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::chunking::types::chunk_id_for;

    fn chunk(index: usize, headings: &[&str]) -> MarkdownChunk {
        MarkdownChunk {
            document: PathBuf::from("case.md"),
            chunk_id: chunk_id_for(index),
            index,
            text: format!("<!-- {} start ({index}/2) -->\nbody\n\n<!-- {} end ({index}/2) -->\n", chunk_id_for(index), chunk_id_for(index)),
            token_count: 1,
            word_count: 1,
            start_line: 4,
            end_line: 20,
            headings: headings.iter().map(|s| s.to_string()).collect(),
            block_count: 1,
            overlap_from_previous_tokens: 0,
        }
    }

    #[test]
    fn header_lists_at_most_three_sections() {
        let c = chunk(1, &["A", "B", "C", "D"]);
        assert_eq!(chunk_header(&c, 2), "Chunk 1/2 | lines 4-20 | sections: A, B, C");
        assert_eq!(chunk_header(&chunk(2, &[]), 2), "Chunk 2/2 | lines 4-20");
    }

    #[test]
    fn content_is_header_then_verbatim_chunk() {
        let c = chunk(1, &["A"]);
        let content = chunk_content(&c, 2);
        assert!(content.starts_with("Chunk 1/2 | lines 4-20 | sections: A\n\n<!-- chunk_01 start (1/2) -->"));
        assert!(content.ends_with(&c.text));
    }

    #[test]
    fn placeholders_are_substituted() {
        let out = render_user_prompt("Doc {document_name}:\n{markdown_content}\n{other}", "case", "TEXT {document_name}");
        assert_eq!(out, "Doc case:\nTEXT {document_name}\n{other}");
    }

    #[test]
    fn merges_keep_order() {
        let a = PromptVariant { label: "part1".into(), display: "summary".into(), text: String::new(), path: None };
        let b = PromptVariant { label: "part2".into(), display: "timeline".into(), text: String::new(), path: None };
        let merged = merge_prompt_outputs(&[(&a, " first \n".into()), (&b, "second".into())]);
        assert_eq!(merged, "<!-- prompt part1 (summary) -->\n\nfirst\n\n<!-- prompt part2 (timeline) -->\n\nsecond\n");

        let (c1, c2) = (chunk(1, &["A"]), chunk(2, &[]));
        let doc = concatenate_chunk_outputs(&[(&c1, "one".into()), (&c2, "two".into())], 2);
        assert!(doc.find("one").unwrap() < doc.find("two").unwrap());
        assert!(doc.starts_with("<!-- Chunk 1/2 | lines 4-20 | sections: A -->\n\none"));
    }
}
