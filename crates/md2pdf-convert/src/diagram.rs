//! Mermaid fence extraction and substitution.

use std::ops::Range;
use std::path::Path;

use md2pdf_config::DiagramFormat;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Fence language recognized as a diagram.
const MERMAID: &str = "mermaid";

/// A Mermaid code block found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    /// Diagram source (fence content without the fence lines).
    pub source: String,
    /// Byte range of the whole block, fences included.
    pub span: Range<usize>,
}

/// Find every closed Mermaid fence in document order.
///
/// The fence language is matched case-insensitively. A fence that runs to the
/// end of the document without a closing line is left alone.
#[must_use]
pub fn extract_diagrams(markdown: &str) -> Vec<DiagramBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(Range<usize>, String)> = None;

    for (event, range) in Parser::new_ext(markdown, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if is_mermaid(&info) => {
                current = Some((range, String::new()));
            }
            Event::Text(text) => {
                if let Some((_, source)) = current.as_mut() {
                    source.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((span, source)) = current.take()
                    && is_closed(&markdown[span.clone()])
                {
                    blocks.push(DiagramBlock { source, span });
                }
            }
            _ => {}
        }
    }

    blocks
}

fn is_mermaid(info: &str) -> bool {
    info.split_whitespace()
        .next()
        .is_some_and(|lang| lang.eq_ignore_ascii_case(MERMAID))
}

/// Whether a fenced block has a closing fence line.
fn is_closed(block: &str) -> bool {
    let mut lines = block.trim_end().lines();
    let Some(opening) = lines.next() else {
        return false;
    };
    let Some(closing) = lines.next_back() else {
        return false;
    };

    let opening = opening.trim_start();
    let fence_char = opening.chars().next().unwrap_or('`');
    let fence_len = opening.chars().take_while(|c| *c == fence_char).count();

    let closing = closing.trim();
    closing.len() >= fence_len && closing.chars().all(|c| c == fence_char)
}

/// Markup that embeds a rendered artifact in the document.
#[must_use]
pub fn image_reference(path: &Path, format: DiagramFormat) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    match format {
        DiagramFormat::Pdf => format!("\\includegraphics[width=\\linewidth]{{{path}}}\n\n"),
        DiagramFormat::Svg => format!("![]({path})\n"),
    }
}

/// Replace each block's span with its image reference.
///
/// `replacements` pairs a block span with the markup to put there; spans must
/// not overlap. Text outside the spans is copied unchanged.
#[must_use]
pub fn substitute_diagrams(markdown: &str, replacements: &[(Range<usize>, String)]) -> String {
    let mut sorted: Vec<_> = replacements.iter().collect();
    sorted.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for (span, markup) in sorted {
        out.push_str(&markdown[cursor..span.start]);
        out.push_str(markup);
        cursor = span.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "# Title\n\nIntro.\n\n```mermaid\ngraph TD\n  A --> B\n```\n\nMiddle.\n\n```rust\nfn main() {}\n```\n\n```Mermaid\npie\n  \"a\": 1\n```\n\nEnd.\n";

    #[test]
    fn test_extract_in_document_order() {
        let blocks = extract_diagrams(DOC);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].source, "graph TD\n  A --> B\n");
        assert_eq!(blocks[1].source, "pie\n  \"a\": 1\n");
        assert!(DOC[blocks[0].span.clone()].starts_with("```mermaid"));
        assert!(blocks[0].span.end <= blocks[1].span.start);
    }

    #[test]
    fn test_non_diagram_fences_ignored() {
        let blocks = extract_diagrams("```python\nprint(1)\n```\n\n    indented code\n");

        assert!(blocks.is_empty());
    }

    #[test]
    fn test_unterminated_fence_is_not_a_diagram() {
        let blocks = extract_diagrams("Text\n\n```mermaid\ngraph TD\n  A --> B\n");

        assert!(blocks.is_empty());
    }

    #[test]
    fn test_tilde_fence() {
        let blocks = extract_diagrams("~~~mermaid\nsequenceDiagram\n  A->>B: hi\n~~~\n");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].source, "sequenceDiagram\n  A->>B: hi\n");
    }

    #[test]
    fn test_image_reference_forms() {
        let path = Path::new("/cache/diagram_abc.pdf");

        assert_eq!(
            image_reference(path, DiagramFormat::Pdf),
            "\\includegraphics[width=\\linewidth]{/cache/diagram_abc.pdf}\n\n"
        );
        assert_eq!(
            image_reference(Path::new("/cache/d.svg"), DiagramFormat::Svg),
            "![](/cache/d.svg)\n"
        );
    }

    #[test]
    fn test_substitute_preserves_surrounding_text() {
        let blocks = extract_diagrams(DOC);
        let replacements: Vec<_> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.span.clone(), format!("[img{i}]\n")))
            .collect();

        let out = substitute_diagrams(DOC, &replacements);

        assert!(out.starts_with("# Title\n\nIntro.\n\n[img0]\n"));
        assert!(out.contains("```rust\nfn main() {}\n```"));
        assert!(out.contains("[img1]\n"));
        assert!(out.ends_with("End.\n"));
        assert!(!out.contains("mermaid"));
        assert!(!out.contains("Mermaid"));
    }

    #[test]
    fn test_substitute_nothing() {
        assert_eq!(substitute_diagrams("plain\n", &[]), "plain\n");
    }
}
