//! Document metadata extraction.

use std::path::Path;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Metadata passed to the document compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
}

impl DocumentMetadata {
    /// Title from the first level-1 heading, else from the file name.
    #[must_use]
    pub fn extract(markdown: &str, path: &Path) -> Self {
        let title = first_h1(markdown)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title_from_filename(path));
        Self { title }
    }
}

/// Plain text of the first H1. Lines inside code blocks are never headings.
fn first_h1(markdown: &str) -> Option<String> {
    let mut title: Option<String> = None;

    for event in Parser::new_ext(markdown, Options::empty()) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => title = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = title.as_mut() {
                    title.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(title) = title.as_mut() {
                    title.push(' ');
                }
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                if let Some(title) = title.take() {
                    return Some(title.trim().to_owned());
                }
            }
            _ => {}
        }
    }
    None
}

/// Title-case a file stem: `getting-started.md` becomes "Getting Started".
#[must_use]
pub fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    stem.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_title_from_first_h1() {
        let md = "Preamble\n\n# Quarterly Report\n\nText\n\n# Second\n";

        let meta = DocumentMetadata::extract(md, Path::new("notes.md"));

        assert_eq!(meta.title, "Quarterly Report");
    }

    #[test]
    fn test_h2_is_not_a_title() {
        let meta = DocumentMetadata::extract("## Section\n", Path::new("api_reference.md"));

        assert_eq!(meta.title, "Api Reference");
    }

    #[test]
    fn test_closing_hashes_stripped() {
        let meta = DocumentMetadata::extract("# Setup ##\n", Path::new("x.md"));

        assert_eq!(meta.title, "Setup");
        assert_eq!(
            DocumentMetadata::extract("# Learning C#\n", Path::new("x.md")).title,
            "Learning C#"
        );
    }

    #[test]
    fn test_comment_in_code_block_is_not_a_title() {
        let md = "```bash\n# install dependencies\nnpm ci\n```\n\n# Build Guide\n";

        let meta = DocumentMetadata::extract(md, Path::new("build.md"));

        assert_eq!(meta.title, "Build Guide");
    }

    #[test]
    fn test_inline_code_kept_in_title() {
        let meta = DocumentMetadata::extract("# The `md2pdf` tool\n", Path::new("x.md"));

        assert_eq!(meta.title, "The md2pdf tool");
    }

    #[test]
    fn test_unicode_title() {
        let meta = DocumentMetadata::extract("# 设计文档\n", Path::new("design.md"));

        assert_eq!(meta.title, "设计文档");
    }

    #[test]
    fn test_title_from_filename() {
        assert_eq!(
            title_from_filename(Path::new("docs/getting-started.md")),
            "Getting Started"
        );
        assert_eq!(title_from_filename(Path::new("release_notes_v2.md")), "Release Notes V2");
        assert_eq!(title_from_filename(Path::new("README.md")), "README");
    }
}
