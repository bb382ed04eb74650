//! Section chunker
//!
//! Parsed documents arrive as markdown with one `# Heading` per section.
//! Each section becomes one chunk; sections longer than the target size are
//! split at sentence boundaries with a small overlap.

use std::path::{Path, PathBuf};

use crate::error::RagResult;

use super::pipeline::ChunkSource;

/// A text chunk with its byte span in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Start byte offset in the source text
    pub start: usize,
    /// End byte offset in the source text
    pub end: usize,
    /// Position within the source
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct SectionChunker {
    /// Target chunk size in bytes (~512 tokens ≈ 2048 bytes for English)
    target_size: usize,
    /// Bytes carried over from the previous chunk
    overlap: usize,
}

impl Default for SectionChunker {
    fn default() -> Self {
        Self {
            target_size: 2048,
            overlap: 200,
        }
    }
}

impl SectionChunker {
    pub fn new(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size: target_size.max(1),
            overlap,
        }
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Split markdown into heading-delimited sections.
    ///
    /// A section runs from a line starting with `#` to the next such line.
    /// Text before the first heading is a section of its own. Blank sections
    /// are dropped.
    pub fn split_sections(&self, markdown: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current = String::new();

        for line in markdown.lines() {
            if line.starts_with('#') && !current.trim().is_empty() {
                sections.push(current.trim().to_string());
                current.clear();
            }
            current.push_str(line);
            current.push('\n');
        }

        if !current.trim().is_empty() {
            sections.push(current.trim().to_string());
        }

        sections
    }

    /// Sections in order; oversized ones are split with [`SectionChunker::chunk`]
    pub fn chunk_document(&self, markdown: &str) -> Vec<String> {
        self.split_sections(markdown)
            .into_iter()
            .flat_map(|section| {
                if section.len() <= self.target_size {
                    vec![section]
                } else {
                    self.chunk(&section).into_iter().map(|c| c.text).collect()
                }
            })
            .collect()
    }

    /// Split at sentence boundaries (`.`, `?`, `!`, newline) near the target size
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return vec![];
        }

        let mut chunks = Vec::new();
        let mut chunk_start = 0;
        let mut last_boundary = 0;

        // Boundary bytes are ASCII, so `i + 1` is always a char boundary
        for (i, &byte) in text.as_bytes().iter().enumerate() {
            if !matches!(byte, b'.' | b'?' | b'!' | b'\n') {
                continue;
            }

            let potential_end = i + 1;
            if potential_end - chunk_start >= self.target_size && last_boundary > chunk_start {
                chunks.push(Chunk {
                    text: text[chunk_start..last_boundary].to_string(),
                    start: chunk_start,
                    end: last_boundary,
                    index: chunks.len(),
                });
                chunk_start = last_boundary;
            }
            last_boundary = potential_end;
        }

        if chunk_start < text.len() {
            chunks.push(Chunk {
                text: text[chunk_start..].to_string(),
                start: chunk_start,
                end: text.len(),
                index: chunks.len(),
            });
        }

        if self.overlap > 0 && chunks.len() > 1 {
            self.apply_overlap(&mut chunks, text);
        }

        chunks
            .into_iter()
            .filter_map(|mut c| {
                let trimmed = c.text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                c.text = trimmed.to_string();
                Some(c)
            })
            .enumerate()
            .map(|(index, c)| Chunk { index, ..c })
            .collect()
    }

    fn apply_overlap(&self, chunks: &mut [Chunk], original: &str) {
        for i in 1..chunks.len() {
            let curr_start = chunks[i].start;
            let overlap_start = curr_start.saturating_sub(self.overlap);
            if overlap_start >= curr_start {
                continue;
            }

            let overlap_start = find_word_start(original, overlap_start, curr_start);
            if overlap_start < curr_start {
                chunks[i].text = format!("{}{}", &original[overlap_start..curr_start], chunks[i].text);
                chunks[i].start = overlap_start;
            }
        }
    }
}

/// First word start at or after `pos` (within 50 bytes), never past `limit`.
/// Falls back to the next char boundary after `pos`.
fn find_word_start(text: &str, pos: usize, limit: usize) -> usize {
    let bytes = text.as_bytes();
    let end = limit.min(pos + 50);

    for i in pos..end {
        if bytes[i] == b' ' || bytes[i] == b'\n' {
            return i + 1;
        }
    }

    let mut pos = pos;
    while pos < limit && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

/// Reads parsed section files `{root}/{document_id}.md`
#[derive(Debug, Clone)]
pub struct MarkdownChunkSource {
    root: PathBuf,
    chunker: SectionChunker,
}

impl MarkdownChunkSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_chunker(root, SectionChunker::default())
    }

    pub fn with_chunker(root: impl Into<PathBuf>, chunker: SectionChunker) -> Self {
        Self {
            root: root.into(),
            chunker,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{}.md", document_id))
    }
}

impl ChunkSource for MarkdownChunkSource {
    fn get_chunks(&self, document_id: &str) -> RagResult<Option<Vec<String>>> {
        let path = self.document_path(document_id);
        if !path.exists() {
            return Ok(None);
        }

        let markdown = std::fs::read_to_string(&path)?;
        Ok(Some(self.chunker.chunk_document(&markdown)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        let chunker = SectionChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk_document("").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = SectionChunker::default();
        let chunks = chunker.chunk("Short text.");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text.");
    }

    #[test]
    fn test_long_text_splits_at_sentences() {
        let chunker = SectionChunker::new(50, 0);
        let text = "This is sentence one. This is sentence two. This is sentence three. This is sentence four.";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.ends_with('.'));
        }
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_overlap_prefixes_previous_words() {
        let chunker = SectionChunker::new(40, 15);
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu.";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() > 1);
        // The second chunk starts before the end of the first one
        assert!(chunks[1].start < chunks[0].end);
    }

    #[test]
    fn test_multibyte_text_does_not_panic() {
        let chunker = SectionChunker::new(20, 7);
        let text = "Überprüfung läuft. Größenänderung erfolgt. Ähnlichkeit ermittelt. Ende.";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() > 1);
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert!(rejoined.contains("Ende."));
    }

    #[test]
    fn test_split_sections_on_headings() {
        let chunker = SectionChunker::default();
        let markdown = "preamble line\n# Intro\nHello there.\n\n# Methods\nWe did things.\n";
        let sections = chunker.split_sections(markdown);

        assert_eq!(
            sections,
            vec![
                "preamble line".to_string(),
                "# Intro\nHello there.".to_string(),
                "# Methods\nWe did things.".to_string(),
            ]
        );
    }

    #[test]
    fn test_oversized_section_is_split() {
        let chunker = SectionChunker::new(30, 0);
        let markdown = "# Short\nTiny.\n# Long\nFirst sentence here. Second sentence here. Third one.";
        let chunks = chunker.chunk_document(markdown);

        assert_eq!(chunks[0], "# Short\nTiny.");
        assert!(chunks.len() > 2);
    }

    #[test]
    fn test_markdown_source_missing_file_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = MarkdownChunkSource::new(dir.path());
        assert!(source.get_chunks("unparsed").unwrap().is_none());
    }

    #[test]
    fn test_markdown_source_reads_sections() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("paper.md"), "# A\nfirst\n# B\nsecond\n").unwrap();

        let source = MarkdownChunkSource::new(dir.path());
        let chunks = source.get_chunks("paper").unwrap().unwrap();
        assert_eq!(chunks, vec!["# A\nfirst".to_string(), "# B\nsecond".to_string()]);
    }
}
