// src/recommendation/chunking.rs
//! Text preparation for the job index: HTML cleanup and recursive character splitting

use scraper::Html;
use tracing::{debug, warn};

/// Splitter settings. Sizes are measured in characters.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Tried in order; the empty separator splits into single characters.
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            separators: ["\n\n", "\n", " ", ""].iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A piece of text to index, identified by `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub label: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub key: String,
    pub label: String,
    pub chunk_index: usize,
    pub content: String,
}

/// Strip tags, decode entities and collapse whitespace, keeping line breaks.
pub fn clean_html(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(raw);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `separator`, attaching each separator to the piece that follows it.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(text[start..index].to_string());
        }
        start = index;
    }
    pieces.push(text[start..].to_string());
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    config: ChunkingConfig,
}

impl Default for RecursiveCharacterSplitter {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

impl RecursiveCharacterSplitter {
    pub fn new(mut config: ChunkingConfig) -> Self {
        if config.chunk_overlap >= config.chunk_size {
            warn!(
                "Chunk overlap {} is not smaller than chunk size {}, reducing it",
                config.chunk_overlap, config.chunk_size
            );
            config.chunk_overlap = config.chunk_size / 2;
        }
        if config.separators.is_empty() {
            config.separators.push(String::new());
        }
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    pub fn split_documents(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        let chunks: Vec<DocumentChunk> = documents
            .iter()
            .flat_map(|document| {
                self.split_text(&document.content)
                    .into_iter()
                    .enumerate()
                    .map(|(chunk_index, content)| DocumentChunk {
                        key: document.key.clone(),
                        label: document.label.clone(),
                        chunk_index,
                        content,
                    })
            })
            .collect();

        debug!("Split {} documents into {} chunks", documents.len(), chunks.len());
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut final_chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece.trim().to_string());
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks.retain(|chunk| !chunk.is_empty());
        final_chunks
    }

    /// Greedily pack small splits into chunks, carrying the tail of each
    /// chunk into the next one as overlap.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let chunk_overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            if total + len > chunk_size && !current.is_empty() {
                let joined: String = current.iter().copied().collect();
                let trimmed = joined.trim();
                if !trimmed.is_empty() {
                    docs.push(trimmed.to_string());
                }

                while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            current.push_back(split);
            total += len;
        }

        let joined: String = current.iter().copied().collect();
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            docs.push(trimmed.to_string());
        }
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_splitter(chunk_size: usize, chunk_overlap: usize) -> RecursiveCharacterSplitter {
        RecursiveCharacterSplitter::new(ChunkingConfig {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        })
    }

    fn words(count: usize) -> String {
        (0..count)
            .map(|i| format!("w{:02}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_clean_html() {
        assert_eq!(
            clean_html("<p>Senior <b>Rust</b> developer &amp; mentor</p>\n<ul><li>Remote</li></ul>"),
            "Senior Rust developer & mentor\nRemote"
        );
        assert_eq!(clean_html("plain   text"), "plain text");
        assert_eq!(clean_html("   "), "");
    }

    #[test]
    fn test_split_keeping_separator() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = RecursiveCharacterSplitter::default();
        assert_eq!(splitter.split_text("  Title: Cook  "), vec!["Title: Cook"]);
        assert!(splitter.split_text("   ").is_empty());
    }

    #[test]
    fn test_words_are_packed_with_overlap() {
        let chunks = small_splitter(20, 8).split_text(&words(12));

        assert_eq!(chunks[0], "w00 w01 w02 w03 w04");
        assert_eq!(chunks[1], "w03 w04 w05 w06 w07");
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 20));
        assert!(chunks.last().unwrap().ends_with("w11"));
    }

    #[test]
    fn test_paragraphs_are_preferred_split_points() {
        let paragraph_a = "a".repeat(600);
        let paragraph_b = "b".repeat(600);
        let text = format!("{}\n\n{}", paragraph_a, paragraph_b);

        let chunks = RecursiveCharacterSplitter::default().split_text(&text);
        assert_eq!(chunks, vec![paragraph_a, paragraph_b]);
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(2500);
        let chunks = RecursiveCharacterSplitter::default().split_text(&text);

        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 1000));
    }

    #[test]
    fn test_split_documents_numbers_chunks_per_document() {
        let splitter = small_splitter(20, 5);
        let documents = vec![
            Document {
                key: "1".to_string(),
                label: "Cook".to_string(),
                content: words(10),
            },
            Document {
                key: "2".to_string(),
                label: "Driver".to_string(),
                content: "short".to_string(),
            },
        ];

        let chunks = splitter.split_documents(&documents);
        let first_doc: Vec<_> = chunks.iter().filter(|c| c.key == "1").collect();
        assert!(first_doc.len() > 1);
        assert!(first_doc
            .iter()
            .enumerate()
            .all(|(i, chunk)| chunk.chunk_index == i && chunk.label == "Cook"));

        let last = chunks.last().unwrap();
        assert_eq!(last.key, "2");
        assert_eq!(last.chunk_index, 0);
        assert_eq!(last.content, "short");
    }
}
