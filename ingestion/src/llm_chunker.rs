use newsloom_core::config::LlmConfig;
use newsloom_core::domain::ChunkType;
use newsloom_core::error::{Classify, ErrorClass};
use serde::Deserialize;
use storage::NewChunk;
use thiserror::Error;

fn estimate_tokens(text: &str) -> i32 {
    (text.chars().count() / 4).max(1) as i32
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    text: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    #[serde(rename = "type")]
    chunk_type: Option<String>,
}

/// The four accepted response shapes (§4.3), modeled as a tagged union with one parser
/// per variant. The paragraph fallback is deliberately not a variant here: it is what
/// `chunk` falls back to once every variant below fails to parse, and unlike these it
/// can never itself fail.
#[derive(Debug)]
enum LlmChunkResponse {
    NamedArray(Vec<RawChunk>),
    BareArray(Vec<RawChunk>),
    SingleObject(RawChunk),
}

#[derive(Debug, Deserialize)]
struct NamedArrayShape {
    chunks: Vec<RawChunk>,
}

impl LlmChunkResponse {
    fn parse(raw: &str) -> Option<Self> {
        Self::parse_named_array(raw)
            .or_else(|| Self::parse_bare_array(raw))
            .or_else(|| Self::parse_single_object(raw))
            .or_else(|| Self::parse_embedded_fragment(raw))
    }

    fn parse_named_array(raw: &str) -> Option<Self> {
        serde_json::from_str::<NamedArrayShape>(raw)
            .ok()
            .map(|shape| LlmChunkResponse::NamedArray(shape.chunks))
    }

    fn parse_bare_array(raw: &str) -> Option<Self> {
        serde_json::from_str::<Vec<RawChunk>>(raw)
            .ok()
            .map(LlmChunkResponse::BareArray)
    }

    fn parse_single_object(raw: &str) -> Option<Self> {
        serde_json::from_str::<RawChunk>(raw)
            .ok()
            .map(LlmChunkResponse::SingleObject)
    }

    /// Extracts the largest balanced `{...}` or `[...]` substring from free-form text
    /// and retries the three structured parsers against just that fragment.
    fn parse_embedded_fragment(raw: &str) -> Option<Self> {
        let fragment = largest_balanced_fragment(raw)?;
        Self::parse_named_array(&fragment)
            .or_else(|| Self::parse_bare_array(&fragment))
            .or_else(|| Self::parse_single_object(&fragment))
    }

    fn into_raw_chunks(self) -> Vec<RawChunk> {
        match self {
            LlmChunkResponse::NamedArray(chunks) => chunks,
            LlmChunkResponse::BareArray(chunks) => chunks,
            LlmChunkResponse::SingleObject(chunk) => vec![chunk],
        }
    }
}

fn largest_balanced_fragment(raw: &str) -> Option<String> {
    let mut best: Option<(usize, usize)> = None;
    let bytes = raw.as_bytes();
    for (start, &open) in bytes.iter().enumerate() {
        let close = match open {
            b'{' => b'}',
            b'[' => b']',
            _ => continue,
        };
        let mut depth = 0i32;
        for (offset, &c) in bytes[start..].iter().enumerate() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    let span = end - start;
                    if best.map(|(s, e)| e - s < span).unwrap_or(true) {
                        best = Some((start, end));
                    }
                    break;
                }
            }
        }
    }
    best.map(|(s, e)| raw[s..e].to_string())
}

#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
}

impl Classify for ChunkerError {
    fn class(&self) -> ErrorClass {
        match self {
            ChunkerError::Network(_) => ErrorClass::TransientIo,
        }
    }
}

/// Result of one `chunk()` call: the chunks themselves, plus whether the LLM's
/// response failed to parse under every shape in §4.3 and the paragraph fallback had
/// to run instead. The chunking service turns `used_fallback` into a `parse_error`
/// diagnostic row even though chunking itself still succeeds.
pub struct ChunkOutcome {
    pub chunks: Vec<NewChunk>,
    pub used_fallback: bool,
}

pub struct LlmChunker {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmChunker {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    pub async fn chunk(&self, clean_text: &str) -> Result<ChunkOutcome, ChunkerError> {
        let prompt = build_prompt(clean_text, self.config.max_chunk_chars);
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&body)
            .send()
            .await?;
        let raw_text = response.text().await.unwrap_or_default();

        let chunks = LlmChunkResponse::parse(&raw_text)
            .map(LlmChunkResponse::into_raw_chunks)
            .unwrap_or_default();

        let used_fallback = chunks.is_empty();
        let normalized = if used_fallback {
            paragraph_fallback(clean_text)
        } else {
            normalize_chunks(chunks, self.config.max_chunk_chars)
        };

        Ok(ChunkOutcome {
            chunks: normalized,
            used_fallback,
        })
    }
}

fn build_prompt(clean_text: &str, max_chars: usize) -> String {
    format!(
        "Split the following article into semantically coherent chunks of at most {max_chars} \
         characters each. Respond as JSON: {{\"chunks\": [{{\"text\": \"...\", \"topic\": \"...\", \
         \"type\": \"intro|body|conclusion|other\"}}]}}.\n\nArticle:\n{clean_text}"
    )
}

/// Trims and drops empty chunks, clips each to `max_chars` by splitting at the nearest
/// preceding sentence boundary, reassigns dense `chunk_index`es, and clamps `type` to
/// the known enum values (§4.3).
fn normalize_chunks(raw: Vec<RawChunk>, max_chars: usize) -> Vec<NewChunk> {
    let mut out = Vec::new();
    for chunk in raw {
        let trimmed = chunk.text.trim();
        if trimmed.is_empty() {
            continue;
        }
        for piece in soft_split(trimmed, max_chars) {
            let token_estimate = estimate_tokens(&piece);
            out.push(NewChunk {
                chunk_index: out.len() as i32,
                text: piece,
                topic: chunk.topic.clone(),
                chunk_type: clamp_chunk_type(chunk.chunk_type.as_deref()),
                token_estimate,
            });
        }
    }
    out
}

fn clamp_chunk_type(raw: Option<&str>) -> ChunkType {
    match raw.unwrap_or("other").to_lowercase().as_str() {
        "intro" => ChunkType::Intro,
        "body" => ChunkType::Body,
        "conclusion" => ChunkType::Conclusion,
        _ => ChunkType::Other,
    }
}

fn soft_split(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut remaining = text;
    while remaining.chars().count() > max_chars {
        let limit_byte = byte_index_at_char(remaining, max_chars);
        let window = &remaining[..limit_byte];
        let split_at = window
            .rfind(['.', '!', '?'])
            .map(|idx| idx + 1)
            .unwrap_or(limit_byte);
        let (head, tail) = remaining.split_at(split_at.max(1));
        pieces.push(head.trim().to_string());
        remaining = tail.trim_start();
    }
    if !remaining.is_empty() {
        pieces.push(remaining.to_string());
    }
    pieces
}

fn byte_index_at_char(text: &str, char_count: usize) -> usize {
    text.char_indices()
        .nth(char_count)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Paragraph fallback (§4.3): splits on blank lines, emits chunks with `topic=None`
/// and `type="body"`. Always succeeds, even on an empty article body.
pub fn paragraph_fallback(clean_text: &str) -> Vec<NewChunk> {
    clean_text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(i, text)| NewChunk {
            chunk_index: i as i32,
            text: text.to_string(),
            topic: None,
            chunk_type: ChunkType::Body,
            token_estimate: estimate_tokens(text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_array_shape() {
        let raw = r#"{"chunks": [{"text": "hello", "topic": "greeting", "type": "intro"}]}"#;
        let parsed = LlmChunkResponse::parse(raw).unwrap().into_raw_chunks();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "hello");
    }

    #[test]
    fn parses_bare_array_shape() {
        let raw = r#"[{"text": "a"}, {"text": "b"}]"#;
        let parsed = LlmChunkResponse::parse(raw).unwrap().into_raw_chunks();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn parses_single_object_shape() {
        let raw = r#"{"text": "solo chunk", "type": "body"}"#;
        let parsed = LlmChunkResponse::parse(raw).unwrap().into_raw_chunks();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "solo chunk");
    }

    #[test]
    fn parses_embedded_fragment_in_surrounding_prose() {
        let raw = "Sure, here is the JSON: {\"chunks\": [{\"text\": \"embedded\"}]} Hope that helps!";
        let parsed = LlmChunkResponse::parse(raw).unwrap().into_raw_chunks();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "embedded");
    }

    #[test]
    fn paragraph_fallback_splits_on_blank_lines() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird.";
        let chunks = paragraph_fallback(text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks
            .iter()
            .all(|c| c.chunk_type == ChunkType::Body && c.topic.is_none()));
    }

    #[test]
    fn unknown_type_clamps_to_other() {
        assert_eq!(clamp_chunk_type(Some("epilogue")), ChunkType::Other);
        assert_eq!(clamp_chunk_type(None), ChunkType::Other);
    }

    #[test]
    fn soft_split_breaks_long_text_at_sentence_boundary() {
        let text = "Sentence one is here. Sentence two is here. Sentence three is here.";
        let pieces = soft_split(text, 30);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.chars().count() <= 40);
        }
    }
}
