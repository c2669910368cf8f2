//! Single-item tag generation.
//!
//! [`TagGenerator`] turns one [`WorkItem`] into a tag list: it builds a chat
//! prompt from the current vocabulary and the item's title and url, drains the
//! streamed response from a [`RemoteGenerator`], then parses the text into
//! tags.

use futures::StreamExt;
use tracing::debug;

use crate::error::GenerationError;
use crate::traits::RemoteGenerator;
use crate::{ChatMessage, WorkItem};

const SYSTEM_PROMPT: &str = "You assign short topical tags to web pages. \
Reply with 3 to 5 tags separated by commas and nothing else. \
Prefer tags from the existing vocabulary when they fit. \
Use lowercase unless the tag is a proper noun.";

/// Maximum vocabulary entries included in a prompt.
const MAX_VOCABULARY_IN_PROMPT: usize = 200;

/// Wraps a [`RemoteGenerator`] with prompt construction and response parsing.
#[derive(Debug, Clone)]
pub struct TagGenerator<G> {
    remote: G,
}

impl<G: RemoteGenerator> TagGenerator<G> {
    pub fn new(remote: G) -> Self {
        Self { remote }
    }

    /// Generates tags for `item`.
    ///
    /// # Errors
    ///
    /// Returns the remote error unchanged (including
    /// [`GenerationError::RateLimited`]), or [`GenerationError::EmptyResult`]
    /// when the response contains no usable tag.
    pub async fn generate(
        &self,
        item: &WorkItem,
        vocabulary: &[String],
    ) -> Result<Vec<String>, GenerationError> {
        let messages = build_messages(item, vocabulary);
        let mut stream = self.remote.generate(&messages).await?;

        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk?);
        }
        debug!(url = %item.url, response = %text, "Generation finished");

        let tags = parse_tags(&text);
        if tags.is_empty() {
            return Err(GenerationError::EmptyResult);
        }
        Ok(tags)
    }
}

/// Builds the system and user messages for one item.
pub fn build_messages(item: &WorkItem, vocabulary: &[String]) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    if !vocabulary.is_empty() {
        let shown = &vocabulary[..vocabulary.len().min(MAX_VOCABULARY_IN_PROMPT)];
        prompt.push_str("Existing tags: ");
        prompt.push_str(&shown.join(", "));
        prompt.push_str("\n\n");
    }
    prompt.push_str("Title: ");
    prompt.push_str(item.title.trim());
    prompt.push_str("\nURL: ");
    prompt.push_str(item.url.trim());

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

/// Parses a raw model response into a tag list.
///
/// Removes surrounding code-fence markers, splits on comma-like separators and
/// newlines, trims quotes, bullets and leading `#`, then drops empty tokens
/// and case-insensitive duplicates. Order of first appearance is kept.
///
/// # Examples
///
/// ```
/// use retag_core::generator::parse_tags;
///
/// assert_eq!(parse_tags("```\nrust, async，tokio\n```"), vec!["rust", "async", "tokio"]);
/// assert!(parse_tags("  ,  ").is_empty());
/// ```
pub fn parse_tags(raw: &str) -> Vec<String> {
    let body = strip_code_fence(raw.trim());

    let mut tags: Vec<String> = Vec::new();
    for token in body.split(is_separator) {
        let tag = token
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim()
            .trim_matches(['"', '\'', '`'])
            .trim_start_matches('#')
            .trim();
        if tag.is_empty() {
            continue;
        }
        if tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        tags.push(tag.to_string());
    }
    tags
}

fn is_separator(c: char) -> bool {
    matches!(c, ',' | '，' | '、' | ';' | '；' | '\n' | '\r')
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an info string such as ```text on the opening line.
    let rest = match rest.find('\n') {
        Some(pos) if !rest[..pos].contains(',') => &rest[pos + 1..],
        _ => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
