// docrag/src/embeddings/tokenize.rs
//
// Tokenization wrapper for BERT-style models

use std::sync::Arc;
use thiserror::Error;
use tokenizers::Tokenizer;

/// Tokenizer wrapper for embedding models
pub struct EmbedTokenizer {
    tokenizer: Arc<Tokenizer>,
    max_length: usize,
    truncate: bool,
}

/// Tokenized input ready for model inference
#[derive(Debug, Clone)]
pub struct TokenizedInput {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

/// Tokenizer errors
#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Failed to load tokenizer: {0}")]
    LoadFailed(String),

    #[error("Failed to encode text: {0}")]
    EncodeFailed(String),

    #[error("Input has {tokens} tokens, model limit is {max_length}")]
    InputTooLong { tokens: usize, max_length: usize },
}

impl EmbedTokenizer {
    /// Create tokenizer from tokenizer.json contents
    pub fn from_json(
        tokenizer_json: &str,
        max_length: usize,
        truncate: bool,
    ) -> Result<Self, TokenizerError> {
        let tokenizer = Tokenizer::from_bytes(tokenizer_json.as_bytes())
            .map_err(|e| TokenizerError::LoadFailed(e.to_string()))?;

        Ok(Self {
            tokenizer: Arc::new(tokenizer),
            max_length,
            truncate,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Tokenize a single text
    pub fn encode(&self, text: &str) -> Result<TokenizedInput, TokenizerError> {
        let encoding = self.tokenizer.encode(text, true)
            .map_err(|e| TokenizerError::EncodeFailed(e.to_string()))?;

        let input = TokenizedInput {
            input_ids: encoding.get_ids().iter().map(|&id| id as i64).collect(),
            attention_mask: encoding.get_attention_mask().iter().map(|&m| m as i64).collect(),
            token_type_ids: encoding.get_type_ids().iter().map(|&id| id as i64).collect(),
        };

        apply_limit(input, self.max_length, self.truncate)
    }

    /// Tokenize a batch of texts
    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<TokenizedInput>, TokenizerError> {
        texts.iter()
            .map(|text| self.encode(text))
            .collect()
    }

    /// Pad batch to uniform length
    pub fn pad_batch(&self, inputs: Vec<TokenizedInput>) -> (Vec<TokenizedInput>, usize) {
        pad_batch(inputs)
    }
}

/// Apply a model's sequence limit: truncate or reject
pub fn apply_limit(
    mut input: TokenizedInput,
    max_length: usize,
    truncate: bool,
) -> Result<TokenizedInput, TokenizerError> {
    let tokens = input.input_ids.len();
    if tokens <= max_length {
        return Ok(input);
    }

    if !truncate {
        return Err(TokenizerError::InputTooLong { tokens, max_length });
    }

    input.input_ids.truncate(max_length);
    input.attention_mask.truncate(max_length);
    input.token_type_ids.truncate(max_length);
    Ok(input)
}

/// Pad every input to the longest sequence in the batch with zeros
pub fn pad_batch(inputs: Vec<TokenizedInput>) -> (Vec<TokenizedInput>, usize) {
    if inputs.is_empty() {
        return (inputs, 0);
    }

    let max_len = inputs.iter()
        .map(|i| i.input_ids.len())
        .max()
        .unwrap_or(0);

    let padded: Vec<TokenizedInput> = inputs.into_iter()
        .map(|mut input| {
            let pad_len = max_len - input.input_ids.len();
            if pad_len > 0 {
                input.input_ids.extend(vec![0i64; pad_len]);
                input.attention_mask.extend(vec![0i64; pad_len]);
                input.token_type_ids.extend(vec![0i64; pad_len]);
            }
            input
        })
        .collect();

    (padded, max_len)
}
