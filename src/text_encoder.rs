//! Tokenization of feedback comments into transformer model inputs.
//!
//! Produces the `input_ids` / `attention_mask` / `token_type_ids` triple the
//! exported sequence-classification models expect, truncated to the model's
//! maximum sequence length.

use anyhow::{anyhow, bail, Result};
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};

/// Model inputs for a single comment (batch size 1)
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedText {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl EncodedText {
    /// Number of tokens after truncation
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Wraps a Hugging Face tokenizer for one classifier.
pub struct TextEncoder {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl TextEncoder {
    /// Load a `tokenizer.json` from disk.
    pub fn from_file<P: AsRef<Path>>(path: P, max_length: usize) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {:?}: {}", path, e))?;
        Self::from_tokenizer(tokenizer, max_length)
    }

    /// Wrap an already constructed tokenizer, enabling truncation.
    pub fn from_tokenizer(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Invalid truncation settings: {}", e))?;
        tokenizer.with_padding(None);

        Ok(Self {
            tokenizer,
            max_length,
        })
    }

    /// Encode one comment, including the model's special tokens.
    pub fn encode(&self, text: &str) -> Result<EncodedText> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let widen = |values: &[u32]| values.iter().map(|&v| i64::from(v)).collect::<Vec<_>>();
        let encoded = EncodedText {
            input_ids: widen(encoding.get_ids()),
            attention_mask: widen(encoding.get_attention_mask()),
            token_type_ids: widen(encoding.get_type_ids()),
        };

        if encoded.is_empty() {
            bail!("Comment encodes to zero tokens");
        }
        Ok(encoded)
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}
