//! Token accounting for judgment requests.
//!
//! The oracle is given a response budget sized inversely to the outbound
//! prompt so a fixed request-plus-response total is respected.

use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::config::RankConfig;

/// Tokens reserved for chat framing overhead.
pub const FRAMING_TOKENS: usize = 50;

static CL100K: Lazy<Option<CoreBPE>> = Lazy::new(|| cl100k_base().ok());

/// Count tokens using the cl100k_base tokenizer.
///
/// Falls back to a 4-chars-per-token estimate if the tokenizer fails to load.
pub fn count_tokens(text: &str) -> usize {
    match CL100K.as_ref() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.chars().count().div_ceil(4),
    }
}

/// `clamp(total - prompt_tokens - framing, min, max)`, saturating at the floor.
pub fn response_budget(prompt_tokens: usize, config: &RankConfig) -> u32 {
    let remaining = config
        .total_token_budget
        .saturating_sub(prompt_tokens)
        .saturating_sub(FRAMING_TOKENS);
    let remaining = u32::try_from(remaining).unwrap_or(u32::MAX);
    remaining
        .min(config.max_response_tokens)
        .max(config.min_response_tokens)
}
