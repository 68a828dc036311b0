use std::path::Path;

use anyhow::{Result, anyhow};
use tokenizers::Tokenizer;

/// Token strings treated as end-of-generation when the tokenizer knows them.
pub const EOS_TOKEN_CANDIDATES: &[&str] = &[
    "<eos>",
    "</s>",
    "<end_of_turn>",
    "<|endoftext|>",
    "<|im_end|>",
    "<|eot_id|>",
    "<|end_of_text|>",
];

pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|err| anyhow!("failed to load tokenizer from {}: {err}", path.display()))
}

pub fn encode(tokenizer: &Tokenizer, text: &str, add_special_tokens: bool) -> Result<Vec<u32>> {
    let encoding = tokenizer
        .encode(text, add_special_tokens)
        .map_err(|err| anyhow!("tokenization failed: {err}"))?;
    Ok(encoding.get_ids().to_vec())
}

pub fn decode(tokenizer: &Tokenizer, ids: &[u32]) -> Result<String> {
    tokenizer
        .decode(ids, true)
        .map_err(|err| anyhow!("detokenization failed: {err}"))
}

/// Ids of every candidate end-of-generation token present in the vocabulary.
pub fn resolve_eos_tokens(tokenizer: &Tokenizer, candidates: &[&str]) -> Vec<u32> {
    let mut ids = candidates
        .iter()
        .filter_map(|token| tokenizer.token_to_id(token))
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids.dedup();
    ids
}
