use anyhow::{anyhow, Result};
use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};
use tracing::warn;

use super::TokenCounter;

pub struct TiktokenCounter {
    model: String,
    bpe: CoreBPE,
}

impl TiktokenCounter {
    // unknown model names fall back to cl100k_base (gpt-3.5/gpt-4 family)
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = match get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(e) => {
                warn!(model, error = %e, "unknown tokenizer model; using cl100k_base");
                cl100k_base().map_err(|e| anyhow!("load cl100k_base: {}", e))?
            }
        };
        Ok(Self { model: model.to_string(), bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

impl std::fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenCounter").field("model", &self.model).finish()
    }
}
