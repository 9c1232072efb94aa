use anyhow::{anyhow, Context, Result};
use hf_hub::api::sync::Api;
use tokenizers::Tokenizer;

use super::{count_words, TokenCounter};

#[derive(Debug, Clone)]
pub struct HfTokenCounter {
    inner: Tokenizer,
}

impl HfTokenCounter {
    // fetches tokenizer.json from the HF Hub (cached by hf-hub); truncation stays off so long
    // documents are counted in full
    pub fn from_hub(repo: &str) -> Result<Self> {
        let api = Api::new().context("init hf-hub api")?;
        let path = api
            .model(repo.to_string())
            .get("tokenizer.json")
            .with_context(|| format!("download tokenizer.json for {repo}"))?;
        let mut inner = Tokenizer::from_file(&path).map_err(|e| anyhow!("{}", e))?;
        inner.with_truncation(None).map_err(|e| anyhow!("{}", e))?;
        inner.with_padding(None);
        Ok(Self { inner })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        // encode only fails on normalizer errors; fall back to the word count
        self.inner
            .encode(text, false)
            .map(|enc| enc.get_ids().len())
            .unwrap_or_else(|_| count_words(text))
    }
}
