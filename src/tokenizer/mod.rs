pub mod hf;
pub mod tiktoken;

use anyhow::Result;

pub use hf::HfTokenCounter;
pub use tiktoken::TiktokenCounter;

/// Counts tokens for one model. Implementations must be deterministic for a given model.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

// "hf:<repo>" selects a Hugging Face tokenizer, anything else goes through tiktoken
pub fn build_counter(model: &str) -> Result<Box<dyn TokenCounter>> {
    if let Some(repo) = model.strip_prefix("hf:") {
        return Ok(Box::new(HfTokenCounter::from_hub(repo)?));
    }
    Ok(Box::new(TiktokenCounter::for_model(model)?))
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// One token per whitespace-separated word. Keeps engine tests independent of BPE tables.
#[cfg(test)]
pub struct WordCounter;

#[cfg(test)]
impl TokenCounter for WordCounter {
    fn count_tokens(&self, text: &str) -> usize {
        count_words(text)
    }
}
