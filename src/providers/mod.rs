pub(crate) mod openai;

pub use openai::provider::OPENROUTER_BASE_URL;
pub use openai::{OpenAIChatModel, OpenAIProvider};
