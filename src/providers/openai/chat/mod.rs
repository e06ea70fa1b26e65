pub mod api;
pub mod model;

pub use model::OpenAIChatModel;
