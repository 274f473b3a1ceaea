pub mod extract;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod similarity;
pub mod status;
