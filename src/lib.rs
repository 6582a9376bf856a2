pub mod analyze;
pub mod assembly;
pub mod cli;
pub mod config;
pub mod output;
pub mod record;
pub mod source;
pub mod stream;
pub mod tokenizer;
