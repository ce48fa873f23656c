// Library interface for the omcproxy compiler client
// This allows the console binary, benchmarks and tests to access internal modules

pub mod cache;
pub mod channel;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod proxy;
pub mod supervisor;
pub mod transcript;
pub mod value;
