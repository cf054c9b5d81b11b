pub mod app;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod runner;
pub mod scanner;
pub mod sink;
pub mod target;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
