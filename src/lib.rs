pub mod cli;
pub mod collect;
pub mod config;
pub mod core;
pub mod diff;
pub mod engine;
pub mod exit;
pub mod export;
pub mod rules;
pub mod score;
pub mod ui;
