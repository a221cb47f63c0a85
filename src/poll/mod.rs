// src/poll/mod.rs
mod strategy;

pub use strategy::PollStrategy;
