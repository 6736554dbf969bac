//! MarketMind Library
//!
//! Reactive market data and trading journal backend

pub mod config;
pub mod journal;
pub mod market;
pub mod persistence;
pub mod risk;
pub mod store;
pub mod strategy;
pub mod types;
pub mod utils;
