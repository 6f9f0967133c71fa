//! StopLab Core — series types, stop-loss/take-profit simulator, performance evaluation.
//!
//! This crate contains the computation layer:
//! - Validated price and signal series
//! - Two-state position simulator with stop, target and signal-withdrawal exits
//! - Return ledger with turnover costs and buy-and-hold benchmark
//! - CAGR / Sharpe / max drawdown evaluation
//! - Indicators and signal generators that feed the simulator
//! - Price providers (Yahoo Finance, CSV, synthetic)

pub mod data;
pub mod domain;
pub mod indicators;
pub mod performance;
pub mod signals;
pub mod simulator;
