//! Return attribution over a finished position sequence.
//!
//! Computed after the state machine has run. Today's return is earned on
//! yesterday's position; turnover is charged on the bar the position changes.

use crate::domain::equity::cumulative_product;

use super::state::Exposure;

/// Column-oriented per-bar accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub daily_return: Vec<f64>,
    pub position_lag: Vec<f64>,
    pub turnover: Vec<f64>,
    pub cost: Vec<f64>,
    pub net_return: Vec<f64>,
    pub equity_strategy: Vec<f64>,
    pub equity_buy_and_hold: Vec<f64>,
}

impl Ledger {
    /// `closes` and `positions` must have equal length.
    pub fn build(closes: &[f64], positions: &[Exposure], cost_bps: f64) -> Self {
        debug_assert_eq!(closes.len(), positions.len());
        let n = closes.len();
        let cost_rate = cost_bps / 10000.0;

        let mut daily_return = vec![0.0; n];
        let mut position_lag = vec![0.0; n];
        let mut turnover = vec![0.0; n];
        let mut cost = vec![0.0; n];
        let mut net_return = vec![0.0; n];

        for i in 1..n {
            daily_return[i] = closes[i] / closes[i - 1] - 1.0;
            position_lag[i] = positions[i - 1].as_f64();
            turnover[i] = (positions[i].as_f64() - positions[i - 1].as_f64()).abs();
            cost[i] = turnover[i] * cost_rate;
            net_return[i] = position_lag[i] * daily_return[i] - cost[i];
        }

        let equity_strategy = cumulative_product(&net_return);
        let equity_buy_and_hold = cumulative_product(&daily_return);

        Self {
            daily_return,
            position_lag,
            turnover,
            cost,
            net_return,
            equity_strategy,
            equity_buy_and_hold,
        }
    }
}
