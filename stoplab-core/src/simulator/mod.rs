//! Position simulator — long-only stop-loss / take-profit walk over daily closes.
//!
//! One sequential pass:
//! 1. Align the signal onto the price dates (missing → flat)
//! 2. Step the trade state machine bar by bar, recording position and entry price
//! 3. Build the return ledger from the finished position sequence
//! 4. Extract round-trip trades from the transitions
//!
//! Every call owns its own `TradeState`; independent runs share nothing.

pub mod ledger;
pub mod state;
pub mod trades;

pub use ledger::Ledger;
pub use state::{ExitTriggers, Exposure, RiskLimits, TradeState, Transition};
pub use trades::{extract_trades, Trade, TradeExit};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{EquityCurve, PriceSeries, SignalSeries};

/// Errors from the simulator boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Risk and cost parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Exit when close <= entry * (1 - stop_loss_pct). In (0, 1).
    pub stop_loss_pct: f64,
    /// Exit when close >= entry * (1 + take_profit_pct). In (0, 1).
    pub take_profit_pct: f64,
    /// Basis points charged per unit of turnover. >= 0.
    pub cost_bps: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.05,
            take_profit_pct: 0.10,
            cost_bps: 10.0,
        }
    }
}

impl SimulationParams {
    pub fn new(
        stop_loss_pct: f64,
        take_profit_pct: f64,
        cost_bps: f64,
    ) -> Result<Self, SimulationError> {
        let params = Self {
            stop_loss_pct,
            take_profit_pct,
            cost_bps,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        check_fraction("stop_loss_pct", self.stop_loss_pct)?;
        check_fraction("take_profit_pct", self.take_profit_pct)?;
        if !self.cost_bps.is_finite() || self.cost_bps < 0.0 {
            return Err(SimulationError::InvalidParameter {
                name: "cost_bps",
                value: self.cost_bps,
                reason: "must be finite and >= 0",
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> RiskLimits {
        RiskLimits {
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
        }
    }
}

fn check_fraction(name: &'static str, value: f64) -> Result<(), SimulationError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidParameter {
            name,
            value,
            reason: "must be in (0, 1)",
        })
    }
}

/// Everything known about one bar after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub signal: bool,
    pub position: Exposure,
    pub entry_price: Option<f64>,
    pub daily_return: f64,
    pub position_lag: f64,
    pub turnover: f64,
    pub cost: f64,
    pub net_return: f64,
    pub equity_strategy: f64,
    pub equity_buy_and_hold: f64,
    pub transition: Transition,
}

/// Output of `simulate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub params: SimulationParams,
    pub records: Vec<StepRecord>,
    pub trades: Vec<Trade>,
}

impl SimulationResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn positions(&self) -> Vec<Exposure> {
        self.records.iter().map(|r| r.position).collect()
    }

    pub fn net_returns(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.net_return).collect()
    }

    pub fn daily_returns(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.daily_return).collect()
    }

    pub fn strategy_equity(&self) -> EquityCurve {
        self.curve(|r| r.equity_strategy)
    }

    pub fn buy_and_hold_equity(&self) -> EquityCurve {
        self.curve(|r| r.equity_buy_and_hold)
    }

    /// Fraction of bars spent long.
    pub fn exposure_ratio(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let long = self.records.iter().filter(|r| r.position.is_long()).count();
        long as f64 / self.records.len() as f64
    }

    pub fn total_cost(&self) -> f64 {
        self.records.iter().map(|r| r.cost).sum()
    }

    fn curve(&self, value: impl Fn(&StepRecord) -> f64) -> EquityCurve {
        let (dates, values) = self.records.iter().map(|r| (r.date, value(r))).unzip();
        EquityCurve::from_parts(dates, values)
    }
}

/// Run the stop-loss / take-profit state machine over `prices`.
pub fn simulate(
    prices: &PriceSeries,
    signal: &SignalSeries,
    params: &SimulationParams,
) -> Result<SimulationResult, SimulationError> {
    params.validate()?;

    let wants_long = signal.align_to(prices);
    let limits = params.limits();
    let n = prices.len();

    let mut state = TradeState::Flat;
    let mut positions = Vec::with_capacity(n);
    let mut entry_prices = Vec::with_capacity(n);
    let mut transitions = Vec::with_capacity(n);

    for (point, &want) in prices.iter().zip(wants_long.iter()) {
        let (next, transition) = state.step(point.close, want, &limits);
        match transition {
            Transition::Enter => {
                debug!(date = %point.date, price = point.close, "enter long");
            }
            Transition::Exit(triggers) => {
                debug!(
                    date = %point.date,
                    price = point.close,
                    entry_price = state.entry_price(),
                    reason = %triggers.label(),
                    "exit long"
                );
            }
            Transition::Hold | Transition::StayFlat => {}
        }
        positions.push(next.exposure());
        entry_prices.push(next.entry_price());
        transitions.push(transition);
        state = next;
    }

    let ledger = Ledger::build(prices.closes(), &positions, params.cost_bps);

    let records: Vec<StepRecord> = (0..n)
        .map(|i| StepRecord {
            date: prices.dates()[i],
            close: prices.closes()[i],
            signal: wants_long[i],
            position: positions[i],
            entry_price: entry_prices[i],
            daily_return: ledger.daily_return[i],
            position_lag: ledger.position_lag[i],
            turnover: ledger.turnover[i],
            cost: ledger.cost[i],
            net_return: ledger.net_return[i],
            equity_strategy: ledger.equity_strategy[i],
            equity_buy_and_hold: ledger.equity_buy_and_hold[i],
            transition: transitions[i],
        })
        .collect();

    let trades = extract_trades(&records);

    info!(
        bars = n,
        trades = trades.len(),
        final_equity = ledger.equity_strategy[n - 1],
        "simulation complete"
    );

    Ok(SimulationResult {
        params: *params,
        records,
        trades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> PriceSeries {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..closes.len())
            .map(|i| base + chrono::Duration::days(i as i64))
            .collect();
        PriceSeries::new(dates, closes.to_vec()).unwrap()
    }

    fn flags(prices: &PriceSeries, flags: &[u8]) -> SignalSeries {
        let bools: Vec<bool> = flags.iter().map(|&f| f == 1).collect();
        SignalSeries::from_price_dates(prices, &bools).unwrap()
    }

    fn params(cost_bps: f64) -> SimulationParams {
        SimulationParams::new(0.05, 0.10, cost_bps).unwrap()
    }

    fn position_bits(result: &SimulationResult) -> Vec<u8> {
        result.positions().iter().map(|p| p.as_u8()).collect()
    }

    #[test]
    fn stop_then_reenter_next_bar() {
        let prices = series(&[100.0, 94.0, 101.0]);
        let signal = flags(&prices, &[1, 1, 1]);
        let r = simulate(&prices, &signal, &params(0.0)).unwrap();

        assert_eq!(position_bits(&r), vec![1, 0, 1]);
        assert_eq!(r.records[0].entry_price, Some(100.0));
        assert_eq!(r.records[1].entry_price, None);
        assert_eq!(r.records[2].entry_price, Some(101.0));
        assert!(matches!(
            r.records[1].transition,
            Transition::Exit(ExitTriggers { stop_loss: true, .. })
        ));
    }

    #[test]
    fn exit_bar_never_reenters() {
        // Stop fires on bar 1 while signal is still 1: bar 1 must be flat.
        let prices = series(&[100.0, 90.0]);
        let signal = flags(&prices, &[1, 1]);
        let r = simulate(&prices, &signal, &params(0.0)).unwrap();
        assert_eq!(position_bits(&r), vec![1, 0]);
    }

    #[test]
    fn flat_signal_keeps_equity_at_one() {
        let prices = series(&[100.0, 105.0, 98.0]);
        let signal = flags(&prices, &[0, 0, 0]);
        let r = simulate(&prices, &signal, &params(10.0)).unwrap();

        assert_eq!(position_bits(&r), vec![0, 0, 0]);
        assert_eq!(
            r.strategy_equity().values(),
            &[1.0, 1.0, 1.0]
        );
        assert_eq!(r.total_cost(), 0.0);
        assert!(r.trades.is_empty());
    }

    #[test]
    fn take_profit_exit() {
        let prices = series(&[100.0, 105.0, 111.0, 112.0]);
        let signal = flags(&prices, &[1, 1, 1, 0]);
        let r = simulate(&prices, &signal, &params(0.0)).unwrap();
        assert_eq!(position_bits(&r), vec![1, 1, 0, 0]);
        let trade = &r.trades[0];
        let exit = trade.exit.as_ref().unwrap();
        assert!(exit.triggers.take_profit);
        assert_eq!(exit.index, 2);
        assert_eq!(trade.bars_held, 2);
        assert!((trade.gross_return - 0.11).abs() < 1e-12);
    }

    #[test]
    fn thresholds_anchor_to_latest_entry() {
        // Trade 1 enters at 100, withdrawn at 104. Trade 2 enters at 120.
        // 115 is above trade 1's stop (95) but at/below trade 2's (114) only if anchored
        // to 120: 120 * 0.95 = 114, so 115 holds and 113 stops out.
        let prices = series(&[100.0, 104.0, 120.0, 115.0, 113.0]);
        let signal = flags(&prices, &[1, 0, 1, 1, 1]);
        let r = simulate(&prices, &signal, &params(0.0)).unwrap();
        assert_eq!(position_bits(&r), vec![1, 0, 1, 1, 0]);
        assert_eq!(r.records[3].entry_price, Some(120.0));
        assert!(matches!(
            r.records[4].transition,
            Transition::Exit(ExitTriggers { stop_loss: true, .. })
        ));
    }

    #[test]
    fn open_trade_is_not_liquidated() {
        let prices = series(&[100.0, 101.0, 102.0]);
        let signal = flags(&prices, &[1, 1, 1]);
        let r = simulate(&prices, &signal, &params(10.0)).unwrap();
        assert_eq!(position_bits(&r), vec![1, 1, 1]);
        assert_eq!(r.trades.len(), 1);
        assert!(r.trades[0].is_open());
        assert_eq!(r.trades[0].bars_held, 2);
    }

    #[test]
    fn entry_on_first_bar_is_not_charged() {
        let prices = series(&[100.0, 101.0]);
        let signal = flags(&prices, &[1, 1]);
        let r = simulate(&prices, &signal, &params(50.0)).unwrap();
        assert_eq!(r.total_cost(), 0.0);
    }

    #[test]
    fn costs_applied_on_later_entry_and_exit() {
        let prices = series(&[100.0, 100.0, 100.0, 100.0]);
        let signal = flags(&prices, &[0, 1, 0, 0]);
        let r = simulate(&prices, &signal, &params(10.0)).unwrap();
        assert_eq!(position_bits(&r), vec![0, 1, 0, 0]);
        assert!((r.total_cost() - 0.002).abs() < 1e-15);
        let eq = r.strategy_equity();
        assert!((eq.last().unwrap() - 0.999 * 0.999).abs() < 1e-15);
    }

    #[test]
    fn missing_signal_dates_are_flat() {
        let prices = series(&[100.0, 101.0, 102.0]);
        let signal = SignalSeries::new(vec![(prices.dates()[1], true)]).unwrap();
        let r = simulate(&prices, &signal, &params(0.0)).unwrap();
        assert_eq!(position_bits(&r), vec![0, 1, 0]);
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(SimulationParams::new(0.0, 0.1, 0.0).is_err());
        assert!(SimulationParams::new(0.05, 1.0, 0.0).is_err());
        assert!(SimulationParams::new(0.05, 0.1, -1.0).is_err());
        assert!(SimulationParams::new(f64::NAN, 0.1, 0.0).is_err());

        let prices = series(&[100.0]);
        let signal = flags(&prices, &[1]);
        let bad = SimulationParams {
            stop_loss_pct: 1.5,
            ..SimulationParams::default()
        };
        assert!(matches!(
            simulate(&prices, &signal, &bad),
            Err(SimulationError::InvalidParameter { name: "stop_loss_pct", .. })
        ));
    }

    #[test]
    fn exposure_ratio_counts_long_bars() {
        let prices = series(&[100.0, 101.0, 102.0, 103.0]);
        let signal = flags(&prices, &[1, 1, 0, 0]);
        let r = simulate(&prices, &signal, &params(0.0)).unwrap();
        assert!((r.exposure_ratio() - 0.5).abs() < 1e-12);
    }
}
