//! Trade state machine — two states, guarded transitions, one transition per bar.
//!
//! ```text
//!            signal == 1                  stop | target | signal == 0
//!   Flat ─────────────────► InTrade ───────────────────────────────► Flat
//!    ▲ │ signal == 0          │ ▲ none fired
//!    └─┘ (StayFlat)           └─┘ (Hold)
//! ```
//!
//! The exit guard is evaluated only from `InTrade`, and an exit lands in
//! `Flat` for the rest of the bar: re-entry is considered on the next bar.

use serde::{Deserialize, Serialize};

/// Binary exposure. No leverage, no shorting, no partial sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exposure {
    Flat,
    Long,
}

impl Exposure {
    pub fn as_u8(self) -> u8 {
        match self {
            Exposure::Flat => 0,
            Exposure::Long => 1,
        }
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.as_u8())
    }

    pub fn is_long(self) -> bool {
        self == Exposure::Long
    }
}

/// Stop and target distances, as fractions of the entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLimits {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl RiskLimits {
    pub fn stop_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.stop_loss_pct)
    }

    pub fn target_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.take_profit_pct)
    }
}

/// Which exit conditions fired on an exit bar. More than one may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitTriggers {
    pub stop_loss: bool,
    pub take_profit: bool,
    pub signal_withdrawn: bool,
}

impl ExitTriggers {
    /// Evaluate all three guards against the current trade's entry price.
    pub fn evaluate(entry_price: f64, price: f64, wants_long: bool, limits: &RiskLimits) -> Self {
        Self {
            stop_loss: price <= limits.stop_price(entry_price),
            take_profit: price >= limits.target_price(entry_price),
            signal_withdrawn: !wants_long,
        }
    }

    pub fn any(&self) -> bool {
        self.stop_loss || self.take_profit || self.signal_withdrawn
    }

    /// Short labels for reporting, e.g. `"stop_loss+signal_withdrawn"`.
    pub fn label(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if self.stop_loss {
            parts.push("stop_loss");
        }
        if self.take_profit {
            parts.push("take_profit");
        }
        if self.signal_withdrawn {
            parts.push("signal_withdrawn");
        }
        parts.join("+")
    }
}

/// What happened on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    StayFlat,
    Enter,
    Hold,
    Exit(ExitTriggers),
}

/// Per-run trade state. Owned by a single `simulate` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeState {
    Flat,
    InTrade { entry_price: f64 },
}

impl TradeState {
    /// Advance one bar. Pure: the new state and the transition taken.
    pub fn step(self, price: f64, wants_long: bool, limits: &RiskLimits) -> (TradeState, Transition) {
        match self {
            TradeState::Flat if wants_long => (
                TradeState::InTrade { entry_price: price },
                Transition::Enter,
            ),
            TradeState::Flat => (TradeState::Flat, Transition::StayFlat),
            TradeState::InTrade { entry_price } => {
                let triggers = ExitTriggers::evaluate(entry_price, price, wants_long, limits);
                if triggers.any() {
                    (TradeState::Flat, Transition::Exit(triggers))
                } else {
                    (self, Transition::Hold)
                }
            }
        }
    }

    pub fn exposure(&self) -> Exposure {
        match self {
            TradeState::Flat => Exposure::Flat,
            TradeState::InTrade { .. } => Exposure::Long,
        }
    }

    pub fn entry_price(&self) -> Option<f64> {
        match self {
            TradeState::Flat => None,
            TradeState::InTrade { entry_price } => Some(*entry_price),
        }
    }
}
