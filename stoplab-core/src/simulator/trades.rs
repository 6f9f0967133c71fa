//! Round-trip extraction from the per-bar transition record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::state::{ExitTriggers, Transition};
use super::StepRecord;

/// Where and why a trade closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExit {
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
    pub triggers: ExitTriggers,
}

/// One entry-to-exit round trip. `exit` is `None` for a trade still open
/// when the input ran out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit: Option<TradeExit>,
    pub bars_held: usize,
    /// Price return from entry to exit (or to the last close if open), before costs.
    pub gross_return: f64,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    pub fn is_winner(&self) -> bool {
        self.gross_return > 0.0
    }
}

pub fn extract_trades(records: &[StepRecord]) -> Vec<Trade> {
    let mut trades = Vec::new();
    let mut open: Option<(usize, NaiveDate, f64)> = None;

    for (i, rec) in records.iter().enumerate() {
        match rec.transition {
            Transition::Enter => {
                open = Some((i, rec.date, rec.close));
            }
            Transition::Exit(triggers) => {
                if let Some((entry_index, entry_date, entry_price)) = open.take() {
                    trades.push(Trade {
                        entry_index,
                        entry_date,
                        entry_price,
                        exit: Some(TradeExit {
                            index: i,
                            date: rec.date,
                            price: rec.close,
                            triggers,
                        }),
                        bars_held: i - entry_index,
                        gross_return: rec.close / entry_price - 1.0,
                    });
                }
            }
            Transition::Hold | Transition::StayFlat => {}
        }
    }

    if let (Some((entry_index, entry_date, entry_price)), Some(last)) = (open, records.last()) {
        trades.push(Trade {
            entry_index,
            entry_date,
            entry_price,
            exit: None,
            bars_held: records.len() - 1 - entry_index,
            gross_return: last.close / entry_price - 1.0,
        });
    }

    trades
}
