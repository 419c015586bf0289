//! Ordered risk checks over an alert
//!
//! The gate is pure: the caller supplies settings, exposure and the clock.
//! Checks run in a fixed order and stop at the first failure. Broker
//! exposure is only fetched when a check actually needs it, so the gate
//! asks for it with [`Verdict::NeedsExposure`] and the caller re-evaluates.

use crate::error::RejectReason;
use crate::models::{AccountSettings, Alert, Exposure, InstrumentSpec, TradingSession};
use chrono::{DateTime, Utc};

const VOLUME_EPSILON: f64 = 1e-9;

pub struct GateInput<'a> {
    pub alert: &'a Alert,
    pub instrument: &'a InstrumentSpec,
    pub settings: &'a AccountSettings,
    /// An order from this alert is already recorded for the account
    pub already_processed: bool,
    pub exposure: Option<&'a Exposure>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approved,
    Rejected(RejectReason),
    /// Re-evaluate with `exposure` filled in
    NeedsExposure,
}

enum Halt {
    Reject(RejectReason),
    NeedsExposure,
}

impl From<RejectReason> for Halt {
    fn from(reason: RejectReason) -> Self {
        Halt::Reject(reason)
    }
}

#[derive(Debug, Clone)]
pub struct RiskGate {
    supported_symbols: Vec<String>,
}

impl RiskGate {
    pub fn new(supported_symbols: Vec<String>) -> Self {
        Self { supported_symbols }
    }

    pub fn supported_symbols(&self) -> &[String] {
        &self.supported_symbols
    }

    pub fn evaluate(&self, input: &GateInput<'_>) -> Verdict {
        match self.run_checks(input) {
            Ok(()) => Verdict::Approved,
            Err(Halt::Reject(reason)) => Verdict::Rejected(reason),
            Err(Halt::NeedsExposure) => Verdict::NeedsExposure,
        }
    }

    fn run_checks(&self, input: &GateInput<'_>) -> Result<(), Halt> {
        let alert = input.alert;

        self.check_symbol(&alert.symbol)?;
        check_distances(alert, input.instrument)?;

        if input.settings.exclusive_mode && exposure(input)?.open_count() > 0 {
            return Err(RejectReason::ExclusiveMode {
                account: alert.account.clone(),
            }
            .into());
        }

        let session = TradingSession::at(input.now);
        if !input.settings.session_enabled(session) {
            return Err(RejectReason::SessionDisabled {
                session,
                account: alert.account.clone(),
            }
            .into());
        }

        let mode = input.settings.trading_mode;
        if !mode.allows(alert.side) {
            return Err(RejectReason::ModeMismatch {
                account: alert.account.clone(),
                mode,
            }
            .into());
        }

        if input.already_processed {
            return Err(RejectReason::AlreadyProcessed {
                alert_id: alert.alert_id.clone(),
            }
            .into());
        }

        let exposure = exposure(input)?;
        if exposure.open_volume + alert.size > alert.max_exposure + VOLUME_EPSILON {
            return Err(RejectReason::MaxExposure {
                opened: exposure.open_volume,
                attempted: alert.size,
                max: alert.max_exposure,
            }
            .into());
        }

        let same_side = exposure.count(alert.side);
        if same_side > 0 {
            return Err(RejectReason::SideAlreadyOpen {
                count: same_side,
                side: alert.side,
            }
            .into());
        }

        Ok(())
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), RejectReason> {
        if self.supported_symbols.iter().any(|s| s == symbol) {
            Ok(())
        } else {
            Err(RejectReason::UnsupportedSymbol {
                symbol: symbol.to_string(),
                supported: self.supported_symbols.join(", "),
            })
        }
    }
}

fn exposure<'a>(input: &GateInput<'a>) -> Result<&'a Exposure, Halt> {
    input.exposure.ok_or(Halt::NeedsExposure)
}

fn check_distances(alert: &Alert, instrument: &InstrumentSpec) -> Result<(), RejectReason> {
    // `!(x > 0)` also catches NaN.
    if !(alert.take_profit > 0.0) {
        return Err(RejectReason::InvalidTakeProfit(alert.take_profit));
    }
    if let Some(sl) = alert.stop_loss {
        if !(sl > 0.0) {
            return Err(RejectReason::InvalidStopLoss(sl));
        }
    }

    let minimum = instrument.min_distance();
    let unit = instrument.distance_unit();
    if alert.take_profit < minimum {
        return Err(RejectReason::TakeProfitTooSmall { minimum, unit });
    }
    if alert.stop_loss.is_some_and(|sl| sl < minimum) {
        return Err(RejectReason::StopLossTooSmall { minimum, unit });
    }
    Ok(())
}
