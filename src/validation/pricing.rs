//! Turn an approved alert and a live quote into absolute order prices

use crate::error::RejectReason;
use crate::models::{Alert, InstrumentSpec, Quote, Side};
use crate::services::broker::MarketOrder;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub order: MarketOrder,
    /// Price the order is expected to fill at (ask for buys, bid for sells)
    pub entry_price: f64,
    pub quote: Quote,
}

pub fn plan_order(
    alert: &Alert,
    instrument: &InstrumentSpec,
    quote: Option<&Quote>,
) -> Result<OrderPlan, RejectReason> {
    let quote = quote.ok_or_else(|| RejectReason::NoQuote {
        symbol: alert.symbol.clone(),
    })?;

    let entry_price = quote.entry_price(alert.side);
    let tp_offset = instrument.to_price_offset(alert.take_profit);
    let take_profit = match alert.side {
        Side::Buy => entry_price + tp_offset,
        Side::Sell => entry_price - tp_offset,
    };

    let reference = alert.use_reference.then_some(alert.reference_price).flatten();
    let stop_loss = alert
        .stop_loss
        .map(|distance| stop_loss_price(alert.side, entry_price, distance, reference, instrument));

    Ok(OrderPlan {
        order: MarketOrder {
            symbol: alert.symbol.clone(),
            side: alert.side,
            volume: alert.size,
            take_profit: Some(instrument.round_price(take_profit)),
            stop_loss,
        },
        entry_price,
        quote: quote.clone(),
    })
}

/// Stop-loss price `distance` pips beyond the base price.
///
/// The base is the reference price when one is given, otherwise the market
/// price. The result never sits closer to the market than the instrument's
/// stop buffer.
pub fn stop_loss_price(
    side: Side,
    market_price: f64,
    distance: f64,
    reference_price: Option<f64>,
    instrument: &InstrumentSpec,
) -> f64 {
    let base = reference_price.unwrap_or(market_price);
    let offset = instrument.to_price_offset(distance);
    let buffer = instrument.stop_buffer();

    let raw = match side {
        Side::Buy => (base - offset).min(market_price - buffer),
        Side::Sell => (base + offset).max(market_price + buffer),
    };
    instrument.round_price(raw)
}
