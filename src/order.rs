//! Order intent normalization.
//!
//! Takes a semantic [`OrderIntent`], classifies it, fills in inferred fields
//! (direction and size for close placeholders, slippage prices for market
//! semantics, mid defaults for triggers), formats sizes and prices to the
//! asset's precision, and emits the [`OrderWire`] form the signer accepts.
//!
//! Everything here is pure: the facade fetches whatever context a given
//! intent needs (mid price, position snapshot) and passes it in.

use rust_decimal::{dec, Decimal};

use crate::{
    error::{Error, Result},
    meta::Asset,
    num,
    types::{Instrument, OrderGrouping, OrderTypeWire, OrderWire, TimeInForce, TpSl},
    Cloid,
};

/// Global default slippage for synthesized market prices.
pub const DEFAULT_SLIPPAGE: Decimal = dec!(0.05);

/// Order type at the intent level: limit with a time-in-force, or a
/// trigger with its activation parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderType {
    Limit {
        tif: TimeInForce,
    },
    Trigger {
        trigger_px: Decimal,
        is_market: bool,
        tpsl: TpSl,
    },
}

/// A semantic order before normalization.
///
/// Optional fields follow the placeholder conventions the normalizer keys
/// on: a reduce-only IOC intent without a price is a market close whose
/// direction and size come from the live position, a market intent gets its
/// price synthesized from the mid, and so on. The constructors build the
/// common shapes.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub instrument: Instrument,
    pub symbol: String,
    pub is_buy: Option<bool>,
    pub sz: Option<Decimal>,
    pub limit_px: Option<Decimal>,
    pub order_type: OrderType,
    pub reduce_only: bool,
    pub cloid: Option<Cloid>,
    /// Overrides the per-symbol and global slippage defaults.
    pub slippage: Option<Decimal>,
    /// Expiry in ms: absolute when at least 10^12, otherwise relative to
    /// the nonce. Defaults to 120s relative when unset.
    pub expires_after: Option<u64>,
}

impl OrderIntent {
    fn new(symbol: impl Into<String>, order_type: OrderType) -> Self {
        Self {
            instrument: Instrument::Perp,
            symbol: symbol.into(),
            is_buy: None,
            sz: None,
            limit_px: None,
            order_type,
            reduce_only: false,
            cloid: None,
            slippage: None,
            expires_after: None,
        }
    }

    /// Market open: IOC limit whose price the normalizer synthesizes from
    /// the mid and slippage.
    pub fn market(symbol: impl Into<String>, is_buy: bool, sz: Decimal) -> Self {
        let mut intent = Self::new(
            symbol,
            OrderType::Limit {
                tif: TimeInForce::Ioc,
            },
        );
        intent.is_buy = Some(is_buy);
        intent.sz = Some(sz);
        intent
    }

    /// Plain limit order.
    pub fn limit(
        tif: TimeInForce,
        symbol: impl Into<String>,
        is_buy: bool,
        sz: Decimal,
        limit_px: Decimal,
    ) -> Self {
        let mut intent = Self::new(symbol, OrderType::Limit { tif });
        intent.is_buy = Some(is_buy);
        intent.sz = Some(sz);
        intent.limit_px = Some(limit_px);
        intent
    }

    /// Trigger order. A missing `limit_px` defaults to the mid at
    /// normalization time.
    pub fn trigger(
        symbol: impl Into<String>,
        is_buy: bool,
        sz: Decimal,
        trigger_px: Decimal,
        is_market: bool,
        tpsl: TpSl,
    ) -> Self {
        let mut intent = Self::new(
            symbol,
            OrderType::Trigger {
                trigger_px,
                is_market,
                tpsl,
            },
        );
        intent.is_buy = Some(is_buy);
        intent.sz = Some(sz);
        intent
    }

    /// Market close placeholder: direction, size, and price are inferred
    /// from the live position.
    pub fn close_market(symbol: impl Into<String>) -> Self {
        let mut intent = Self::new(
            symbol,
            OrderType::Limit {
                tif: TimeInForce::Ioc,
            },
        );
        intent.reduce_only = true;
        intent
    }

    /// Limit close placeholder: direction is inferred from the live
    /// position, the price is the caller's.
    pub fn close_limit(tif: TimeInForce, symbol: impl Into<String>, limit_px: Decimal) -> Self {
        let mut intent = Self::new(symbol, OrderType::Limit { tif });
        intent.reduce_only = true;
        intent.limit_px = Some(limit_px);
        intent
    }

    /// Sets an explicit size.
    #[must_use]
    pub fn size(mut self, sz: Decimal) -> Self {
        self.sz = Some(sz);
        self
    }

    /// Marks the order reduce-only.
    #[must_use]
    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    /// Targets the spot book instead of perps.
    #[must_use]
    pub fn spot(mut self) -> Self {
        self.instrument = Instrument::Spot;
        self
    }

    /// Attaches a client order id.
    #[must_use]
    pub fn cloid(mut self, cloid: Cloid) -> Self {
        self.cloid = Some(cloid);
        self
    }

    /// Overrides the slippage used for synthesized market prices.
    #[must_use]
    pub fn slippage(mut self, slippage: Decimal) -> Self {
        self.slippage = Some(slippage);
        self
    }

    /// Sets the order expiry (ms, absolute or relative; see the field doc).
    #[must_use]
    pub fn expires_after(mut self, expires_after: u64) -> Self {
        self.expires_after = Some(expires_after);
        self
    }
}

/// A bulk submission: intents plus the grouping tag.
#[derive(Debug, Clone)]
pub struct OrderGroup {
    pub orders: Vec<OrderIntent>,
    pub grouping: OrderGrouping,
}

impl OrderGroup {
    pub fn na(orders: Vec<OrderIntent>) -> Self {
        Self {
            orders,
            grouping: OrderGrouping::Na,
        }
    }

    pub fn normal_tpsl(orders: Vec<OrderIntent>) -> Self {
        Self {
            orders,
            grouping: OrderGrouping::NormalTpsl,
        }
    }

    pub fn position_tpsl(orders: Vec<OrderIntent>) -> Self {
        Self {
            orders,
            grouping: OrderGrouping::PositionTpsl,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.orders.is_empty() {
            return Err(Error::Request("order group is empty".to_string()));
        }
        if self.grouping == OrderGrouping::PositionTpsl {
            let first = &self.orders[0].symbol;
            if self
                .orders
                .iter()
                .any(|o| !o.symbol.eq_ignore_ascii_case(first))
            {
                return Err(Error::Request(
                    "positionTpsl orders must share one symbol".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Which placeholder convention an intent matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntentClass {
    MarketOpen,
    CloseMarket,
    CloseLimit,
    Trigger,
    Plain,
}

pub(crate) fn classify(intent: &OrderIntent) -> IntentClass {
    match &intent.order_type {
        OrderType::Trigger { .. } => IntentClass::Trigger,
        OrderType::Limit {
            tif: TimeInForce::Ioc,
        } if !intent.reduce_only && intent.limit_px.is_none() => IntentClass::MarketOpen,
        OrderType::Limit {
            tif: TimeInForce::Ioc,
        } if intent.instrument == Instrument::Perp
            && intent.reduce_only
            && intent.limit_px.is_none() =>
        {
            IntentClass::CloseMarket
        }
        OrderType::Limit {
            tif: TimeInForce::Gtc,
        } if intent.instrument == Instrument::Perp
            && intent.reduce_only
            && intent.limit_px.is_some()
            && intent.is_buy.is_none() =>
        {
            IntentClass::CloseLimit
        }
        _ => IntentClass::Plain,
    }
}

/// Context the facade resolved for one intent: needed mid, needed position,
/// and the effective slippage after override resolution.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NormalizeContext {
    pub mid: Option<Decimal>,
    pub szi: Option<Decimal>,
    pub slippage: Decimal,
}

/// What [`prepare`] will need for this intent: `(mid, position)`.
pub(crate) fn required_context(intent: &OrderIntent) -> (bool, bool) {
    match classify(intent) {
        IntentClass::MarketOpen => (true, false),
        IntentClass::CloseMarket => (true, true),
        IntentClass::CloseLimit => (false, true),
        IntentClass::Trigger => (intent.limit_px.is_none(), false),
        IntentClass::Plain => (false, false),
    }
}

/// Runs sanitation, classification, and field inference in place.
pub(crate) fn prepare(intent: &mut OrderIntent, ctx: &NormalizeContext) -> Result<()> {
    if let Some(sz) = intent.sz {
        if sz.is_sign_negative() {
            intent.sz = Some(sz.abs());
        }
    }

    match classify(intent) {
        IntentClass::MarketOpen => {
            let is_buy = intent
                .is_buy
                .ok_or_else(|| Error::Request(format!("direction missing for {}", intent.symbol)))?;
            let mid = require_mid(intent, ctx)?;
            intent.limit_px = Some(slippage_price(mid, is_buy, ctx.slippage));
        }
        IntentClass::CloseMarket => {
            let szi = require_position(intent, ctx)?;
            infer_close_market(intent, szi)?;
            if intent.limit_px.is_none() {
                let mid = require_mid(intent, ctx)?;
                let is_buy = intent.is_buy.unwrap_or(szi < Decimal::ZERO);
                intent.limit_px = Some(slippage_price(mid, is_buy, ctx.slippage));
            }
        }
        IntentClass::CloseLimit => {
            let szi = require_position(intent, ctx)?;
            infer_close_limit(intent, szi)?;
        }
        IntentClass::Trigger => {
            if intent.limit_px.is_none() {
                intent.limit_px = Some(require_mid(intent, ctx)?);
            }
        }
        IntentClass::Plain => {}
    }

    Ok(())
}

fn require_mid(intent: &OrderIntent, ctx: &NormalizeContext) -> Result<Decimal> {
    ctx.mid
        .ok_or_else(|| Error::UnknownSymbol(intent.symbol.clone()))
}

fn require_position(intent: &OrderIntent, ctx: &NormalizeContext) -> Result<Decimal> {
    ctx.szi
        .ok_or_else(|| Error::NoPosition(intent.symbol.clone()))
}

/// Mid adjusted away from the market by `slippage`: up for buys, down for
/// sells.
pub(crate) fn slippage_price(mid: Decimal, is_buy: bool, slippage: Decimal) -> Decimal {
    if is_buy {
        mid * (Decimal::ONE + slippage)
    } else {
        mid * (Decimal::ONE - slippage)
    }
}

/// Fills direction and size of a market-close placeholder from the signed
/// position size.
pub(crate) fn infer_close_market(intent: &mut OrderIntent, szi: Decimal) -> Result<()> {
    if szi.is_zero() {
        return Err(Error::NoPosition(intent.symbol.clone()));
    }
    if intent.is_buy.is_none() {
        intent.is_buy = Some(szi < Decimal::ZERO);
    }
    if intent.sz.is_none() {
        intent.sz = Some(szi.abs());
    }
    Ok(())
}

/// Fills the direction of a limit-close placeholder from the signed
/// position size. A missing size defaults to the full position.
pub(crate) fn infer_close_limit(intent: &mut OrderIntent, szi: Decimal) -> Result<()> {
    if szi.is_zero() {
        return Err(Error::NoPosition(intent.symbol.clone()));
    }
    intent.is_buy = Some(szi < Decimal::ZERO);
    if intent.sz.is_none() {
        intent.sz = Some(szi.abs());
    }
    Ok(())
}

/// Whether a position-TP/SL group needs the position snapshot at all.
pub(crate) fn group_needs_inference(orders: &[OrderIntent]) -> bool {
    orders
        .iter()
        .any(|o| o.is_buy.is_none() || o.sz.is_none())
}

/// Fills missing direction and size across a position-TP/SL group.
///
/// Reduce-only entries close the position, so they take the reverse of its
/// direction; anything else follows it. Entries that already carry a
/// direction are untouched.
pub(crate) fn fill_position_tpsl(orders: &mut [OrderIntent], szi: Decimal) -> Result<()> {
    if szi.is_zero() {
        let symbol = orders.first().map(|o| o.symbol.clone()).unwrap_or_default();
        return Err(Error::NoPosition(symbol));
    }
    let long = szi > Decimal::ZERO;
    for order in orders {
        if order.is_buy.is_none() {
            order.is_buy = Some(if order.reduce_only { !long } else { long });
        }
        if order.sz.is_none() {
            order.sz = Some(szi.abs());
        }
    }
    Ok(())
}

/// Formats a prepared intent and translates it into its wire form.
pub(crate) fn to_wire(intent: &OrderIntent, asset: &Asset) -> Result<OrderWire> {
    let sz = intent
        .sz
        .ok_or_else(|| Error::Request(format!("size missing for {}", intent.symbol)))?;
    let is_buy = intent
        .is_buy
        .ok_or_else(|| Error::Request(format!("direction missing for {}", intent.symbol)))?;

    let limit_px = intent
        .limit_px
        .map(|px| num::format_price(px, asset.instrument, asset.sz_decimals))
        .transpose()?;

    let order_type = match &intent.order_type {
        OrderType::Limit { tif } => OrderTypeWire::Limit { tif: *tif },
        OrderType::Trigger {
            trigger_px,
            is_market,
            tpsl,
        } => OrderTypeWire::Trigger {
            trigger_px: num::format_price(*trigger_px, asset.instrument, asset.sz_decimals)?,
            is_market: *is_market,
            tpsl: *tpsl,
        },
    };

    Ok(OrderWire {
        asset: asset.id,
        is_buy,
        limit_px,
        sz: num::format_size(sz, asset.sz_decimals),
        reduce_only: intent.reduce_only,
        order_type,
        cloid: intent.cloid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth() -> Asset {
        Asset {
            symbol: "ETH".into(),
            id: 4,
            instrument: Instrument::Perp,
            sz_decimals: 4,
        }
    }

    fn ctx(mid: Option<Decimal>, szi: Option<Decimal>) -> NormalizeContext {
        NormalizeContext {
            mid,
            szi,
            slippage: DEFAULT_SLIPPAGE,
        }
    }

    #[test]
    fn classification_matches_placeholders() {
        assert_eq!(
            classify(&OrderIntent::market("ETH", true, dec!(0.01))),
            IntentClass::MarketOpen
        );
        assert_eq!(
            classify(&OrderIntent::close_market("ETH")),
            IntentClass::CloseMarket
        );
        assert_eq!(
            classify(&OrderIntent::close_limit(TimeInForce::Gtc, "ETH", dec!(3000))),
            IntentClass::CloseLimit
        );
        assert_eq!(
            classify(&OrderIntent::trigger(
                "ETH",
                false,
                dec!(0.02),
                dec!(3600),
                true,
                TpSl::Tp
            )),
            IntentClass::Trigger
        );
        assert_eq!(
            classify(&OrderIntent::limit(
                TimeInForce::Gtc,
                "ETH",
                true,
                dec!(0.01),
                dec!(3000)
            )),
            IntentClass::Plain
        );
    }

    #[test]
    fn market_open_synthesizes_slippage_price() {
        let mut intent = OrderIntent::market("ETH", true, dec!(0.01));
        prepare(&mut intent, &ctx(Some(dec!(3000.0)), None)).unwrap();

        let wire = to_wire(&intent, &eth()).unwrap();
        assert!(wire.is_buy);
        assert_eq!(wire.sz.to_string(), "0.01");
        assert_eq!(wire.limit_px.unwrap().to_string(), "3150.0");
        assert!(!wire.reduce_only);
        assert!(matches!(
            wire.order_type,
            OrderTypeWire::Limit {
                tif: TimeInForce::Ioc
            }
        ));
    }

    #[test]
    fn sell_slippage_goes_below_mid() {
        assert_eq!(
            slippage_price(dec!(3000), false, dec!(0.05)).to_string(),
            "2850.00"
        );
        assert_eq!(
            slippage_price(dec!(3000), true, dec!(0.01)).to_string(),
            "3030.00"
        );
    }

    #[test]
    fn close_market_infers_direction_size_and_price() {
        let mut intent = OrderIntent::close_market("ETH");
        prepare(&mut intent, &ctx(Some(dec!(2986.3)), Some(dec!(-0.0335)))).unwrap();

        let wire = to_wire(&intent, &eth()).unwrap();
        assert!(wire.is_buy);
        assert_eq!(wire.sz.to_string(), "0.0335");
        assert_eq!(wire.limit_px.unwrap().to_string(), "3135.6");
        assert!(wire.reduce_only);
    }

    #[test]
    fn close_with_no_position_fails() {
        let mut intent = OrderIntent::close_market("ETH");
        let err = prepare(&mut intent, &ctx(Some(dec!(2986.3)), Some(Decimal::ZERO))).unwrap_err();
        assert!(matches!(err, Error::NoPosition(ref s) if s == "ETH"));

        let mut intent = OrderIntent::close_limit(TimeInForce::Gtc, "ETH", dec!(3000));
        let err = prepare(&mut intent, &ctx(None, Some(Decimal::ZERO))).unwrap_err();
        assert!(matches!(err, Error::NoPosition(_)));
    }

    #[test]
    fn close_limit_keeps_price_and_infers_direction() {
        let mut intent = OrderIntent::close_limit(TimeInForce::Gtc, "ETH", dec!(3050.5));
        prepare(&mut intent, &ctx(None, Some(dec!(0.25)))).unwrap();
        // Long position closes by selling, full size by default.
        assert_eq!(intent.is_buy, Some(false));
        assert_eq!(intent.sz, Some(dec!(0.25)));
        assert_eq!(intent.limit_px, Some(dec!(3050.5)));
    }

    #[test]
    fn trigger_defaults_limit_price_to_mid() {
        let mut intent = OrderIntent::trigger("ETH", false, dec!(0.02), dec!(3600), true, TpSl::Tp);
        prepare(&mut intent, &ctx(Some(dec!(3005.7)), None)).unwrap();
        assert_eq!(intent.limit_px, Some(dec!(3005.7)));

        // A provided price is never overridden.
        let mut intent = OrderIntent::trigger("ETH", false, dec!(0.02), dec!(3600), false, TpSl::Tp);
        intent.limit_px = Some(dec!(3590));
        prepare(&mut intent, &ctx(Some(dec!(3005.7)), None)).unwrap();
        assert_eq!(intent.limit_px, Some(dec!(3590)));
    }

    #[test]
    fn negative_sizes_become_absolute() {
        let mut intent = OrderIntent::limit(TimeInForce::Gtc, "ETH", true, dec!(-0.5), dec!(3000));
        prepare(&mut intent, &ctx(None, None)).unwrap();
        assert_eq!(intent.sz, Some(dec!(0.5)));
    }

    #[test]
    fn position_tpsl_fills_missing_fields() {
        let mut tp = OrderIntent::trigger("ETH", true, dec!(1), dec!(3600), true, TpSl::Tp);
        tp.is_buy = None;
        tp.sz = None;
        tp.reduce_only = true;
        let mut sl = OrderIntent::trigger("ETH", true, dec!(1), dec!(3400), true, TpSl::Sl);
        sl.is_buy = None;
        sl.sz = None;
        sl.reduce_only = true;

        let mut orders = vec![tp, sl];
        assert!(group_needs_inference(&orders));
        fill_position_tpsl(&mut orders, dec!(0.02)).unwrap();

        for order in &orders {
            assert_eq!(order.is_buy, Some(false));
            assert_eq!(order.sz, Some(dec!(0.02)));
        }
    }

    #[test]
    fn position_tpsl_leaves_explicit_direction_alone() {
        let mut order = OrderIntent::trigger("ETH", true, dec!(0.5), dec!(3600), true, TpSl::Tp);
        order.reduce_only = true;
        let mut orders = vec![order];
        fill_position_tpsl(&mut orders, dec!(0.02)).unwrap();
        assert_eq!(orders[0].is_buy, Some(true));
        assert_eq!(orders[0].sz, Some(dec!(0.5)));
    }

    #[test]
    fn position_tpsl_without_position_fails() {
        let mut order = OrderIntent::trigger("ETH", true, dec!(1), dec!(3600), true, TpSl::Tp);
        order.is_buy = None;
        order.reduce_only = true;
        let mut orders = vec![order];
        let err = fill_position_tpsl(&mut orders, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, Error::NoPosition(_)));
    }

    #[test]
    fn group_validation() {
        assert!(OrderGroup::na(vec![]).validate().is_err());

        let mixed = OrderGroup::position_tpsl(vec![
            OrderIntent::close_market("ETH"),
            OrderIntent::close_market("BTC"),
        ]);
        assert!(mixed.validate().is_err());

        let same = OrderGroup::position_tpsl(vec![
            OrderIntent::close_market("ETH"),
            OrderIntent::close_market("eth"),
        ]);
        assert!(same.validate().is_ok());
    }

    #[test]
    fn wire_requires_size_and_direction() {
        let intent = OrderIntent::close_market("ETH");
        assert!(matches!(
            to_wire(&intent, &eth()),
            Err(Error::Request(_))
        ));
    }
}
