//! Account state reader.
//!
//! A read-only view of the user's perp positions, fetched through the
//! `clearinghouseState` info query. Nothing is cached across calls: every
//! close-position inference sees fresh state, so it cannot race a fill that
//! landed a moment earlier.

use std::{collections::HashMap, str::FromStr};

use alloy::primitives::Address;
use rust_decimal::Decimal;

use crate::{
    error::{Error, Result},
    http::Transport,
    types::{ClearinghouseState, InfoRequest},
};

/// Read-only position view for one user address.
pub(crate) struct AccountReader {
    transport: Transport,
    user: Address,
}

impl AccountReader {
    pub(crate) fn new(transport: Transport, user: Address) -> Self {
        Self { transport, user }
    }

    /// Fetches a fresh snapshot of signed position sizes per symbol.
    ///
    /// Positive is long, negative is short; symbols with no position are
    /// absent.
    pub(crate) async fn positions(&self) -> Result<HashMap<String, Decimal>> {
        let value = self
            .transport
            .post("/info", &InfoRequest::ClearinghouseState { user: self.user })
            .await?;
        let state: ClearinghouseState = serde_json::from_value(value)
            .map_err(|err| Error::Io(format!("invalid clearinghouseState response: {err}")))?;
        parse_positions(state)
    }

    /// Signed position size for one symbol, zero when flat.
    pub(crate) async fn signed_position(&self, symbol: &str) -> Result<Decimal> {
        let positions = self.positions().await?;
        Ok(lookup_position(&positions, symbol))
    }
}

/// Extracts `symbol -> szi` from a clearinghouse snapshot. A position size
/// the server sent but we cannot parse is fatal.
pub(crate) fn parse_positions(state: ClearinghouseState) -> Result<HashMap<String, Decimal>> {
    state
        .asset_positions
        .into_iter()
        .map(|slot| {
            let szi = Decimal::from_str(&slot.position.szi)
                .map_err(|_| Error::BadPosition(slot.position.szi.clone()))?;
            Ok((slot.position.coin, szi))
        })
        .collect()
}

/// Case-insensitive position lookup; flat accounts read as zero.
pub(crate) fn lookup_position(positions: &HashMap<String, Decimal>, symbol: &str) -> Decimal {
    positions
        .iter()
        .find(|(coin, _)| coin.eq_ignore_ascii_case(symbol))
        .map(|(_, szi)| *szi)
        .unwrap_or(Decimal::ZERO)
}
