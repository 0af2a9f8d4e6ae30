//! Metadata cache: asset universes and mid prices.
//!
//! Maps symbols to their asset id, instrument kind, and size precision, and
//! keeps the latest mid price per symbol. Universes load lazily on first
//! lookup and publish atomically, so readers never observe a partially
//! built registry. Mids refresh on demand with last-writer-wins snapshots.

use std::{collections::HashMap, sync::Arc};

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::{
    error::{Error, Result},
    http::Transport,
    types::{InfoRequest, Instrument, Meta, SpotMeta},
};

/// Spot asset ids are the pair index offset by this constant.
pub const SPOT_ASSET_OFFSET: u32 = 10_000;

/// An immutable asset listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Symbol in the server's canonical casing.
    pub symbol: String,
    /// Integer id used on the wire.
    pub id: u32,
    /// Perp or spot.
    pub instrument: Instrument,
    /// Decimal places for order sizes.
    pub sz_decimals: u32,
}

/// Fully built perp and spot registries, published as one snapshot.
#[derive(Debug, Default)]
pub(crate) struct Universe {
    perps: HashMap<String, Asset>,
    spots: HashMap<String, Asset>,
}

impl Universe {
    pub(crate) fn build(meta: Meta, spot_meta: SpotMeta) -> Self {
        let perps = meta
            .universe
            .into_iter()
            .enumerate()
            .map(|(index, listing)| {
                let asset = Asset {
                    symbol: listing.name.clone(),
                    id: index as u32,
                    instrument: Instrument::Perp,
                    sz_decimals: listing.sz_decimals,
                };
                (listing.name.to_lowercase(), asset)
            })
            .collect();

        let decimals_by_token: HashMap<u32, u32> = spot_meta
            .tokens
            .iter()
            .map(|token| (token.index, token.sz_decimals))
            .collect();
        let spots = spot_meta
            .universe
            .into_iter()
            .filter_map(|pair| {
                // Size precision of a pair comes from its base token.
                let sz_decimals = *decimals_by_token.get(&pair.tokens[0])?;
                let asset = Asset {
                    symbol: pair.name.clone(),
                    id: SPOT_ASSET_OFFSET + pair.index,
                    instrument: Instrument::Spot,
                    sz_decimals,
                };
                Some((pair.name.to_lowercase(), asset))
            })
            .collect();

        Self { perps, spots }
    }

    pub(crate) fn resolve(&self, symbol: &str) -> Option<&Asset> {
        let key = symbol.to_lowercase();
        self.perps.get(&key).or_else(|| self.spots.get(&key))
    }
}

/// Process-wide cache of asset metadata and mid prices.
///
/// Shared behind the client; all methods take `&self` and are safe to call
/// from many tasks at once. The universe write path holds the write lock
/// across its fetch, which collapses concurrent first-lookups into a single
/// pair of requests.
pub(crate) struct MetaCache {
    transport: Transport,
    universe: RwLock<Option<Arc<Universe>>>,
    mids: RwLock<Arc<HashMap<String, Decimal>>>,
}

impl MetaCache {
    pub(crate) fn new(transport: Transport) -> Self {
        Self {
            transport,
            universe: RwLock::new(None),
            mids: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Resolves a symbol (case-insensitively) to its asset listing.
    pub(crate) async fn resolve_asset(&self, symbol: &str) -> Result<Asset> {
        let universe = self.ensure_universe().await?;
        universe
            .resolve(symbol)
            .cloned()
            .ok_or_else(|| Error::UnknownSymbol(symbol.to_string()))
    }

    /// Latest mid price for a symbol, fetching on a cache miss.
    ///
    /// The mids map is keyed by the server's canonical symbol; pass
    /// [`Asset::symbol`] rather than raw user input.
    pub(crate) async fn mid(&self, symbol: &str) -> Result<Decimal> {
        if let Some(mid) = self.mids.read().await.get(symbol) {
            return Ok(*mid);
        }
        self.refresh_mids().await?;
        self.mids
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::UnknownSymbol(symbol.to_string()))
    }

    /// Fetches `allMids` and swaps in the new snapshot.
    pub(crate) async fn refresh_mids(&self) -> Result<()> {
        let value = self.transport.post("/info", &InfoRequest::AllMids).await?;
        let mids: HashMap<String, Decimal> = serde_json::from_value(value)
            .map_err(|err| Error::Io(format!("invalid allMids response: {err}")))?;
        *self.mids.write().await = Arc::new(mids);
        Ok(())
    }

    /// Best-effort startup warm-up: universes and mids in parallel.
    ///
    /// Failures are logged and swallowed; later lookups lazy-load.
    pub(crate) async fn warm_up(&self) {
        let (universe, mids) = tokio::join!(self.ensure_universe(), self.refresh_mids());
        if let Err(err) = universe {
            log::warn!("metadata warm-up failed: {err}");
        }
        if let Err(err) = mids {
            log::warn!("mids warm-up failed: {err}");
        }
    }

    async fn ensure_universe(&self) -> Result<Arc<Universe>> {
        if let Some(universe) = self.universe.read().await.as_ref() {
            return Ok(Arc::clone(universe));
        }

        let mut slot = self.universe.write().await;
        if let Some(universe) = slot.as_ref() {
            return Ok(Arc::clone(universe));
        }

        let (meta, spot_meta) = tokio::join!(
            self.transport.post("/info", &InfoRequest::Meta),
            self.transport.post("/info", &InfoRequest::SpotMeta),
        );
        let meta: Meta = serde_json::from_value(meta?)
            .map_err(|err| Error::Io(format!("invalid meta response: {err}")))?;
        let spot_meta: SpotMeta = serde_json::from_value(spot_meta?)
            .map_err(|err| Error::Io(format!("invalid spotMeta response: {err}")))?;

        let universe = Arc::new(Universe::build(meta, spot_meta));
        *slot = Some(Arc::clone(&universe));
        Ok(universe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_universe() -> Universe {
        let meta: Meta = serde_json::from_str(
            r#"{"universe":[
                {"name":"BTC","szDecimals":5,"maxLeverage":50},
                {"name":"ETH","szDecimals":4,"maxLeverage":50}
            ]}"#,
        )
        .unwrap();
        let spot_meta: SpotMeta = serde_json::from_str(
            r#"{
                "universe":[{"name":"PURR/USDC","tokens":[1,0],"index":0}],
                "tokens":[
                    {"name":"USDC","index":0,"szDecimals":8,"weiDecimals":8},
                    {"name":"PURR","index":1,"szDecimals":0,"weiDecimals":5}
                ]
            }"#,
        )
        .unwrap();
        Universe::build(meta, spot_meta)
    }

    #[test]
    fn perp_ids_follow_universe_order() {
        let universe = sample_universe();
        let btc = universe.resolve("BTC").unwrap();
        assert_eq!(btc.id, 0);
        assert_eq!(btc.instrument, Instrument::Perp);
        assert_eq!(btc.sz_decimals, 5);

        let eth = universe.resolve("ETH").unwrap();
        assert_eq!(eth.id, 1);
        assert_eq!(eth.sz_decimals, 4);
    }

    #[test]
    fn spot_ids_are_offset_and_use_base_decimals() {
        let universe = sample_universe();
        let purr = universe.resolve("PURR/USDC").unwrap();
        assert_eq!(purr.id, SPOT_ASSET_OFFSET);
        assert_eq!(purr.instrument, Instrument::Spot);
        // Base token is PURR (index 1).
        assert_eq!(purr.sz_decimals, 0);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let universe = sample_universe();
        assert_eq!(universe.resolve("eth").unwrap().symbol, "ETH");
        assert_eq!(universe.resolve("purr/usdc").unwrap().symbol, "PURR/USDC");
        assert!(universe.resolve("DOGE").is_none());
    }
}
