//! # hypertrade
//!
//! A Rust client for the Hyperliquid exchange. It turns semantic order
//! intents into byte-exact, EIP-712-signed wire requests: close-position
//! inference from live account state, per-asset size and price formatting,
//! slippage-synthesized market prices, TP/SL grouping, and the full action
//! catalog from orders and cancels through transfers, deploys, and
//! validator operations.
//!
//! ## Quick start
//!
//! ```no_run
//! use hypertrade::{dec, Chain, Exchange, OrderIntent, Wallet};
//!
//! # async fn example() -> hypertrade::Result<()> {
//! let wallet = Wallet::new("your_api_wallet_key")?;
//! let client = Exchange::builder()
//!     .chain(Chain::Testnet)
//!     .wallet(wallet)
//!     .build()?;
//! client.warm_up().await;
//!
//! // Market buy 0.01 ETH with the default 5% slippage cap.
//! let response = client
//!     .order(OrderIntent::market("ETH", true, dec!(0.01)))
//!     .await?;
//! for status in response.order_statuses().into_iter().flatten() {
//!     println!("{status:?}");
//! }
//!
//! // Close whatever ETH position is open.
//! client.close_position_market("ETH").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Structure
//!
//! - [`exchange`]: the trading facade ([`Exchange`], [`Wallet`])
//! - [`order`]: order intents and the normalization pipeline
//! - [`types`]: wire actions, responses, info shapes
//! - [`meta`]: asset metadata and mid-price cache
//! - [`num`]: size and price formatting rules
//! - [`http`]: transport and retry policy
//! - [`error`]: the classified error taxonomy

mod account;
pub mod error;
pub mod exchange;
pub mod http;
pub mod meta;
pub mod num;
pub mod order;
mod signing;
pub mod types;
mod utils;

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::{dyn_abi::Eip712Domain, primitives::B128};
use chrono::Utc;
use either::Either;
/// Re-exported address type used throughout the API.
pub use alloy::primitives::Address;
/// Re-exported local signer; wallets wrap one of these.
pub use alloy::signers::local::PrivateKeySigner;
pub use error::{Error, Result};
pub use exchange::{
    ApproveAgentResult, CancelByCloidRequest, CancelRequest, ClosePositionParams, Exchange,
    ExchangeBuilder, ModifyRequest, Wallet, DEFAULT_EXPIRES_AFTER_MS,
};
pub use http::RetryPolicy;
pub use meta::Asset;
pub use order::{OrderGroup, OrderIntent, OrderType, DEFAULT_SLIPPAGE};
/// Re-exported decimal type; all sizes, prices, and amounts use it.
pub use rust_decimal::{dec, Decimal};
pub use types::{
    ApiResponse, BuilderFee, Instrument, OrderGrouping, OrderResponseStatus, TimeInForce, TpSl,
};
use url::Url;

/// Client order id: a 16-byte value, `0x` + 32 lowercase hex on the wire.
pub type Cloid = B128;

/// Order reference: exchange-assigned oid on the left, client cloid on the
/// right.
pub type OidOrCloid = Either<u64, Cloid>;

/// Parses a cloid from its canonical `0x` + 32 hex char form.
pub fn parse_cloid(value: &str) -> Result<Cloid> {
    let malformed = || Error::Request(format!("malformed cloid: {value}"));
    let hex = value.strip_prefix("0x").ok_or_else(malformed)?;
    if hex.len() != 32 {
        return Err(malformed());
    }
    value.parse::<Cloid>().map_err(|_| malformed())
}

/// Network selector. Controls base URLs, signing domains, and the
/// `hyperliquidChain` field of user-signed actions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    derive_more::Display,
    derive_more::FromStr,
    derive_more::IsVariant,
)]
#[serde(rename_all = "PascalCase")]
pub enum Chain {
    #[display("Mainnet")]
    Mainnet,
    #[display("Testnet")]
    Testnet,
}

impl Chain {
    /// Chain id string carried in user-signed action bodies.
    #[must_use]
    pub fn signature_chain_id(&self) -> &'static str {
        if self.is_mainnet() { "0xa4b1" } else { "0x66eee" }
    }

    /// EIP-712 domain for user-signed actions on this chain.
    pub(crate) fn user_domain(&self) -> Eip712Domain {
        if self.is_mainnet() {
            signing::USER_MAINNET_EIP712_DOMAIN
        } else {
            signing::USER_TESTNET_EIP712_DOMAIN
        }
    }

    /// Default API base URL for this chain.
    #[must_use]
    pub fn base_url(&self) -> Url {
        if self.is_mainnet() {
            mainnet_url()
        } else {
            testnet_url()
        }
    }
}

/// Default mainnet API URL: `https://api.hyperliquid.xyz`.
#[must_use]
pub fn mainnet_url() -> Url {
    "https://api.hyperliquid.xyz".parse().unwrap()
}

/// Default testnet API URL: `https://api.hyperliquid-testnet.xyz`.
#[must_use]
pub fn testnet_url() -> Url {
    "https://api.hyperliquid-testnet.xyz".parse().unwrap()
}

/// Thread-safe nonce source.
///
/// Nonces are millisecond timestamps bumped atomically, so two submissions
/// from the same wallet in the same millisecond still get distinct,
/// strictly increasing values. When the counter lags real time by more than
/// 300 ms it jumps forward, keeping nonces inside the server's anti-replay
/// window.
#[derive(Debug)]
pub struct NonceHandler {
    nonce: AtomicU64,
}

impl Default for NonceHandler {
    fn default() -> Self {
        Self {
            nonce: AtomicU64::new(Utc::now().timestamp_millis() as u64),
        }
    }
}

impl NonceHandler {
    /// Returns the next unique nonce.
    pub fn next(&self) -> u64 {
        let now = Utc::now().timestamp_millis() as u64;

        let prev = self.nonce.load(Ordering::Relaxed);
        if prev + 300 < now {
            self.nonce.fetch_max(now, Ordering::Relaxed);
        }

        self.nonce.fetch_add(1, Ordering::Relaxed)
    }
}
