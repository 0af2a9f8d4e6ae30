//! Order facade: the public trading surface.
//!
//! [`Exchange`] composes the metadata cache, the account reader, the order
//! normalizer, the signer, and the transport into the operations a trading
//! program calls: orders and bulk orders, modifies and cancels, close
//! helpers, leverage and margin updates, transfers, and the user-signed and
//! admin action families.
//!
//! One instance serves one wallet against one network. The instance is
//! shared by reference; every operation is `&self` and safe to call from
//! many tasks concurrently. No retries happen at this level: the transport
//! owns the retry policy, and every operation surfaces a single classified
//! [`Error`](crate::error::Error) to the caller.

use std::{
    collections::HashMap,
    fmt,
    sync::RwLock,
    time::Duration,
};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use rust_decimal::Decimal;
use serde_json::Value;
use url::Url;

use crate::{
    account::AccountReader,
    error::{Error, Result},
    http::{RetryPolicy, Transport},
    meta::MetaCache,
    num,
    order::{self, OrderGroup, OrderIntent, DEFAULT_SLIPPAGE},
    signing,
    types::{
        Action, ApiResponse, ApproveAgent, ApproveBuilderFee, BatchCancel, BatchCancelCloid,
        BatchModify, BatchOrder, BuilderFee, CSigner, CValidator, Cancel, CancelByCloid,
        ConvertToMultiSigUser, ExchangePayload, ModifyWire, MultiSigAction, MultiSigPayload,
        NodeIp, OrderGrouping, PerpDeploy, ScheduleCancel, SendAsset, SetReferrer, Signature,
        SpotDeploy, SpotSend, SubAccountSpotTransfer, SubAccountTransfer, TimeInForce,
        TokenDelegate, TokenSpec, UpdateIsolatedMargin, UpdateLeverage, UsdClassTransfer, UsdSend,
        UserDexAbstraction, ValidatorProfile, VaultTransfer, Withdraw3,
    },
    Chain, Cloid, NonceHandler, OidOrCloid,
};

/// Default relative expiry applied to L1 actions, in milliseconds.
pub const DEFAULT_EXPIRES_AFTER_MS: u64 = 120_000;

/// Upper bound accepted for a builder fee.
const MAX_BUILDER_FEE: u64 = 1_000_000;

/// Expiry values at or above this are absolute ms timestamps; below, they
/// are relative to the nonce.
const ABSOLUTE_EXPIRY_THRESHOLD_MS: u64 = 1_000_000_000_000;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An API wallet: the signing key plus the primary address it acts for.
///
/// The primary address defaults to the address derived from the key, and
/// the alias defaults to the primary address. The private key is held only
/// inside the signer and never appears in logs or serialized output.
#[derive(Clone)]
pub struct Wallet {
    alias: String,
    primary_address: Address,
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Builds a wallet from a hex private key (with or without `0x`).
    pub fn new(private_key: &str) -> Result<Self> {
        Self::with_primary(private_key, None)
    }

    /// Builds a wallet whose key is delegated by `primary` (an agent key
    /// signing for a primary account).
    pub fn with_primary(private_key: &str, primary: Option<Address>) -> Result<Self> {
        validate_private_key(private_key)?;
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|_| Error::Sign("private key failed cryptographic validation".to_string()))?;
        let primary_address = primary.unwrap_or_else(|| signer.address());
        Ok(Self {
            alias: format!("{primary_address:#x}"),
            primary_address,
            signer,
        })
    }

    /// Replaces the display alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Address derived from the signing key.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Primary account address this wallet acts for.
    #[must_use]
    pub fn primary_address(&self) -> Address {
        self.primary_address
    }

    /// Display alias.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.alias
    }

    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("alias", &self.alias)
            .field("primary_address", &self.primary_address)
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

fn validate_private_key(key: &str) -> Result<()> {
    let hex = key.strip_prefix("0x").unwrap_or(key);
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Sign(
            "private key must be 64 hex characters".to_string(),
        ));
    }
    Ok(())
}

/// A modify request: the target order plus its full replacement.
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    pub oid: OidOrCloid,
    pub order: OrderIntent,
}

/// Cancel by exchange order id.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub symbol: String,
    pub oid: u64,
}

/// Cancel by client order id.
#[derive(Debug, Clone)]
pub struct CancelByCloidRequest {
    pub symbol: String,
    pub cloid: Cloid,
}

/// Options for [`Exchange::close_position_market_with`].
#[derive(Debug, Clone, Default)]
pub struct ClosePositionParams {
    /// Partial close size; the full position when unset.
    pub sz: Option<Decimal>,
    /// Slippage override for the synthesized price.
    pub slippage: Option<Decimal>,
    /// Client order id for the close order.
    pub cloid: Option<Cloid>,
    /// Builder fee attached to the order action.
    pub builder: Option<BuilderFee>,
}

/// Result of [`Exchange::approve_agent`]: the server response plus the
/// generated agent credentials.
#[derive(Debug)]
pub struct ApproveAgentResult {
    pub response: Value,
    /// Hex private key of the new agent. Handle with care.
    pub agent_private_key: String,
    pub agent_address: Address,
}

/// Builder for [`Exchange`].
#[derive(Debug)]
pub struct ExchangeBuilder {
    chain: Chain,
    base_url: Option<Url>,
    timeout: Duration,
    retry: Option<RetryPolicy>,
    vault_address: Option<Address>,
    wallet: Option<Wallet>,
}

impl ExchangeBuilder {
    fn new() -> Self {
        Self {
            chain: Chain::Mainnet,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            retry: None,
            vault_address: None,
            wallet: None,
        }
    }

    /// Selects mainnet or testnet. Also picks the default base URL.
    #[must_use]
    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    /// Overrides the base URL (custom node or proxy). The chain setting
    /// still controls signing domains.
    #[must_use]
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Per-attempt request timeout. Defaults to 10 seconds.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables transport-level retries for 5xx and I/O failures.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Trades on behalf of a vault or sub-account.
    #[must_use]
    pub fn vault_address(mut self, vault: Address) -> Self {
        self.vault_address = Some(vault);
        self
    }

    /// The API wallet that signs every request. Required.
    #[must_use]
    pub fn wallet(mut self, wallet: Wallet) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn build(self) -> Result<Exchange> {
        let wallet = self
            .wallet
            .ok_or_else(|| Error::Request("a wallet is required".to_string()))?;
        let base_url = self.base_url.unwrap_or_else(|| self.chain.base_url());

        let mut transport = Transport::new(base_url, self.timeout)?;
        if let Some(policy) = self.retry {
            transport = transport.with_retry(policy);
        }

        Ok(Exchange {
            meta: MetaCache::new(transport.clone()),
            account: AccountReader::new(transport.clone(), wallet.primary_address()),
            transport,
            wallet,
            chain: self.chain,
            nonces: NonceHandler::default(),
            vault_address: RwLock::new(self.vault_address),
            default_slippage: RwLock::new(DEFAULT_SLIPPAGE),
            slippage_by_symbol: RwLock::new(HashMap::new()),
        })
    }
}

/// Client for the exchange endpoint, bound to one wallet and one network.
pub struct Exchange {
    transport: Transport,
    meta: MetaCache,
    account: AccountReader,
    wallet: Wallet,
    chain: Chain,
    nonces: NonceHandler,
    vault_address: RwLock<Option<Address>>,
    default_slippage: RwLock<Decimal>,
    slippage_by_symbol: RwLock<HashMap<String, Decimal>>,
}

impl Exchange {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ExchangeBuilder {
        ExchangeBuilder::new()
    }

    /// Mainnet client with defaults.
    pub fn mainnet(wallet: Wallet) -> Result<Self> {
        Self::builder().chain(Chain::Mainnet).wallet(wallet).build()
    }

    /// Testnet client with defaults.
    pub fn testnet(wallet: Wallet) -> Result<Self> {
        Self::builder().chain(Chain::Testnet).wallet(wallet).build()
    }

    /// The configured chain.
    #[must_use]
    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// The signing wallet.
    #[must_use]
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Currently configured vault address, if any.
    #[must_use]
    pub fn vault_address(&self) -> Option<Address> {
        *self.vault_address.read().unwrap()
    }

    /// Sets or clears the vault address used for subsequent actions.
    pub fn set_vault_address(&self, vault: Option<Address>) {
        *self.vault_address.write().unwrap() = vault;
    }

    /// Sets the global default slippage for synthesized market prices.
    pub fn set_default_slippage(&self, slippage: Decimal) {
        *self.default_slippage.write().unwrap() = slippage;
    }

    /// Sets a per-symbol slippage override.
    pub fn set_symbol_slippage(&self, symbol: &str, slippage: Decimal) {
        self.slippage_by_symbol
            .write()
            .unwrap()
            .insert(symbol.to_lowercase(), slippage);
    }

    /// Best-effort metadata and mids warm-up. Failures are logged and the
    /// caches lazy-load later.
    pub async fn warm_up(&self) {
        self.meta.warm_up().await;
    }

    /// Fresh signed position sizes per symbol.
    pub async fn positions(&self) -> Result<HashMap<String, Decimal>> {
        self.account.positions().await
    }

    // ---- Orders -----------------------------------------------------------

    /// Places a single order.
    pub async fn order(&self, intent: OrderIntent) -> Result<ApiResponse> {
        let expiry = intent.expires_after;
        self.submit_orders(vec![intent], OrderGrouping::Na, None, expiry)
            .await
    }

    /// Places a single order with a builder fee attached.
    pub async fn order_with_builder(
        &self,
        intent: OrderIntent,
        builder: BuilderFee,
    ) -> Result<ApiResponse> {
        let expiry = intent.expires_after;
        self.submit_orders(vec![intent], OrderGrouping::Na, Some(builder), expiry)
            .await
    }

    /// Places a batch of independent orders (`na` grouping).
    pub async fn bulk_orders(&self, intents: Vec<OrderIntent>) -> Result<ApiResponse> {
        self.submit_orders(intents, OrderGrouping::Na, None, None)
            .await
    }

    /// Places a grouped batch.
    ///
    /// For `positionTpsl` groups with entries missing direction or size,
    /// the position snapshot is read once and the gaps are filled:
    /// reduce-only entries take the reverse of the position's direction and
    /// default to its full size.
    pub async fn bulk_orders_grouped(
        &self,
        group: OrderGroup,
        builder: Option<BuilderFee>,
    ) -> Result<ApiResponse> {
        group.validate()?;
        let OrderGroup {
            mut orders,
            grouping,
        } = group;

        if grouping == OrderGrouping::PositionTpsl && order::group_needs_inference(&orders) {
            let szi = self.account.signed_position(&orders[0].symbol).await?;
            order::fill_position_tpsl(&mut orders, szi)?;
        }

        self.submit_orders(orders, grouping, builder, None).await
    }

    /// Modifies an existing order.
    pub async fn modify_order(
        &self,
        request: ModifyRequest,
        expires_after: Option<u64>,
    ) -> Result<ApiResponse> {
        let mut intent = request.order;
        let wire = self.normalize_intent(&mut intent).await?;
        let action = Action::Modify(ModifyWire {
            oid: request.oid,
            order: wire,
        });
        let value = self.post_l1(action, expires_after).await?;
        ApiResponse::parse(&value)
    }

    /// Modifies a batch of orders atomically.
    pub async fn modify_orders(
        &self,
        requests: Vec<ModifyRequest>,
        expires_after: Option<u64>,
    ) -> Result<ApiResponse> {
        let mut modifies = Vec::with_capacity(requests.len());
        for request in requests {
            let mut intent = request.order;
            let wire = self.normalize_intent(&mut intent).await?;
            modifies.push(ModifyWire {
                oid: request.oid,
                order: wire,
            });
        }
        let value = self
            .post_l1(Action::BatchModify(BatchModify { modifies }), expires_after)
            .await?;
        ApiResponse::parse(&value)
    }

    /// Cancels one order by exchange id.
    pub async fn cancel(&self, symbol: &str, oid: u64) -> Result<Value> {
        self.cancels(vec![CancelRequest {
            symbol: symbol.to_string(),
            oid,
        }])
        .await
    }

    /// Cancels a batch of orders by exchange id.
    pub async fn cancels(&self, requests: Vec<CancelRequest>) -> Result<Value> {
        let mut cancels = Vec::with_capacity(requests.len());
        for request in requests {
            let asset = self.meta.resolve_asset(&request.symbol).await?;
            cancels.push(Cancel {
                asset: asset.id,
                oid: request.oid,
            });
        }
        self.post_l1(Action::Cancel(BatchCancel { cancels }), None)
            .await
    }

    /// Cancels one order by client id.
    pub async fn cancel_by_cloid(&self, symbol: &str, cloid: Cloid) -> Result<Value> {
        self.cancel_by_cloids(vec![CancelByCloidRequest {
            symbol: symbol.to_string(),
            cloid,
        }])
        .await
    }

    /// Cancels a batch of orders by client id.
    pub async fn cancel_by_cloids(&self, requests: Vec<CancelByCloidRequest>) -> Result<Value> {
        let mut cancels = Vec::with_capacity(requests.len());
        for request in requests {
            let asset = self.meta.resolve_asset(&request.symbol).await?;
            cancels.push(CancelByCloid {
                asset: asset.id,
                cloid: request.cloid,
            });
        }
        self.post_l1(Action::CancelByCloid(BatchCancelCloid { cancels }), None)
            .await
    }

    /// Schedules cancellation of all orders, immediately when `time_ms` is
    /// unset.
    pub async fn schedule_cancel(&self, time_ms: Option<u64>) -> Result<Value> {
        self.post_l1(Action::ScheduleCancel(ScheduleCancel { time: time_ms }), None)
            .await
    }

    // ---- Close helpers ----------------------------------------------------

    /// Market-closes the full position for `symbol`.
    pub async fn close_position_market(&self, symbol: &str) -> Result<ApiResponse> {
        self.close_position_market_with(symbol, ClosePositionParams::default())
            .await
    }

    /// Market-closes a position with explicit size, slippage, cloid, or
    /// builder fee.
    pub async fn close_position_market_with(
        &self,
        symbol: &str,
        params: ClosePositionParams,
    ) -> Result<ApiResponse> {
        let mut intent = OrderIntent::close_market(symbol);
        intent.sz = params.sz;
        intent.slippage = params.slippage;
        intent.cloid = params.cloid;
        self.submit_orders(vec![intent], OrderGrouping::Na, params.builder, None)
            .await
    }

    /// Limit-closes the full position for `symbol` at `limit_px`.
    pub async fn close_position_limit(
        &self,
        tif: TimeInForce,
        symbol: &str,
        limit_px: Decimal,
        cloid: Option<Cloid>,
    ) -> Result<ApiResponse> {
        let mut intent = OrderIntent::close_limit(tif, symbol, limit_px);
        intent.cloid = cloid;
        self.submit_orders(vec![intent], OrderGrouping::Na, None, None)
            .await
    }

    /// Market-closes every open position in one `na` bulk order.
    pub async fn close_all_positions(&self) -> Result<ApiResponse> {
        let positions = self.account.positions().await?;

        let mut intents = Vec::new();
        for (symbol, szi) in positions {
            if szi.is_zero() {
                continue;
            }
            let asset = self.meta.resolve_asset(&symbol).await?;
            let is_buy = szi < Decimal::ZERO;
            let mid = self.meta.mid(&asset.symbol).await?;
            let slippage = self.symbol_slippage(&symbol);
            let px = order::slippage_price(mid, is_buy, slippage);

            let mut intent = OrderIntent::market(symbol, is_buy, szi.abs()).reduce_only();
            intent.limit_px = Some(px);
            intents.push(intent);
        }

        if intents.is_empty() {
            return Err(Error::NoPosition("account".to_string()));
        }
        self.submit_orders(intents, OrderGrouping::Na, None, None)
            .await
    }

    // ---- Account ----------------------------------------------------------

    /// Changes leverage for a market.
    pub async fn update_leverage(
        &self,
        symbol: &str,
        is_cross: bool,
        leverage: u32,
    ) -> Result<Value> {
        let asset = self.meta.resolve_asset(symbol).await?;
        self.post_l1(
            Action::UpdateLeverage(UpdateLeverage {
                asset: asset.id,
                is_cross,
                leverage,
            }),
            None,
        )
        .await
    }

    /// Adds or removes isolated margin for a market. `amount` is USD.
    pub async fn update_isolated_margin(&self, amount: Decimal, symbol: &str) -> Result<Value> {
        let asset = self.meta.resolve_asset(symbol).await?;
        let ntli = num::usd_to_int(amount)?;
        self.post_l1(
            Action::UpdateIsolatedMargin(UpdateIsolatedMargin {
                asset: asset.id,
                is_buy: true,
                ntli,
            }),
            None,
        )
        .await
    }

    // ---- Transfers and user-signed actions --------------------------------

    /// Sends USDC from the perp balance to another address.
    pub async fn usd_transfer(&self, amount: Decimal, destination: &str) -> Result<Value> {
        validate_address(destination)?;
        let nonce = self.nonces.next();
        let action = Action::UsdSend(UsdSend {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            destination: destination.to_string(),
            amount,
            time: nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Sends a spot token to another address.
    pub async fn spot_transfer(
        &self,
        amount: Decimal,
        destination: &str,
        token: &str,
    ) -> Result<Value> {
        validate_address(destination)?;
        let nonce = self.nonces.next();
        let action = Action::SpotSend(SpotSend {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            destination: destination.to_string(),
            token: token.to_string(),
            amount,
            time: nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Withdraws through the bridge.
    pub async fn withdraw_from_bridge(&self, amount: Decimal, destination: &str) -> Result<Value> {
        validate_address(destination)?;
        let nonce = self.nonces.next();
        let action = Action::Withdraw3(Withdraw3 {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            destination: destination.to_string(),
            amount,
            time: nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Moves USDC between spot and perp balances. With a configured vault
    /// the amount carries a `subaccount:` suffix instead of a vault field.
    pub async fn usd_class_transfer(&self, to_perp: bool, amount: Decimal) -> Result<Value> {
        let nonce = self.nonces.next();
        let mut amount = amount.to_string();
        if let Some(vault) = self.vault_address() {
            amount.push_str(&format!(" subaccount:{vault:#x}"));
        }
        let action = Action::UsdClassTransfer(UsdClassTransfer {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            amount,
            to_perp,
            nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Moves a token across DEXes or sub-accounts.
    pub async fn send_asset(
        &self,
        destination: &str,
        source_dex: &str,
        destination_dex: &str,
        token: &str,
        amount: Decimal,
        from_sub_account: Option<&str>,
    ) -> Result<Value> {
        validate_address(destination)?;
        let nonce = self.nonces.next();
        let from_sub_account = from_sub_account
            .map(str::to_lowercase)
            .or_else(|| self.vault_address().map(|vault| format!("{vault:#x}")))
            .unwrap_or_default();
        let action = Action::SendAsset(SendAsset {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            destination: destination.to_string(),
            source_dex: source_dex.to_string(),
            destination_dex: destination_dex.to_string(),
            token: token.to_string(),
            amount,
            from_sub_account,
            nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Transfers USD between the main account and a sub-account. `usd` is
    /// micro-USD.
    pub async fn sub_account_transfer(
        &self,
        sub_account_user: Address,
        is_deposit: bool,
        usd: u64,
    ) -> Result<Value> {
        self.post_l1(
            Action::SubAccountTransfer(SubAccountTransfer {
                sub_account_user,
                is_deposit,
                usd,
            }),
            None,
        )
        .await
    }

    /// Transfers a spot token between the main account and a sub-account.
    pub async fn sub_account_spot_transfer(
        &self,
        sub_account_user: Address,
        is_deposit: bool,
        token: &str,
        amount: Decimal,
    ) -> Result<Value> {
        self.post_l1(
            Action::SubAccountSpotTransfer(SubAccountSpotTransfer {
                sub_account_user,
                is_deposit,
                token: token.to_string(),
                amount,
            }),
            None,
        )
        .await
    }

    /// Deposits into or withdraws from a vault. `usd` is micro-USD.
    pub async fn vault_transfer(
        &self,
        vault_address: Address,
        is_deposit: bool,
        usd: u64,
    ) -> Result<Value> {
        self.post_l1(
            Action::VaultTransfer(VaultTransfer {
                vault_address,
                is_deposit,
                usd,
            }),
            None,
        )
        .await
    }

    /// Generates a fresh agent key and asks the primary wallet to approve
    /// it. The returned key is shown once and never stored.
    pub async fn approve_agent(&self, name: Option<&str>) -> Result<ApproveAgentResult> {
        let agent = PrivateKeySigner::random();
        let agent_address = agent.address();
        let agent_private_key = format!("0x{}", const_hex::encode(agent.credential().to_bytes()));

        let nonce = self.nonces.next();
        let action = Action::ApproveAgent(ApproveAgent {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            agent_address,
            agent_name: name.map(str::to_string),
            nonce,
        });
        let response = self.post_user_signed(action, nonce).await?;

        Ok(ApproveAgentResult {
            response,
            agent_private_key,
            agent_address,
        })
    }

    /// Toggles user-side DEX abstraction.
    pub async fn user_dex_abstraction(&self, user: Address, enabled: bool) -> Result<Value> {
        let nonce = self.nonces.next();
        let action = Action::UserDexAbstraction(UserDexAbstraction {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            user: format!("{user:#x}"),
            enabled,
            nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Enables agent-side DEX abstraction for this wallet.
    pub async fn agent_enable_dex_abstraction(&self) -> Result<Value> {
        self.post_l1(Action::AgentEnableDexAbstraction, None).await
    }

    /// Caps the fee a builder may charge this account.
    pub async fn approve_builder_fee(&self, builder: Address, max_fee_rate: &str) -> Result<Value> {
        let nonce = self.nonces.next();
        let action = Action::ApproveBuilderFee(ApproveBuilderFee {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            max_fee_rate: max_fee_rate.to_string(),
            builder,
            nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Binds a referral code.
    pub async fn set_referrer(&self, code: &str) -> Result<Value> {
        let nonce = self.nonces.next();
        let action = Action::SetReferrer(SetReferrer {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            code: code.to_string(),
            nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Delegates or undelegates stake with a validator.
    pub async fn token_delegate(
        &self,
        validator: Address,
        wei: u64,
        is_undelegate: bool,
    ) -> Result<Value> {
        let nonce = self.nonces.next();
        let action = Action::TokenDelegate(TokenDelegate {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            validator,
            wei,
            is_undelegate,
            nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Converts the account to multi-sig authorization. `signers_json` is
    /// the JSON signer configuration, or `"null"` to revert.
    pub async fn convert_to_multi_sig_user(&self, signers_json: &str) -> Result<Value> {
        let nonce = self.nonces.next();
        let action = Action::ConvertToMultiSigUser(ConvertToMultiSigUser {
            hyperliquid_chain: self.chain,
            signature_chain_id: self.chain.signature_chain_id().to_string(),
            signers: signers_json.to_string(),
            nonce,
        });
        self.post_user_signed(action, nonce).await
    }

    /// Creates a named sub-account.
    pub async fn create_sub_account(&self, name: &str) -> Result<Value> {
        self.post_l1(
            Action::CreateSubAccount {
                name: name.to_string(),
            },
            None,
        )
        .await
    }

    /// Submits an inner action on behalf of a multi-sig account.
    ///
    /// `signatures` are the already-collected signer signatures, ordered by
    /// address as the wallet configuration requires. This wallet acts as
    /// the outer signer and signs the envelope.
    pub async fn multi_sig(
        &self,
        multi_sig_user: Address,
        inner: Action,
        signatures: Vec<Signature>,
        nonce: u64,
        vault_address: Option<Address>,
    ) -> Result<Value> {
        let action = Action::MultiSig(MultiSigAction {
            signature_chain_id: "0x66eee".to_string(),
            signatures,
            payload: MultiSigPayload {
                multi_sig_user: format!("{multi_sig_user:#x}"),
                outer_signer: format!("{:#x}", self.wallet.primary_address()),
                action: Box::new(inner),
            },
        });

        let signature = signing::sign_multisig_envelope(
            self.wallet.signer(),
            &action,
            nonce,
            vault_address,
            self.chain,
        )?;
        let payload = ExchangePayload {
            action,
            nonce,
            signature,
            vault_address,
            expires_after: None,
        };
        self.transport.post("/exchange", &payload).await
    }

    // ---- Deploy and admin families ----------------------------------------

    /// Registers a new spot token.
    pub async fn spot_deploy_register_token(
        &self,
        name: &str,
        sz_decimals: u32,
        wei_decimals: u32,
        max_gas: u64,
        full_name: &str,
    ) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::RegisterToken2 {
                spec: TokenSpec {
                    name: name.to_string(),
                    sz_decimals,
                    wei_decimals,
                },
                max_gas,
                full_name: full_name.to_string(),
            }),
            None,
        )
        .await
    }

    /// Sets genesis balances for a deployed token.
    pub async fn spot_deploy_user_genesis(
        &self,
        token: u32,
        user_and_wei: Vec<(Address, String)>,
        existing_token_and_wei: Vec<(u32, String)>,
    ) -> Result<Value> {
        let user_and_wei = user_and_wei
            .into_iter()
            .map(|(user, wei)| (format!("{user:#x}"), wei))
            .collect();
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::UserGenesis {
                token,
                user_and_wei,
                existing_token_and_wei,
            }),
            None,
        )
        .await
    }

    /// Finalizes a token genesis with its max supply.
    pub async fn spot_deploy_genesis(
        &self,
        token: u32,
        max_supply: &str,
        no_hyperliquidity: bool,
    ) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::Genesis {
                token,
                max_supply: max_supply.to_string(),
                no_hyperliquidity: no_hyperliquidity.then_some(true),
            }),
            None,
        )
        .await
    }

    /// Registers a spot pair for two deployed tokens.
    pub async fn spot_deploy_register_spot(
        &self,
        base_token: u32,
        quote_token: u32,
    ) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::RegisterSpot {
                tokens: [base_token, quote_token],
            }),
            None,
        )
        .await
    }

    /// Registers Hyperliquidity market making for a spot pair.
    pub async fn spot_deploy_register_hyperliquidity(
        &self,
        spot: u32,
        start_px: Decimal,
        order_sz: Decimal,
        n_orders: u32,
        n_seeded_levels: Option<u32>,
    ) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::RegisterHyperliquidity {
                spot,
                start_px,
                order_sz,
                n_orders,
                n_seeded_levels,
            }),
            None,
        )
        .await
    }

    /// Freezes or unfreezes a user for a deployed token.
    pub async fn spot_deploy_freeze_user(
        &self,
        token: u32,
        user: Address,
        freeze: bool,
    ) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::FreezeUser {
                token,
                user,
                freeze,
            }),
            None,
        )
        .await
    }

    /// Enables the freeze privilege for a deployed token.
    pub async fn spot_deploy_enable_freeze_privilege(&self, token: u32) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::EnableFreezePrivilege { token }),
            None,
        )
        .await
    }

    /// Revokes the freeze privilege for a deployed token.
    pub async fn spot_deploy_revoke_freeze_privilege(&self, token: u32) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::RevokeFreezePrivilege { token }),
            None,
        )
        .await
    }

    /// Enables a token as a quote token.
    pub async fn spot_deploy_enable_quote_token(&self, token: u32) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::EnableQuoteToken { token }),
            None,
        )
        .await
    }

    /// Sets the deployer's trading fee share for a token.
    pub async fn spot_deploy_set_deployer_trading_fee_share(
        &self,
        token: u32,
        share: &str,
    ) -> Result<Value> {
        self.post_l1(
            Action::SpotDeploy(SpotDeploy::SetDeployerTradingFeeShare {
                token,
                share: share.to_string(),
            }),
            None,
        )
        .await
    }

    /// Pushes oracle and mark prices for a builder-deployed perp DEX.
    /// Price maps are key-sorted before serialization, as the server
    /// requires.
    pub async fn perp_deploy_set_oracle(
        &self,
        dex: &str,
        oracle_pxs: HashMap<String, String>,
        all_mark_pxs: Vec<HashMap<String, String>>,
        external_perp_pxs: HashMap<String, String>,
    ) -> Result<Value> {
        self.post_l1(
            Action::PerpDeploy(PerpDeploy::SetOracle {
                dex: dex.to_string(),
                oracle_pxs: sorted_pairs(oracle_pxs),
                mark_pxs: all_mark_pxs.into_iter().map(sorted_pairs).collect(),
                external_perp_pxs: sorted_pairs(external_perp_pxs),
            }),
            None,
        )
        .await
    }

    /// Registers a validator node.
    #[allow(clippy::too_many_arguments)]
    pub async fn c_validator_register(
        &self,
        node_ip: &str,
        name: &str,
        description: &str,
        delegations_disabled: bool,
        commission_bps: u32,
        signer: &str,
        unjailed: bool,
        initial_wei: u64,
    ) -> Result<Value> {
        self.post_l1(
            Action::CValidatorAction(CValidator::Register {
                profile: ValidatorProfile {
                    node_ip: NodeIp {
                        ip: node_ip.to_string(),
                    },
                    name: name.to_string(),
                    description: description.to_string(),
                    delegations_disabled,
                    commission_bps,
                    signer: signer.to_lowercase(),
                },
                unjailed,
                initial_wei,
            }),
            None,
        )
        .await
    }

    /// Updates a validator profile. Unset fields are sent as nulls and left
    /// unchanged by the server.
    #[allow(clippy::too_many_arguments)]
    pub async fn c_validator_change_profile(
        &self,
        node_ip: Option<&str>,
        name: Option<&str>,
        description: Option<&str>,
        unjailed: bool,
        disable_delegations: Option<bool>,
        commission_bps: Option<u32>,
        signer: Option<&str>,
    ) -> Result<Value> {
        self.post_l1(
            Action::CValidatorAction(CValidator::ChangeProfile {
                node_ip: node_ip.map(|ip| NodeIp { ip: ip.to_string() }),
                name: name.map(str::to_string),
                description: description.map(str::to_string),
                unjailed,
                disable_delegations,
                commission_bps,
                signer: signer.map(str::to_lowercase),
            }),
            None,
        )
        .await
    }

    /// Unregisters this validator.
    pub async fn c_validator_unregister(&self) -> Result<Value> {
        self.post_l1(Action::CValidatorAction(CValidator::Unregister(())), None)
            .await
    }

    /// Jails this validator's signer.
    pub async fn c_signer_jail_self(&self) -> Result<Value> {
        self.post_l1(Action::CSignerAction(CSigner::JailSelf(())), None)
            .await
    }

    /// Unjails this validator's signer.
    pub async fn c_signer_unjail_self(&self) -> Result<Value> {
        self.post_l1(Action::CSignerAction(CSigner::UnjailSelf(())), None)
            .await
    }

    /// Toggles EVM big blocks for this user.
    pub async fn use_big_blocks(&self, enable: bool) -> Result<Value> {
        self.post_l1(
            Action::EvmUserModify {
                using_big_blocks: enable,
            },
            None,
        )
        .await
    }

    /// Invalidates a nonce without any other effect. Signed without an
    /// expiry, with a caller-supplied nonce.
    pub async fn noop(&self, nonce: u64) -> Result<Value> {
        let action = Action::Noop;
        let vault = self.effective_vault(&action);
        self.post_l1_raw(action, nonce, vault, None).await
    }

    // ---- Internals --------------------------------------------------------

    async fn submit_orders(
        &self,
        intents: Vec<OrderIntent>,
        grouping: OrderGrouping,
        builder: Option<BuilderFee>,
        expires_after: Option<u64>,
    ) -> Result<ApiResponse> {
        let builder = builder.map(validate_builder).transpose()?;

        let mut expires_after = expires_after;
        let mut orders = Vec::with_capacity(intents.len());
        for mut intent in intents {
            expires_after = expires_after.or(intent.expires_after);
            orders.push(self.normalize_intent(&mut intent).await?);
        }

        let action = Action::Order(BatchOrder {
            orders,
            grouping,
            builder,
        });
        let value = self.post_l1(action, expires_after).await?;
        ApiResponse::parse(&value)
    }

    /// Resolves the context an intent needs and runs it through the
    /// normalizer pipeline.
    async fn normalize_intent(&self, intent: &mut OrderIntent) -> Result<crate::types::OrderWire> {
        let asset = self.meta.resolve_asset(&intent.symbol).await?;
        let (needs_mid, needs_position) = order::required_context(intent);

        let szi = if needs_position {
            Some(self.account.signed_position(&asset.symbol).await?)
        } else {
            None
        };
        let mid = if needs_mid {
            Some(self.meta.mid(&asset.symbol).await?)
        } else {
            None
        };

        let ctx = order::NormalizeContext {
            mid,
            szi,
            slippage: intent
                .slippage
                .unwrap_or_else(|| self.symbol_slippage(&intent.symbol)),
        };
        order::prepare(intent, &ctx)?;
        order::to_wire(intent, &asset)
    }

    fn symbol_slippage(&self, symbol: &str) -> Decimal {
        self.slippage_by_symbol
            .read()
            .unwrap()
            .get(&symbol.to_lowercase())
            .copied()
            .unwrap_or_else(|| *self.default_slippage.read().unwrap())
    }

    /// The vault address the signed payload carries, after the per-action
    /// and own-address exclusions.
    fn effective_vault(&self, action: &Action) -> Option<Address> {
        if !action.carries_vault() {
            return None;
        }
        let vault = self.vault_address()?;
        if vault == self.wallet.address() {
            None
        } else {
            Some(vault)
        }
    }

    async fn post_l1(&self, action: Action, expires_after: Option<u64>) -> Result<Value> {
        let nonce = self.nonces.next();
        let vault = self.effective_vault(&action);
        let expires_after = Some(resolve_expiry(nonce, expires_after));
        self.post_l1_raw(action, nonce, vault, expires_after).await
    }

    async fn post_l1_raw(
        &self,
        action: Action,
        nonce: u64,
        vault_address: Option<Address>,
        expires_after: Option<u64>,
    ) -> Result<Value> {
        let signature = signing::sign_l1_action(
            self.wallet.signer(),
            &action,
            nonce,
            vault_address,
            expires_after,
            self.chain,
        )?;
        let payload = ExchangePayload {
            action,
            nonce,
            signature,
            vault_address,
            expires_after,
        };
        self.transport.post("/exchange", &payload).await
    }

    async fn post_user_signed(&self, action: Action, nonce: u64) -> Result<Value> {
        let signature = signing::sign_user_action(self.wallet.signer(), &action, self.chain)?;
        let vault_address = self.effective_vault(&action);
        let payload = ExchangePayload {
            action,
            nonce,
            signature,
            vault_address,
            expires_after: None,
        };
        self.transport.post("/exchange", &payload).await
    }
}

/// Resolves the effective absolute expiry for an L1 action.
fn resolve_expiry(nonce: u64, expires_after: Option<u64>) -> u64 {
    let expiry = expires_after.unwrap_or(DEFAULT_EXPIRES_AFTER_MS);
    if expiry < ABSOLUTE_EXPIRY_THRESHOLD_MS {
        nonce + expiry
    } else {
        expiry
    }
}

/// Checks that a destination string is a well-formed 20-byte address. The
/// original casing is preserved on the wire.
fn validate_address(value: &str) -> Result<()> {
    value
        .parse::<Address>()
        .map(|_| ())
        .map_err(|_| Error::BadAddress(value.to_string()))
}

/// Validates builder fee shape and range. The address is lowercased at
/// serialization; unknown fields cannot exist on the typed struct.
fn validate_builder(fee: BuilderFee) -> Result<BuilderFee> {
    if fee.fee > MAX_BUILDER_FEE {
        return Err(Error::BadBuilderFee(format!(
            "fee {} above maximum {MAX_BUILDER_FEE}",
            fee.fee
        )));
    }
    Ok(fee)
}

fn sorted_pairs(map: HashMap<String, String>) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = map.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;

    use super::*;
    use crate::types::UsdClassTransfer;

    const TEST_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn test_exchange() -> Exchange {
        Exchange::builder()
            .chain(Chain::Testnet)
            .wallet(Wallet::new(TEST_KEY).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn wallet_defaults_and_validation() {
        let wallet = Wallet::new(TEST_KEY).unwrap();
        assert_eq!(wallet.primary_address(), wallet.address());
        assert_eq!(wallet.name(), format!("{:#x}", wallet.address()));

        let named = Wallet::new(TEST_KEY).unwrap().alias("market-maker");
        assert_eq!(named.name(), "market-maker");

        assert!(matches!(Wallet::new("0x1234"), Err(Error::Sign(_))));
        assert!(matches!(
            Wallet::new("zz00000000000000000000000000000000000000000000000000000000000000"),
            Err(Error::Sign(_))
        ));
    }

    #[test]
    fn wallet_debug_never_shows_key_material() {
        let wallet = Wallet::new(TEST_KEY).unwrap();
        let debug = format!("{wallet:?}");
        assert!(!debug.contains("0000000000000000000000000000000001"));
    }

    #[test]
    fn delegated_wallet_keeps_primary_address() {
        let primary: Address = "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap();
        let wallet = Wallet::with_primary(TEST_KEY, Some(primary)).unwrap();
        assert_eq!(wallet.primary_address(), primary);
        assert_ne!(wallet.primary_address(), wallet.address());
    }

    #[test]
    fn expiry_is_relative_below_the_threshold() {
        assert_eq!(resolve_expiry(1_700_000_000_000, None), 1_700_000_120_000);
        assert_eq!(resolve_expiry(1_700_000_000_000, Some(5_000)), 1_700_000_005_000);
        assert_eq!(
            resolve_expiry(1_700_000_000_000, Some(1_800_000_000_000)),
            1_800_000_000_000
        );
    }

    #[test]
    fn builder_fee_bounds() {
        let builder: Address = "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap();
        assert!(validate_builder(BuilderFee { builder, fee: 10 }).is_ok());
        assert!(validate_builder(BuilderFee {
            builder,
            fee: 1_000_000
        })
        .is_ok());
        assert!(matches!(
            validate_builder(BuilderFee {
                builder,
                fee: 1_000_001
            }),
            Err(Error::BadBuilderFee(_))
        ));
    }

    #[test]
    fn vault_matching_own_address_is_omitted() {
        let exchange = test_exchange();
        exchange.set_vault_address(Some(exchange.wallet().address()));
        assert_eq!(exchange.effective_vault(&Action::Noop), None);

        let other: Address = "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap();
        exchange.set_vault_address(Some(other));
        assert_eq!(exchange.effective_vault(&Action::Noop), Some(other));
    }

    #[test]
    fn in_band_vault_actions_never_carry_one() {
        let exchange = test_exchange();
        let other: Address = "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap();
        exchange.set_vault_address(Some(other));

        let action = Action::UsdClassTransfer(UsdClassTransfer {
            hyperliquid_chain: Chain::Testnet,
            signature_chain_id: "0x66eee".into(),
            amount: "100".into(),
            to_perp: true,
            nonce: 1,
        });
        assert_eq!(exchange.effective_vault(&action), None);
    }

    #[test]
    fn transfer_destinations_must_be_addresses() {
        assert!(validate_address("0x0D1d9635D0640821d15e323ac8AdADfA9c111414").is_ok());
        assert!(matches!(
            validate_address("0x1234"),
            Err(Error::BadAddress(_))
        ));
        assert!(matches!(
            validate_address("not-an-address"),
            Err(Error::BadAddress(_))
        ));
    }

    #[test]
    fn slippage_resolution_order() {
        let exchange = test_exchange();
        assert_eq!(exchange.symbol_slippage("ETH"), DEFAULT_SLIPPAGE);

        exchange.set_default_slippage(dec!(0.02));
        assert_eq!(exchange.symbol_slippage("ETH"), dec!(0.02));

        exchange.set_symbol_slippage("ETH", dec!(0.1));
        assert_eq!(exchange.symbol_slippage("eth"), dec!(0.1));
        assert_eq!(exchange.symbol_slippage("BTC"), dec!(0.02));
    }
}
