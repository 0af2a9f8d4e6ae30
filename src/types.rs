//! Wire types for the exchange API.
//!
//! Everything the client sends or receives lives here: the tagged [`Action`]
//! enum (one variant per server discriminator), the post-normalization
//! [`OrderWire`] form consumed by the signer, the `/info` request and
//! response shapes, and the signed request envelope.
//!
//! Field declaration order is the wire key order. The signer hashes the
//! exact JSON bytes these types serialize to, so nothing here may reorder or
//! sort keys.

use alloy::primitives::{Address, U256};
use either::Either;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::{utils, Chain, Cloid, OidOrCloid};

/// Instrument kind for an asset listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instrument {
    /// Perpetual futures market.
    Perp,
    /// Spot trading pair.
    Spot,
}

/// Time-in-force for a limit order.
///
/// - `Alo` rests only if it adds liquidity (maker-only).
/// - `Ioc` executes immediately and cancels any remainder.
/// - `Gtc` rests until filled or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Alo,
    Ioc,
    Gtc,
}

/// Trigger direction: take-profit or stop-loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TpSl {
    Tp,
    Sl,
}

/// Wire form of an order type: exactly one inhabited branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderTypeWire {
    Limit {
        tif: TimeInForce,
    },
    #[serde(rename_all = "camelCase")]
    Trigger {
        #[serde(with = "rust_decimal::serde::str")]
        trigger_px: Decimal,
        is_market: bool,
        tpsl: TpSl,
    },
}

/// A single order in its post-normalization wire form.
///
/// This is the only order representation the signer accepts. Sizes and
/// prices have already been formatted to the asset's precision by the
/// normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWire {
    /// Asset id.
    #[serde(rename = "a")]
    pub asset: u32,
    /// Buy side when true.
    #[serde(rename = "b")]
    pub is_buy: bool,
    /// Limit price, absent only for malformed intents the server rejects.
    #[serde(
        rename = "p",
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option",
        default
    )]
    pub limit_px: Option<Decimal>,
    /// Size in base units.
    #[serde(rename = "s", with = "rust_decimal::serde::str")]
    pub sz: Decimal,
    /// Reduce-only flag.
    #[serde(rename = "r")]
    pub reduce_only: bool,
    /// Order type branch.
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
    /// Client order id, canonical hex, present iff set.
    #[serde(
        rename = "c",
        skip_serializing_if = "Option::is_none",
        serialize_with = "utils::serialize_opt_cloid",
        deserialize_with = "utils::deserialize_opt_cloid",
        default
    )]
    pub cloid: Option<Cloid>,
}

/// Grouping tag applied to a batch of orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderGrouping {
    Na,
    NormalTpsl,
    PositionTpsl,
}

/// Optional builder fee attached to order actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderFee {
    /// Builder address, lowercased on the wire.
    #[serde(rename = "b", serialize_with = "utils::serialize_address_lower")]
    pub builder: Address,
    /// Fee in tenths of a basis point. Validated against the configured
    /// upper bound before signing.
    #[serde(rename = "f")]
    pub fee: u64,
}

/// The `order` action body: orders plus grouping and an optional builder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOrder {
    pub orders: Vec<OrderWire>,
    pub grouping: OrderGrouping,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderFee>,
}

/// Cancel by exchange order id.
#[derive(Debug, Clone, Serialize)]
pub struct Cancel {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

/// Cancel by client order id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelByCloid {
    pub asset: u32,
    #[serde(serialize_with = "utils::serialize_cloid")]
    pub cloid: Cloid,
}

/// The `cancel` action body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCancel {
    pub cancels: Vec<Cancel>,
}

/// The `cancelByCloid` action body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCancelCloid {
    pub cancels: Vec<CancelByCloid>,
}

/// A single order modification: target id plus full replacement order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyWire {
    /// Exchange oid or client cloid of the order being replaced.
    #[serde(with = "either::serde_untagged")]
    pub oid: OidOrCloid,
    pub order: OrderWire,
}

/// The `batchModify` action body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchModify {
    pub modifies: Vec<ModifyWire>,
}

/// The `scheduleCancel` action body. A missing time cancels immediately.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCancel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
}

/// The `updateLeverage` action body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeverage {
    pub asset: u32,
    pub is_cross: bool,
    pub leverage: u32,
}

/// The `updateIsolatedMargin` action body. `ntli` is micro-USD.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIsolatedMargin {
    pub asset: u32,
    pub is_buy: bool,
    pub ntli: i64,
}

/// The `vaultTransfer` action body. `usd` is micro-USD.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTransfer {
    #[serde(serialize_with = "utils::serialize_address_lower")]
    pub vault_address: Address,
    pub is_deposit: bool,
    pub usd: u64,
}

/// The `subAccountTransfer` action body. `usd` is micro-USD.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAccountTransfer {
    #[serde(serialize_with = "utils::serialize_address_lower")]
    pub sub_account_user: Address,
    pub is_deposit: bool,
    pub usd: u64,
}

/// The `subAccountSpotTransfer` action body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAccountSpotTransfer {
    #[serde(serialize_with = "utils::serialize_address_lower")]
    pub sub_account_user: Address,
    pub is_deposit: bool,
    pub token: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Token spec inside `spotDeploy.registerToken2`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSpec {
    pub name: String,
    pub sz_decimals: u32,
    pub wei_decimals: u32,
}

/// Spot-deploy sub-actions. Serialized as a single variant key beside the
/// `spotDeploy` discriminator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpotDeploy {
    #[serde(rename_all = "camelCase")]
    RegisterToken2 {
        spec: TokenSpec,
        max_gas: u64,
        full_name: String,
    },
    #[serde(rename_all = "camelCase")]
    UserGenesis {
        token: u32,
        user_and_wei: Vec<(String, String)>,
        existing_token_and_wei: Vec<(u32, String)>,
    },
    #[serde(rename_all = "camelCase")]
    Genesis {
        token: u32,
        max_supply: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        no_hyperliquidity: Option<bool>,
    },
    RegisterSpot {
        tokens: [u32; 2],
    },
    #[serde(rename_all = "camelCase")]
    RegisterHyperliquidity {
        spot: u32,
        #[serde(with = "rust_decimal::serde::str")]
        start_px: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        order_sz: Decimal,
        n_orders: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        n_seeded_levels: Option<u32>,
    },
    FreezeUser {
        token: u32,
        #[serde(serialize_with = "utils::serialize_address_lower")]
        user: Address,
        freeze: bool,
    },
    EnableFreezePrivilege {
        token: u32,
    },
    RevokeFreezePrivilege {
        token: u32,
    },
    EnableQuoteToken {
        token: u32,
    },
    SetDeployerTradingFeeShare {
        token: u32,
        share: String,
    },
}

/// Perp-deploy sub-actions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PerpDeploy {
    #[serde(rename_all = "camelCase")]
    SetOracle {
        dex: String,
        /// Key-sorted `[coin, price]` pairs.
        oracle_pxs: Vec<(String, String)>,
        /// One key-sorted list per mark-price source.
        mark_pxs: Vec<Vec<(String, String)>>,
        /// Key-sorted `[coin, price]` pairs.
        external_perp_pxs: Vec<(String, String)>,
    },
}

/// Node endpoint inside a validator profile.
#[derive(Debug, Clone, Serialize)]
pub struct NodeIp {
    #[serde(rename = "Ip")]
    pub ip: String,
}

/// Validator profile for `CValidatorAction.register`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatorProfile {
    pub node_ip: NodeIp,
    pub name: String,
    pub description: String,
    pub delegations_disabled: bool,
    pub commission_bps: u32,
    pub signer: String,
}

/// Validator operations. The server uses snake_case field names here,
/// unlike the rest of the action surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CValidator {
    Register {
        profile: ValidatorProfile,
        unjailed: bool,
        initial_wei: u64,
    },
    ChangeProfile {
        node_ip: Option<NodeIp>,
        name: Option<String>,
        description: Option<String>,
        unjailed: bool,
        disable_delegations: Option<bool>,
        commission_bps: Option<u32>,
        signer: Option<String>,
    },
    Unregister(()),
}

/// Signer jail operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CSigner {
    JailSelf(()),
    UnjailSelf(()),
}

/// `usdSend`: transfer USDC from the perp balance to another address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdSend {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    pub destination: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Must equal the request nonce.
    pub time: u64,
}

/// `withdraw3`: withdraw through the bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdraw3 {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    pub destination: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub time: u64,
}

/// `spotSend`: transfer a spot token to another address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotSend {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    pub destination: String,
    pub token: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub time: u64,
}

/// `usdClassTransfer`: move USDC between spot and perp balances.
///
/// The amount is a raw string because a configured vault appends a
/// ` subaccount:0x…` suffix that travels inside the same field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdClassTransfer {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    pub amount: String,
    pub to_perp: bool,
    pub nonce: u64,
}

/// `sendAsset`: move a token across DEXes or sub-accounts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAsset {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    pub destination: String,
    pub source_dex: String,
    pub destination_dex: String,
    pub token: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub from_sub_account: String,
    pub nonce: u64,
}

/// `approveAgent`: authorize a freshly generated API wallet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveAgent {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    #[serde(serialize_with = "utils::serialize_address_lower")]
    pub agent_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub nonce: u64,
}

/// `approveBuilderFee`: cap the fee a builder may charge this account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBuilderFee {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    pub max_fee_rate: String,
    #[serde(serialize_with = "utils::serialize_address_lower")]
    pub builder: Address,
    pub nonce: u64,
}

/// `setReferrer`: bind a referral code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetReferrer {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    pub code: String,
    pub nonce: u64,
}

/// `tokenDelegate`: stake or unstake with a validator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDelegate {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    #[serde(serialize_with = "utils::serialize_address_lower")]
    pub validator: Address,
    pub wei: u64,
    pub is_undelegate: bool,
    pub nonce: u64,
}

/// `convertToMultiSigUser`: swap the account to multi-sig authorization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertToMultiSigUser {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    /// JSON-encoded signer configuration, or the literal `"null"` to revert.
    pub signers: String,
    pub nonce: u64,
}

/// `userDexAbstraction`: toggle user-side DEX abstraction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDexAbstraction {
    pub hyperliquid_chain: Chain,
    pub signature_chain_id: String,
    pub user: String,
    pub enabled: bool,
    pub nonce: u64,
}

/// Inner payload of a `multiSig` action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSigPayload {
    pub multi_sig_user: String,
    pub outer_signer: String,
    pub action: Box<Action>,
}

/// The `multiSig` action: an inner action plus collected signatures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSigAction {
    pub signature_chain_id: String,
    pub signatures: Vec<Signature>,
    pub payload: MultiSigPayload,
}

/// A server-accepted operation, tagged by its string discriminator.
///
/// Variant order is irrelevant; field order inside each body is not, because
/// the L1 signer hashes the serialized JSON bytes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Order(BatchOrder),
    Cancel(BatchCancel),
    CancelByCloid(BatchCancelCloid),
    Modify(ModifyWire),
    BatchModify(BatchModify),
    ScheduleCancel(ScheduleCancel),
    UpdateLeverage(UpdateLeverage),
    UpdateIsolatedMargin(UpdateIsolatedMargin),
    UsdSend(UsdSend),
    Withdraw3(Withdraw3),
    SpotSend(SpotSend),
    UsdClassTransfer(UsdClassTransfer),
    SendAsset(SendAsset),
    SubAccountTransfer(SubAccountTransfer),
    SubAccountSpotTransfer(SubAccountSpotTransfer),
    VaultTransfer(VaultTransfer),
    ApproveAgent(ApproveAgent),
    UserDexAbstraction(UserDexAbstraction),
    ApproveBuilderFee(ApproveBuilderFee),
    SetReferrer(SetReferrer),
    TokenDelegate(TokenDelegate),
    ConvertToMultiSigUser(ConvertToMultiSigUser),
    MultiSig(MultiSigAction),
    SpotDeploy(SpotDeploy),
    PerpDeploy(PerpDeploy),
    #[serde(rename = "CValidatorAction")]
    CValidatorAction(CValidator),
    #[serde(rename = "CSignerAction")]
    CSignerAction(CSigner),
    #[serde(rename_all = "camelCase")]
    EvmUserModify {
        using_big_blocks: bool,
    },
    Noop,
    CreateSubAccount {
        name: String,
    },
    AgentEnableDexAbstraction,
}

impl Action {
    /// Whether this action authenticates through the user-signed EIP-712
    /// path instead of the L1 agent path.
    #[must_use]
    pub fn is_user_signed(&self) -> bool {
        matches!(
            self,
            Action::ApproveAgent(_)
                | Action::UserDexAbstraction(_)
                | Action::UsdSend(_)
                | Action::Withdraw3(_)
                | Action::SpotSend(_)
                | Action::UsdClassTransfer(_)
                | Action::SendAsset(_)
                | Action::ApproveBuilderFee(_)
                | Action::SetReferrer(_)
                | Action::TokenDelegate(_)
                | Action::ConvertToMultiSigUser(_)
        )
    }

    /// Whether the signed payload may carry a vault address for this action.
    ///
    /// `usdClassTransfer` and `sendAsset` express vault semantics in-band
    /// and never take one.
    #[must_use]
    pub fn carries_vault(&self) -> bool {
        !matches!(self, Action::UsdClassTransfer(_) | Action::SendAsset(_))
    }
}

/// ECDSA signature split into its wire components.
///
/// All three components serialize as `0x` hex, `v` included.
#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    pub r: U256,
    pub s: U256,
    #[serde(serialize_with = "serialize_v_hex")]
    pub v: u64,
}

fn serialize_v_hex<S: Serializer>(v: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{v:#x}"))
}

impl From<alloy::signers::Signature> for Signature {
    fn from(sig: alloy::signers::Signature) -> Self {
        Self {
            r: sig.r(),
            s: sig.s(),
            v: sig.recid().to_byte() as u64 + 27,
        }
    }
}

/// The signed request envelope posted to `/exchange`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePayload {
    pub action: Action,
    pub nonce: u64,
    pub signature: Signature,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "utils::serialize_opt_address_lower"
    )]
    pub vault_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<u64>,
}

/// Request body shapes for the `/info` endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum InfoRequest {
    Meta,
    SpotMeta,
    AllMids,
    ClearinghouseState {
        #[serde(serialize_with = "utils::serialize_address_lower")]
        user: Address,
    },
}

/// `meta` response: the perp universe.
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<PerpListing>,
}

/// One perp listing in the `meta` universe.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpListing {
    pub name: String,
    pub sz_decimals: u32,
}

/// `spotMeta` response: spot pairs plus the token table.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotMeta {
    pub universe: Vec<SpotPair>,
    pub tokens: Vec<SpotTokenMeta>,
}

/// One spot pair in the `spotMeta` universe.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotPair {
    pub name: String,
    /// Base and quote indexes into the token table.
    pub tokens: [u32; 2],
    pub index: u32,
}

/// One token entry in the `spotMeta` token table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotTokenMeta {
    pub name: String,
    pub index: u32,
    pub sz_decimals: u32,
}

/// `clearinghouseState` response, reduced to what position inference needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
}

/// One position slot in the clearinghouse state.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: PositionData,
}

/// Position details. `szi` stays a string here; parsing it is the account
/// reader's job so a malformed value classifies as a position error rather
/// than a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionData {
    pub coin: String,
    pub szi: String,
}

/// `/exchange` response wrapper: `status` is `ok` or `err`.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", content = "response", rename_all = "camelCase")]
pub enum ApiResponse {
    Ok(OkResponse),
    Err(String),
}

impl ApiResponse {
    /// Decodes a raw `/exchange` response value.
    pub fn parse(value: &serde_json::Value) -> crate::error::Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|err| crate::error::Error::Io(format!("unexpected response shape: {err}")))
    }

    /// The per-order statuses, when this is an order response.
    #[must_use]
    pub fn order_statuses(&self) -> Option<&[OrderResponseStatus]> {
        match self {
            ApiResponse::Ok(OkResponse::Order { statuses }) => Some(statuses),
            _ => None,
        }
    }
}

/// Successful `/exchange` response data.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum OkResponse {
    Order { statuses: Vec<OrderResponseStatus> },
    Default,
}

/// Terminal classification of one submitted order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderResponseStatus {
    /// Accepted with no further detail.
    Success,
    /// Resting on the book.
    Resting {
        oid: u64,
        #[serde(default, deserialize_with = "utils::deserialize_opt_cloid")]
        cloid: Option<Cloid>,
    },
    /// Filled immediately.
    Filled {
        #[serde(rename = "totalSz")]
        total_sz: Decimal,
        #[serde(rename = "avgPx")]
        avg_px: Decimal,
        oid: u64,
    },
    /// Rejected with a reason.
    Error(String),
}

impl OrderResponseStatus {
    /// True unless the order was rejected.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !matches!(self, OrderResponseStatus::Error(_))
    }

    /// The rejection reason, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            OrderResponseStatus::Error(err) => Some(err),
            _ => None,
        }
    }

    /// The exchange order id for resting and filled orders.
    #[must_use]
    pub fn oid(&self) -> Option<u64> {
        match self {
            OrderResponseStatus::Resting { oid, .. } | OrderResponseStatus::Filled { oid, .. } => {
                Some(*oid)
            }
            _ => None,
        }
    }
}

/// Convenience alias: oid on the left, cloid on the right.
pub fn oid(oid: u64) -> OidOrCloid {
    Either::Left(oid)
}

/// Convenience alias for addressing an order by cloid.
pub fn by_cloid(cloid: Cloid) -> OidOrCloid {
    Either::Right(cloid)
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    fn sample_wire() -> OrderWire {
        OrderWire {
            asset: 4,
            is_buy: true,
            limit_px: Some(dec!(3150.0)),
            sz: dec!(0.01),
            reduce_only: false,
            order_type: OrderTypeWire::Limit {
                tif: TimeInForce::Ioc,
            },
            cloid: None,
        }
    }

    #[test]
    fn order_action_wire_shape() {
        let action = Action::Order(BatchOrder {
            orders: vec![sample_wire()],
            grouping: OrderGrouping::Na,
            builder: None,
        });
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(
            json,
            r#"{"type":"order","orders":[{"a":4,"b":true,"p":"3150.0","s":"0.01","r":false,"t":{"limit":{"tif":"Ioc"}}}],"grouping":"na"}"#
        );
    }

    #[test]
    fn trigger_wire_shape() {
        let t = OrderTypeWire::Trigger {
            trigger_px: dec!(3600),
            is_market: true,
            tpsl: TpSl::Tp,
        };
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            r#"{"trigger":{"triggerPx":"3600","isMarket":true,"tpsl":"tp"}}"#
        );
    }

    #[test]
    fn cloid_serializes_as_canonical_hex() {
        let mut wire = sample_wire();
        let bytes = [0xab; 16];
        wire.cloid = Some(Cloid::from(bytes));
        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains(r#""c":"0xabababababababababababababababab""#));

        let back: OrderWire = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cloid.unwrap().0, bytes);
    }

    #[test]
    fn cancel_actions_use_short_and_long_keys() {
        let cancel = Action::Cancel(BatchCancel {
            cancels: vec![Cancel { asset: 4, oid: 77 }],
        });
        assert_eq!(
            serde_json::to_string(&cancel).unwrap(),
            r#"{"type":"cancel","cancels":[{"a":4,"o":77}]}"#
        );

        let by_cloid = Action::CancelByCloid(BatchCancelCloid {
            cancels: vec![CancelByCloid {
                asset: 4,
                cloid: Cloid::from([0u8; 16]),
            }],
        });
        assert_eq!(
            serde_json::to_string(&by_cloid).unwrap(),
            r#"{"type":"cancelByCloid","cancels":[{"asset":4,"cloid":"0x00000000000000000000000000000000"}]}"#
        );
    }

    #[test]
    fn modify_oid_is_untagged() {
        let single = Action::Modify(ModifyWire {
            oid: oid(42),
            order: sample_wire(),
        });
        let json = serde_json::to_string(&single).unwrap();
        assert!(json.starts_with(r#"{"type":"modify","oid":42,"order":"#));

        let by_id = ModifyWire {
            oid: by_cloid(Cloid::from([1u8; 16])),
            order: sample_wire(),
        };
        let json = serde_json::to_string(&by_id).unwrap();
        assert!(json.contains(r#""oid":"0x01010101010101010101010101010101""#));
    }

    #[test]
    fn validator_discriminators_keep_case() {
        let action = Action::CValidatorAction(CValidator::Unregister(()));
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"type":"CValidatorAction","unregister":null}"#
        );

        let action = Action::CSignerAction(CSigner::JailSelf(()));
        assert_eq!(
            serde_json::to_string(&action).unwrap(),
            r#"{"type":"CSignerAction","jailSelf":null}"#
        );
    }

    #[test]
    fn misc_action_discriminators() {
        assert_eq!(
            serde_json::to_string(&Action::Noop).unwrap(),
            r#"{"type":"noop"}"#
        );
        assert_eq!(
            serde_json::to_string(&Action::EvmUserModify {
                using_big_blocks: true
            })
            .unwrap(),
            r#"{"type":"evmUserModify","usingBigBlocks":true}"#
        );
        assert_eq!(
            serde_json::to_string(&Action::AgentEnableDexAbstraction).unwrap(),
            r#"{"type":"agentEnableDexAbstraction"}"#
        );
    }

    #[test]
    fn vault_semantics_per_action() {
        let class_transfer = Action::UsdClassTransfer(UsdClassTransfer {
            hyperliquid_chain: Chain::Mainnet,
            signature_chain_id: "0xa4b1".into(),
            amount: "100".into(),
            to_perp: true,
            nonce: 1,
        });
        assert!(!class_transfer.carries_vault());
        assert!(class_transfer.is_user_signed());

        let noop = Action::Noop;
        assert!(noop.carries_vault());
        assert!(!noop.is_user_signed());
    }

    #[test]
    fn signature_components_serialize_as_hex() {
        let sig = Signature {
            r: U256::from(0x1234u64),
            s: U256::from(0x5678u64),
            v: 27,
        };
        assert_eq!(
            serde_json::to_string(&sig).unwrap(),
            r#"{"r":"0x1234","s":"0x5678","v":"0x1b"}"#
        );
    }

    #[test]
    fn payload_omits_absent_fields() {
        let payload = ExchangePayload {
            action: Action::Noop,
            nonce: 1,
            signature: Signature {
                r: U256::from(1u64),
                s: U256::from(2u64),
                v: 28,
            },
            vault_address: None,
            expires_after: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("vaultAddress"));
        assert!(!json.contains("expiresAfter"));
    }

    #[test]
    fn api_error_response_decodes() {
        let text = r#"{"status":"err","response":"Order must have minimum value of $10."}"#;
        let res: ApiResponse = serde_json::from_str(text).unwrap();
        assert!(matches!(res, ApiResponse::Err(_)));
    }

    #[test]
    fn api_order_response_decodes() {
        let text = r#"{
           "status":"ok",
           "response":{
              "type":"order",
              "data":{
                 "statuses":[
                    {"resting":{"oid":77738308}},
                    {"error":"Insufficient margin."},
                    "success"
                 ]
              }
           }
        }"#;
        let res: ApiResponse = serde_json::from_str(text).unwrap();
        let statuses = res.order_statuses().unwrap();
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[0].oid(), Some(77738308));
        assert_eq!(statuses[1].error(), Some("Insufficient margin."));
        assert!(statuses[2].is_ok());
    }

    #[test]
    fn default_ok_response_decodes() {
        let text = r#"{"status":"ok","response":{"type":"default"}}"#;
        let res: ApiResponse = serde_json::from_str(text).unwrap();
        assert!(matches!(res, ApiResponse::Ok(OkResponse::Default)));
    }
}
