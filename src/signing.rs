//! Action signing.
//!
//! Two paths authenticate requests:
//!
//! - **L1 path**: the action's canonical JSON bytes are framed with the
//!   nonce, optional vault address, and optional expiry (see
//!   [`crate::utils::pack_action_frame`]), keccak-256 hashed, and the digest
//!   is signed as the `connectionId` of an EIP-712 `Agent` struct whose
//!   `source` is `"a"` on mainnet and `"b"` on testnet.
//! - **User-signed path**: a fixed catalog of actions signs EIP-712 typed
//!   data directly. Each action declares its payload type table, always led
//!   by `hyperliquidChain`, under the `HyperliquidSignTransaction` domain.
//!
//! Both paths sign with the API wallet key. Signing is CPU-only and
//! deterministic for a given `(digest, key)` under RFC 6979.

use alloy::{
    dyn_abi::Eip712Domain,
    primitives::{Address, B256},
    signers::SignerSync,
    sol,
    sol_types::eip712_domain,
};

use crate::{
    error::{Error, Result},
    types::{Action, Signature},
    utils, Chain,
};

/// Domain for the L1 agent path.
pub(crate) const L1_EIP712_DOMAIN: Eip712Domain = eip712_domain! {
    name: "Exchange",
    version: "1",
    chain_id: 1337,
    verifying_contract: Address::ZERO,
};

/// Domain for user-signed actions on mainnet (Arbitrum One chain id).
pub(crate) const USER_MAINNET_EIP712_DOMAIN: Eip712Domain = eip712_domain! {
    name: "HyperliquidSignTransaction",
    version: "1",
    chain_id: 42161,
    verifying_contract: Address::ZERO,
};

/// Domain for user-signed actions on testnet.
pub(crate) const USER_TESTNET_EIP712_DOMAIN: Eip712Domain = eip712_domain! {
    name: "HyperliquidSignTransaction",
    version: "1",
    chain_id: 421614,
    verifying_contract: Address::ZERO,
};

/// Domain for the multi-sig envelope. The chain id stays 421614 on both
/// networks; `hyperliquidChain` inside the message carries the distinction.
pub(crate) const MULTISIG_EIP712_DOMAIN: Eip712Domain = eip712_domain! {
    name: "HyperliquidSignTransaction",
    version: "1",
    chain_id: 421614,
    verifying_contract: Address::ZERO,
};

sol! {
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

type Fields = &'static [(&'static str, &'static str)];

const USD_SEND_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("destination", "string"),
    ("amount", "string"),
    ("time", "uint64"),
];

const WITHDRAW_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("destination", "string"),
    ("amount", "string"),
    ("time", "uint64"),
];

const SPOT_SEND_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("destination", "string"),
    ("token", "string"),
    ("amount", "string"),
    ("time", "uint64"),
];

const USD_CLASS_TRANSFER_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("amount", "string"),
    ("toPerp", "bool"),
    ("nonce", "uint64"),
];

const SEND_ASSET_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("destination", "string"),
    ("sourceDex", "string"),
    ("destinationDex", "string"),
    ("token", "string"),
    ("amount", "string"),
    ("fromSubAccount", "string"),
    ("nonce", "uint64"),
];

const APPROVE_AGENT_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("agentAddress", "address"),
    ("agentName", "string"),
    ("nonce", "uint64"),
];

const APPROVE_BUILDER_FEE_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("maxFeeRate", "string"),
    ("builder", "address"),
    ("nonce", "uint64"),
];

const SET_REFERRER_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("code", "string"),
    ("nonce", "uint64"),
];

const TOKEN_DELEGATE_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("validator", "address"),
    ("wei", "uint64"),
    ("isUndelegate", "bool"),
    ("nonce", "uint64"),
];

const CONVERT_TO_MULTI_SIG_USER_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("signers", "string"),
    ("nonce", "uint64"),
];

const USER_DEX_ABSTRACTION_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("user", "address"),
    ("enabled", "bool"),
    ("nonce", "uint64"),
];

const SEND_MULTI_SIG_FIELDS: Fields = &[
    ("hyperliquidChain", "string"),
    ("multiSigActionHash", "bytes32"),
    ("nonce", "uint64"),
];

/// Payload type table for a user-signed action, or `None` for L1 actions.
fn user_payload_fields(action: &Action) -> Option<(&'static str, Fields)> {
    match action {
        Action::UsdSend(_) => Some(("UsdSend", USD_SEND_FIELDS)),
        Action::Withdraw3(_) => Some(("Withdraw", WITHDRAW_FIELDS)),
        Action::SpotSend(_) => Some(("SpotSend", SPOT_SEND_FIELDS)),
        Action::UsdClassTransfer(_) => Some(("UsdClassTransfer", USD_CLASS_TRANSFER_FIELDS)),
        Action::SendAsset(_) => Some(("SendAsset", SEND_ASSET_FIELDS)),
        Action::ApproveAgent(_) => Some(("ApproveAgent", APPROVE_AGENT_FIELDS)),
        Action::ApproveBuilderFee(_) => Some(("ApproveBuilderFee", APPROVE_BUILDER_FEE_FIELDS)),
        Action::SetReferrer(_) => Some(("SetReferrer", SET_REFERRER_FIELDS)),
        Action::TokenDelegate(_) => Some(("TokenDelegate", TOKEN_DELEGATE_FIELDS)),
        Action::ConvertToMultiSigUser(_) => {
            Some(("ConvertToMultiSigUser", CONVERT_TO_MULTI_SIG_USER_FIELDS))
        }
        Action::UserDexAbstraction(_) => Some(("UserDexAbstraction", USER_DEX_ABSTRACTION_FIELDS)),
        _ => None,
    }
}

/// Signs a connection-id digest through the EIP-712 `Agent` wrapper.
pub(crate) fn sign_l1_digest<S: SignerSync>(
    signer: &S,
    chain: Chain,
    connection_id: B256,
) -> Result<Signature> {
    let agent = Agent {
        source: if chain.is_mainnet() { "a" } else { "b" }.to_string(),
        connectionId: connection_id,
    };
    let sig = signer.sign_typed_data_sync(&agent, &L1_EIP712_DOMAIN)?;
    Ok(sig.into())
}

/// Signs an L1 action: canonical JSON bytes, framed digest, agent wrapper.
pub(crate) fn sign_l1_action<S: SignerSync>(
    signer: &S,
    action: &Action,
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
    chain: Chain,
) -> Result<Signature> {
    let bytes = serde_json::to_vec(action).map_err(|err| Error::Encode(err.to_string()))?;
    let digest = utils::action_digest(&bytes, nonce, vault_address, expires_after)?;
    sign_l1_digest(signer, chain, digest)
}

/// Signs a user-signed action from the fixed catalog.
///
/// The serialized action itself is the typed-data message; the hasher only
/// resolves the declared payload fields, so the `type` tag and
/// `signatureChainId` ride along harmlessly.
pub(crate) fn sign_user_action<S: SignerSync>(
    signer: &S,
    action: &Action,
    chain: Chain,
) -> Result<Signature> {
    let (suffix, fields) = user_payload_fields(action).ok_or_else(|| {
        Error::Request("action is not in the user-signed catalog".to_string())
    })?;
    let message = serde_json::to_value(action).map_err(|err| Error::Encode(err.to_string()))?;
    let typed = utils::user_typed_data(suffix, fields, chain, message)?;
    let sig = signer.sign_dynamic_typed_data_sync(&typed)?;
    Ok(sig.into())
}

/// Signs the outer envelope of a `multiSig` action.
///
/// The whole multi-sig action (inner action plus collected signatures) is
/// hashed with the L1 framing, and the lead signer signs
/// `{hyperliquidChain, multiSigActionHash, nonce}` under the multi-sig
/// domain.
pub(crate) fn sign_multisig_envelope<S: SignerSync>(
    signer: &S,
    action: &Action,
    nonce: u64,
    vault_address: Option<Address>,
    chain: Chain,
) -> Result<Signature> {
    let bytes = serde_json::to_vec(action).map_err(|err| Error::Encode(err.to_string()))?;
    let hash = utils::action_digest(&bytes, nonce, vault_address, None)?;

    let message = serde_json::json!({
        "hyperliquidChain": chain.to_string(),
        "multiSigActionHash": format!("{hash}"),
        "nonce": nonce,
    });
    let mut typed = utils::user_typed_data("SendMultiSig", SEND_MULTI_SIG_FIELDS, chain, message)?;
    typed.domain = MULTISIG_EIP712_DOMAIN;

    let sig = signer.sign_dynamic_typed_data_sync(&typed)?;
    Ok(sig.into())
}
