//! Serialization helpers shared by the wire types and the signer.
//!
//! Addresses and cloids travel as lowercase `0x` hex. The signing digest
//! frames the action's canonical JSON bytes in a small msgpack stream, so
//! the helpers here sit below both the serde layer and the signer.

use alloy::{
    dyn_abi::{Eip712Types, Resolver, TypedData},
    primitives::{keccak256, Address, B256},
};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

use crate::{
    error::{Error, Result},
    Chain, Cloid,
};

/// Serializes an address as lowercase `0x` hex.
///
/// Alloy's default serde form is EIP-55 checksummed; the exchange expects
/// lowercase everywhere an address appears in an action or payload.
pub(crate) fn serialize_address_lower<S>(value: &Address, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:#x}"))
}

/// Serializes an optional address as lowercase hex. Pair with
/// `skip_serializing_if = "Option::is_none"` so absent means absent.
pub(crate) fn serialize_opt_address_lower<S>(
    value: &Option<Address>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(addr) => serialize_address_lower(addr, serializer),
        None => serializer.serialize_none(),
    }
}

/// Serializes a cloid as its canonical `0x` + 32 lowercase hex chars.
pub(crate) fn serialize_cloid<S>(value: &Cloid, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:#x}"))
}

/// Serializes an optional cloid as canonical hex.
pub(crate) fn serialize_opt_cloid<S>(
    value: &Option<Cloid>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(cloid) => serialize_cloid(cloid, serializer),
        None => serializer.serialize_none(),
    }
}

/// Deserializes an optional cloid from its hex form.
pub(crate) fn deserialize_opt_cloid<'de, D>(deserializer: D) -> std::result::Result<Option<Cloid>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    value
        .map(|s| s.parse::<Cloid>().map_err(serde::de::Error::custom))
        .transpose()
}

/// Builds the byte stream the L1 signing digest is computed over.
///
/// Layout, in msgpack encoding: the action's JSON bytes as a length-prefixed
/// binary blob, the nonce as an integer, a flag plus the 20 raw vault bytes
/// when a vault is present, and a flag plus the expiry timestamp when one is
/// set. The action bytes go in opaque, so the digest depends only on the
/// exact JSON emitted by the caller.
pub(crate) fn pack_action_frame(
    action: &[u8],
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(action.len() + 48);
    rmp::encode::write_bin(&mut buf, action).map_err(encode_err)?;
    rmp::encode::write_uint(&mut buf, nonce).map_err(encode_err)?;

    match vault_address {
        Some(addr) => {
            rmp::encode::write_bool(&mut buf, true).map_err(encode_err)?;
            rmp::encode::write_bin(&mut buf, addr.as_slice()).map_err(encode_err)?;
        }
        None => rmp::encode::write_bool(&mut buf, false).map_err(encode_err)?,
    }

    match expires_after {
        Some(ts) => {
            rmp::encode::write_bool(&mut buf, true).map_err(encode_err)?;
            rmp::encode::write_uint(&mut buf, ts).map_err(encode_err)?;
        }
        None => rmp::encode::write_bool(&mut buf, false).map_err(encode_err)?,
    }

    Ok(buf)
}

/// Keccak-256 digest of the framed action, the `connectionId` signed by the
/// L1 path.
pub(crate) fn action_digest(
    action: &[u8],
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
) -> Result<B256> {
    let frame = pack_action_frame(action, nonce, vault_address, expires_after)?;
    Ok(keccak256(frame))
}

fn encode_err(err: impl std::fmt::Display) -> Error {
    Error::Encode(err.to_string())
}

/// Assembles EIP-712 typed data for a user-signed action.
///
/// The primary type is `HyperliquidTransaction:<suffix>` and `fields` is the
/// action's payload type table, always led by `hyperliquidChain`. Extra keys
/// in `message` (like `signatureChainId`) are ignored by the hasher, which
/// only resolves the declared fields.
pub(crate) fn user_typed_data(
    primary_suffix: &str,
    fields: &[(&str, &str)],
    chain: Chain,
    message: Value,
) -> Result<TypedData> {
    let primary = format!("HyperliquidTransaction:{primary_suffix}");

    let props: Vec<Value> = fields
        .iter()
        .map(|(name, ty)| serde_json::json!({ "name": name, "type": ty }))
        .collect();
    let mut types = serde_json::Map::new();
    types.insert(primary.clone(), Value::Array(props));

    let types: Eip712Types =
        serde_json::from_value(Value::Object(types)).map_err(|err| Error::Encode(err.to_string()))?;

    Ok(TypedData {
        domain: chain.user_domain(),
        resolver: Resolver::from(types),
        primary_type: primary,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout_for_bare_action() {
        // {"type":"noop"} with nonce 1, no vault, no expiry.
        let action = br#"{"type":"noop"}"#;
        let frame = pack_action_frame(action, 1, None, None).unwrap();

        let mut expected = vec![0xc4, action.len() as u8];
        expected.extend_from_slice(action);
        expected.push(0x01); // nonce 1 as positive fixint
        expected.push(0xc2); // no vault
        expected.push(0xc2); // no expiry
        assert_eq!(frame, expected);
    }

    #[test]
    fn frame_includes_vault_and_expiry() {
        let action = br#"{"type":"noop"}"#;
        let vault: Address = "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap();
        let frame = pack_action_frame(action, 1, Some(vault), Some(120_000)).unwrap();

        let mut expected = vec![0xc4, action.len() as u8];
        expected.extend_from_slice(action);
        expected.push(0x01);
        expected.push(0xc3); // vault flag
        expected.extend_from_slice(&[0xc4, 20]); // 20-byte blob
        expected.extend_from_slice(vault.as_slice());
        expected.push(0xc3); // expiry flag
        expected.extend_from_slice(&[0xce, 0x00, 0x01, 0xd4, 0xc0]); // 120_000 as uint32
        assert_eq!(frame, expected);
    }

    #[test]
    fn digest_depends_only_on_action_bytes() {
        let a = action_digest(br#"{"type":"noop"}"#, 1, None, None).unwrap();
        let b = action_digest(br#"{"type":"noop"}"#, 1, None, None).unwrap();
        assert_eq!(a, b);

        let c = action_digest(br#"{"type":"noop"}"#, 2, None, None).unwrap();
        assert_ne!(a, c);

        let vault: Address = "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap();
        let d = action_digest(br#"{"type":"noop"}"#, 1, Some(vault), None).unwrap();
        assert_ne!(a, d);
    }

    #[test]
    fn typed_data_uses_prefixed_primary_type() {
        let data = user_typed_data(
            "UsdSend",
            &[
                ("hyperliquidChain", "string"),
                ("destination", "string"),
                ("amount", "string"),
                ("time", "uint64"),
            ],
            Chain::Mainnet,
            serde_json::json!({
                "hyperliquidChain": "Mainnet",
                "destination": "0x0d1d9635d0640821d15e323ac8adadfa9c111414",
                "amount": "1",
                "time": 1690393044548u64,
            }),
        )
        .unwrap();

        assert_eq!(data.primary_type, "HyperliquidTransaction:UsdSend");
        assert!(data.eip712_signing_hash().is_ok());
    }
}
