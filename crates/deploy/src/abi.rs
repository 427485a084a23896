//! Minimal ABI encoding for constructor arguments and unit calls.
//!
//! Every value the suite passes on-chain is a static 32-byte word (`address` or
//! `uint256`), so encoding is a plain concatenation of words behind an optional
//! 4-byte selector.

use std::fmt;

use alloy_core::primitives::{Address, B256, Bytes, U256, keccak256};
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A constructor or call argument with every reference already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ResolvedArg {
    Address(Address),
    Uint(U256),
}

impl ResolvedArg {
    /// Encode the argument as a single ABI word.
    pub fn to_word(&self) -> B256 {
        match self {
            Self::Address(address) => address.into_word(),
            Self::Uint(value) => B256::from(value.to_be_bytes::<32>()),
        }
    }
}

impl fmt::Display for ResolvedArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::Uint(value) => write!(f, "{value}"),
        }
    }
}

impl From<Address> for ResolvedArg {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<U256> for ResolvedArg {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

/// ABI-encode a list of static arguments.
pub fn encode_args(args: &[ResolvedArg]) -> Vec<u8> {
    args.iter().flat_map(|arg| arg.to_word().0).collect()
}

/// Compute the 4-byte function selector for a canonical signature,
/// e.g. `mintTo(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Build calldata for `signature` with the given arguments.
pub fn encode_call(signature: &str, args: &[ResolvedArg]) -> Bytes {
    let mut data = selector(signature).to_vec();
    data.extend(encode_args(args));
    Bytes::from(data)
}

/// Concatenate creation bytecode with its encoded constructor arguments.
pub fn encode_init_code(bytecode: &Bytes, args: &[ResolvedArg]) -> Bytes {
    let mut code = bytecode.to_vec();
    code.extend(encode_args(args));
    Bytes::from(code)
}

/// Decode a single `uint256` return value.
pub fn decode_uint(data: &[u8]) -> anyhow::Result<U256> {
    let word = data
        .get(..32)
        .context("Return data is shorter than one ABI word")?;
    Ok(U256::from_be_slice(word))
}

/// Decode the `index`-th static argument word of a calldata payload as a `uint256`.
pub fn calldata_uint(calldata: &[u8], index: usize) -> Option<U256> {
    let start = 4 + index * 32;
    calldata.get(start..start + 32).map(U256::from_be_slice)
}

/// Decode the `index`-th static argument word of a calldata payload as an `address`.
pub fn calldata_address(calldata: &[u8], index: usize) -> Option<Address> {
    let start = 4 + index * 32;
    calldata
        .get(start + 12..start + 32)
        .map(Address::from_slice)
}
