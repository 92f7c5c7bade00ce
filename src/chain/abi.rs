// src/chain/abi.rs
// Minimal Solidity ABI encoding for the handful of calls the dashboard makes

use alloy_primitives::{keccak256, Address, U256};
use serde_json::Value;

use crate::error::{Result, StakingError};
use crate::types::RawFullState;

pub const GET_USER_FULL_STATE: &str = "getUserFullState(address)";
pub const IS_BLACKLISTED: &str = "isBlacklisted(address,uint256)";
pub const IS_APPROVED_FOR_ALL: &str = "isApprovedForAll(address,address)";
pub const SET_APPROVAL_FOR_ALL: &str = "setApprovalForAll(address,bool)";
pub const STAKE: &str = "stake(address[],uint256[],uint8)";
pub const UNSTAKE: &str = "unstake(address[],uint256[])";
pub const CLAIM_REWARD: &str = "claimReward(address[],uint256[])";

/// Words per `Stake` tuple in the `getUserFullState` return value
pub const STAKE_WORDS: usize = 6;

const WORD: usize = 32;

/// Call argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    Bool(bool),
    AddressArray(Vec<Address>),
    UintArray(Vec<U256>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::AddressArray(_) | Token::UintArray(_))
    }
}

/// First four bytes of keccak-256 of the canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_slice());
    word
}

fn uint_word(value: U256) -> [u8; WORD] {
    value.to_be_bytes::<WORD>()
}

fn usize_word(value: usize) -> [u8; WORD] {
    uint_word(U256::from(value as u64))
}

fn encode_array(words: Vec<[u8; WORD]>) -> Vec<u8> {
    let mut out = Vec::with_capacity((words.len() + 1) * WORD);
    out.extend_from_slice(&usize_word(words.len()));
    for word in words {
        out.extend_from_slice(&word);
    }
    out
}

/// Head/tail encode `args` behind the selector of `signature`
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(args.len() * WORD);
    let mut tail = Vec::new();
    let head_len = args.len() * WORD;

    for arg in args {
        if arg.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
        }
        match arg {
            Token::Address(a) => head.extend_from_slice(&address_word(a)),
            Token::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Token::Bool(b) => head.extend_from_slice(&uint_word(U256::from(*b as u64))),
            Token::AddressArray(items) => {
                tail.extend(encode_array(items.iter().map(address_word).collect()))
            }
            Token::UintArray(items) => {
                tail.extend(encode_array(items.iter().map(|v| uint_word(*v)).collect()))
            }
        }
    }

    let mut out = Vec::with_capacity(4 + head.len() + tail.len());
    out.extend_from_slice(&selector(signature));
    out.extend(head);
    out.extend(tail);
    out
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8]> {
    let start = index
        .checked_mul(WORD)
        .ok_or_else(|| StakingError::Decode("ABI offset overflow".to_string()))?;
    data.get(start..start + WORD).ok_or_else(|| {
        StakingError::Decode(format!(
            "ABI data too short: need word {} of {} bytes",
            index,
            data.len()
        ))
    })
}

fn word_as_usize(word: &[u8]) -> Result<usize> {
    let value = U256::from_be_slice(word);
    if value > U256::from(u32::MAX as u64) {
        return Err(StakingError::Decode(format!("ABI length/offset too large: {}", value)));
    }
    Ok(value.as_limbs()[0] as usize)
}

/// Decode a single `bool` return value
pub fn decode_bool(data: &[u8]) -> Result<bool> {
    let word = word_at(data, 0)?;
    match U256::from_be_slice(word) {
        v if v.is_zero() => Ok(false),
        v if v == U256::from(1u64) => Ok(true),
        v => Err(StakingError::Decode(format!("Invalid bool word: {}", v))),
    }
}

/// Decode `(Stake[], uint256)`. Each stake is returned tuple-shaped as its raw
/// words (`0x` hex strings) so it goes through the same normalisation as every
/// other source.
pub fn decode_full_state(data: &[u8]) -> Result<RawFullState> {
    let offset = word_as_usize(word_at(data, 0)?)?;
    let total_pending = U256::from_be_slice(word_at(data, 1)?);

    if offset % WORD != 0 {
        return Err(StakingError::Decode(format!("Misaligned array offset: {}", offset)));
    }
    let base = offset / WORD;
    let len = word_as_usize(word_at(data, base)?)?;

    let mut stakes = Vec::with_capacity(len.min(1024));
    for i in 0..len {
        let first = base + 1 + i * STAKE_WORDS;
        let mut tuple = Vec::with_capacity(STAKE_WORDS);
        for w in 0..STAKE_WORDS {
            let word = word_at(data, first + w)?;
            tuple.push(Value::String(format!("0x{}", hex::encode(word))));
        }
        stakes.push(Value::Array(tuple));
    }

    Ok(RawFullState {
        stakes,
        total_pending,
    })
}

/// Parse a `0x` hex string returned by the node
pub fn decode_hex_result(result: &str) -> Result<Vec<u8>> {
    let digits = result.strip_prefix("0x").unwrap_or(result);
    hex::decode(digits).map_err(|e| StakingError::Decode(format!("Invalid hex result: {}", e)))
}

#[cfg(test)]
pub(crate) fn encode_full_state(stakes: &[[U256; STAKE_WORDS]], total_pending: U256) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&usize_word(2 * WORD));
    out.extend_from_slice(&uint_word(total_pending));
    out.extend_from_slice(&usize_word(stakes.len()));
    for stake in stakes {
        for word in stake {
            out.extend_from_slice(&uint_word(*word));
        }
    }
    out
}
