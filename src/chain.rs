// src/chain.rs
//! Read-only chain access: `eth_call` against ERC-20 contracts and native balances.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{DigestError, DigestResult};
use crate::http::fetch_json;
use crate::render::group_thousands;

/// `balanceOf(address)`
pub const SELECTOR_BALANCE_OF: &str = "70a08231";
/// `decimals()`
pub const SELECTOR_DECIMALS: &str = "313ce567";
/// `symbol()`
pub const SELECTOR_SYMBOL: &str = "95d89b41";

pub const NATIVE_DECIMALS: u32 = 18;

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute a read-only call and return the raw return data.
    async fn call(&self, to: &str, data: &str) -> DigestResult<Vec<u8>>;
    /// Native-asset balance of `address`, in the smallest unit.
    async fn native_balance(&self, address: &str) -> DigestResult<u128>;
}

/// JSON-RPC over HTTP.
pub struct JsonRpcReader {
    url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl JsonRpcReader {
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> DigestResult<String> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let req = self.client.post(&self.url).json(&body);
        let resp: RpcResponse = fetch_json(req, method).await?;
        if let Some(err) = resp.error {
            return Err(DigestError::fetch(format!(
                "{method}: rpc error {}: {}",
                err.code, err.message
            )));
        }
        resp.result
            .ok_or_else(|| DigestError::fetch(format!("{method}: empty result")))
    }
}

#[async_trait]
impl ChainReader for JsonRpcReader {
    async fn call(&self, to: &str, data: &str) -> DigestResult<Vec<u8>> {
        let result = self
            .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        decode_hex(&result)
    }

    async fn native_balance(&self, address: &str) -> DigestResult<u128> {
        let result = self
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity(&result)
    }
}

pub fn decode_hex(s: &str) -> DigestResult<Vec<u8>> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(raw).map_err(|e| DigestError::fetch(format!("bad hex in rpc result: {e}")))
}

/// Parse a JSON-RPC quantity (`0x1a`, possibly with leading zeros) into `u128`.
pub fn parse_quantity(s: &str) -> DigestResult<u128> {
    let raw = s.strip_prefix("0x").unwrap_or(s).trim_start_matches('0');
    if raw.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(raw, 16)
        .map_err(|e| DigestError::integrity(format!("quantity {s} does not fit u128: {e}")))
}

/// Call data for `balanceOf(owner)`.
pub fn balance_of_calldata(owner: &str) -> DigestResult<String> {
    Ok(format!("0x{SELECTOR_BALANCE_OF}{}", address_word(owner)?))
}

/// Interpret return data as a single `uint256` that must fit `u128`.
pub fn decode_uint(data: &[u8]) -> DigestResult<u128> {
    if data.len() < 32 {
        return Err(DigestError::integrity(format!(
            "uint256 return data is {} bytes",
            data.len()
        )));
    }
    let word = &data[..32];
    if word[..16].iter().any(|b| *b != 0) {
        return Err(DigestError::integrity("uint256 value exceeds u128"));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(buf))
}

/// Decode a `symbol()` result: ABI `string`, or the legacy `bytes32` form.
pub fn decode_symbol(data: &[u8]) -> DigestResult<String> {
    if data.len() == 32 {
        let end = data.iter().position(|b| *b == 0).unwrap_or(32);
        return String::from_utf8(data[..end].to_vec())
            .map_err(|_| DigestError::integrity("bytes32 symbol is not utf-8"));
    }
    let offset = word_to_index(decode_uint(data)?)?;
    let len_start = offset
        .checked_add(32)
        .ok_or_else(|| DigestError::integrity("string offset out of range"))?;
    let len_word = data
        .get(offset..len_start)
        .ok_or_else(|| DigestError::integrity("string offset out of range"))?;
    let len = word_to_index(decode_uint(len_word)?)?;
    let end = len_start
        .checked_add(len)
        .ok_or_else(|| DigestError::integrity("string length out of range"))?;
    let bytes = data
        .get(len_start..end)
        .ok_or_else(|| DigestError::integrity("string length out of range"))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DigestError::integrity("symbol is not utf-8"))
}

fn word_to_index(n: u128) -> DigestResult<usize> {
    usize::try_from(n).map_err(|_| DigestError::integrity(format!("abi offset {n} out of range")))
}

/// A 20-byte address left-padded to one ABI word, as lowercase hex.
pub fn address_word(address: &str) -> DigestResult<String> {
    let addr = address.strip_prefix("0x").unwrap_or(address);
    if addr.len() != 40 || !addr.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DigestError::config(format!("invalid address {address}")));
    }
    Ok(format!("{:0>64}", addr.to_ascii_lowercase()))
}

/// One `uint256` ABI word as hex.
pub fn uint_word(n: u128) -> String {
    format!("{n:064x}")
}

/// An integer token amount with its declared precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    pub raw: u128,
    pub decimals: u32,
}

impl TokenAmount {
    pub fn new(raw: u128, decimals: u32) -> DigestResult<Self> {
        if 10u128.checked_pow(decimals).is_none() {
            return Err(DigestError::integrity(format!(
                "token declares {decimals} decimals"
            )));
        }
        Ok(Self { raw, decimals })
    }

    /// `raw / 10^decimals` as a float, for callers that want a plain number.
    pub fn as_f64(&self) -> f64 {
        self.raw as f64 / 10f64.powi(self.decimals as i32)
    }

    /// Thousands-separated with `places` decimals, rounded half up.
    ///
    /// Fails when the amount cannot be scaled to `places` within `u128`.
    pub fn format(&self, places: u32) -> DigestResult<String> {
        let overflow = || {
            DigestError::integrity(format!(
                "amount {} with {} decimals cannot be shown with {places} places",
                self.raw, self.decimals
            ))
        };
        let scaled = if self.decimals >= places {
            let div = 10u128.pow(self.decimals - places);
            self.raw.checked_add(div / 2).ok_or_else(overflow)? / div
        } else {
            10u128
                .checked_pow(places - self.decimals)
                .and_then(|m| self.raw.checked_mul(m))
                .ok_or_else(overflow)?
        };
        let unit = 10u128.checked_pow(places).ok_or_else(overflow)?;
        let int = group_thousands(scaled / unit);
        if places == 0 {
            return Ok(int);
        }
        Ok(format!(
            "{int}.{:0width$}",
            scaled % unit,
            width = places as usize
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(n: u128) -> Vec<u8> {
        let mut w = vec![0u8; 16];
        w.extend_from_slice(&n.to_be_bytes());
        w
    }

    #[test]
    fn amount_formatting() {
        let fmt = |raw, decimals| TokenAmount::new(raw, decimals).unwrap().format(4).unwrap();
        assert_eq!(fmt(1_500_000, 6), "1.5000");
        assert_eq!(fmt(1_234_567_891_234_567_890_123, 18), "1,234.5679");
        assert_eq!(fmt(5, 0), "5.0000");
        assert_eq!(fmt(0, 18), "0.0000");
        assert!(TokenAmount::new(1, 40).is_err());
    }

    #[test]
    fn amount_too_large_to_scale_is_an_integrity_error() {
        let huge = TokenAmount::new(u128::MAX / 10, 0).unwrap();
        assert!(matches!(huge.format(4), Err(DigestError::DataIntegrity(_))));
        // Rounding up past u128::MAX is also refused.
        let edge = TokenAmount::new(u128::MAX, 18).unwrap();
        assert!(matches!(edge.format(4), Err(DigestError::DataIntegrity(_))));
        assert_eq!(TokenAmount::new(u128::MAX, 0).unwrap().format(0).unwrap().len(), 51);
    }

    #[test]
    fn balance_of_pads_owner() {
        let data = balance_of_calldata("0x60e7343205C9C88788a22C40030d35f9370d302D").unwrap();
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0x70a08231000000000000000000000000"));
        assert!(data.ends_with("60e7343205c9c88788a22c40030d35f9370d302d"));
        assert!(balance_of_calldata("0x1234").is_err());
    }

    #[test]
    fn quantities_and_words() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x16345785d8a0000").unwrap(), 100_000_000_000_000_000);
        assert_eq!(decode_uint(&word(42)).unwrap(), 42);
        let mut big = word(1);
        big[0] = 1;
        assert!(decode_uint(&big).is_err());
    }

    #[test]
    fn symbols_decode_from_string_and_bytes32() {
        let mut data = word(32);
        data.extend(word(4));
        let mut s = b"WETH".to_vec();
        s.resize(32, 0);
        data.extend(s);
        assert_eq!(decode_symbol(&data).unwrap(), "WETH");

        let mut b32 = b"MKR".to_vec();
        b32.resize(32, 0);
        assert_eq!(decode_symbol(&b32).unwrap(), "MKR");
    }

    #[test]
    fn string_offsets_beyond_the_data_are_rejected() {
        // Offset word near u64::MAX: must not overflow when the length slot is located.
        let mut data = word(u64::MAX as u128);
        data.extend(word(4));
        data.extend(b"WETH".iter().copied().chain(std::iter::repeat(0).take(28)));
        assert!(matches!(decode_symbol(&data), Err(DigestError::DataIntegrity(_))));

        // Offset above usize::MAX on 64-bit targets is rejected, not truncated to 32.
        let mut data = word((1u128 << 64) + 32);
        data.extend(word(4));
        data.extend(b"WETH".iter().copied().chain(std::iter::repeat(0).take(28)));
        assert!(matches!(decode_symbol(&data), Err(DigestError::DataIntegrity(_))));

        // Length word that runs past the end.
        let mut data = word(32);
        data.extend(word(u64::MAX as u128));
        data.extend(vec![0u8; 32]);
        assert!(matches!(decode_symbol(&data), Err(DigestError::DataIntegrity(_))));
    }

    #[test]
    fn abi_words() {
        assert_eq!(uint_word(42).len(), 64);
        assert!(uint_word(42).ends_with("2a"));
        assert!(address_word("0xzz").is_err());
    }
}
