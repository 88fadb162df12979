// src/sources/treasury.rs
//! Treasury wallet balances read straight from the chain.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{DigestSource, SourceKind};
use crate::chain::{
    balance_of_calldata, decode_symbol, decode_uint, ChainReader, TokenAmount, NATIVE_DECIMALS,
    SELECTOR_DECIMALS, SELECTOR_SYMBOL,
};
use crate::error::DigestResult;
use crate::identity::{Identity, NameCache};
use crate::markdown::{code, escape, link};

pub const DEFAULT_RPC_URL: &str = "https://rpc.ankr.com/eth";
pub const DEFAULT_WALLET: &str = "0x60e7343205C9C88788a22C40030d35f9370d302D";
pub const DEFAULT_NATIVE_SYMBOL: &str = "ETH";
pub const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

/// Ticker -> amount, in insertion order: configured tokens first, native asset last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBalance {
    entries: Vec<(String, TokenAmount)>,
}

impl TokenBalance {
    pub fn insert(&mut self, ticker: impl Into<String>, amount: TokenAmount) {
        let ticker = ticker.into();
        match self.entries.iter_mut().find(|(t, _)| *t == ticker) {
            Some(slot) => slot.1 = amount,
            None => self.entries.push((ticker, amount)),
        }
    }

    pub fn get(&self, ticker: &str) -> Option<&TokenAmount> {
        self.entries.iter().find(|(t, _)| t == ticker).map(|(_, a)| a)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenAmount)> {
        self.entries.iter().map(|(t, a)| (t.as_str(), a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ERC-20 contract with its on-chain metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub address: String,
    pub ticker: String,
    pub decimals: u32,
}

pub struct TreasurySource {
    reader: Arc<dyn ChainReader>,
    wallet: String,
    tokens: Vec<String>,
    native_symbol: String,
    community: String,
    names: Option<Arc<NameCache>>,
}

impl TreasurySource {
    pub fn new(reader: Arc<dyn ChainReader>, wallet: impl Into<String>, tokens: Vec<String>) -> Self {
        Self {
            reader,
            wallet: wallet.into(),
            tokens,
            native_symbol: DEFAULT_NATIVE_SYMBOL.to_string(),
            community: "CityDAO".to_string(),
            names: None,
        }
    }

    pub fn with_native_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.native_symbol = symbol.into();
        self
    }

    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = community.into();
        self
    }

    pub fn with_names(mut self, names: Arc<NameCache>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn wallet_url(&self) -> String {
        format!(
            "https://gnosis-safe.io/app/eth:{}/balances",
            self.wallet
        )
    }

    pub async fn token_info(&self, address: &str) -> DigestResult<Token> {
        let symbol = self
            .reader
            .call(address, &format!("0x{SELECTOR_SYMBOL}"))
            .await?;
        let decimals = self
            .reader
            .call(address, &format!("0x{SELECTOR_DECIMALS}"))
            .await?;
        Ok(Token {
            address: address.to_string(),
            ticker: decode_symbol(&symbol)?,
            decimals: u32::try_from(decode_uint(&decimals)?).unwrap_or(u32::MAX),
        })
    }

    /// Balances of every configured token plus the native asset.
    pub async fn fetch_balances(&self) -> DigestResult<TokenBalance> {
        let mut balance = TokenBalance::default();
        let calldata = balance_of_calldata(&self.wallet)?;
        for address in &self.tokens {
            let token = self.token_info(address).await?;
            let raw = decode_uint(&self.reader.call(address, &calldata).await?)?;
            balance.insert(token.ticker, TokenAmount::new(raw, token.decimals)?);
        }
        let native = self.reader.native_balance(&self.wallet).await?;
        balance.insert(
            self.native_symbol.clone(),
            TokenAmount::new(native, NATIVE_DECIMALS)?,
        );
        debug!(target: "digest", tokens = balance.len(), "treasury balances fetched");
        Ok(balance)
    }

    pub fn render(&self, wallet: &Identity, balance: &TokenBalance) -> DigestResult<String> {
        let mut out = format!(
            "🏦 {} Balance\n",
            link(&format!("{} Treasury", self.community), &self.wallet_url())
        );
        out.push_str(&format!("   👛 Wallet: {}\n\n", code(&wallet.short())));
        let lines = balance
            .iter()
            .map(|(ticker, amount)| {
                Ok(format!("   \\- {} {}", escape(&amount.format(4)?), code(ticker)))
            })
            .collect::<DigestResult<Vec<String>>>()?;
        out.push_str(&lines.join("\n"));
        Ok(out)
    }
}

#[async_trait]
impl DigestSource for TreasurySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Treasury
    }

    async fn summarize(&self, _now: DateTime<Utc>) -> DigestResult<String> {
        let balance = self.fetch_balances().await?;
        let wallet = match &self.names {
            Some(names) => names.resolve(&self.wallet).await,
            None => Identity::new(self.wallet.clone()),
        };
        self.render(&wallet, &balance)
    }
}
