// src/citizen.rs
//! Citizen NFT reads: ERC-1155 balances per citizenship tier, tier supply, and
//! holders from the marketplace API.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::{address_word, decode_uint, uint_word, ChainReader};
use crate::error::{DigestError, DigestResult};
use crate::http::fetch_json;

pub const CITIZEN_NFT: &str = "0x7EeF591A6CC0403b9652E98E88476fe1bF31dDeb";
pub const DEFAULT_MARKETPLACE_BASE: &str = "https://api.opensea.io/api/v1";

/// `balanceOf(address,uint256)`
pub const SELECTOR_BALANCE_OF_ID: &str = "00fdd58e";
/// `inquireHousingNumbers()`: minted citizenships.
pub const SELECTOR_HOUSING_NUMBERS: &str = "c058f66c";
/// `howManyReservedCitizenships()`: founding citizenships.
pub const SELECTOR_RESERVED_CITIZENSHIPS: &str = "0449e3df";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitizenTier {
    Citizen,
    FoundingCitizen,
    FirstCitizen,
}

impl CitizenTier {
    pub const ALL: [CitizenTier; 3] = [
        CitizenTier::Citizen,
        CitizenTier::FoundingCitizen,
        CitizenTier::FirstCitizen,
    ];

    /// ERC-1155 token id of the tier.
    pub fn token_id(self) -> u128 {
        match self {
            CitizenTier::Citizen => 42,
            CitizenTier::FoundingCitizen => 69,
            CitizenTier::FirstCitizen => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CitizenTier::Citizen => "citizen",
            CitizenTier::FoundingCitizen => "founding_citizen",
            CitizenTier::FirstCitizen => "first_citizen",
        }
    }
}

impl fmt::Display for CitizenTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CitizenTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "citizen" | "42" => Ok(CitizenTier::Citizen),
            "founding_citizen" | "founding" | "69" => Ok(CitizenTier::FoundingCitizen),
            "first_citizen" | "first" | "7" => Ok(CitizenTier::FirstCitizen),
            other => Err(format!("unknown citizenship tier {other:?}")),
        }
    }
}

/// Supply of one tier, as served by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierSupply {
    pub tier: CitizenTier,
    pub token_id: u128,
    pub supply: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierBalance {
    pub tier: CitizenTier,
    pub balance: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holder {
    pub address: String,
    pub quantity: u128,
}

#[derive(Deserialize)]
struct AssetPage {
    #[serde(default)]
    top_ownerships: Vec<RawOwnership>,
}

#[derive(Deserialize)]
struct RawOwnership {
    owner: RawOwner,
    quantity: String,
}

#[derive(Deserialize)]
struct RawOwner {
    address: String,
}

/// Marketplace client for the holders lookup.
pub struct Marketplace {
    base: String,
    api_key: String,
    client: Client,
}

impl Marketplace {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>, client: Client) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }
}

pub struct CitizenNft {
    reader: Arc<dyn ChainReader>,
    contract: String,
    marketplace: Option<Marketplace>,
}

impl CitizenNft {
    pub fn new(reader: Arc<dyn ChainReader>, contract: impl Into<String>) -> Self {
        Self {
            reader,
            contract: contract.into(),
            marketplace: None,
        }
    }

    pub fn with_marketplace(mut self, marketplace: Marketplace) -> Self {
        self.marketplace = Some(marketplace);
        self
    }

    /// How many tokens of `tier` `owner` holds.
    pub async fn balance(&self, owner: &str, tier: CitizenTier) -> DigestResult<u128> {
        let data = format!(
            "0x{SELECTOR_BALANCE_OF_ID}{}{}",
            address_word(owner)?,
            uint_word(tier.token_id())
        );
        decode_uint(&self.reader.call(&self.contract, &data).await?)
    }

    /// Balance of `owner` for every tier, in [`CitizenTier::ALL`] order.
    pub async fn balances(&self, owner: &str) -> DigestResult<Vec<TierBalance>> {
        let mut out = Vec::with_capacity(CitizenTier::ALL.len());
        for tier in CitizenTier::ALL {
            out.push(TierBalance {
                tier,
                balance: self.balance(owner, tier).await?,
            });
        }
        Ok(out)
    }

    /// Total supply of `tier`. There is exactly one first citizen.
    pub async fn total_supply(&self, tier: CitizenTier) -> DigestResult<u128> {
        let selector = match tier {
            CitizenTier::FirstCitizen => return Ok(1),
            CitizenTier::Citizen => SELECTOR_HOUSING_NUMBERS,
            CitizenTier::FoundingCitizen => SELECTOR_RESERVED_CITIZENSHIPS,
        };
        let raw = self
            .reader
            .call(&self.contract, &format!("0x{selector}"))
            .await?;
        decode_uint(&raw)
    }

    pub async fn supplies(&self) -> DigestResult<Vec<TierSupply>> {
        let mut out = Vec::with_capacity(CitizenTier::ALL.len());
        for tier in CitizenTier::ALL {
            out.push(TierSupply {
                tier,
                token_id: tier.token_id(),
                supply: self.total_supply(tier).await?,
            });
        }
        debug!(target: "digest", tiers = out.len(), "citizen supply read");
        Ok(out)
    }

    /// Current holders of `tier`, as listed by the marketplace.
    pub async fn holders(&self, tier: CitizenTier) -> DigestResult<Vec<Holder>> {
        let market = self
            .marketplace
            .as_ref()
            .ok_or_else(|| DigestError::config("citizen holders need a marketplace api key"))?;
        let url = format!("{}/assets/{}/{}", market.base, self.contract, tier.token_id());
        let req = market.client.get(url).header("X-API-KEY", &market.api_key);
        let page: AssetPage = fetch_json(req, "citizen holders").await?;
        page.top_ownerships
            .into_iter()
            .map(|o| {
                let quantity = o.quantity.trim().parse::<u128>().map_err(|_| {
                    DigestError::integrity(format!(
                        "holder {} has quantity {:?}",
                        o.owner.address, o.quantity
                    ))
                })?;
                Ok(Holder {
                    address: o.owner.address,
                    quantity,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn word(n: u128) -> Vec<u8> {
        let mut w = vec![0u8; 16];
        w.extend_from_slice(&n.to_be_bytes());
        w
    }

    /// Answers by selector and remembers the call data it saw.
    #[derive(Default)]
    struct FakeContract {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChainReader for FakeContract {
        async fn call(&self, to: &str, data: &str) -> DigestResult<Vec<u8>> {
            assert_eq!(to, CITIZEN_NFT);
            self.seen.lock().unwrap().push(data.to_string());
            let body = data.strip_prefix("0x").unwrap_or(data);
            match &body[..8] {
                SELECTOR_HOUSING_NUMBERS => Ok(word(9_800)),
                SELECTOR_RESERVED_CITIZENSHIPS => Ok(word(50)),
                SELECTOR_BALANCE_OF_ID => {
                    let id = u128::from_str_radix(&body[8 + 64..], 16).unwrap();
                    Ok(word(if id == 42 { 2 } else { 0 }))
                }
                other => Err(DigestError::fetch(format!("execution reverted: {other}"))),
            }
        }

        async fn native_balance(&self, _address: &str) -> DigestResult<u128> {
            Ok(0)
        }
    }

    const HOLDER: &str = "0x60e7343205C9C88788a22C40030d35f9370d302D";

    #[tokio::test]
    async fn balance_encodes_owner_and_token_id() {
        let fake = Arc::new(FakeContract::default());
        let nft = CitizenNft::new(fake.clone(), CITIZEN_NFT);
        assert_eq!(nft.balance(HOLDER, CitizenTier::Citizen).await.unwrap(), 2);
        assert_eq!(nft.balance(HOLDER, CitizenTier::FoundingCitizen).await.unwrap(), 0);

        let seen = fake.seen.lock().unwrap().clone();
        assert_eq!(seen[0].len(), 2 + 8 + 64 + 64);
        assert!(seen[0].starts_with("0x00fdd58e000000000000000000000000"));
        assert!(seen[0].contains("60e7343205c9c88788a22c40030d35f9370d302d"));
        assert!(seen[0].ends_with("2a"));
        assert!(seen[1].ends_with("45"));
    }

    #[tokio::test]
    async fn supply_per_tier() {
        let nft = CitizenNft::new(Arc::new(FakeContract::default()), CITIZEN_NFT);
        let supplies = nft.supplies().await.unwrap();
        let got: Vec<(CitizenTier, u128)> = supplies.iter().map(|s| (s.tier, s.supply)).collect();
        assert_eq!(
            got,
            vec![
                (CitizenTier::Citizen, 9_800),
                (CitizenTier::FoundingCitizen, 50),
                (CitizenTier::FirstCitizen, 1),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_owner_is_rejected_before_any_call() {
        let fake = Arc::new(FakeContract::default());
        let nft = CitizenNft::new(fake.clone(), CITIZEN_NFT);
        let err = nft.balance("0x1234", CitizenTier::Citizen).await.unwrap_err();
        assert!(matches!(err, DigestError::Configuration(_)));
        assert!(fake.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn holders_without_marketplace_is_a_configuration_error() {
        let nft = CitizenNft::new(Arc::new(FakeContract::default()), CITIZEN_NFT);
        let err = nft.holders(CitizenTier::Citizen).await.unwrap_err();
        assert!(matches!(err, DigestError::Configuration(_)));
    }

    #[test]
    fn tiers_parse_from_names_and_ids() {
        assert_eq!("founding".parse::<CitizenTier>().unwrap(), CitizenTier::FoundingCitizen);
        assert_eq!("first-citizen".parse::<CitizenTier>().unwrap(), CitizenTier::FirstCitizen);
        assert_eq!("42".parse::<CitizenTier>().unwrap(), CitizenTier::Citizen);
        assert!("mayor".parse::<CitizenTier>().is_err());
        assert_eq!(CitizenTier::FoundingCitizen.to_string(), "founding_citizen");
    }
}
