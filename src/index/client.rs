// src/index/client.rs
//! Alchemy NFT API client

use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::str::FromStr;

use super::media::{pick_media_url, pick_name, DEFAULT_IPFS_GATEWAY};
use super::types::OwnedNftsResponse;
use super::NftIndex;
use crate::config::StakingConfig;
use crate::error::{Result, StakingError};
use crate::types::WalletAsset;
use crate::units::parse_token_id;

/// Stop following `pageKey` after this many pages
const MAX_PAGES: usize = 20;

pub struct AlchemyIndexClient {
    base_url: String,
    api_key: String,
    ipfs_gateway: String,
    http_client: HttpClient,
}

impl AlchemyIndexClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            http_client: HttpClient::new(),
        }
    }

    pub fn from_config(config: &StakingConfig) -> Self {
        Self::new(&config.index_url, &config.index_api_key).with_ipfs_gateway(&config.ipfs_gateway)
    }

    pub fn with_ipfs_gateway(mut self, gateway: &str) -> Self {
        self.ipfs_gateway = gateway.to_string();
        self
    }

    fn endpoint(&self) -> String {
        if self.api_key.is_empty() {
            format!("{}/getNFTs/", self.base_url)
        } else {
            format!("{}/{}/getNFTs/", self.base_url, self.api_key)
        }
    }

    async fn fetch_page(
        &self,
        owner: Address,
        collection: Address,
        page_key: Option<&str>,
    ) -> Result<OwnedNftsResponse> {
        let mut query = vec![
            ("owner", owner.to_string()),
            ("contractAddresses[]", collection.to_string()),
        ];
        if let Some(key) = page_key {
            query.push(("pageKey", key.to_string()));
        }

        let response = self
            .http_client
            .get(self.endpoint())
            .query(&query)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StakingError::Rpc(format!("NFT index error {}: {}", status, error_text)));
        }

        Ok(response.json::<OwnedNftsResponse>().await?)
    }

    fn to_assets(&self, page: OwnedNftsResponse, collection: Address) -> Vec<WalletAsset> {
        let mut assets = Vec::with_capacity(page.owned_nfts.len());
        for nft in page.owned_nfts {
            // The index may ignore the contract filter; never trust it blindly
            if let Some(contract) = &nft.contract {
                match Address::from_str(&contract.address) {
                    Ok(address) if address == collection => {}
                    _ => continue,
                }
            }

            let token_id = match parse_token_id(&nft.id.token_id) {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("Dropping NFT with unusable token id {:?}: {}", nft.id.token_id, e);
                    continue;
                }
            };

            assets.push(WalletAsset {
                collection,
                token_id,
                name: pick_name(&nft.metadata).or(nft.title.filter(|t| !t.is_empty())),
                media_url: pick_media_url(&nft.metadata, &self.ipfs_gateway),
            });
        }
        assets
    }
}

#[async_trait]
impl NftIndex for AlchemyIndexClient {
    async fn owned_tokens(&self, owner: Address, collection: Address) -> Result<Vec<WalletAsset>> {
        let mut assets = Vec::new();
        let mut page_key: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(owner, collection, page_key.as_deref()).await?;
            let next = page.page_key.clone().filter(|k| !k.is_empty());
            assets.extend(self.to_assets(page, collection));

            match next {
                Some(key) => page_key = Some(key),
                None => break,
            }
        }

        log::info!("NFT index: {} holds {} tokens of {}", owner, assets.len(), collection);
        Ok(assets)
    }
}
