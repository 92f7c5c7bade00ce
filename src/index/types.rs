// src/index/types.rs
//! Response shapes of the NFT ownership index (Alchemy `getNFTs`)

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedNftsResponse {
    #[serde(default)]
    pub owned_nfts: Vec<OwnedNft>,
    pub page_key: Option<String>,
    pub total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct OwnedNft {
    pub contract: Option<NftContract>,
    pub id: NftId,
    pub title: Option<String>,
    /// Usually an object, occasionally a JSON string or missing entirely
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct NftContract {
    pub address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftId {
    /// Hex-encoded, e.g. `0x00..0f4241`
    pub token_id: String,
}
