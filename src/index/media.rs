// src/index/media.rs
// Picking a displayable media URL out of NFT metadata

use serde_json::Value;

pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Rewrite `ipfs://<cid>/path` to `<gateway><cid>/path`; other URLs pass through
pub fn normalize_ipfs(url: &str, gateway: &str) -> String {
    match url.strip_prefix("ipfs://") {
        Some(rest) => {
            let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
            format!("{}/{}", gateway.trim_end_matches('/'), rest)
        }
        None => url.to_string(),
    }
}

fn first_str<'a>(meta: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| meta.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// Animation beats still image. Metadata given as a JSON string is parsed first.
pub fn pick_media_url(metadata: &Value, gateway: &str) -> Option<String> {
    let parsed;
    let meta = match metadata {
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw).ok()?;
            &parsed
        }
        other => other,
    };
    if !meta.is_object() {
        return None;
    }

    first_str(meta, &["animation_url", "animation", "animationUrl"])
        .or_else(|| first_str(meta, &["image", "image_url", "imageUrl"]))
        .map(|url| normalize_ipfs(url, gateway))
}

/// Display name from metadata, if any
pub fn pick_name(metadata: &Value) -> Option<String> {
    match metadata {
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|v| first_str(&v, &["name"]).map(str::to_string)),
        other => first_str(other, &["name"]).map(str::to_string),
    }
}
