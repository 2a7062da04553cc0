//! # Signing Identity
//!
//! A node's signing seed lives in its store collaborator under
//! `<prefix>/MNEMONIC` as 64 hex characters. A store without one gets a
//! fresh random seed, so the same store always yields the same identity.

use anyhow::{anyhow, Context, Result};
use rand::RngCore;
use sc_01_channel_store::{StoreRecord, StoreService};
use serde_json::Value;
use tracing::info;

/// Read the seed under `key`, generating and persisting one if absent.
pub fn load_or_create_seed(store: &dyn StoreService, key: &str) -> Result<[u8; 32]> {
    if let Some(value) = store
        .get(key)
        .with_context(|| format!("reading signing seed at {key}"))?
    {
        let encoded = value
            .as_str()
            .ok_or_else(|| anyhow!("signing seed at {key} is not a string"))?;
        return decode_seed(encoded).with_context(|| format!("decoding signing seed at {key}"));
    }

    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    store
        .set(vec![StoreRecord::new(key, Value::String(hex::encode(seed)))])
        .with_context(|| format!("persisting signing seed at {key}"))?;
    info!(key = %key, "[sc-node] Generated new signing seed");
    Ok(seed)
}

fn decode_seed(encoded: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(encoded.trim_start_matches("0x"))?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow!("expected 32 bytes, got {}", bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_01_channel_store::InMemoryStoreService;

    #[test]
    fn test_seed_is_generated_once() {
        let store = InMemoryStoreService::new();
        let first = load_or_create_seed(&store, "n/MNEMONIC").unwrap();
        let second = load_or_create_seed(&store, "n/MNEMONIC").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_existing_seed_is_used() {
        let store = InMemoryStoreService::new();
        store
            .set(vec![StoreRecord::new(
                "n/MNEMONIC",
                Value::String(hex::encode([5u8; 32])),
            )])
            .unwrap();
        assert_eq!(load_or_create_seed(&store, "n/MNEMONIC").unwrap(), [5u8; 32]);
    }

    #[test]
    fn test_malformed_seed_is_an_error() {
        let store = InMemoryStoreService::new();
        store
            .set(vec![StoreRecord::new("n/MNEMONIC", Value::String("abcd".to_string()))])
            .unwrap();
        assert!(load_or_create_seed(&store, "n/MNEMONIC").is_err());
    }
}
