//! State entries and the state-key grammar.
//!
//! Every effect of block execution is recorded under a namespaced key whose
//! suffix names the entity kind:
//!
//! | Kind             | Key                                         |
//! |------------------|---------------------------------------------|
//! | account          | `{address}:account`                         |
//! | balance          | `{address}-{currency}:balance`              |
//! | contract account | `{address}:contractaccount`                 |
//! | NFT collection   | `nft:{contract}:{collection}:collection`    |
//! | NFT              | `nft:{contract}:{collection}:{index}:nft`   |
//! | NFT agent        | `nft:{contract}:{collection}:{owner}:agent` |
//!
//! No suffix is a suffix of another, so at most one `is_*_key` predicate
//! holds for any key. The `parse_*_key` functions extract the key's
//! components and fail on keys that have the right suffix but a malformed
//! body.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::Height;
use crate::error::TypeError;

pub const ACCOUNT_SUFFIX: &str = ":account";
pub const BALANCE_SUFFIX: &str = ":balance";
pub const CONTRACT_ACCOUNT_SUFFIX: &str = ":contractaccount";
pub const COLLECTION_SUFFIX: &str = ":collection";
pub const NFT_SUFFIX: &str = ":nft";
pub const AGENT_SUFFIX: &str = ":agent";

const NFT_PREFIX: &str = "nft:";

/// One keyed effect of executing a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub key: String,
    pub value: Value,
    /// Height at which this value was written.
    pub height: Height,
}

impl StateEntry {
    pub fn new(key: impl Into<String>, value: Value, height: Height) -> Self {
        Self {
            key: key.into(),
            value,
            height,
        }
    }
}

/// A contract-scoped NFT collection reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    pub contract: String,
    pub collection: String,
}

/// Identity of one NFT: `{contract}:{collection}:{index}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NftId {
    pub contract: String,
    pub collection: String,
    pub index: u64,
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.contract, self.collection, self.index)
    }
}

// ---------------------------------------------------------------------------
// Key construction
// ---------------------------------------------------------------------------

pub fn account_key(address: &str) -> String {
    format!("{address}{ACCOUNT_SUFFIX}")
}

pub fn balance_key(address: &str, currency: &str) -> String {
    format!("{address}-{currency}{BALANCE_SUFFIX}")
}

pub fn contract_account_key(address: &str) -> String {
    format!("{address}{CONTRACT_ACCOUNT_SUFFIX}")
}

pub fn collection_key(contract: &str, collection: &str) -> String {
    format!("{NFT_PREFIX}{contract}:{collection}{COLLECTION_SUFFIX}")
}

pub fn nft_key(id: &NftId) -> String {
    format!(
        "{NFT_PREFIX}{}:{}:{}{NFT_SUFFIX}",
        id.contract, id.collection, id.index
    )
}

pub fn agent_key(contract: &str, collection: &str, owner: &str) -> String {
    format!("{NFT_PREFIX}{contract}:{collection}:{owner}{AGENT_SUFFIX}")
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

pub fn is_account_key(key: &str) -> bool {
    has_body(key, ACCOUNT_SUFFIX)
}

pub fn is_balance_key(key: &str) -> bool {
    has_body(key, BALANCE_SUFFIX)
}

pub fn is_contract_account_key(key: &str) -> bool {
    has_body(key, CONTRACT_ACCOUNT_SUFFIX)
}

pub fn is_collection_key(key: &str) -> bool {
    key.starts_with(NFT_PREFIX) && has_body(key, COLLECTION_SUFFIX)
}

pub fn is_nft_key(key: &str) -> bool {
    key.starts_with(NFT_PREFIX) && has_body(key, NFT_SUFFIX)
}

pub fn is_agent_key(key: &str) -> bool {
    key.starts_with(NFT_PREFIX) && has_body(key, AGENT_SUFFIX)
}

fn has_body(key: &str, suffix: &str) -> bool {
    key.len() > suffix.len() && key.ends_with(suffix)
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Address of an account key.
pub fn parse_account_key(key: &str) -> Result<&str, TypeError> {
    strip(key, "", ACCOUNT_SUFFIX)
}

/// `(address, currency)` of a balance key.
pub fn parse_balance_key(key: &str) -> Result<(&str, &str), TypeError> {
    let body = strip(key, "", BALANCE_SUFFIX)?;
    match body.rsplit_once('-') {
        Some((address, currency)) if !address.is_empty() && !currency.is_empty() => {
            Ok((address, currency))
        }
        _ => Err(malformed(key, "expected {address}-{currency}")),
    }
}

/// Address of a contract-account key.
pub fn parse_contract_account_key(key: &str) -> Result<&str, TypeError> {
    strip(key, "", CONTRACT_ACCOUNT_SUFFIX)
}

pub fn parse_collection_key(key: &str) -> Result<CollectionRef, TypeError> {
    let body = strip(key, NFT_PREFIX, COLLECTION_SUFFIX)?;
    let [contract, collection] = segments::<2>(key, body)?;
    Ok(CollectionRef {
        contract: contract.to_string(),
        collection: collection.to_string(),
    })
}

pub fn parse_nft_key(key: &str) -> Result<NftId, TypeError> {
    let body = strip(key, NFT_PREFIX, NFT_SUFFIX)?;
    let [contract, collection, index] = segments::<3>(key, body)?;
    let index = index
        .parse::<u64>()
        .map_err(|e| malformed(key, &format!("invalid nft index: {e}")))?;
    Ok(NftId {
        contract: contract.to_string(),
        collection: collection.to_string(),
        index,
    })
}

/// `(collection, owner)` of an agent key.
pub fn parse_agent_key(key: &str) -> Result<(CollectionRef, &str), TypeError> {
    let body = strip(key, NFT_PREFIX, AGENT_SUFFIX)?;
    let [contract, collection, owner] = segments::<3>(key, body)?;
    Ok((
        CollectionRef {
            contract: contract.to_string(),
            collection: collection.to_string(),
        },
        owner,
    ))
}

fn strip<'a>(key: &'a str, prefix: &str, suffix: &str) -> Result<&'a str, TypeError> {
    key.strip_prefix(prefix)
        .and_then(|k| k.strip_suffix(suffix))
        .filter(|body| !body.is_empty())
        .ok_or_else(|| malformed(key, &format!("expected {prefix}...{suffix}")))
}

fn segments<'a, const N: usize>(key: &str, body: &'a str) -> Result<[&'a str; N], TypeError> {
    let parts: Vec<&str> = body.split(':').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(malformed(key, "empty segment"));
    }
    parts
        .try_into()
        .map_err(|parts: Vec<&str>| malformed(key, &format!("expected {N} segments, got {}", parts.len())))
}

fn malformed(key: &str, reason: &str) -> TypeError {
    TypeError::InvalidStateKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn predicates() -> [fn(&str) -> bool; 6] {
        [
            is_account_key,
            is_balance_key,
            is_contract_account_key,
            is_collection_key,
            is_nft_key,
            is_agent_key,
        ]
    }

    fn matches(key: &str) -> usize {
        predicates().iter().filter(|p| p(key)).count()
    }

    #[test]
    fn built_keys_match_exactly_one_predicate() {
        let id = NftId {
            contract: "c1".into(),
            collection: "art".into(),
            index: 3,
        };
        let keys = [
            account_key("alice"),
            balance_key("alice", "MCC"),
            contract_account_key("c1"),
            collection_key("c1", "art"),
            nft_key(&id),
            agent_key("c1", "art", "alice"),
        ];
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(matches(key), 1, "{key}");
            assert!(predicates()[i](key), "{key}");
        }
    }

    #[test]
    fn contract_account_is_not_an_account() {
        assert!(!is_account_key(&contract_account_key("c1")));
    }

    #[test]
    fn bare_suffix_is_not_a_key() {
        assert_eq!(matches(":account"), 0);
        assert_eq!(matches("nft::nft"), 1);
        assert!(parse_nft_key("nft::nft").is_err());
    }

    #[test]
    fn unrelated_keys_match_nothing() {
        assert_eq!(matches("alice:currencydesign"), 0);
        assert_eq!(matches("dao:proposal:1"), 0);
        assert_eq!(matches(""), 0);
    }

    #[test]
    fn parse_balance_splits_on_last_dash() {
        assert_eq!(
            parse_balance_key("my-addr-PEN:balance").unwrap(),
            ("my-addr", "PEN")
        );
        assert!(parse_balance_key("nodash:balance").is_err());
    }

    #[test]
    fn parse_nft_roundtrips_id() {
        let id = NftId {
            contract: "c".into(),
            collection: "col".into(),
            index: 42,
        };
        assert_eq!(parse_nft_key(&nft_key(&id)).unwrap(), id);
        assert_eq!(id.to_string(), "c:col:42");
    }

    #[test]
    fn parse_nft_rejects_bad_index() {
        let err = parse_nft_key("nft:c:col:x:nft").unwrap_err();
        assert!(matches!(err, TypeError::InvalidStateKey { .. }));
    }

    #[test]
    fn parse_agent_and_collection() {
        let key = agent_key("c", "col", "bob");
        let (col, owner) = parse_agent_key(&key).unwrap();
        assert_eq!(col.contract, "c");
        assert_eq!(col.collection, "col");
        assert_eq!(owner, "bob");

        let col = parse_collection_key(&collection_key("c", "col")).unwrap();
        assert_eq!(col.collection, "col");
        assert!(parse_collection_key("nft:onlyone:collection").is_err());
    }

    proptest! {
        #[test]
        fn no_key_matches_two_predicates(key in "[a-z0-9:\\-]{0,24}") {
            prop_assert!(matches(&key) <= 1);
        }
    }
}
