//! Entity documents built from state entries.
//!
//! Each builder parses the entry's key, decodes its JSON value into a typed
//! state and encodes the stored document. Only shape is checked here; the
//! values were already accepted by block execution. Any failure is a
//! [`DigestError::Validation`]: the block is not digested at all rather than
//! digested partially.

use chaindex_store::Document;
use chaindex_types::state::{
    parse_account_key, parse_agent_key, parse_balance_key, parse_collection_key,
    parse_contract_account_key, parse_nft_key,
};
use chaindex_types::{Height, StateEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DigestError, DigestResult};

/// Field NFT documents are keyed on for cleanup.
pub const NFT_ID_FIELD: &str = "nft_id";

/// A built entity document. `nft_id` is set only for NFT documents.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDocument {
    pub document: Document,
    pub nft_id: Option<String>,
}

impl EntityDocument {
    fn plain(document: Document) -> Self {
        Self {
            document,
            nft_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountKey {
    pub key: String,
    pub weight: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountKeys {
    pub threshold: u8,
    pub keys: Vec<AccountKey>,
}

#[derive(Deserialize)]
struct AccountState {
    keys: AccountKeys,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDoc {
    pub address: String,
    pub keys: AccountKeys,
    pub height: u64,
}

pub fn build_account(entry: &StateEntry, _block: Height) -> DigestResult<EntityDocument> {
    let address = parse_account_key(&entry.key)?;
    let state: AccountState = decode(entry)?;

    encode(
        entry,
        &AccountDoc {
            address: address.to_string(),
            keys: state.keys,
            height: entry.height.get(),
        },
    )
    .map(EntityDocument::plain)
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct BalanceState {
    currency: String,
    amount: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDoc {
    pub address: String,
    pub currency: String,
    /// Decimal string; amounts exceed 64 bits.
    pub amount: String,
    pub height: u64,
}

pub fn build_balance(entry: &StateEntry, _block: Height) -> DigestResult<EntityDocument> {
    let (address, _) = parse_balance_key(&entry.key)?;
    let state: BalanceState = decode(entry)?;
    if state.amount.is_empty() || !state.amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(entry, format!("amount {:?} is not a decimal", state.amount)));
    }

    encode(
        entry,
        &BalanceDoc {
            address: address.to_string(),
            currency: state.currency,
            amount: state.amount,
            height: entry.height.get(),
        },
    )
    .map(EntityDocument::plain)
}

// ---------------------------------------------------------------------------
// Contract account
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ContractAccountState {
    owner: String,
    is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAccountDoc {
    pub address: String,
    pub owner: String,
    pub is_active: bool,
    pub height: u64,
}

pub fn build_contract_account(
    entry: &StateEntry,
    _block: Height,
) -> DigestResult<EntityDocument> {
    let address = parse_contract_account_key(&entry.key)?;
    let state: ContractAccountState = decode(entry)?;

    encode(
        entry,
        &ContractAccountDoc {
            address: address.to_string(),
            owner: state.owner,
            is_active: state.is_active,
            height: entry.height.get(),
        },
    )
    .map(EntityDocument::plain)
}

// ---------------------------------------------------------------------------
// NFT collection
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CollectionState {
    name: String,
    royalty: u8,
    uri: String,
    #[serde(default)]
    whitelist: Vec<String>,
    active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftCollectionDoc {
    pub contract: String,
    pub collection: String,
    pub name: String,
    pub royalty: u8,
    pub uri: String,
    pub whitelist: Vec<String>,
    pub active: bool,
    pub height: u64,
}

pub fn build_nft_collection(entry: &StateEntry, _block: Height) -> DigestResult<EntityDocument> {
    let col = parse_collection_key(&entry.key)?;
    let state: CollectionState = decode(entry)?;

    encode(
        entry,
        &NftCollectionDoc {
            contract: col.contract,
            collection: col.collection,
            name: state.name,
            royalty: state.royalty,
            uri: state.uri,
            whitelist: state.whitelist,
            active: state.active,
            height: entry.height.get(),
        },
    )
    .map(EntityDocument::plain)
}

// ---------------------------------------------------------------------------
// NFT
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub address: String,
    pub share: u8,
}

#[derive(Deserialize)]
struct NftState {
    owner: String,
    hash: String,
    uri: String,
    #[serde(default)]
    approved: Option<String>,
    #[serde(default)]
    creators: Vec<Creator>,
    active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftDoc {
    pub nft_id: String,
    pub contract: String,
    pub collection: String,
    pub index: u64,
    pub owner: String,
    pub hash: String,
    pub uri: String,
    pub approved: Option<String>,
    pub creators: Vec<Creator>,
    pub active: bool,
    /// Height of the block that produced this row; cleanup deletes rows
    /// below it.
    pub height: u64,
}

/// NFT rows carry the digesting block's height, not the entry's, and report
/// their identifier for the cleanup step.
pub fn build_nft(entry: &StateEntry, block: Height) -> DigestResult<EntityDocument> {
    let id = parse_nft_key(&entry.key)?;
    let state: NftState = decode(entry)?;

    let nft_id = id.to_string();
    let document = encode(
        entry,
        &NftDoc {
            nft_id: nft_id.clone(),
            contract: id.contract,
            collection: id.collection,
            index: id.index,
            owner: state.owner,
            hash: state.hash,
            uri: state.uri,
            approved: state.approved,
            creators: state.creators,
            active: state.active,
            height: block.get(),
        },
    )?;

    Ok(EntityDocument {
        document,
        nft_id: Some(nft_id),
    })
}

// ---------------------------------------------------------------------------
// NFT agent
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AgentState {
    agents: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftAgentDoc {
    pub contract: String,
    pub collection: String,
    pub owner: String,
    pub agents: Vec<String>,
    pub height: u64,
}

pub fn build_nft_agent(entry: &StateEntry, _block: Height) -> DigestResult<EntityDocument> {
    let (col, owner) = parse_agent_key(&entry.key)?;
    let state: AgentState = decode(entry)?;

    encode(
        entry,
        &NftAgentDoc {
            contract: col.contract,
            collection: col.collection,
            owner: owner.to_string(),
            agents: state.agents,
            height: entry.height.get(),
        },
    )
    .map(EntityDocument::plain)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode<T: DeserializeOwned>(entry: &StateEntry) -> DigestResult<T> {
    serde_json::from_value(entry.value.clone()).map_err(|e| invalid(entry, e))
}

fn encode<T: Serialize>(entry: &StateEntry, doc: &T) -> DigestResult<Document> {
    Document::encode(doc).map_err(|e| invalid(entry, e))
}

fn invalid(entry: &StateEntry, reason: impl ToString) -> DigestError {
    DigestError::validation(format!("state {}", entry.key), reason)
}

#[cfg(test)]
mod tests {
    use chaindex_types::state::{
        account_key, agent_key, balance_key, collection_key, contract_account_key, nft_key,
    };
    use chaindex_types::NftId;
    use serde_json::{json, Value};

    use super::*;

    fn entry(key: String, value: Value) -> StateEntry {
        StateEntry::new(key, value, Height(3))
    }

    fn nft_id() -> NftId {
        NftId {
            contract: "c1".into(),
            collection: "art".into(),
            index: 7,
        }
    }

    fn assert_invalid(result: DigestResult<EntityDocument>) {
        assert!(
            matches!(result, Err(DigestError::Validation { .. })),
            "{result:?}"
        );
    }

    #[test]
    fn account_document() {
        let e = entry(
            account_key("alice"),
            json!({"keys": {"threshold": 100, "keys": [{"key": "pk1", "weight": 100}]}}),
        );
        let built = build_account(&e, Height(9)).unwrap();
        let doc: AccountDoc = built.document.decode().unwrap();
        assert_eq!(doc.address, "alice");
        assert_eq!(doc.height, 3);
        assert_eq!(built.nft_id, None);
    }

    #[test]
    fn account_keys_are_stored_as_given() {
        let e = entry(
            account_key("carol"),
            json!({"keys": {"threshold": 100, "keys": [{"key": "pk1", "weight": 60}]}}),
        );
        let doc: AccountDoc = build_account(&e, Height(3)).unwrap().document.decode().unwrap();
        assert_eq!(doc.keys.threshold, 100);
        assert_eq!(doc.keys.keys[0].weight, 60);
    }

    #[test]
    fn account_with_mistyped_weight_is_invalid() {
        let e = entry(
            account_key("a"),
            json!({"keys": {"threshold": 1, "keys": [{"key": "pk", "weight": "heavy"}]}}),
        );
        assert_invalid(build_account(&e, Height(3)));
    }

    #[test]
    fn balance_document() {
        let e = entry(
            balance_key("alice", "MCC"),
            json!({"currency": "MCC", "amount": "340282366920938463463374607431768211456"}),
        );
        let doc: BalanceDoc = build_balance(&e, Height(3)).unwrap().document.decode().unwrap();
        assert_eq!(doc.address, "alice");
        assert_eq!(doc.currency, "MCC");
        assert_eq!(doc.amount, "340282366920938463463374607431768211456");
    }

    #[test]
    fn balance_rejects_non_decimal_amount() {
        for amount in ["-5", "", "1.5", "0x10"] {
            let e = entry(
                balance_key("alice", "MCC"),
                json!({"currency": "MCC", "amount": amount}),
            );
            assert_invalid(build_balance(&e, Height(3)));
        }
    }

    #[test]
    fn contract_account_document() {
        let e = entry(
            contract_account_key("c1"),
            json!({"owner": "alice", "is_active": true}),
        );
        let doc: ContractAccountDoc = build_contract_account(&e, Height(3))
            .unwrap()
            .document
            .decode()
            .unwrap();
        assert_eq!(doc.address, "c1");
        assert!(doc.is_active);

        let unowned = entry(contract_account_key("c2"), json!({"owner": "", "is_active": false}));
        assert!(build_contract_account(&unowned, Height(3)).is_ok());
    }

    #[test]
    fn collection_document() {
        let value = |royalty: u8| {
            json!({"name": "Art", "royalty": royalty, "uri": "https://x", "active": true})
        };
        let ok = entry(collection_key("c1", "art"), value(10));
        let doc: NftCollectionDoc = build_nft_collection(&ok, Height(3))
            .unwrap()
            .document
            .decode()
            .unwrap();
        assert_eq!(doc.collection, "art");
        assert!(doc.whitelist.is_empty());

        let high = entry(collection_key("c1", "art"), value(150));
        assert!(build_nft_collection(&high, Height(3)).is_ok());
    }

    #[test]
    fn nft_uses_block_height_and_reports_id() {
        let e = entry(
            nft_key(&nft_id()),
            json!({
                "owner": "alice",
                "hash": "h",
                "uri": "ipfs://n",
                "creators": [{"address": "bob", "share": 30}],
                "active": true
            }),
        );
        let built = build_nft(&e, Height(12)).unwrap();
        assert_eq!(built.nft_id.as_deref(), Some("c1:art:7"));
        let doc: NftDoc = built.document.decode().unwrap();
        assert_eq!(doc.height, 12);
        assert_eq!(doc.index, 7);
        assert_eq!(doc.approved, None);
        assert_eq!(built.document.get(NFT_ID_FIELD), Some(&json!("c1:art:7")));
    }

    #[test]
    fn nft_creator_shares_are_stored_as_given() {
        let e = entry(
            nft_key(&nft_id()),
            json!({
                "owner": "alice", "hash": "h", "uri": "u", "active": true,
                "creators": [{"address": "a", "share": 60}, {"address": "b", "share": 60}]
            }),
        );
        let doc: NftDoc = build_nft(&e, Height(3)).unwrap().document.decode().unwrap();
        assert_eq!(doc.creators.len(), 2);
    }

    #[test]
    fn nft_missing_owner_is_invalid() {
        let e = entry(
            nft_key(&nft_id()),
            json!({"hash": "h", "uri": "u", "active": true}),
        );
        assert_invalid(build_nft(&e, Height(3)));
    }

    #[test]
    fn agent_document() {
        let e = entry(agent_key("c1", "art", "alice"), json!({"agents": ["bob"]}));
        let doc: NftAgentDoc = build_nft_agent(&e, Height(3))
            .unwrap()
            .document
            .decode()
            .unwrap();
        assert_eq!(doc.owner, "alice");
        assert_eq!(doc.agents, vec!["bob".to_string()]);

        let self_agent = entry(
            agent_key("c1", "art", "alice"),
            json!({"agents": ["alice", "bob"]}),
        );
        let doc: NftAgentDoc = build_nft_agent(&self_agent, Height(3))
            .unwrap()
            .document
            .decode()
            .unwrap();
        assert_eq!(doc.agents, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn malformed_value_is_invalid() {
        let e = entry(account_key("alice"), json!("not an object"));
        assert_invalid(build_account(&e, Height(3)));
    }

    #[test]
    fn malformed_key_body_is_invalid() {
        let e = entry("nft:c1:art:seven:nft".into(), json!({}));
        assert_invalid(build_nft(&e, Height(3)));
    }
}
