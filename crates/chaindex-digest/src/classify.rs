//! State classification.
//!
//! A closed registry of routes maps each entity kind to its key predicate and
//! document builder. Keys matching no route belong to state namespaces the
//! digester does not index and are skipped.

use chaindex_types::state::{
    is_account_key, is_agent_key, is_balance_key, is_collection_key, is_contract_account_key,
    is_nft_key,
};
use chaindex_types::{Height, StateEntry};

use crate::collection::Collection;
use crate::entity::{
    build_account, build_balance, build_contract_account, build_nft, build_nft_agent,
    build_nft_collection, EntityDocument,
};
use crate::error::DigestResult;

/// Kinds of state the digester indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Balance,
    ContractAccount,
    NftCollection,
    Nft,
    NftAgent,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Account,
        EntityKind::Balance,
        EntityKind::ContractAccount,
        EntityKind::NftCollection,
        EntityKind::Nft,
        EntityKind::NftAgent,
    ];

    pub const fn collection(self) -> Collection {
        match self {
            Self::Account => Collection::Account,
            Self::Balance => Collection::Balance,
            Self::ContractAccount => Collection::ContractAccount,
            Self::NftCollection => Collection::NftCollection,
            Self::Nft => Collection::Nft,
            Self::NftAgent => Collection::NftAgent,
        }
    }

    /// Whether this kind's rows are replaced rather than appended.
    pub const fn is_mutable(self) -> bool {
        matches!(self, Self::Nft)
    }

    fn route(self) -> &'static Route {
        // ROUTES is indexed in ALL order.
        &ROUTES[self as usize]
    }

    /// Whether `key` has this kind's shape.
    pub fn matches(self, key: &str) -> bool {
        (self.route().matches)(key)
    }
}

type Builder = fn(&StateEntry, Height) -> DigestResult<EntityDocument>;

struct Route {
    matches: fn(&str) -> bool,
    build: Builder,
}

static ROUTES: [Route; 6] = [
    Route {
        matches: is_account_key,
        build: build_account,
    },
    Route {
        matches: is_balance_key,
        build: build_balance,
    },
    Route {
        matches: is_contract_account_key,
        build: build_contract_account,
    },
    Route {
        matches: is_collection_key,
        build: build_nft_collection,
    },
    Route {
        matches: is_nft_key,
        build: build_nft,
    },
    Route {
        matches: is_agent_key,
        build: build_nft_agent,
    },
];

/// The kind a state key belongs to, if any.
pub fn classify(key: &str) -> Option<EntityKind> {
    EntityKind::ALL.into_iter().find(|kind| kind.matches(key))
}

/// A state entry turned into a document for its kind's collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Classified {
    pub kind: EntityKind,
    pub entity: EntityDocument,
}

/// Classify `entry` and build its document. `Ok(None)` for unknown keys.
pub fn build_entity(entry: &StateEntry, block: Height) -> DigestResult<Option<Classified>> {
    let Some(kind) = classify(&entry.key) else {
        return Ok(None);
    };
    let entity = (kind.route().build)(entry, block)?;
    Ok(Some(Classified { kind, entity }))
}

#[cfg(test)]
mod tests {
    use chaindex_types::state::{
        account_key, agent_key, balance_key, collection_key, contract_account_key, nft_key,
    };
    use chaindex_types::NftId;
    use serde_json::json;

    use super::*;

    fn sample_keys() -> Vec<(String, EntityKind)> {
        let id = NftId {
            contract: "c1".into(),
            collection: "art".into(),
            index: 1,
        };
        vec![
            (account_key("alice"), EntityKind::Account),
            (balance_key("alice", "MCC"), EntityKind::Balance),
            (contract_account_key("c1"), EntityKind::ContractAccount),
            (collection_key("c1", "art"), EntityKind::NftCollection),
            (nft_key(&id), EntityKind::Nft),
            (agent_key("c1", "art", "alice"), EntityKind::NftAgent),
        ]
    }

    #[test]
    fn routes_are_indexed_in_kind_order() {
        assert_eq!(ROUTES.len(), EntityKind::ALL.len());
        for (key, kind) in sample_keys() {
            assert!(kind.matches(&key), "{kind:?} does not match {key}");
            let entry = StateEntry::new(key.as_str(), json!(null), Height(1));
            assert!(build_entity(&entry, Height(1)).is_err());
        }
    }

    #[test]
    fn every_known_key_routes_to_exactly_one_kind() {
        for (key, expected) in sample_keys() {
            assert_eq!(classify(&key), Some(expected), "{key}");
            let hits = EntityKind::ALL.iter().filter(|k| k.matches(&key)).count();
            assert_eq!(hits, 1, "{key} matched {hits} routes");
        }
    }

    #[test]
    fn unknown_keys_are_ignored() {
        for key in ["alice:currencydesign", "dao:proposal:1", "", "nft:c1"] {
            assert_eq!(classify(key), None, "{key}");
            let entry = StateEntry::new(key, json!({"whatever": true}), Height(1));
            assert!(build_entity(&entry, Height(1)).unwrap().is_none());
        }
    }

    #[test]
    fn build_entity_dispatches_to_builder() {
        let entry = StateEntry::new(
            contract_account_key("c1"),
            json!({"owner": "alice", "is_active": false}),
            Height(4),
        );
        let classified = build_entity(&entry, Height(4)).unwrap().unwrap();
        assert_eq!(classified.kind, EntityKind::ContractAccount);
        assert_eq!(classified.kind.collection(), Collection::ContractAccount);
        assert_eq!(classified.entity.document.get("owner"), Some(&json!("alice")));
    }

    #[test]
    fn builder_failure_propagates() {
        let entry = StateEntry::new(account_key("alice"), json!(null), Height(4));
        assert!(build_entity(&entry, Height(4)).is_err());
    }

    #[test]
    fn only_nfts_are_mutable() {
        let mutable: Vec<_> = EntityKind::ALL.iter().filter(|k| k.is_mutable()).collect();
        assert_eq!(mutable, [&EntityKind::Nft]);
    }
}
