use std::fmt;

/// Target collections of the digest store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Operation,
    Account,
    Balance,
    ContractAccount,
    NftCollection,
    Nft,
    NftAgent,
}

/// The order in which a session commits its buffers. A failure while writing
/// collection `N` guarantees collections `0..N` were written.
pub const COMMIT_ORDER: [Collection; 7] = [
    Collection::Operation,
    Collection::Account,
    Collection::Balance,
    Collection::ContractAccount,
    Collection::NftCollection,
    Collection::Nft,
    Collection::NftAgent,
];

impl Collection {
    /// Store-side collection name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Operation => "digest_op",
            Self::Account => "digest_ac",
            Self::Balance => "digest_bl",
            Self::ContractAccount => "digest_ca",
            Self::NftCollection => "digest_nftcollection",
            Self::Nft => "digest_nft",
            Self::NftAgent => "digest_nftagent",
        }
    }

    /// Operations, accounts and balances are written on every commit, even
    /// when empty; the rest only when the block produced documents for them.
    pub const fn always_written(self) -> bool {
        matches!(self, Self::Operation | Self::Account | Self::Balance)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
