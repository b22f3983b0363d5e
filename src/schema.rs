//! Key-prefix taxonomy for the client's key-value store
//!
//! Every key written by the client carries either a long literal marker
//! (metadata singletons like `LastBlock`) or a short table prefix (one or
//! two bytes, like `h` for headers). The table below mirrors the client's
//! database schema; `classify` maps a raw key to its category name.

/// A single prefix rule: byte pattern and the category it selects
#[derive(Debug, Clone, Copy)]
pub struct PrefixRule {
    pub prefix: &'static [u8],
    pub category: &'static str,
}

/// Category returned when no rule matches
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// The known prefixes and their categories
///
/// Matching is longest-prefix-wins, so `LastBlock` keys resolve to
/// `HeadBlockKey` and never to the one-byte `L` rule (`StateIDPrefix`)
/// even though both patterns are prefixes of the key.
pub const PREFIX_RULES: &[PrefixRule] = &[
    PrefixRule { prefix: b"secure-key-", category: "PreimagePrefix" },
    PrefixRule { prefix: b"ethereum-config-", category: "ConfigPrefix" },
    PrefixRule { prefix: b"ethereum-genesis-", category: "GenesisPrefix" },
    PrefixRule { prefix: b"chtRootV2-", category: "ChtPrefix" },
    PrefixRule { prefix: b"chtIndexV2-", category: "ChtIndexTablePrefix" },
    PrefixRule { prefix: b"fixedRoot-", category: "FixedCommitteeRootKey" },
    PrefixRule { prefix: b"committee-", category: "SyncCommitteeKey" },
    PrefixRule { prefix: b"cht-", category: "ChtTablePrefix" },
    PrefixRule { prefix: b"bltRoot-", category: "BloomTriePrefix" },
    PrefixRule { prefix: b"bltIndex-", category: "BloomTrieIndexPrefix" },
    PrefixRule { prefix: b"blt-", category: "BloomTrieTablePrefix" },
    PrefixRule { prefix: b"clique-", category: "CliqueSnapshotPrefix" },
    PrefixRule { prefix: b"update-", category: "BestUpdateKey" },
    PrefixRule { prefix: b"SnapshotSyncStatus", category: "SnapshotSyncStatusKey" },
    PrefixRule { prefix: b"SnapshotDisabled", category: "SnapshotDisabledKey" },
    PrefixRule { prefix: b"SnapshotRoot", category: "SnapshotRootKey" },
    PrefixRule { prefix: b"SnapshotJournal", category: "SnapshotJournalKey" },
    PrefixRule { prefix: b"SnapshotGenerator", category: "SnapshotGeneratorKey" },
    PrefixRule { prefix: b"SnapshotRecovery", category: "SnapshotRecoveryKey" },
    PrefixRule { prefix: b"SkeletonSyncStatus", category: "SkeletonSyncStatusKey" },
    PrefixRule { prefix: b"TrieSync", category: "FastTrieProgressKey" },
    PrefixRule { prefix: b"TrieJournal", category: "TrieJournalKey" },
    PrefixRule { prefix: b"TransactionIndexTail", category: "TxIndexTailKey" },
    PrefixRule { prefix: b"FastTransactionLookupLimit", category: "FastTxLookupLimitKey" },
    PrefixRule { prefix: b"InvalidBlock", category: "BadBlockKey" },
    PrefixRule { prefix: b"unclean-shutdown", category: "UncleanShutdownKey" },
    PrefixRule { prefix: b"eth2-transition", category: "TransitionStatusKey" },
    PrefixRule { prefix: b"SnapSyncStatus", category: "SnapSyncStatusFlagKey" },
    PrefixRule { prefix: b"DatabaseVersion", category: "DatabaseVersionKey" },
    PrefixRule { prefix: b"LastHeader", category: "HeadHeaderKey" },
    PrefixRule { prefix: b"LastBlock", category: "HeadBlockKey" },
    PrefixRule { prefix: b"LastFast", category: "HeadFastBlockKey" },
    PrefixRule { prefix: b"LastFinalized", category: "HeadFinalizedBlockKey" },
    PrefixRule { prefix: b"LastStateID", category: "PersistentStateIDKey" },
    PrefixRule { prefix: b"LastPivot", category: "LastPivotKey" },
    PrefixRule { prefix: b"i", category: "BloomBitsIndexPrefix" },
    PrefixRule { prefix: b"h", category: "HeaderPrefix" },
    PrefixRule { prefix: b"t", category: "HeaderTDSuffix" },
    PrefixRule { prefix: b"n", category: "HeaderHashSuffix" },
    PrefixRule { prefix: b"H", category: "HeaderNumberPrefix" },
    PrefixRule { prefix: b"b", category: "BlockBodyPrefix" },
    PrefixRule { prefix: b"r", category: "BlockReceiptsPrefix" },
    PrefixRule { prefix: b"l", category: "TxLookupPrefix" },
    PrefixRule { prefix: b"B", category: "BloomBitsPrefix" },
    PrefixRule { prefix: b"a", category: "SnapshotAccountPrefix" },
    PrefixRule { prefix: b"o", category: "SnapshotStoragePrefix" },
    PrefixRule { prefix: b"c", category: "CodePrefix" },
    PrefixRule { prefix: b"S", category: "SkeletonHeaderPrefix" },
    PrefixRule { prefix: b"A", category: "TrieNodeAccountPrefix" },
    PrefixRule { prefix: b"O", category: "TrieNodeStoragePrefix" },
    PrefixRule { prefix: b"L", category: "StateIDPrefix" },
    PrefixRule { prefix: b"v", category: "VerklePrefix" },
];

/// Classify a raw key by its longest matching prefix
///
/// Returns [`UNKNOWN_CATEGORY`] when no rule matches. Pure and
/// deterministic: the same key always yields the same category.
pub fn classify(key: &[u8]) -> &'static str {
    let mut best: Option<&PrefixRule> = None;
    for rule in PREFIX_RULES {
        if key.starts_with(rule.prefix) {
            match best {
                Some(prev) if prev.prefix.len() >= rule.prefix.len() => {}
                _ => best = Some(rule),
            }
        }
    }
    best.map_or(UNKNOWN_CATEGORY, |rule| rule.category)
}

/// The full category universe in table order, with [`UNKNOWN_CATEGORY`] last
///
/// The order is stable, which lets callers use the returned index as a
/// bit-vector slot for the whole run.
pub fn categories() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PREFIX_RULES.iter().map(|r| r.category).collect();
    names.push(UNKNOWN_CATEGORY);
    names
}
