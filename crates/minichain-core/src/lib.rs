use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod constants;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Seconds since the epoch, fractional. Set once at construction.
    pub timestamp: f64,
    /// Opaque payload; only its canonical serialization participates in
    /// hashing. `serde_json`'s default map keeps keys sorted, so two
    /// payloads equal as mappings hash identically regardless of how
    /// their keys were inserted.
    pub data: Value,
    /// Hash of the block immediately before this one. Genesis carries
    /// the sentinel "0".
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

/// Hash input for a block. serde_json writes struct fields in
/// declaration order, so the declaration order here IS the canonical
/// ascending key order of the encoding.
#[derive(Serialize)]
struct HashFields<'a> {
    data: &'a Value,
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
}

impl Block {
    /// Timestamp is taken from the wall clock; nonce starts at 0 and the
    /// hash is computed immediately.
    pub fn new(index: u64, data: Value, previous_hash: String) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_secs_f64();
        let mut block = Self {
            index,
            timestamp,
            data,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Canonical byte encoding of the five hashed fields: a compact JSON
    /// object with keys `data, index, nonce, previous_hash, timestamp`
    /// in ascending order, UTF-8. Any reimplementation must match this
    /// byte-for-byte to produce interoperable hashes.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let fields = HashFields {
            data: &self.data,
            index: self.index,
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
        };
        serde_json::to_vec(&fields).expect("block fields serialize")
    }

    /// SHA-256 over `hash_bytes()`, as 64 lowercase hex characters.
    /// Pure; assigning the result to `self.hash` is the chain's job.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.hash_bytes());
        hex::encode(hasher.finalize())
    }
}

pub mod pow {
    /// True when `hash` starts with `difficulty` '0' hex characters.
    pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
        difficulty <= hash.len() && hash.as_bytes()[..difficulty].iter().all(|&b| b == b'0')
    }
}

pub mod chain {
    use super::constants::{DEFAULT_DIFFICULTY, GENESIS_PREVIOUS_HASH};
    use super::pow::meets_difficulty;
    use super::Block;
    use serde_json::{json, Value};
    use thiserror::Error;
    use tracing::info;

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum ChainError {
        #[error("chain has no blocks")]
        EmptyChain,
    }

    /// An ordered sequence of blocks, singly linked by hash reference.
    /// Single-writer: `append` reads the tip and then pushes, so
    /// concurrent appends need external mutual exclusion.
    pub struct Chain {
        pub blocks: Vec<Block>,
        difficulty: usize,
    }

    impl Default for Chain {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Chain {
        pub fn new() -> Self {
            Self::with_difficulty(DEFAULT_DIFFICULTY)
        }

        /// `difficulty` is the number of leading '0' hex characters every
        /// non-genesis block hash must carry. Fixed for the lifetime of
        /// the chain.
        pub fn with_difficulty(difficulty: usize) -> Self {
            Self {
                blocks: vec![genesis_block()],
                difficulty,
            }
        }

        pub fn difficulty(&self) -> usize {
            self.difficulty
        }

        pub fn len(&self) -> usize {
            self.blocks.len()
        }

        pub fn is_empty(&self) -> bool {
            self.blocks.is_empty()
        }

        /// The most recently appended block. `EmptyChain` is unreachable
        /// in practice since construction always installs genesis.
        pub fn tip(&self) -> Result<&Block, ChainError> {
            self.blocks.last().ok_or(ChainError::EmptyChain)
        }

        /// Proof-of-Work: bump the nonce and rehash until the hash
        /// carries the difficulty prefix, then return that hash. The
        /// hash present on entry is tested before the first increment.
        /// Unbounded and blocking; a caller needing a latency bound must
        /// run this on a worker it can terminate.
        pub fn mine(&self, block: &mut Block) -> String {
            while !meets_difficulty(&block.hash, self.difficulty) {
                block.nonce += 1;
                block.hash = block.compute_hash();
            }
            info!(
                index = block.index,
                nonce = block.nonce,
                hash = %block.hash,
                "mined block"
            );
            block.hash.clone()
        }

        /// Mine and append a block carrying `data`; returns the sealed
        /// block. The only mutator of the sequence.
        pub fn append(&mut self, data: Value) -> Result<&Block, ChainError> {
            let index = self.blocks.len();
            let mut block = Block::new(index as u64, data, self.tip()?.hash.clone());
            self.mine(&mut block);
            self.blocks.push(block);
            Ok(&self.blocks[index])
        }

        /// Integrity predicate over every non-genesis block: the stored
        /// hash matches a recomputation, the previous-hash link holds,
        /// and the PoW prefix is present. Genesis is trusted by
        /// construction and skipped. Never an error: tampering is a
        /// `false`, not a failure.
        pub fn validate(&self) -> bool {
            for i in 1..self.blocks.len() {
                let current = &self.blocks[i];
                let previous = &self.blocks[i - 1];
                if current.hash != current.compute_hash() {
                    return false;
                }
                if current.previous_hash != previous.hash {
                    return false;
                }
                if !meets_difficulty(&current.hash, self.difficulty) {
                    return false;
                }
            }
            true
        }
    }

    /// The fixed first block: index 0, marker payload, sentinel previous
    /// hash. Exempt from the PoW check in `validate`.
    pub fn genesis_block() -> Block {
        Block::new(
            0,
            json!({ "message": "Genesis block" }),
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }
}
