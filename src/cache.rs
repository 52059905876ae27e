//! Per-instance memoisation of host queries.
//!
//! The tx context is fetched once per execution. Block and blob hashes are
//! keyed lookups. Keccak digests, code hashes and calldata windows are
//! interned in boxed storage because the runtime function table returns
//! pointers into them; boxing keeps those pointers stable while the maps
//! grow.

use crate::host::{Host, TxContext};
use ethereum_types::H256;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct ExecutionCache {
    tx_context: Option<TxContext>,
    block_hashes: FxHashMap<u64, Box<[u8; 32]>>,
    blob_hashes: FxHashMap<u64, Box<[u8; 32]>>,
    /// 32-byte calldata windows, keyed by (message depth, offset).
    calldata_words: FxHashMap<(u32, u64), Box<[u8; 32]>>,
    /// Keccak digests and code hashes whose addresses must outlive the
    /// opcode that produced them.
    interned: Vec<Box<[u8; 32]>>,
}

impl ExecutionCache {
    /// The transaction context, fetched from the host on first use and never
    /// invalidated within an execution.
    pub fn tx_context(&mut self, host: &dyn Host) -> &TxContext {
        self.tx_context.get_or_insert_with(|| host.get_tx_context())
    }

    pub fn block_hash(&mut self, host: &dyn Host, block_number: u64) -> &[u8; 32] {
        self.block_hashes
            .entry(block_number)
            .or_insert_with(|| Box::new(host.get_block_hash(block_number).0))
    }

    pub fn blob_hash(&mut self, host: &dyn Host, index: u64) -> &[u8; 32] {
        if !self.blob_hashes.contains_key(&index) {
            let hashes = &self.tx_context(host).blob_hashes;
            let hash = hashes
                .get(usize::try_from(index).unwrap_or(usize::MAX))
                .copied()
                .unwrap_or_else(H256::zero);
            self.blob_hashes.insert(index, Box::new(hash.0));
        }
        #[expect(clippy::unwrap_used, reason = "inserted above")]
        self.blob_hashes.get(&index).unwrap()
    }

    pub fn calldata_word(
        &mut self,
        depth: u32,
        offset: u64,
        calldata: &[u8],
    ) -> &[u8; 32] {
        self.calldata_words.entry((depth, offset)).or_insert_with(|| {
            let mut word = [0u8; 32];
            if let Ok(offset) = usize::try_from(offset) {
                if let Some(data) = calldata.get(offset..) {
                    let len = data.len().min(32);
                    #[expect(clippy::indexing_slicing, reason = "len bounded above")]
                    word[..len].copy_from_slice(&data[..len]);
                }
            }
            Box::new(word)
        })
    }

    /// Stores a 32-byte result and returns a pointer that stays valid for
    /// the rest of the execution.
    pub fn intern(&mut self, bytes: [u8; 32]) -> &[u8; 32] {
        self.interned.push(Box::new(bytes));
        #[expect(clippy::unwrap_used, reason = "pushed above")]
        self.interned.last().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calldata_window_zero_pads() {
        let mut cache = ExecutionCache::default();
        let word = cache.calldata_word(0, 1, &[0xaa, 0xbb, 0xcc]);
        assert_eq!(word[0], 0xbb);
        assert_eq!(word[1], 0xcc);
        assert_eq!(word[2], 0);
        let word = cache.calldata_word(0, 100, &[0xaa]);
        assert_eq!(*word, [0u8; 32]);
    }

    #[test]
    fn interned_pointers_survive_growth() {
        let mut cache = ExecutionCache::default();
        let first = cache.intern([1u8; 32]) as *const [u8; 32];
        for i in 0..100 {
            cache.intern([i; 32]);
        }
        // The first box has not moved.
        assert_eq!(unsafe { (*first)[0] }, 1);
    }
}
