/// Reorg Manager
///
/// Keeps a sliding window of `(number -> hash)` for the most recently recorded
/// canonical blocks and uses it to detect when a freshly fetched block's
/// parent hash disagrees with what was previously recorded, then walks the
/// remote chain backward to find where the two views still agree.
use std::collections::HashMap;

use crate::rpc::Client;
use crate::types::{normalize_hex, Block};

pub struct ReorgManager {
    depth: u64,
    by_num: HashMap<u64, String>,
    highest: u64,
}

impl ReorgManager {
    pub fn new(depth: u64) -> Self {
        ReorgManager {
            depth,
            by_num: HashMap::new(),
            highest: 0,
        }
    }

    pub fn highest(&self) -> u64 {
        self.highest
    }

    pub fn len(&self) -> usize {
        self.by_num.len()
    }

    /// No prior history is trivially consistent.
    pub fn parent_ok(&self, block: &Block) -> bool {
        if self.highest == 0 {
            return true;
        }
        let parent_num = match block.number.checked_sub(1) {
            Some(n) => n,
            None => return true,
        };
        match self.by_num.get(&parent_num) {
            None => true,
            Some(hash) => normalize_hex(hash) == normalize_hex(&block.parent_hash),
        }
    }

    pub fn record(&mut self, block: &Block) {
        self.by_num.insert(block.number, normalize_hex(&block.hash));
        if block.number > self.highest {
            self.highest = block.number;
        }
        let floor = self.highest.saturating_sub(self.depth);
        self.by_num.retain(|&num, _| num >= floor);
    }

    pub fn reset_above(&mut self, n: u64) {
        self.by_num.retain(|&num, _| num <= n);
        self.highest = n;
    }

    /// Walk the remote chain backward from `(head_hash, head_num)` looking for
    /// a number whose recorded hash still matches the remote view. Returns
    /// `None` if no agreement is found within `depth` steps (reorg deeper
    /// than the window — caller logs and defers).
    pub async fn common_ancestor<C: Client>(
        &self,
        client: &C,
        head_hash: &str,
        head_num: u64,
    ) -> Option<(u64, String)> {
        let head_hash = normalize_hex(head_hash);
        if self.by_num.get(&head_num).map(|h| normalize_hex(h)) == Some(head_hash.clone()) {
            return Some((head_num, head_hash));
        }

        let mut cur_hash = head_hash;
        let mut cur_num = head_num;
        for _ in 0..self.depth {
            let block = match client.get_block_by_hash(&cur_hash, false).await {
                Ok(b) => b,
                Err(_) => return None,
            };
            cur_num = match cur_num.checked_sub(1) {
                Some(n) => n,
                None => return None,
            };
            cur_hash = normalize_hex(&block.parent_hash);
            if self.by_num.get(&cur_num).map(|h| normalize_hex(h)) == Some(cur_hash.clone()) {
                return Some((cur_num, cur_hash));
            }
        }
        None
    }
}
