use chess_core::Move;
use log::debug;

/// Largest table `new` will allocate.
pub const MAX_SIZE_MB: usize = 1024;

/// Type of node in the search tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Exact score (PV-node)
    Exact,
    /// Lower bound (fail-high node)
    LowerBound,
    /// Upper bound (fail-low node)
    UpperBound,
}

/// Entry in the transposition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranspositionEntry {
    /// Zobrist hash of the position (for collision detection)
    pub hash: u64,
    /// Best move found at this position
    pub best_move: Option<Move>,
    /// Evaluation score
    pub score: i32,
    /// Search depth
    pub depth: u8,
    /// Type of node (exact, lower bound, upper bound)
    pub node_type: NodeType,
}

/// Transposition table for caching search results.
///
/// Indexed by the low bits of the Zobrist hash, one entry per slot. Two
/// positions sharing a full 64-bit hash are indistinguishable here; that is
/// an accepted approximation, not an error.
pub struct TranspositionTable {
    entries: Vec<Option<TranspositionEntry>>,
    /// Size mask (size must be power of 2)
    size_mask: usize,
    size_mb: usize,
}

/// Slots fitting in `size_mb`, rounded down to a power of two.
fn slot_count(size_mb: usize) -> usize {
    let entry_size = std::mem::size_of::<Option<TranspositionEntry>>();
    let num_entries = (size_mb.clamp(1, MAX_SIZE_MB) * 1024 * 1024 / entry_size).max(1);
    if num_entries.is_power_of_two() {
        num_entries
    } else {
        num_entries.next_power_of_two() / 2
    }
}

impl TranspositionTable {
    /// Creates a new transposition table with the given size in MB,
    /// clamped to `1..=MAX_SIZE_MB`.
    pub fn new(size_mb: usize) -> Self {
        let size_mb = size_mb.clamp(1, MAX_SIZE_MB);
        let size = slot_count(size_mb);
        debug!("transposition table: {size_mb} MB, {size} entries");

        Self {
            entries: vec![None; size],
            size_mask: size - 1,
            size_mb,
        }
    }

    pub fn size_mb(&self) -> usize {
        self.size_mb
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn index(&self, hash: u64) -> usize {
        hash as usize & self.size_mask
    }

    /// Stores an entry. A slot already holding the same position is only
    /// overwritten by a search at least as deep.
    pub fn store(
        &mut self,
        hash: u64,
        best_move: Option<Move>,
        score: i32,
        depth: u8,
        node_type: NodeType,
    ) {
        let index = self.index(hash);
        let slot = &mut self.entries[index];

        if let Some(existing) = slot {
            if existing.hash == hash && existing.depth > depth {
                return;
            }
        }

        *slot = Some(TranspositionEntry {
            hash,
            best_move,
            score,
            depth,
            node_type,
        });
    }

    /// Probes the transposition table for a position.
    pub fn probe(&self, hash: u64) -> Option<TranspositionEntry> {
        self.entries[self.index(hash)].filter(|entry| entry.hash == hash)
    }

    /// Clears the transposition table.
    pub fn clear(&mut self) {
        self.entries.fill(None);
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new(16)
    }
}
