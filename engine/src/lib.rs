pub mod evaluation;
pub mod ordering;
pub mod search;
pub mod transposition;

pub use evaluation::*;
pub use ordering::{HistoryTable, KillerTable, MAX_PLY};
pub use search::*;
pub use transposition::{NodeType, TranspositionEntry, TranspositionTable, MAX_SIZE_MB};
