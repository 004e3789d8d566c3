pub mod board;
pub mod fen;
pub mod move_gen;
pub mod perft;
pub mod position;
pub mod types;
pub mod zobrist;

pub use board::Board;
pub use fen::{positions, FenError};
pub use move_gen::*;
pub use perft::{perft, perft_detailed, perft_divide, PerftResults};
pub use position::{GameStatus, MoveError, Position};
pub use types::*;
pub use zobrist::{full_hash, ZOBRIST};
