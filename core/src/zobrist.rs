use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::position::Position;
use crate::types::{CastlingRights, Piece, Square};

/// Seed for the key table. Fixed so hashes are reproducible between runs.
const ZOBRIST_SEED: u64 = 0x0123_4567_89AB_CDEF;

/// Zobrist hashing for chess positions.
/// Uses pre-computed random numbers for each piece-square combination.
///
/// Two different positions can share a hash; search treats that as an
/// accepted approximation rather than an error.
#[derive(Debug, Clone)]
pub struct ZobristKeys {
    /// Random values for each piece type, color, and square
    piece_square: [[[u64; 64]; 6]; 2],
    /// Random value for side to move (XOR when black to move)
    black_to_move: u64,
    /// One key per castling flag: white K, white Q, black K, black Q
    castling: [u64; 4],
    /// Random values for en passant files
    en_passant: [u64; 8],
}

impl ZobristKeys {
    /// Creates the 12x64 + 4 + 8 + 1 keys from a seeded generator.
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);

        let mut piece_square = [[[0u64; 64]; 6]; 2];
        for color in piece_square.iter_mut() {
            for piece_type in color.iter_mut() {
                for key in piece_type.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let black_to_move: u64 = rng.gen();
        let castling: [u64; 4] = rng.gen();
        let en_passant: [u64; 8] = rng.gen();

        Self {
            piece_square,
            black_to_move,
            castling,
            en_passant,
        }
    }

    /// Gets the Zobrist key for a piece on a square.
    pub fn piece_square_key(&self, piece: Piece, square: Square) -> u64 {
        self.piece_square[piece.color.index()][piece.piece_type.index()][square.index() as usize]
    }

    /// The side-to-move key, toggled on every move.
    pub fn side_key(&self) -> u64 {
        self.black_to_move
    }

    /// XOR of the keys of every castling flag that is set.
    pub fn castling_key(&self, rights: CastlingRights) -> u64 {
        rights
            .flags()
            .iter()
            .zip(self.castling.iter())
            .filter(|(&set, _)| set)
            .fold(0, |acc, (_, &key)| acc ^ key)
    }

    /// Keys of the flags that differ between two rights sets.
    pub fn castling_delta(&self, before: CastlingRights, after: CastlingRights) -> u64 {
        self.castling_key(before) ^ self.castling_key(after)
    }

    /// Gets the Zobrist key for en passant square.
    pub fn en_passant_key(&self, square: Option<Square>) -> u64 {
        match square {
            Some(sq) => self.en_passant[sq.file().index() as usize],
            None => 0,
        }
    }
}

impl Default for ZobristKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// Global Zobrist keys instance.
/// Initialized once and shared across the application.
pub static ZOBRIST: LazyLock<ZobristKeys> = LazyLock::new(ZobristKeys::new);

/// Computes a position's hash from scratch. `Position` maintains the same
/// value incrementally; this is used at load time and to check it.
pub fn full_hash(position: &Position) -> u64 {
    let keys = &*ZOBRIST;
    let mut hash = position
        .board()
        .pieces()
        .fold(0, |acc, (square, piece)| acc ^ keys.piece_square_key(piece, square));

    if position.side_to_move() == crate::types::Color::Black {
        hash ^= keys.side_key();
    }
    hash ^= keys.castling_key(position.castling());
    hash ^= keys.en_passant_key(position.en_passant());
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, PieceType};
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_distinct() {
        let keys = ZobristKeys::new();
        let mut seen = HashSet::new();
        for color in Color::ALL {
            for piece_type in PieceType::ALL {
                for square in Square::all() {
                    let key = keys.piece_square_key(Piece::new(piece_type, color), square);
                    assert!(seen.insert(key));
                }
            }
        }
        assert!(seen.insert(keys.side_key()));
        assert_eq!(seen.len(), 12 * 64 + 1);
    }

    #[test]
    fn test_keys_are_reproducible() {
        let a = ZobristKeys::new();
        let b = ZobristKeys::new();
        assert_eq!(a.side_key(), b.side_key());
        assert_eq!(
            a.castling_key(CastlingRights::all()),
            b.castling_key(CastlingRights::all())
        );
    }

    #[test]
    fn test_castling_key_is_per_flag() {
        let keys = ZobristKeys::new();
        let mut rights = CastlingRights::all();
        let before = keys.castling_key(rights);
        rights.white.kingside = false;
        let after = keys.castling_key(rights);
        assert_eq!(keys.castling_delta(CastlingRights::all(), rights), before ^ after);
        assert_eq!(keys.castling_key(CastlingRights::none()), 0);
    }
}
