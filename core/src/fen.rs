//! FEN (Forsyth-Edwards Notation) parsing and serialization.

use log::debug;
use thiserror::Error;

use crate::board::Board;
use crate::position::Position;
use crate::types::{CastleSide, CastlingRights, Color, File, Piece, PieceType, Rank, Square};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("invalid FEN format: {0}")]
    InvalidFormat(String),
    #[error("invalid piece character: '{0}'")]
    InvalidPiece(char),
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("invalid castling rights: {0}")]
    InvalidCastling(String),
    #[error("invalid en passant square: {0}")]
    InvalidEnPassant(String),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("{0:?} must have exactly one king")]
    InvalidKings(Color),
    #[error("{0:?} is in check but not to move")]
    KingCapturable(Color),
}

impl Position {
    /// Parses a FEN string. The halfmove and fullmove fields may be omitted
    /// and default to `0 1`.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();

        if parts.len() != 4 && parts.len() != 6 {
            return Err(FenError::InvalidFormat(format!(
                "expected 4 or 6 fields, got {}",
                parts.len()
            )));
        }

        let board = parse_board(parts[0])?;

        let turn = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(FenError::InvalidColor(parts[1].to_string())),
        };

        let castling = sanitize_castling(&board, parse_castling(parts[2])?);
        let en_passant = parse_en_passant(parts[3], turn)?;

        let (halfmove_clock, fullmove_number) = match parts.get(4..6) {
            Some(&[halfmove, fullmove]) => (parse_number(halfmove)?, parse_number(fullmove)?),
            _ => (0, 1),
        };

        let position = Position::from_parts(
            board,
            turn,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        )
        .map_err(FenError::InvalidKings)?;

        let waiting = turn.opponent();
        if position.is_side_in_check(waiting) {
            return Err(FenError::KingCapturable(waiting));
        }
        Ok(position)
    }

    /// Converts the position to a six-field FEN string.
    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            board_to_fen(self.board()),
            if self.side_to_move() == Color::White { "w" } else { "b" },
            castling_to_fen(self.castling()),
            self.en_passant()
                .map_or_else(|| "-".to_string(), |square| square.to_string()),
            self.halfmove_clock(),
            self.fullmove_number()
        )
    }
}

fn parse_number(field: &str) -> Result<u16, FenError> {
    field
        .parse::<u16>()
        .map_err(|_| FenError::InvalidNumber(field.to_string()))
}

/// Parses the board portion of a FEN string.
fn parse_board(board_str: &str) -> Result<Board, FenError> {
    let mut board = Board::empty();
    let ranks: Vec<&str> = board_str.split('/').collect();

    if ranks.len() != 8 {
        return Err(FenError::InvalidFormat(format!(
            "expected 8 ranks, got {}",
            ranks.len()
        )));
    }

    // FEN lists rank 8 first.
    for (rank, rank_str) in (0..8u8).rev().filter_map(Rank::new).zip(ranks) {
        let mut file_idx = 0u8;

        for ch in rank_str.chars() {
            if let Some(empty) = ch.to_digit(10).filter(|n| (1..=8).contains(n)) {
                file_idx += empty as u8;
            } else {
                let piece = Piece::from_char(ch).ok_or(FenError::InvalidPiece(ch))?;
                let file = File::new(file_idx).ok_or_else(|| {
                    FenError::InvalidFormat(format!("too many squares in rank {}", rank.to_char()))
                })?;
                board.set_piece(Square::new(file, rank), Some(piece));
                file_idx += 1;
            }

            if file_idx > 8 {
                return Err(FenError::InvalidFormat(format!(
                    "too many squares in rank {}",
                    rank.to_char()
                )));
            }
        }

        if file_idx != 8 {
            return Err(FenError::InvalidFormat(format!(
                "rank {} has {} squares, expected 8",
                rank.to_char(),
                file_idx
            )));
        }
    }

    Ok(board)
}

/// Converts a board to FEN notation.
fn board_to_fen(board: &Board) -> String {
    let mut fen = String::new();

    for rank in (0..8u8).rev().filter_map(Rank::new) {
        let mut empty_count = 0;

        for file in (0..8u8).filter_map(File::new) {
            match board.piece_at(Square::new(file, rank)) {
                Some(piece) => {
                    if empty_count > 0 {
                        fen.push_str(&empty_count.to_string());
                        empty_count = 0;
                    }
                    fen.push(piece.to_char());
                }
                None => empty_count += 1,
            }
        }

        if empty_count > 0 {
            fen.push_str(&empty_count.to_string());
        }
        if rank != Rank::FIRST {
            fen.push('/');
        }
    }

    fen
}

/// Parses castling rights from FEN notation.
fn parse_castling(castling_str: &str) -> Result<CastlingRights, FenError> {
    let mut rights = CastlingRights::none();
    if castling_str == "-" {
        return Ok(rights);
    }

    for ch in castling_str.chars() {
        match ch {
            'K' => rights.white.kingside = true,
            'Q' => rights.white.queenside = true,
            'k' => rights.black.kingside = true,
            'q' => rights.black.queenside = true,
            _ => return Err(FenError::InvalidCastling(castling_str.to_string())),
        }
    }

    Ok(rights)
}

/// Drops rights whose king or rook is not on its home square, so a
/// castling move never has to cope with a missing piece.
fn sanitize_castling(board: &Board, rights: CastlingRights) -> CastlingRights {
    let mut sanitized = rights;
    for color in Color::ALL {
        let king_home = match color {
            Color::White => Square::E1,
            Color::Black => Square::E8,
        };
        let king_home_ok = board.piece_at(king_home) == Some(Piece::new(PieceType::King, color));

        for side in [CastleSide::Kingside, CastleSide::Queenside] {
            if !rights.has(color, side) {
                continue;
            }
            let (rook_home, _) = side.rook_squares(color);
            let rook_home_ok =
                board.piece_at(rook_home) == Some(Piece::new(PieceType::Rook, color));
            if !(king_home_ok && rook_home_ok) {
                debug!("dropping {color:?} {side:?} castling right: pieces not on home squares");
                sanitized.revoke(color, side);
            }
        }
    }
    sanitized
}

/// Converts castling rights to FEN notation.
fn castling_to_fen(castling: CastlingRights) -> String {
    let s: String = ['K', 'Q', 'k', 'q']
        .into_iter()
        .zip(castling.flags())
        .filter_map(|(ch, set)| set.then_some(ch))
        .collect();

    if s.is_empty() { "-".to_string() } else { s }
}

/// Parses the en-passant target. It must sit on the rank a double push of
/// the side that just moved would have crossed.
fn parse_en_passant(ep_str: &str, turn: Color) -> Result<Option<Square>, FenError> {
    if ep_str == "-" {
        return Ok(None);
    }

    let square: Square = ep_str
        .parse()
        .map_err(|_| FenError::InvalidEnPassant(ep_str.to_string()))?;
    let expected_rank = match turn {
        Color::White => Rank::SIXTH,
        Color::Black => Rank::THIRD,
    };
    if square.rank() != expected_rank {
        return Err(FenError::InvalidEnPassant(ep_str.to_string()));
    }

    Ok(Some(square))
}

/// Standard FEN positions for testing.
pub mod positions {
    /// Starting position.
    pub const STARTING: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Kiwipete position - good for testing complex positions.
    pub const KIWIPETE: &str =
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    /// Position after 1.e4 e5.
    pub const AFTER_E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zobrist::full_hash;

    #[test]
    fn test_parse_starting_position() {
        let position = Position::from_fen(positions::STARTING).unwrap();
        assert_eq!(position, Position::new());
        assert_eq!(position.fullmove_number(), 1);
        assert_eq!(position.halfmove_clock(), 0);
    }

    #[test]
    fn test_round_trip() {
        for fen in [positions::STARTING, positions::KIWIPETE, positions::AFTER_E4_E5] {
            assert_eq!(Position::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn test_four_field_fen_defaults_clocks() {
        let position =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -").unwrap();
        assert_eq!(position.to_fen(), positions::STARTING);
    }

    #[test]
    fn test_parse_kiwipete() {
        let position = Position::from_fen(positions::KIWIPETE).unwrap();
        assert_eq!(position.side_to_move(), Color::White);
        assert_eq!(
            position.piece_at(Square::E1),
            Some(Piece::new(PieceType::King, Color::White))
        );
        assert_eq!(position.castling(), CastlingRights::all());
        assert_eq!(position.hash(), full_hash(&position));
    }

    #[test]
    fn test_parse_en_passant() {
        let position = Position::from_fen(positions::AFTER_E4_E5).unwrap();
        assert_eq!(position.en_passant(), Some("e6".parse().unwrap()));

        // e6 cannot be a target when Black is to move
        assert!(matches!(
            Position::from_fen("rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e6 0 2"),
            Err(FenError::InvalidEnPassant(_))
        ));
    }

    #[test]
    fn test_castling_rights_without_rook_are_dropped() {
        let position = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w KQ - 0 1").unwrap();
        assert!(position.castling().white.kingside);
        assert!(!position.castling().white.queenside);
        assert_eq!(position.to_fen(), "4k3/8/8/8/8/8/8/4K2R w K - 0 1");
    }

    #[test]
    fn test_invalid_fen() {
        assert!(Position::from_fen("invalid").is_err());
        assert!(Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR").is_err());
        assert_eq!(
            Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1"),
            Err(FenError::InvalidColor("x".to_string()))
        );
        assert_eq!(
            Position::from_fen("rnbqkbnr/ppppxppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::InvalidPiece('x'))
        );
        assert!(matches!(
            Position::from_fen("rnbqkbnr/ppppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::InvalidFormat(_))
        ));
        assert!(matches!(
            Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - x 1"),
            Err(FenError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_king_count_is_validated() {
        assert_eq!(
            Position::from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::InvalidKings(Color::Black))
        );
        assert_eq!(
            Position::from_fen("4k3/8/8/8/8/8/8/3KK3 w - - 0 1"),
            Err(FenError::InvalidKings(Color::White))
        );
    }

    #[test]
    fn test_king_of_waiting_side_cannot_be_in_check() {
        assert_eq!(
            Position::from_fen("4k2R/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::KingCapturable(Color::Black))
        );
        assert_eq!(
            Position::from_fen("4k3/8/8/8/8/8/8/r3K3 b - - 0 1"),
            Err(FenError::KingCapturable(Color::White))
        );
        // The side to move may be in check
        let position = Position::from_fen("4k2R/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert!(position.in_check());
        assert!(position
            .legal_moves()
            .iter()
            .all(|mv| mv.captured.map(|p| p.piece_type) != Some(PieceType::King)));
    }
}
