//! The mutable game state the search walks: placement, side to move,
//! castling rights, en-passant target, cached king squares, the running
//! Zobrist hash and the undo history.

use log::debug;
use thiserror::Error;

use crate::board::Board;
use crate::move_gen::{generate_legal_moves, MoveList};
use crate::types::*;
use crate::zobrist::{full_hash, ZOBRIST};

/// Rejected coordinate-notation moves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("malformed move: {0:?}")]
    Malformed(String),
    #[error("illegal move in this position: {0}")]
    Illegal(String),
}

/// Outcome of the position for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Checkmate,
    Stalemate,
    /// Only the two kings are left.
    ForcedDraw,
}

impl GameStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Ongoing)
    }
}

/// Everything `undo_move` restores verbatim. `mv` is `None` for a null move.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct HistoryEntry {
    mv: Option<Move>,
    castling: CastlingRights,
    en_passant: Option<Square>,
    hash: u64,
    halfmove_clock: u16,
    fullmove_number: u16,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Position {
    board: Board,
    turn: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    king_squares: [Square; 2],
    /// Half-moves since the last capture or pawn move (informational only)
    halfmove_clock: u16,
    /// Full move number (incremented after Black's move)
    fullmove_number: u16,
    hash: u64,
    history: Vec<HistoryEntry>,
}

impl Position {
    /// Creates a new game in the starting position.
    pub fn new() -> Self {
        let mut position = Self {
            board: Board::starting_position(),
            turn: Color::White,
            castling: CastlingRights::all(),
            en_passant: None,
            king_squares: [Square::E1, Square::E8],
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
            history: Vec::new(),
        };
        position.hash = full_hash(&position);
        position
    }

    /// Builds a position from already-validated parts. Fails with the
    /// offending color unless each side has exactly one king.
    pub(crate) fn from_parts(
        board: Board,
        turn: Color,
        castling: CastlingRights,
        en_passant: Option<Square>,
        halfmove_clock: u16,
        fullmove_number: u16,
    ) -> Result<Self, Color> {
        let mut king_squares = [Square::A1; 2];
        for color in Color::ALL {
            let mut kings = board.squares_of(Piece::new(PieceType::King, color));
            match (kings.next(), kings.next()) {
                (Some(square), None) => king_squares[color.index()] = square,
                _ => return Err(color),
            }
        }

        let mut position = Self {
            board,
            turn,
            castling,
            en_passant,
            king_squares,
            halfmove_clock,
            fullmove_number,
            hash: 0,
            history: Vec::new(),
        };
        position.hash = full_hash(&position);
        Ok(position)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.board.piece_at(square)
    }

    /// Returns the side to move.
    pub fn side_to_move(&self) -> Color {
        self.turn
    }

    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    /// Cached king location; always matches the board.
    pub fn king_square(&self, color: Color) -> Square {
        self.king_squares[color.index()]
    }

    /// Incrementally maintained Zobrist hash.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u16 {
        self.fullmove_number
    }

    /// Number of moves (including null moves) that `undo_move` can take back.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// All legal moves for the side to move.
    pub fn legal_moves(&self) -> MoveList {
        generate_legal_moves(self)
    }

    /// Returns true if `square` is attacked by `by_side`.
    pub fn is_square_attacked(&self, square: Square, by_side: Color) -> bool {
        self.board.is_attacked_by(square, by_side)
    }

    /// Returns true if the side to move is in check.
    pub fn in_check(&self) -> bool {
        self.is_side_in_check(self.turn)
    }

    /// Returns true if the given side's king is attacked.
    pub fn is_side_in_check(&self, color: Color) -> bool {
        self.is_square_attacked(self.king_square(color), color.opponent())
    }

    /// True when nothing but the two kings is left.
    pub fn is_bare_kings(&self) -> bool {
        self.board
            .pieces()
            .all(|(_, piece)| piece.piece_type == PieceType::King)
    }

    pub fn status(&self) -> GameStatus {
        if self.legal_moves().is_empty() {
            if self.in_check() {
                GameStatus::Checkmate
            } else {
                GameStatus::Stalemate
            }
        } else if self.is_bare_kings() {
            GameStatus::ForcedDraw
        } else {
            GameStatus::Ongoing
        }
    }

    /// Would making `mv` leave the mover's king safe? Simulated on a copy of
    /// the placement so legality checks never touch `self`.
    pub(crate) fn leaves_king_safe(&self, mv: &Move) -> bool {
        let mut board = self.board.clone();
        if mv.captured.is_some() {
            board.set_piece(mv.capture_square(), None);
        }
        board.move_piece(mv.from, mv.to);
        if let Some(side) = mv.castle_side() {
            let (rook_from, rook_to) = side.rook_squares(mv.piece.color);
            board.move_piece(rook_from, rook_to);
        }

        let king = if mv.piece.piece_type == PieceType::King {
            mv.to
        } else {
            self.king_square(mv.piece.color)
        };
        !board.is_attacked_by(king, mv.piece.color.opponent())
    }

    /// Plays `mv`, which must be one of `legal_moves()`. Every feature the
    /// move touches is XORed in or out of the hash as it changes.
    pub fn make_move(&mut self, mv: Move) {
        let keys = &*ZOBRIST;
        let us = self.turn;
        debug_assert_eq!(mv.piece.color, us, "moving the opponent's piece");

        self.history.push(HistoryEntry {
            mv: Some(mv),
            castling: self.castling,
            en_passant: self.en_passant,
            hash: self.hash,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        });

        let mut hash = self.hash;

        self.board.set_piece(mv.from, None);
        hash ^= keys.piece_square_key(mv.piece, mv.from);

        if let Some(captured) = mv.captured {
            let square = mv.capture_square();
            self.board.set_piece(square, None);
            hash ^= keys.piece_square_key(captured, square);
        }

        let placed = if mv.piece.piece_type == PieceType::Pawn
            && mv.to.rank() == us.promotion_rank()
        {
            Piece::new(mv.promotion.unwrap_or(PieceType::Queen), us)
        } else {
            mv.piece
        };
        self.board.set_piece(mv.to, Some(placed));
        hash ^= keys.piece_square_key(placed, mv.to);

        if let Some(side) = mv.castle_side() {
            let (rook_from, rook_to) = side.rook_squares(us);
            if let Some(rook) = self.board.take(rook_from) {
                self.board.set_piece(rook_to, Some(rook));
                hash ^= keys.piece_square_key(rook, rook_from);
                hash ^= keys.piece_square_key(rook, rook_to);
            }
        }

        if mv.piece.piece_type == PieceType::King {
            self.king_squares[us.index()] = mv.to;
        }

        let castling = self.castling.update_after_move(&mv);
        hash ^= keys.castling_delta(self.castling, castling);
        self.castling = castling;

        let en_passant = if mv.is_double_push() {
            mv.from.offset(0, us.pawn_direction())
        } else {
            None
        };
        hash ^= keys.en_passant_key(self.en_passant);
        hash ^= keys.en_passant_key(en_passant);
        self.en_passant = en_passant;

        if mv.piece.piece_type == PieceType::Pawn || mv.is_capture() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if us == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }

        self.turn = us.opponent();
        hash ^= keys.side_key();
        self.hash = hash;
    }

    /// Passes the turn without moving. Used by null-move pruning; taken
    /// back with `undo_move` like any other move.
    pub fn make_null_move(&mut self) {
        let keys = &*ZOBRIST;
        self.history.push(HistoryEntry {
            mv: None,
            castling: self.castling,
            en_passant: self.en_passant,
            hash: self.hash,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        });

        self.hash ^= keys.en_passant_key(self.en_passant);
        self.en_passant = None;
        self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        self.turn = self.turn.opponent();
        self.hash ^= keys.side_key();
    }

    /// Takes back the most recent move from the history snapshot.
    /// Does nothing when there is no history.
    pub fn undo_move(&mut self) {
        let Some(entry) = self.history.pop() else {
            debug!("undo_move with empty history ignored");
            return;
        };

        self.turn = self.turn.opponent();

        if let Some(mv) = entry.mv {
            let us = self.turn;
            self.board.set_piece(mv.to, None);
            self.board.set_piece(mv.from, Some(mv.piece));
            if let Some(captured) = mv.captured {
                self.board.set_piece(mv.capture_square(), Some(captured));
            }
            if let Some(side) = mv.castle_side() {
                let (rook_from, rook_to) = side.rook_squares(us);
                if let Some(rook) = self.board.take(rook_to) {
                    self.board.set_piece(rook_from, Some(rook));
                }
            }
            if mv.piece.piece_type == PieceType::King {
                self.king_squares[us.index()] = mv.from;
            }
        }

        self.castling = entry.castling;
        self.en_passant = entry.en_passant;
        self.hash = entry.hash;
        self.halfmove_clock = entry.halfmove_clock;
        self.fullmove_number = entry.fullmove_number;
    }

    /// Resolves coordinate notation (`e2e4`, `e7e8q`) against the legal
    /// moves. A promotion without a letter means a queen.
    pub fn parse_uci_move(&self, text: &str) -> Result<Move, MoveError> {
        let malformed = || MoveError::Malformed(text.to_string());
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return Err(malformed());
        }

        let from: Square = text[0..2].parse().map_err(|_| malformed())?;
        let to: Square = text[2..4].parse().map_err(|_| malformed())?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(c) => match PieceType::from_char(c) {
                Some(pt) if PieceType::PROMOTIONS.contains(&pt) => Some(pt),
                _ => return Err(malformed()),
            },
        };

        self.legal_moves()
            .iter()
            .find(|mv| {
                mv.from == from
                    && mv.to == to
                    && (mv.promotion == promotion
                        || (promotion.is_none() && mv.promotion == Some(PieceType::Queen)))
            })
            .copied()
            .ok_or_else(|| MoveError::Illegal(text.to_string()))
    }

    /// Parses and plays a coordinate-notation move. On error nothing changes.
    pub fn apply_uci_move(&mut self, text: &str) -> Result<Move, MoveError> {
        let mv = self.parse_uci_move(text)?;
        self.make_move(mv);
        Ok(mv)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    fn play(position: &mut Position, moves: &[&str]) {
        for text in moves {
            position.apply_uci_move(text).unwrap();
        }
    }

    #[test]
    fn test_starting_position() {
        let position = Position::new();
        assert_eq!(position.side_to_move(), Color::White);
        assert_eq!(position.castling(), CastlingRights::all());
        assert!(position.en_passant().is_none());
        assert_eq!(position.halfmove_clock(), 0);
        assert_eq!(position.fullmove_number(), 1);
        assert_eq!(position.king_square(Color::White), Square::E1);
        assert_eq!(position.king_square(Color::Black), Square::E8);
        assert_eq!(position.hash(), full_hash(&position));
    }

    #[test]
    fn test_apply_pawn_move() {
        let mut position = Position::new();
        position.apply_uci_move("e2e4").unwrap();

        assert_eq!(position.side_to_move(), Color::Black);
        assert_eq!(position.en_passant(), Some(sq("e3")));
        assert_eq!(position.halfmove_clock(), 0);
        assert_eq!(position.fullmove_number(), 1);
        assert_eq!(position.hash(), full_hash(&position));

        position.apply_uci_move("g8f6").unwrap();
        assert!(position.en_passant().is_none());
        assert_eq!(position.fullmove_number(), 2);
        assert_eq!(position.halfmove_clock(), 1);
    }

    #[test]
    fn test_undo_restores_everything() {
        let mut position = Position::new();
        let original = position.clone();
        play(&mut position, &["e2e4", "d7d5", "e4d5", "d8d5", "b1c3"]);
        for _ in 0..5 {
            position.undo_move();
        }
        assert_eq!(position, original);
    }

    #[test]
    fn test_undo_restores_saturated_fullmove_number() {
        let mut position = Position::from_fen("4k3/8/8/8/8/8/8/4K3 b - - 0 65535").unwrap();
        let original = position.clone();

        play(&mut position, &["e8d8"]);
        assert_eq!(position.fullmove_number(), u16::MAX);
        position.undo_move();
        assert_eq!(position.fullmove_number(), u16::MAX);
        assert_eq!(position, original);
    }

    #[test]
    fn test_undo_on_empty_history_is_noop() {
        let mut position = Position::new();
        let original = position.clone();
        position.undo_move();
        assert_eq!(position, original);
    }

    #[test]
    fn test_illegal_move_leaves_state_unchanged() {
        let mut position = Position::new();
        let original = position.clone();

        assert_eq!(
            position.apply_uci_move("e2e5"),
            Err(MoveError::Illegal("e2e5".to_string()))
        );
        assert!(matches!(
            position.apply_uci_move("zz"),
            Err(MoveError::Malformed(_))
        ));
        assert!(matches!(
            position.apply_uci_move("e7e8x"),
            Err(MoveError::Malformed(_))
        ));
        assert_eq!(position, original);
    }

    #[test]
    fn test_fools_mate_is_checkmate() {
        let mut position = Position::new();
        play(&mut position, &["f2f3", "e7e5", "g2g4", "d8h4"]);

        assert!(position.legal_moves().is_empty());
        assert!(position.in_check());
        assert_eq!(position.status(), GameStatus::Checkmate);
    }

    #[test]
    fn test_castling_moves_rook_and_updates_rights() {
        let mut position = Position::new();
        play(&mut position, &["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6"]);
        let before = position.clone();

        let castle = position.apply_uci_move("e1g1").unwrap();
        assert_eq!(castle.castle_side(), Some(CastleSide::Kingside));
        assert_eq!(
            position.piece_at(Square::F1),
            Some(Piece::new(PieceType::Rook, Color::White))
        );
        assert!(position.piece_at(Square::H1).is_none());
        assert_eq!(position.king_square(Color::White), Square::G1);
        assert_eq!(position.castling().white, SideCastlingRights::none());
        assert_eq!(position.castling().black, SideCastlingRights::both());
        assert_eq!(position.hash(), full_hash(&position));

        position.undo_move();
        assert_eq!(position, before);
    }

    #[test]
    fn test_rook_move_revokes_one_wing_and_undo_restores() {
        let mut position = Position::new();
        play(&mut position, &["h2h4", "a7a5"]);
        let before = position.castling();

        position.apply_uci_move("h1h3").unwrap();
        assert!(!position.castling().white.kingside);
        assert!(position.castling().white.queenside);
        assert_eq!(position.castling().black, before.black);

        position.apply_uci_move("a8a6").unwrap();
        assert!(!position.castling().black.queenside);
        assert!(position.castling().black.kingside);

        position.undo_move();
        position.undo_move();
        assert_eq!(position.castling(), before);
    }

    #[test]
    fn test_king_move_revokes_both_wings() {
        let mut position = Position::new();
        play(&mut position, &["e2e4", "e7e5"]);
        position.apply_uci_move("e1e2").unwrap();
        assert_eq!(position.castling().white, SideCastlingRights::none());
        assert_eq!(position.king_square(Color::White), sq("e2"));

        position.undo_move();
        assert_eq!(position.castling(), CastlingRights::all());
        assert_eq!(position.king_square(Color::White), Square::E1);
    }

    #[test]
    fn test_en_passant_capture() {
        let mut position = Position::new();
        play(&mut position, &["e2e4", "a7a6", "e4e5", "d7d5"]);
        assert_eq!(position.en_passant(), Some(sq("d6")));

        let en_passant: Vec<Move> = position
            .legal_moves()
            .iter()
            .filter(|mv| mv.is_en_passant())
            .copied()
            .collect();
        assert_eq!(en_passant.len(), 1);
        assert_eq!(en_passant[0].to_string(), "e5d6");

        let before = position.clone();
        position.make_move(en_passant[0]);
        assert!(position.piece_at(sq("d5")).is_none());
        assert_eq!(
            position.piece_at(sq("d6")),
            Some(Piece::new(PieceType::Pawn, Color::White))
        );
        assert_eq!(position.hash(), full_hash(&position));

        position.undo_move();
        assert_eq!(position, before);
        assert_eq!(
            position.piece_at(sq("d5")),
            Some(Piece::new(PieceType::Pawn, Color::Black))
        );
    }

    #[test]
    fn test_promotion_defaults_to_queen() {
        let mut position = Position::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let mv = position.apply_uci_move("a7a8").unwrap();
        assert_eq!(mv.promotion, Some(PieceType::Queen));
        assert_eq!(
            position.piece_at(Square::A8),
            Some(Piece::new(PieceType::Queen, Color::White))
        );
        assert_eq!(position.hash(), full_hash(&position));

        position.undo_move();
        position.apply_uci_move("a7a8n").unwrap();
        assert_eq!(
            position.piece_at(Square::A8),
            Some(Piece::new(PieceType::Knight, Color::White))
        );
    }

    #[test]
    fn test_null_move_round_trip() {
        let mut position = Position::new();
        position.apply_uci_move("e2e4").unwrap();
        let before = position.clone();

        position.make_null_move();
        assert_eq!(position.side_to_move(), Color::White);
        assert!(position.en_passant().is_none());
        assert_eq!(position.hash(), full_hash(&position));

        position.undo_move();
        assert_eq!(position, before);
    }

    #[test]
    fn test_stalemate_and_bare_kings() {
        let stalemate = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(!stalemate.in_check());
        assert_eq!(stalemate.status(), GameStatus::Stalemate);

        let bare = Position::from_fen("8/8/4k3/8/8/3K4/8/8 w - - 0 1").unwrap();
        assert_eq!(bare.status(), GameStatus::ForcedDraw);
        assert!(bare.status().is_terminal());
    }
}
