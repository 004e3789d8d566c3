use crate::board::{DIAGONALS, KING_DELTAS, KNIGHT_DELTAS, STRAIGHTS};
use crate::position::Position;
use crate::types::{CastleSide, Color, File, Move, Piece, PieceType, Square};

/// Upper bound on legal moves in any reachable position (218), rounded up.
const MAX_MOVES: usize = 256;

/// A list of moves with a fixed capacity to avoid allocations.
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; MAX_MOVES],
    count: usize,
}

impl MoveList {
    /// Creates an empty move list.
    pub const fn new() -> Self {
        Self {
            moves: [Move::NULL; MAX_MOVES],
            count: 0,
        }
    }

    /// Adds a move to the list.
    pub fn push(&mut self, mv: Move) {
        debug_assert!(self.count < MAX_MOVES, "Move list overflow");
        self.moves[self.count] = mv;
        self.count += 1;
    }

    /// Returns the number of moves.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns an iterator over the moves.
    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.as_slice().iter()
    }

    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.count]
    }

    /// Mutable view, used by move ordering to sort in place.
    pub fn as_mut_slice(&mut self) -> &mut [Move] {
        &mut self.moves[..self.count]
    }

    pub fn contains(&self, mv: &Move) -> bool {
        self.as_slice().contains(mv)
    }

    /// Keeps only the moves matching the predicate, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&Move) -> bool) {
        let mut kept = 0;
        for i in 0..self.count {
            if keep(&self.moves[i]) {
                self.moves[kept] = self.moves[i];
                kept += 1;
            }
        }
        self.count = kept;
    }

    /// Clears the move list.
    pub fn clear(&mut self) {
        self.count = 0;
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Pseudo-legal generator for one piece standing on a square.
type PieceGenerator = fn(&Position, Square, Piece, &mut MoveList);

/// Indexed by `PieceType::index()`.
const GENERATORS: [PieceGenerator; 6] = [
    generate_pawn_moves,
    generate_knight_moves,
    generate_bishop_moves,
    generate_rook_moves,
    generate_queen_moves,
    generate_king_moves,
];

/// Generates all legal moves for the current position.
pub fn generate_legal_moves(position: &Position) -> MoveList {
    let mut moves = generate_pseudo_legal_moves(position);
    moves.retain(|mv| position.leaves_king_safe(mv));
    moves
}

/// Legal captures and promotions only; the quiescence move set. Quiet
/// moves are dropped before the legality check.
pub fn generate_tactical_moves(position: &Position) -> MoveList {
    let mut moves = generate_pseudo_legal_moves(position);
    moves.retain(|mv| !mv.is_quiet() && position.leaves_king_safe(mv));
    moves
}

/// Generates all pseudo-legal moves (not checking for king safety).
fn generate_pseudo_legal_moves(position: &Position) -> MoveList {
    let mut moves = MoveList::new();
    let color = position.side_to_move();

    for (square, piece) in position.board().pieces() {
        if piece.color == color {
            GENERATORS[piece.piece_type.index()](position, square, piece, &mut moves);
        }
    }
    generate_castling_moves(position, color, &mut moves);

    moves
}

/// Pushes a pawn move, expanding it into the four promotions on the last rank.
fn push_pawn_move(
    moves: &mut MoveList,
    from: Square,
    to: Square,
    pawn: Piece,
    captured: Option<Piece>,
) {
    if to.rank() == pawn.color.promotion_rank() {
        for promotion in PieceType::PROMOTIONS {
            moves.push(Move::new_promotion(from, to, pawn, captured, promotion));
        }
    } else {
        moves.push(Move::new(from, to, pawn, captured));
    }
}

fn generate_pawn_moves(position: &Position, from: Square, pawn: Piece, moves: &mut MoveList) {
    let board = position.board();
    let color = pawn.color;
    let direction = color.pawn_direction();

    // Single push, then double push from the starting rank
    if let Some(to) = from.offset(0, direction) {
        if board.is_empty(to) {
            push_pawn_move(moves, from, to, pawn, None);

            if from.rank() == color.pawn_rank() {
                if let Some(double) = to.offset(0, direction) {
                    if board.is_empty(double) {
                        moves.push(Move::new(from, double, pawn, None));
                    }
                }
            }
        }
    }

    for df in [-1, 1] {
        let Some(to) = from.offset(df, direction) else {
            continue;
        };

        if let Some(target) = board.piece_at(to).filter(|p| p.color != color) {
            push_pawn_move(moves, from, to, pawn, Some(target));
        } else if position.en_passant() == Some(to) {
            let victim = Piece::new(PieceType::Pawn, color.opponent());
            let victim_square = Square::new(to.file(), from.rank());
            if board.piece_at(victim_square) == Some(victim) {
                moves.push(Move::new_en_passant(from, to, pawn, victim));
            }
        }
    }
}

/// Knight and king single steps.
fn generate_step_moves(
    position: &Position,
    from: Square,
    piece: Piece,
    deltas: &[(i8, i8)],
    moves: &mut MoveList,
) {
    let board = position.board();
    for &(df, dr) in deltas {
        if let Some(to) = from.offset(df, dr) {
            let target = board.piece_at(to);
            if target.is_none_or(|p| p.color != piece.color) {
                moves.push(Move::new(from, to, piece, target));
            }
        }
    }
}

/// Generates sliding piece moves along the given directions.
fn generate_sliding_moves(
    position: &Position,
    from: Square,
    piece: Piece,
    directions: &[(i8, i8)],
    moves: &mut MoveList,
) {
    let board = position.board();
    for &(df, dr) in directions {
        let mut current = from;
        while let Some(to) = current.offset(df, dr) {
            current = to;
            match board.piece_at(to) {
                None => moves.push(Move::new(from, to, piece, None)),
                Some(target) => {
                    if target.color != piece.color {
                        moves.push(Move::new(from, to, piece, Some(target)));
                    }
                    break; // Can't move past any piece
                }
            }
        }
    }
}

fn generate_knight_moves(position: &Position, from: Square, piece: Piece, moves: &mut MoveList) {
    generate_step_moves(position, from, piece, &KNIGHT_DELTAS, moves);
}

fn generate_bishop_moves(position: &Position, from: Square, piece: Piece, moves: &mut MoveList) {
    generate_sliding_moves(position, from, piece, &DIAGONALS, moves);
}

fn generate_rook_moves(position: &Position, from: Square, piece: Piece, moves: &mut MoveList) {
    generate_sliding_moves(position, from, piece, &STRAIGHTS, moves);
}

fn generate_queen_moves(position: &Position, from: Square, piece: Piece, moves: &mut MoveList) {
    generate_sliding_moves(position, from, piece, &DIAGONALS, moves);
    generate_sliding_moves(position, from, piece, &STRAIGHTS, moves);
}

/// Generates king moves (excluding castling).
fn generate_king_moves(position: &Position, from: Square, piece: Piece, moves: &mut MoveList) {
    generate_step_moves(position, from, piece, &KING_DELTAS, moves);
}

/// Files that must be empty, and files the king crosses, for each wing.
const fn castling_files(side: CastleSide) -> (&'static [u8], &'static [u8]) {
    match side {
        CastleSide::Kingside => (&[5, 6], &[5, 6]),
        CastleSide::Queenside => (&[1, 2, 3], &[2, 3]),
    }
}

/// Generates castling moves for the given color.
fn generate_castling_moves(position: &Position, color: Color, moves: &mut MoveList) {
    let rights = position.castling().get(color);
    if !rights.any() {
        return;
    }

    let board = position.board();
    let back_rank = color.back_rank();
    let king = Piece::new(PieceType::King, color);
    let king_square = position.king_square(color);
    let home = match color {
        Color::White => Square::E1,
        Color::Black => Square::E8,
    };
    if king_square != home || position.is_square_attacked(king_square, color.opponent()) {
        return;
    }

    let square_on = |file: u8| File::new(file).map(|f| Square::new(f, back_rank));

    for side in [CastleSide::Kingside, CastleSide::Queenside] {
        if !rights.has(side) {
            continue;
        }
        let (rook_from, _) = side.rook_squares(color);
        if board.piece_at(rook_from) != Some(Piece::new(PieceType::Rook, color)) {
            continue;
        }

        let (empty, crossed) = castling_files(side);
        let path_clear = empty
            .iter()
            .all(|&file| square_on(file).is_some_and(|sq| board.is_empty(sq)));
        let path_safe = crossed.iter().all(|&file| {
            square_on(file).is_some_and(|sq| !position.is_square_attacked(sq, color.opponent()))
        });

        if path_clear && path_safe {
            let target = match side {
                CastleSide::Kingside => home.offset(2, 0),
                CastleSide::Queenside => home.offset(-2, 0),
            };
            if let Some(to) = target {
                moves.push(Move::new_castle(king_square, to, king, side));
            }
        }
    }
}

/// Checks if the current position is checkmate.
pub fn is_checkmate(position: &Position) -> bool {
    position.in_check() && generate_legal_moves(position).is_empty()
}

/// Checks if the current position is stalemate.
pub fn is_stalemate(position: &Position) -> bool {
    !position.in_check() && generate_legal_moves(position).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves_of(fen: &str) -> MoveList {
        generate_legal_moves(&Position::from_fen(fen).unwrap())
    }

    fn names(moves: &MoveList) -> Vec<String> {
        let mut names: Vec<String> = moves.iter().map(|mv| mv.to_string()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_starting_position_moves() {
        let position = Position::new();
        let moves = generate_legal_moves(&position);

        // Starting position has exactly 20 legal moves
        assert_eq!(moves.len(), 20);
        assert!(moves.iter().all(|mv| mv.is_quiet()));
        assert!(generate_tactical_moves(&position).is_empty());
    }

    #[test]
    fn test_tactical_moves_are_legal_captures_and_promotions() {
        let position = Position::from_fen(crate::positions::KIWIPETE).unwrap();
        let mut expected = generate_legal_moves(&position);
        expected.retain(|mv| !mv.is_quiet());

        let tactical = generate_tactical_moves(&position);
        assert_eq!(tactical.as_slice(), expected.as_slice());
        assert_eq!(tactical.len(), 8);

        // A pinned piece's capture is left out
        let pinned = Position::from_fen("4r1k1/8/8/8/8/2p5/4N3/4K3 w - - 0 1").unwrap();
        assert!(generate_tactical_moves(&pinned).is_empty());
    }

    #[test]
    fn test_pawn_promotion() {
        let moves = moves_of("8/P6k/8/8/8/8/8/K7 w - - 0 1");

        let pawn_moves: Vec<String> = names(&moves)
            .into_iter()
            .filter(|name| name.starts_with("a7"))
            .collect();
        assert_eq!(pawn_moves, ["a7a8b", "a7a8n", "a7a8q", "a7a8r"]);
    }

    #[test]
    fn test_captures_record_victim() {
        let moves = moves_of("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1");
        let capture = moves
            .iter()
            .find(|mv| mv.to_string() == "e4d5")
            .copied()
            .unwrap();
        assert_eq!(
            capture.captured,
            Some(Piece::new(PieceType::Pawn, Color::Black))
        );
    }

    #[test]
    fn test_pinned_piece_cannot_move() {
        // Knight on e2 is pinned by the rook on e8.
        let moves = moves_of("4r1k1/8/8/8/8/8/4N3/4K3 w - - 0 1");
        assert!(moves.iter().all(|mv| mv.from != "e2".parse().unwrap()));
    }

    #[test]
    fn test_castling_through_attack_is_illegal() {
        // Black rook on f8 covers f1: kingside castling is out, queenside fine.
        let moves = names(&moves_of("5rk1/8/8/8/8/8/8/R3K2R w KQ - 0 1"));
        assert!(moves.contains(&"e1c1".to_string()));
        assert!(!moves.contains(&"e1g1".to_string()));
    }

    #[test]
    fn test_queenside_castling_allows_attacked_b_file() {
        // b1 attacked by the rook on b8, but the king never crosses it.
        let moves = names(&moves_of("1r4k1/8/8/8/8/8/8/R3K3 w Q - 0 1"));
        assert!(moves.contains(&"e1c1".to_string()));
    }

    #[test]
    fn test_no_castling_out_of_check() {
        let moves = names(&moves_of("4r1k1/8/8/8/8/8/8/R3K2R w KQ - 0 1"));
        assert!(!moves.contains(&"e1g1".to_string()));
        assert!(!moves.contains(&"e1c1".to_string()));
    }

    #[test]
    fn test_en_passant_exposing_king_is_illegal() {
        // Taking en passant would open the fifth rank to the rook on h5.
        let moves = moves_of("8/8/8/K2pP2r/8/8/8/7k w - d6 0 1");
        assert!(moves.iter().all(|mv| !mv.is_en_passant()));
    }

    #[test]
    fn test_checkmate_and_stalemate_helpers() {
        let mate = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1").unwrap();
        assert!(is_checkmate(&mate));
        assert!(!is_stalemate(&mate));

        let stalemate = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(is_stalemate(&stalemate));
        assert!(!is_checkmate(&stalemate));
    }

    #[test]
    fn test_move_list_retain_keeps_order() {
        let mut moves = generate_legal_moves(&Position::new());
        let expected: Vec<Move> = moves
            .iter()
            .filter(|mv| mv.piece.piece_type == PieceType::Knight)
            .copied()
            .collect();
        moves.retain(|mv| mv.piece.piece_type == PieceType::Knight);
        assert_eq!(moves.as_slice(), expected.as_slice());
        assert_eq!(moves.len(), 4);
    }
}
