/// Array-based board representation: piece placement only.
/// Side to move, rights and history live in `Position`.
use crate::types::*;

pub(crate) const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

pub(crate) const KING_DELTAS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

pub(crate) const DIAGONALS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
pub(crate) const STRAIGHTS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

const BACK_RANK: [PieceType; 8] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Board {
    /// 64 squares, indexed by Square::index()
    squares: [Option<Piece>; 64],
}

impl Board {
    /// Creates an empty board.
    pub const fn empty() -> Self {
        Self {
            squares: [None; 64],
        }
    }

    /// Creates the standard starting position.
    pub fn starting_position() -> Self {
        let mut board = Self::empty();

        for (file_idx, &piece_type) in BACK_RANK.iter().enumerate() {
            for color in Color::ALL {
                let file = File::new(file_idx as u8).expect("file index in range");
                board.set_piece(
                    Square::new(file, color.back_rank()),
                    Some(Piece::new(piece_type, color)),
                );
                board.set_piece(
                    Square::new(file, color.pawn_rank()),
                    Some(Piece::new(PieceType::Pawn, color)),
                );
            }
        }

        board
    }

    /// Gets the piece at the given square.
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.index() as usize]
    }

    /// Sets the piece at the given square.
    pub fn set_piece(&mut self, square: Square, piece: Option<Piece>) {
        self.squares[square.index() as usize] = piece;
    }

    /// Removes and returns whatever stands on the square.
    pub fn take(&mut self, square: Square) -> Option<Piece> {
        self.squares[square.index() as usize].take()
    }

    /// Moves a piece from one square to another.
    /// Returns the captured piece, if any.
    pub fn move_piece(&mut self, from: Square, to: Square) -> Option<Piece> {
        let piece = self.take(from);
        std::mem::replace(&mut self.squares[to.index() as usize], piece)
    }

    /// Returns true if the given square is empty.
    pub fn is_empty(&self, square: Square) -> bool {
        self.piece_at(square).is_none()
    }

    /// Returns true if the given square contains a piece of the given color.
    pub fn is_color(&self, square: Square, color: Color) -> bool {
        self.piece_at(square).is_some_and(|p| p.color == color)
    }

    /// Returns true if the given square contains an enemy piece.
    pub fn is_enemy(&self, square: Square, color: Color) -> bool {
        self.is_color(square, color.opponent())
    }

    /// All occupied squares with their pieces, a1 to h8.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(|square| self.piece_at(square).map(|piece| (square, piece)))
    }

    /// Squares holding the given piece.
    pub fn squares_of(&self, piece: Piece) -> impl Iterator<Item = Square> + '_ {
        self.pieces()
            .filter(move |&(_, p)| p == piece)
            .map(|(square, _)| square)
    }

    /// Returns true if the given square is attacked by the given color.
    pub fn is_attacked_by(&self, square: Square, attacker: Color) -> bool {
        self.is_pawn_attacked(square, attacker)
            || self.is_stepper_attacked(square, attacker, &KNIGHT_DELTAS, PieceType::Knight)
            || self.is_slider_attacked(square, attacker)
            || self.is_stepper_attacked(square, attacker, &KING_DELTAS, PieceType::King)
    }

    /// Returns true if the given square is attacked by enemy pawns.
    fn is_pawn_attacked(&self, square: Square, attacker: Color) -> bool {
        // An attacking pawn sits one rank behind the target, from its own point of view.
        let dr = -attacker.pawn_direction();
        let pawn = Piece::new(PieceType::Pawn, attacker);
        [-1, 1].into_iter().any(|df| {
            square
                .offset(df, dr)
                .is_some_and(|from| self.piece_at(from) == Some(pawn))
        })
    }

    /// Knight and king attacks: fixed single-step patterns.
    fn is_stepper_attacked(
        &self,
        square: Square,
        attacker: Color,
        deltas: &[(i8, i8)],
        piece_type: PieceType,
    ) -> bool {
        let piece = Piece::new(piece_type, attacker);
        deltas.iter().any(|&(df, dr)| {
            square
                .offset(df, dr)
                .is_some_and(|from| self.piece_at(from) == Some(piece))
        })
    }

    /// Returns true if the given square is attacked by enemy sliding pieces.
    fn is_slider_attacked(&self, square: Square, attacker: Color) -> bool {
        DIAGONALS
            .iter()
            .any(|&(df, dr)| self.is_attacked_along_ray(square, df, dr, attacker, true))
            || STRAIGHTS
                .iter()
                .any(|&(df, dr)| self.is_attacked_along_ray(square, df, dr, attacker, false))
    }

    /// Checks if a square is attacked along a ray.
    fn is_attacked_along_ray(
        &self,
        square: Square,
        df: i8,
        dr: i8,
        attacker: Color,
        diagonal: bool,
    ) -> bool {
        let mut current = square;

        while let Some(next) = current.offset(df, dr) {
            current = next;
            if let Some(piece) = self.piece_at(current) {
                if piece.color != attacker {
                    return false;
                }
                return match piece.piece_type {
                    PieceType::Queen => true,
                    PieceType::Bishop => diagonal,
                    PieceType::Rook => !diagonal,
                    _ => false,
                };
            }
        }

        false
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_starting_position() {
        let board = Board::starting_position();

        assert_eq!(
            board.piece_at(Square::A1),
            Some(Piece::new(PieceType::Rook, Color::White))
        );
        assert_eq!(
            board.piece_at(Square::E1),
            Some(Piece::new(PieceType::King, Color::White))
        );
        assert_eq!(
            board.piece_at(Square::E8),
            Some(Piece::new(PieceType::King, Color::Black))
        );
        assert_eq!(
            board.piece_at(sq("d8")),
            Some(Piece::new(PieceType::Queen, Color::Black))
        );
        assert!(board.piece_at(sq("d4")).is_none());
        assert_eq!(board.pieces().count(), 32);
    }

    #[test]
    fn test_move_piece() {
        let mut board = Board::starting_position();

        let captured = board.move_piece(sq("e2"), sq("e4"));
        assert!(captured.is_none());
        assert!(board.is_empty(sq("e2")));
        assert_eq!(
            board.piece_at(sq("e4")),
            Some(Piece::new(PieceType::Pawn, Color::White))
        );

        let captured = board.move_piece(sq("d8"), sq("d2"));
        assert_eq!(captured, Some(Piece::new(PieceType::Pawn, Color::White)));
    }

    #[test]
    fn test_is_attacked() {
        let mut board = Board::empty();
        board.set_piece(sq("e4"), Some(Piece::new(PieceType::Rook, Color::White)));

        assert!(board.is_attacked_by(sq("e1"), Color::White));
        assert!(board.is_attacked_by(sq("e8"), Color::White));
        assert!(board.is_attacked_by(sq("a4"), Color::White));
        assert!(board.is_attacked_by(sq("h4"), Color::White));
        assert!(!board.is_attacked_by(sq("d5"), Color::White));

        // Blocked ray
        board.set_piece(sq("e6"), Some(Piece::new(PieceType::Pawn, Color::Black)));
        assert!(board.is_attacked_by(sq("e6"), Color::White));
        assert!(!board.is_attacked_by(sq("e7"), Color::White));
    }

    #[test]
    fn test_pawn_attacks_are_diagonal_only() {
        let mut board = Board::empty();
        board.set_piece(sq("e4"), Some(Piece::new(PieceType::Pawn, Color::White)));
        board.set_piece(sq("d6"), Some(Piece::new(PieceType::Pawn, Color::Black)));

        assert!(board.is_attacked_by(sq("d5"), Color::White));
        assert!(board.is_attacked_by(sq("f5"), Color::White));
        assert!(!board.is_attacked_by(sq("e5"), Color::White));
        assert!(!board.is_attacked_by(sq("d3"), Color::White));

        assert!(board.is_attacked_by(sq("c5"), Color::Black));
        assert!(board.is_attacked_by(sq("e5"), Color::Black));
        assert!(!board.is_attacked_by(sq("d7"), Color::Black));
    }

    #[test]
    fn test_knight_and_king_attacks() {
        let mut board = Board::empty();
        board.set_piece(sq("g1"), Some(Piece::new(PieceType::Knight, Color::White)));
        board.set_piece(sq("a8"), Some(Piece::new(PieceType::King, Color::Black)));

        assert!(board.is_attacked_by(sq("f3"), Color::White));
        assert!(board.is_attacked_by(sq("e2"), Color::White));
        assert!(!board.is_attacked_by(sq("g3"), Color::White));
        assert!(board.is_attacked_by(sq("b7"), Color::Black));
        assert!(!board.is_attacked_by(sq("c6"), Color::Black));
    }
}
