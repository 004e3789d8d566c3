use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Represents one of the two players in chess.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    /// Returns the opposite color.
    pub const fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Index into per-color tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the starting rank for pawns of this color.
    pub const fn pawn_rank(self) -> Rank {
        match self {
            Color::White => Rank::SECOND,
            Color::Black => Rank::SEVENTH,
        }
    }

    /// Returns the promotion rank for pawns of this color.
    pub const fn promotion_rank(self) -> Rank {
        match self {
            Color::White => Rank::EIGHTH,
            Color::Black => Rank::FIRST,
        }
    }

    /// Returns the rank the king and rooks start on.
    pub const fn back_rank(self) -> Rank {
        match self {
            Color::White => Rank::FIRST,
            Color::Black => Rank::EIGHTH,
        }
    }

    /// Returns the direction pawns of this color move.
    pub const fn pawn_direction(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// +1 for White, -1 for Black. Converts White-relative scores.
    pub const fn sign(self) -> i32 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }
}

/// The six types of chess pieces.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PieceType {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceType {
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    /// Promotion choices, strongest first.
    pub const PROMOTIONS: [PieceType; 4] = [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ];

    /// Returns the material value of this piece type in centipawns.
    pub const fn value(self) -> i32 {
        match self {
            PieceType::Pawn => 100,
            PieceType::Knight => 300,
            PieceType::Bishop => 300,
            PieceType::Rook => 500,
            PieceType::Queen => 900,
            PieceType::King => 0, // King has no material value
        }
    }

    /// Index into per-piece tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase letter used by FEN and coordinate notation.
    pub const fn to_char(self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }

    /// Parses a letter in either case.
    pub const fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceType::Pawn),
            'n' => Some(PieceType::Knight),
            'b' => Some(PieceType::Bishop),
            'r' => Some(PieceType::Rook),
            'q' => Some(PieceType::Queen),
            'k' => Some(PieceType::King),
            _ => None,
        }
    }
}

/// A chess piece with both type and color.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Piece {
    pub piece_type: PieceType,
    pub color: Color,
}

impl Piece {
    /// Creates a new piece with the given type and color.
    pub const fn new(piece_type: PieceType, color: Color) -> Self {
        Self { piece_type, color }
    }

    /// FEN letter: uppercase for White, lowercase for Black.
    pub const fn to_char(self) -> char {
        let c = self.piece_type.to_char();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Parses a FEN letter.
    pub const fn from_char(c: char) -> Option<Self> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        match PieceType::from_char(c) {
            Some(piece_type) => Some(Piece::new(piece_type, color)),
            None => None,
        }
    }
}

/// A file on the chess board (a-h).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct File(u8);

impl File {
    /// Creates a new file from index (0-7).
    /// Returns None if index is out of range.
    pub const fn new(index: u8) -> Option<Self> {
        if index < 8 { Some(File(index)) } else { None }
    }

    /// Creates a file from a character ('a'-'h').
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'a'..='h' => Some(File(c as u8 - b'a')),
            _ => None,
        }
    }

    /// Returns the file as a character ('a'-'h').
    pub const fn to_char(self) -> char {
        (b'a' + self.0) as char
    }

    /// Returns the file index (0-7).
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Returns the adjacent file in the given direction, if valid.
    pub const fn offset(self, delta: i8) -> Option<Self> {
        let new_file = self.0 as i8 + delta;
        if new_file >= 0 && new_file < 8 {
            Some(File(new_file as u8))
        } else {
            None
        }
    }
}

/// A rank on the chess board (1-8).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Rank(u8);

impl Rank {
    pub const FIRST: Rank = Rank(0);
    pub const SECOND: Rank = Rank(1);
    pub const THIRD: Rank = Rank(2);
    pub const FOURTH: Rank = Rank(3);
    pub const FIFTH: Rank = Rank(4);
    pub const SIXTH: Rank = Rank(5);
    pub const SEVENTH: Rank = Rank(6);
    pub const EIGHTH: Rank = Rank(7);

    /// Creates a new rank from index (0-7).
    /// Returns None if index is out of range.
    pub const fn new(index: u8) -> Option<Self> {
        if index < 8 { Some(Rank(index)) } else { None }
    }

    /// Creates a rank from a digit ('1'-'8').
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            '1'..='8' => Some(Rank(c as u8 - b'1')),
            _ => None,
        }
    }

    /// Returns the rank as a character ('1'-'8').
    pub const fn to_char(self) -> char {
        (b'1' + self.0) as char
    }

    /// Returns the rank index (0-7).
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Returns the adjacent rank in the given direction, if valid.
    pub const fn offset(self, delta: i8) -> Option<Self> {
        let new_rank = self.0 as i8 + delta;
        if new_rank >= 0 && new_rank < 8 {
            Some(Rank(new_rank as u8))
        } else {
            None
        }
    }

    /// Rank counted from the given side's back rank (0 = own back rank).
    pub const fn relative_to(self, color: Color) -> u8 {
        match color {
            Color::White => self.0,
            Color::Black => 7 - self.0,
        }
    }
}

/// A square on the chess board, stored as `rank * 8 + file`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Square(u8);

impl Square {
    pub const A1: Square = Square(0);
    pub const B1: Square = Square(1);
    pub const C1: Square = Square(2);
    pub const D1: Square = Square(3);
    pub const E1: Square = Square(4);
    pub const F1: Square = Square(5);
    pub const G1: Square = Square(6);
    pub const H1: Square = Square(7);
    pub const A8: Square = Square(56);
    pub const B8: Square = Square(57);
    pub const C8: Square = Square(58);
    pub const D8: Square = Square(59);
    pub const E8: Square = Square(60);
    pub const F8: Square = Square(61);
    pub const G8: Square = Square(62);
    pub const H8: Square = Square(63);

    /// Creates a new square from file and rank.
    pub const fn new(file: File, rank: Rank) -> Self {
        Square(rank.0 * 8 + file.0)
    }

    /// Creates a square from index (0-63).
    /// Returns None if index is out of range.
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 64 { Some(Square(index)) } else { None }
    }

    /// Iterates a1, b1, ..., h8.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square)
    }

    /// Returns the file of this square.
    pub const fn file(self) -> File {
        File(self.0 % 8)
    }

    /// Returns the rank of this square.
    pub const fn rank(self) -> Rank {
        Rank(self.0 / 8)
    }

    /// Returns the square index (0-63).
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Returns the square shifted by (file, rank) deltas, if still on the board.
    pub const fn offset(self, df: i8, dr: i8) -> Option<Square> {
        match (self.file().offset(df), self.rank().offset(dr)) {
            (Some(file), Some(rank)) => Some(Square::new(file, rank)),
            _ => None,
        }
    }

    /// Chebyshev (king-step) distance to another square.
    pub const fn distance(self, other: Square) -> u8 {
        let file_diff = self.file().0.abs_diff(other.file().0);
        let rank_diff = self.rank().0.abs_diff(other.rank().0);
        if file_diff > rank_diff { file_diff } else { rank_diff }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file().to_char(), self.rank().to_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid square: {0:?}")]
pub struct ParseSquareError(pub String);

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(f), Some(r), None) => match (File::from_char(f), Rank::from_char(r)) {
                (Some(file), Some(rank)) => Ok(Square::new(file, rank)),
                _ => Err(ParseSquareError(s.to_string())),
            },
            _ => Err(ParseSquareError(s.to_string())),
        }
    }
}

/// Which wing a castling move goes to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CastleSide {
    Kingside,
    Queenside,
}

impl CastleSide {
    /// (rook origin, rook destination) for the given color.
    pub const fn rook_squares(self, color: Color) -> (Square, Square) {
        match (color, self) {
            (Color::White, CastleSide::Kingside) => (Square::H1, Square::F1),
            (Color::White, CastleSide::Queenside) => (Square::A1, Square::D1),
            (Color::Black, CastleSide::Kingside) => (Square::H8, Square::F8),
            (Color::Black, CastleSide::Queenside) => (Square::A8, Square::D8),
        }
    }

    /// The wing whose rook starts on `square`, if it is a corner of `color`'s back rank.
    pub fn from_rook_corner(square: Square, color: Color) -> Option<Self> {
        [CastleSide::Kingside, CastleSide::Queenside]
            .into_iter()
            .find(|side| side.rook_squares(color).0 == square)
    }
}

/// Castling rights for a single side.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SideCastlingRights {
    pub kingside: bool,
    pub queenside: bool,
}

impl SideCastlingRights {
    /// Creates new castling rights with both sides available.
    pub const fn both() -> Self {
        Self {
            kingside: true,
            queenside: true,
        }
    }

    /// Creates castling rights with no rights available.
    pub const fn none() -> Self {
        Self {
            kingside: false,
            queenside: false,
        }
    }

    /// Returns true if any castling right is available.
    pub const fn any(self) -> bool {
        self.kingside || self.queenside
    }

    pub const fn has(self, side: CastleSide) -> bool {
        match side {
            CastleSide::Kingside => self.kingside,
            CastleSide::Queenside => self.queenside,
        }
    }
}

/// Complete castling rights for both colors: four independent flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CastlingRights {
    pub white: SideCastlingRights,
    pub black: SideCastlingRights,
}

impl CastlingRights {
    /// Creates castling rights with all rights available.
    pub const fn all() -> Self {
        Self {
            white: SideCastlingRights::both(),
            black: SideCastlingRights::both(),
        }
    }

    /// Creates castling rights with no rights available.
    pub const fn none() -> Self {
        Self {
            white: SideCastlingRights::none(),
            black: SideCastlingRights::none(),
        }
    }

    /// Gets castling rights for a specific color.
    pub const fn get(self, color: Color) -> SideCastlingRights {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub const fn has(self, color: Color, side: CastleSide) -> bool {
        self.get(color).has(side)
    }

    /// Clears one wing for one color. Rights are never re-granted.
    pub fn revoke(&mut self, color: Color, side: CastleSide) {
        let rights = match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        match side {
            CastleSide::Kingside => rights.kingside = false,
            CastleSide::Queenside => rights.queenside = false,
        }
    }

    /// Clears both wings for one color.
    pub fn revoke_all(&mut self, color: Color) {
        match color {
            Color::White => self.white = SideCastlingRights::none(),
            Color::Black => self.black = SideCastlingRights::none(),
        }
    }

    /// The four flags in zobrist key order: white K, white Q, black K, black Q.
    pub const fn flags(self) -> [bool; 4] {
        [
            self.white.kingside,
            self.white.queenside,
            self.black.kingside,
            self.black.queenside,
        ]
    }

    /// Applies the revocations caused by `mv`: king moves clear both wings,
    /// a rook leaving its corner clears that wing, and capturing a rook on
    /// its corner clears the opponent's wing.
    pub fn update_after_move(self, mv: &Move) -> Self {
        let mut rights = self;
        let mover = mv.piece.color;

        match mv.piece.piece_type {
            PieceType::King => rights.revoke_all(mover),
            PieceType::Rook => {
                if let Some(side) = CastleSide::from_rook_corner(mv.from, mover) {
                    rights.revoke(mover, side);
                }
            }
            _ => {}
        }

        if let Some(captured) = mv.captured {
            if captured.piece_type == PieceType::Rook {
                if let Some(side) = CastleSide::from_rook_corner(mv.to, captured.color) {
                    rights.revoke(captured.color, side);
                }
            }
        }

        rights
    }
}

/// How a move changes the board beyond relocating one piece.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MoveKind {
    Normal,
    EnPassant,
    Castle(CastleSide),
}

/// A chess move.
///
/// Carries everything make/undo needs (moved and captured piece, special
/// kind). Equality and hashing only look at `from`, `to` and `promotion`,
/// so a move parsed from coordinate notation compares equal to the fully
/// described generated move.
#[derive(Clone, Copy, Debug)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub kind: MoveKind,
    pub promotion: Option<PieceType>,
}

impl Move {
    /// Placeholder used to fill fixed-size move buffers.
    pub const NULL: Move = Move::new(
        Square::A1,
        Square::A1,
        Piece::new(PieceType::Pawn, Color::White),
        None,
    );

    /// Creates a normal move or capture.
    pub const fn new(from: Square, to: Square, piece: Piece, captured: Option<Piece>) -> Self {
        Self {
            from,
            to,
            piece,
            captured,
            kind: MoveKind::Normal,
            promotion: None,
        }
    }

    /// Creates a promotion move (with or without capture).
    pub const fn new_promotion(
        from: Square,
        to: Square,
        piece: Piece,
        captured: Option<Piece>,
        promotion: PieceType,
    ) -> Self {
        Self {
            from,
            to,
            piece,
            captured,
            kind: MoveKind::Normal,
            promotion: Some(promotion),
        }
    }

    /// Creates an en-passant capture of `captured`, which sits beside `from`.
    pub const fn new_en_passant(from: Square, to: Square, piece: Piece, captured: Piece) -> Self {
        Self {
            from,
            to,
            piece,
            captured: Some(captured),
            kind: MoveKind::EnPassant,
            promotion: None,
        }
    }

    /// Creates a castling move; `from`/`to` are the king's squares.
    pub const fn new_castle(from: Square, to: Square, king: Piece, side: CastleSide) -> Self {
        Self {
            from,
            to,
            piece: king,
            captured: None,
            kind: MoveKind::Castle(side),
            promotion: None,
        }
    }

    pub const fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    pub const fn is_promotion(&self) -> bool {
        self.promotion.is_some()
    }

    /// Neither a capture nor a promotion.
    pub const fn is_quiet(&self) -> bool {
        !self.is_capture() && !self.is_promotion()
    }

    pub const fn is_en_passant(&self) -> bool {
        matches!(self.kind, MoveKind::EnPassant)
    }

    pub const fn castle_side(&self) -> Option<CastleSide> {
        match self.kind {
            MoveKind::Castle(side) => Some(side),
            _ => None,
        }
    }

    pub const fn is_castle(&self) -> bool {
        self.castle_side().is_some()
    }

    /// Square the captured piece stands on (differs from `to` for en passant).
    pub const fn capture_square(&self) -> Square {
        match self.kind {
            MoveKind::EnPassant => Square::new(self.to.file(), self.from.rank()),
            _ => self.to,
        }
    }

    /// True for a pawn advancing two ranks.
    pub const fn is_double_push(&self) -> bool {
        matches!(self.piece.piece_type, PieceType::Pawn)
            && self.from.rank().index().abs_diff(self.to.rank().index()) == 2
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from && self.to == other.to && self.promotion == other.promotion
    }
}

impl Eq for Move {}

impl Hash for Move {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.from.hash(state);
        self.to.hash(state);
        self.promotion.hash(state);
    }
}

/// Coordinate notation: `e2e4`, `e7e8q`.
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion.to_char())?;
        }
        Ok(())
    }
}
