use chess_core::{Board, Color, Piece, PieceType, Position, Square};

/// Static evaluation of a position in centipawns.
pub trait Evaluatable {
    /// Score from the perspective of the side to move.
    fn evaluate(&self) -> i32;

    /// Score from White's perspective.
    fn evaluate_absolute(&self) -> i32;
}

impl Evaluatable for Position {
    fn evaluate(&self) -> i32 {
        evaluate(self)
    }

    fn evaluate_absolute(&self) -> i32 {
        evaluate_absolute(self)
    }
}

/// Bonus for having the move, outside the endgame.
pub const TEMPO_BONUS: i32 = 10;

/// At most this many knights, bishops, rooks and queens (both sides) means endgame.
const ENDGAME_PIECE_LIMIT: usize = 6;

const CASTLED_BONUS: i32 = 30;
const UNCASTLED_PENALTY: i32 = 10;
const LOST_CASTLING_PENALTY: i32 = 25;

const DOUBLED_ISOLATED_PENALTY: i32 = 25;
const DOUBLED_PENALTY: i32 = 15;
const ISOLATED_PENALTY: i32 = 12;
const BACKWARD_PENALTY: i32 = 8;

/// Passed pawn bonus by rank counted from the pawn's own back rank.
const PASSED_BONUS: [i32; 8] = [0, 5, 10, 20, 35, 60, 100, 0];
const PASSED_SUPPORTED_BONUS: i32 = 10;
const CONNECTED_PASSER_BONUS: i32 = 15;

/// Evaluates a chess position from the perspective of the side to move.
/// Returns a score in centipawns where positive values favor the side to move.
pub fn evaluate(position: &Position) -> i32 {
    position.side_to_move().sign() * evaluate_absolute(position)
}

/// Evaluates a position from White's perspective.
/// Positive scores favor White, negative favor Black.
pub fn evaluate_absolute(position: &Position) -> i32 {
    let endgame = is_endgame(position);

    let mut score = evaluate_color(position, Color::White, endgame)
        - evaluate_color(position, Color::Black, endgame);

    if !endgame {
        score += position.side_to_move().sign() * TEMPO_BONUS;
    }
    score
}

/// Few enough pieces left that kings should centralize and zugzwang is a risk.
pub fn is_endgame(position: &Position) -> bool {
    position
        .board()
        .pieces()
        .filter(|(_, piece)| !matches!(piece.piece_type, PieceType::Pawn | PieceType::King))
        .count()
        <= ENDGAME_PIECE_LIMIT
}

/// Evaluates all factors for a single color.
fn evaluate_color(position: &Position, color: Color, endgame: bool) -> i32 {
    let board = position.board();
    let mut score = 0;

    for (square, piece) in board.pieces().filter(|(_, p)| p.color == color) {
        score += piece.piece_type.value();
        score += piece_square_value(piece, square, endgame);
    }

    score += evaluate_pawns(position, color, endgame);

    if !endgame {
        score += evaluate_castling(position, color);
    }

    score
}

/// Rewards a completed castle, penalizes rights held but unused, and
/// penalizes more once they are gone without castling.
fn evaluate_castling(position: &Position, color: Color) -> i32 {
    let king = position.king_square(color);
    let rights = position.castling().get(color);
    let on_wing = king.rank() == color.back_rank() && matches!(king.file().index(), 1 | 2 | 6 | 7);

    if rights.any() {
        -UNCASTLED_PENALTY
    } else if on_wing {
        CASTLED_BONUS
    } else {
        -LOST_CASTLING_PENALTY
    }
}

/// Square at zero-based (file, rank) coordinates, if on the board.
fn square_at(file: i8, rank: i8) -> Option<Square> {
    Square::A1.offset(file, rank)
}

fn coords(square: Square) -> (i8, i8) {
    (square.file().index() as i8, square.rank().index() as i8)
}

fn has_pawn(board: &Board, color: Color, file: i8, rank: i8) -> bool {
    square_at(file, rank)
        .is_some_and(|sq| board.piece_at(sq) == Some(Piece::new(PieceType::Pawn, color)))
}

/// Ranks strictly in front of `rank` from `color`'s point of view.
fn ranks_ahead(rank: i8, color: Color) -> impl Iterator<Item = i8> {
    let direction = color.pawn_direction();
    (1..8)
        .map(move |step| rank + step * direction)
        .take_while(|r| (0..8).contains(r))
}

/// `rank` and the ranks behind it from `color`'s point of view.
fn ranks_at_or_behind(rank: i8, color: Color) -> impl Iterator<Item = i8> {
    let direction = color.pawn_direction();
    (0..8)
        .map(move |step| rank - step * direction)
        .take_while(|r| (0..8).contains(r))
}

fn pawns_on_file(board: &Board, color: Color, file: i8) -> usize {
    (0..8).filter(|&rank| has_pawn(board, color, file, rank)).count()
}

fn is_passed(board: &Board, color: Color, file: i8, rank: i8) -> bool {
    let enemy = color.opponent();
    (file - 1..=file + 1).all(|f| ranks_ahead(rank, color).all(|r| !has_pawn(board, enemy, f, r)))
}

/// Defended by a pawn diagonally behind or standing beside one.
fn is_supported(board: &Board, color: Color, file: i8, rank: i8) -> bool {
    let behind = rank - color.pawn_direction();
    [file - 1, file + 1]
        .into_iter()
        .any(|f| has_pawn(board, color, f, rank) || has_pawn(board, color, f, behind))
}

/// No friendly pawn on a neighboring file can ever defend it, and the
/// square in front is covered by an enemy pawn.
fn is_backward(board: &Board, color: Color, file: i8, rank: i8) -> bool {
    let direction = color.pawn_direction();
    let defended_later = [file - 1, file + 1]
        .into_iter()
        .any(|f| ranks_at_or_behind(rank, color).any(|r| has_pawn(board, color, f, r)));
    if defended_later {
        return false;
    }

    let stop = rank + direction;
    [file - 1, file + 1]
        .into_iter()
        .any(|f| has_pawn(board, color.opponent(), f, stop + direction))
}

/// Not yet passed, but the file ahead is open and own supporters on the
/// neighboring files outnumber the enemy sentries.
fn is_candidate(board: &Board, color: Color, file: i8, rank: i8) -> bool {
    let enemy = color.opponent();
    if ranks_ahead(rank, color).any(|r| has_pawn(board, enemy, file, r)) {
        return false;
    }

    let neighbors = [file - 1, file + 1];
    let supporters = neighbors
        .iter()
        .flat_map(|&f| ranks_at_or_behind(rank, color).map(move |r| (f, r)))
        .filter(|&(f, r)| has_pawn(board, color, f, r))
        .count();
    let sentries = neighbors
        .iter()
        .flat_map(|&f| ranks_ahead(rank, color).map(move |r| (f, r)))
        .filter(|&(f, r)| has_pawn(board, enemy, f, r))
        .count();

    supporters >= sentries
}

/// Penalty for one pawn; only the worst applicable weakness counts.
fn pawn_weakness(board: &Board, color: Color, file: i8, rank: i8) -> i32 {
    let doubled = pawns_on_file(board, color, file) > 1;
    let isolated =
        pawns_on_file(board, color, file - 1) == 0 && pawns_on_file(board, color, file + 1) == 0;

    match (doubled, isolated) {
        (true, true) => DOUBLED_ISOLATED_PENALTY,
        (true, false) => DOUBLED_PENALTY,
        (false, true) => ISOLATED_PENALTY,
        (false, false) if is_backward(board, color, file, rank) => BACKWARD_PENALTY,
        (false, false) => 0,
    }
}

/// Pawn weaknesses and passed/candidate pawn bonuses for one color.
fn evaluate_pawns(position: &Position, color: Color, endgame: bool) -> i32 {
    let board = position.board();
    let pawn = Piece::new(PieceType::Pawn, color);
    let mut score = 0;

    for square in board.squares_of(pawn) {
        let (file, rank) = coords(square);
        let relative_rank = square.rank().relative_to(color) as usize;

        score -= pawn_weakness(board, color, file, rank);

        if is_passed(board, color, file, rank) {
            score += passed_pawn_bonus(position, color, square, relative_rank, endgame);
        } else if is_candidate(board, color, file, rank) {
            score += PASSED_BONUS[relative_rank] / 3;
        }
    }

    score
}

fn passed_pawn_bonus(
    position: &Position,
    color: Color,
    square: Square,
    relative_rank: usize,
    endgame: bool,
) -> i32 {
    let board = position.board();
    let (file, rank) = coords(square);
    let mut bonus = PASSED_BONUS[relative_rank];

    if is_supported(board, color, file, rank) {
        bonus += PASSED_SUPPORTED_BONUS;
    }

    let connected = [file - 1, file + 1].into_iter().any(|f| {
        (rank - 1..=rank + 1).any(|r| has_pawn(board, color, f, r) && is_passed(board, color, f, r))
    });
    if connected {
        bonus += CONNECTED_PASSER_BONUS;
    }

    let stop = square.offset(0, color.pawn_direction());
    if stop.is_some_and(|sq| board.is_enemy(sq, color)) {
        bonus /= 2;
    }

    if endgame {
        let promotion = Square::new(square.file(), color.promotion_rank());
        let own = position.king_square(color).distance(promotion) as i32;
        let enemy = position.king_square(color.opponent()).distance(promotion) as i32;
        bonus += 5 * enemy - 2 * own;
    }

    bonus
}

/// Returns positional value for a piece on a given square.
fn piece_square_value(piece: Piece, square: Square, endgame: bool) -> i32 {
    let file = square.file().index() as usize;
    let rank = square.rank().index() as usize;
    // Mirror the rank for black pieces
    let relative = square.rank().relative_to(piece.color) as usize;

    match piece.piece_type {
        PieceType::Pawn => match piece.color {
            Color::White => WHITE_PAWN_TABLE[rank][file],
            Color::Black => BLACK_PAWN_TABLE[rank][file],
        },
        PieceType::Knight => KNIGHT_TABLE[relative][file],
        PieceType::Bishop => BISHOP_TABLE[relative][file],
        PieceType::Rook => ROOK_TABLE[relative][file],
        PieceType::Queen => QUEEN_TABLE[relative][file],
        PieceType::King if endgame => KING_ENDGAME_TABLE[relative][file],
        PieceType::King => KING_MIDDLEGAME_TABLE[relative][file],
    }
}

// Piece-square tables, rank 1 first, values in centipawns. All but the pawn
// tables are written from White's side and mirrored for Black.

const WHITE_PAWN_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [5, 10, 10, -20, -20, 10, 10, 5],
    [5, -5, -10, 0, 0, -10, -5, 5],
    [0, 0, 0, 20, 20, 0, 0, 0],
    [5, 5, 10, 25, 25, 10, 5, 5],
    [10, 10, 20, 30, 30, 20, 10, 10],
    [50, 50, 50, 50, 50, 50, 50, 50],
    [0, 0, 0, 0, 0, 0, 0, 0],
];

const BLACK_PAWN_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [50, 50, 50, 50, 50, 50, 50, 50],
    [10, 10, 20, 30, 30, 20, 10, 10],
    [5, 5, 10, 25, 25, 10, 5, 5],
    [0, 0, 0, 20, 20, 0, 0, 0],
    [5, -5, -10, 0, 0, -10, -5, 5],
    [5, 10, 10, -20, -20, 10, 10, 5],
    [0, 0, 0, 0, 0, 0, 0, 0],
];

const KNIGHT_TABLE: [[i32; 8]; 8] = [
    [-50, -40, -30, -30, -30, -30, -40, -50],
    [-40, -20, 0, 5, 5, 0, -20, -40],
    [-30, 5, 10, 15, 15, 10, 5, -30],
    [-30, 0, 15, 20, 20, 15, 0, -30],
    [-30, 5, 15, 20, 20, 15, 5, -30],
    [-30, 0, 10, 15, 15, 10, 0, -30],
    [-40, -20, 0, 0, 0, 0, -20, -40],
    [-50, -40, -30, -30, -30, -30, -40, -50],
];

const BISHOP_TABLE: [[i32; 8]; 8] = [
    [-20, -10, -10, -10, -10, -10, -10, -20],
    [-10, 5, 0, 0, 0, 0, 5, -10],
    [-10, 10, 10, 10, 10, 10, 10, -10],
    [-10, 0, 10, 10, 10, 10, 0, -10],
    [-10, 5, 5, 10, 10, 5, 5, -10],
    [-10, 0, 5, 10, 10, 5, 0, -10],
    [-10, 0, 0, 0, 0, 0, 0, -10],
    [-20, -10, -10, -10, -10, -10, -10, -20],
];

const ROOK_TABLE: [[i32; 8]; 8] = [
    [0, 0, 0, 5, 5, 0, 0, 0],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [-5, 0, 0, 0, 0, 0, 0, -5],
    [5, 10, 10, 10, 10, 10, 10, 5],
    [0, 0, 0, 0, 0, 0, 0, 0],
];

const QUEEN_TABLE: [[i32; 8]; 8] = [
    [-20, -10, -10, -5, -5, -10, -10, -20],
    [-10, 0, 5, 0, 0, 0, 0, -10],
    [-10, 5, 5, 5, 5, 5, 0, -10],
    [0, 0, 5, 5, 5, 5, 0, -5],
    [-5, 0, 5, 5, 5, 5, 0, -5],
    [-10, 0, 5, 5, 5, 5, 0, -10],
    [-10, 0, 0, 0, 0, 0, 0, -10],
    [-20, -10, -10, -5, -5, -10, -10, -20],
];

const KING_MIDDLEGAME_TABLE: [[i32; 8]; 8] = [
    [20, 30, 10, 0, 0, 10, 30, 20],
    [20, 20, 0, 0, 0, 0, 20, 20],
    [-10, -20, -20, -20, -20, -20, -20, -10],
    [-20, -30, -30, -40, -40, -30, -30, -20],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
];

/// Drives the king toward the center once the heavy pieces are gone.
const KING_ENDGAME_TABLE: [[i32; 8]; 8] = [
    [-50, -30, -30, -30, -30, -30, -30, -50],
    [-30, -30, 0, 0, 0, 0, -30, -30],
    [-30, -10, 20, 30, 30, 20, -10, -30],
    [-30, -10, 30, 40, 40, 30, -10, -30],
    [-30, -10, 30, 40, 40, 30, -10, -30],
    [-30, -10, 20, 30, 30, 20, -10, -30],
    [-30, -20, -10, 0, 0, -10, -20, -30],
    [-50, -40, -30, -20, -20, -30, -40, -50],
];
