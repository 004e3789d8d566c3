//! Move ordering: transposition move, MVV-LVA captures, promotions,
//! killers, then quiet moves by history score.

use std::cmp::Reverse;

use chess_core::{Color, Move};

/// Deepest ply the search tracks killers for.
pub const MAX_PLY: usize = 128;

const TT_MOVE_SCORE: i32 = 1_000_000;
const CAPTURE_BASE: i32 = 100_000;
const PROMOTION_BASE: i32 = 90_000;
const KILLER_SCORES: [i32; 2] = [80_000, 79_000];
/// History scores are capped below the killer band.
const HISTORY_CAP: i32 = 70_000;

/// Two quiet moves per ply that recently caused a beta cutoff.
pub struct KillerTable {
    slots: Vec<[Option<Move>; 2]>,
}

impl KillerTable {
    pub fn new() -> Self {
        Self {
            slots: vec![[None; 2]; MAX_PLY],
        }
    }

    /// Records a cutoff move, pushing the older killer into the second slot.
    pub fn record(&mut self, ply: usize, mv: Move) {
        let Some(slot) = self.slots.get_mut(ply) else {
            return;
        };
        if slot[0] != Some(mv) {
            slot[1] = slot[0];
            slot[0] = Some(mv);
        }
    }

    /// Which killer slot holds `mv` at this ply, if any.
    pub fn rank(&self, ply: usize, mv: &Move) -> Option<usize> {
        self.slots
            .get(ply)?
            .iter()
            .position(|killer| killer.as_ref() == Some(mv))
    }

    pub fn clear(&mut self) {
        self.slots.fill([None; 2]);
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Cutoff counts per side and (from, to), weighted by depth squared.
pub struct HistoryTable {
    scores: Vec<i32>,
}

impl HistoryTable {
    pub fn new() -> Self {
        Self {
            scores: vec![0; 2 * 64 * 64],
        }
    }

    fn index(color: Color, mv: &Move) -> usize {
        (color.index() * 64 + mv.from.index() as usize) * 64 + mv.to.index() as usize
    }

    pub fn add(&mut self, color: Color, mv: &Move, depth: u8) {
        let depth = i32::from(depth);
        let entry = &mut self.scores[Self::index(color, mv)];
        *entry = entry.saturating_add(depth * depth);
    }

    pub fn score(&self, color: Color, mv: &Move) -> i32 {
        self.scores[Self::index(color, mv)]
    }

    pub fn clear(&mut self) {
        self.scores.fill(0);
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Most valuable victim first, cheapest attacker breaking ties.
fn capture_score(mv: &Move) -> i32 {
    let victim = mv.captured.map_or(0, |p| p.piece_type.value());
    let promotion = mv.promotion.map_or(0, |p| p.value());
    CAPTURE_BASE + 10 * victim - mv.piece.piece_type.value() + promotion
}

/// Ordering key for one move; higher is searched first.
pub fn score_move(
    mv: &Move,
    tt_move: Option<Move>,
    killers: &KillerTable,
    history: &HistoryTable,
    ply: usize,
    color: Color,
) -> i32 {
    if tt_move.as_ref() == Some(mv) {
        return TT_MOVE_SCORE;
    }
    if mv.is_capture() {
        return capture_score(mv);
    }
    if let Some(promotion) = mv.promotion {
        return PROMOTION_BASE + promotion.value();
    }
    if let Some(rank) = killers.rank(ply, mv) {
        return KILLER_SCORES[rank];
    }
    history.score(color, mv).min(HISTORY_CAP)
}

/// Sorts in place, best first. The sort is stable, so equal keys keep
/// generation order and the result is deterministic.
pub fn order_moves(
    moves: &mut [Move],
    tt_move: Option<Move>,
    killers: &KillerTable,
    history: &HistoryTable,
    ply: usize,
    color: Color,
) {
    moves.sort_by_cached_key(|mv| Reverse(score_move(mv, tt_move, killers, history, ply, color)));
}

/// Quiescence ordering: MVV-LVA for captures, then promotions.
pub fn order_captures(moves: &mut [Move]) {
    moves.sort_by_cached_key(|mv| {
        Reverse(if mv.is_capture() {
            capture_score(mv)
        } else {
            PROMOTION_BASE + mv.promotion.map_or(0, |p| p.value())
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::Position;

    fn find(position: &Position, text: &str) -> Move {
        position.parse_uci_move(text).unwrap()
    }

    #[test]
    fn test_killer_slots_shift() {
        let position = Position::new();
        let e4 = find(&position, "e2e4");
        let d4 = find(&position, "d2d4");
        let mut killers = KillerTable::new();

        killers.record(3, e4);
        killers.record(3, e4);
        assert_eq!(killers.rank(3, &e4), Some(0));
        assert_eq!(killers.rank(3, &d4), None);

        killers.record(3, d4);
        assert_eq!(killers.rank(3, &d4), Some(0));
        assert_eq!(killers.rank(3, &e4), Some(1));
        assert_eq!(killers.rank(2, &e4), None);

        killers.record(MAX_PLY + 5, d4);
        killers.clear();
        assert_eq!(killers.rank(3, &d4), None);
    }

    #[test]
    fn test_history_accumulates_depth_squared() {
        let position = Position::new();
        let e4 = find(&position, "e2e4");
        let mut history = HistoryTable::new();

        history.add(Color::White, &e4, 3);
        history.add(Color::White, &e4, 2);
        assert_eq!(history.score(Color::White, &e4), 13);
        assert_eq!(history.score(Color::Black, &e4), 0);
    }

    #[test]
    fn test_ordering_priorities() {
        // White can take the queen with the pawn or the queen, promote on b8,
        // or play quiet moves.
        let position =
            Position::from_fen("3r2k1/1P6/8/3q4/4P3/8/3Q4/4K3 w - - 0 1").unwrap();
        let mut moves: Vec<Move> = position.legal_moves().iter().copied().collect();
        let quiet = find(&position, "e1f1");
        let tt = find(&position, "d2h6");

        let mut killers = KillerTable::new();
        killers.record(0, quiet);
        let history = HistoryTable::new();
        order_moves(&mut moves, Some(tt), &killers, &history, 0, Color::White);

        let names: Vec<String> = moves.iter().map(|mv| mv.to_string()).collect();
        assert_eq!(names[0], "d2h6");
        // Pawn takes queen before queen takes queen
        assert_eq!(names[1], "e4d5");
        assert_eq!(names[2], "d2d5");
        assert_eq!(&names[3..7], ["b7b8q", "b7b8r", "b7b8b", "b7b8n"]);
        assert_eq!(names[7], "e1f1");
    }

    #[test]
    fn test_order_is_deterministic() {
        let position = Position::from_fen(chess_core::positions::KIWIPETE).unwrap();
        let killers = KillerTable::new();
        let history = HistoryTable::new();

        let mut first: Vec<Move> = position.legal_moves().iter().copied().collect();
        let mut second = first.clone();
        order_moves(&mut first, None, &killers, &history, 0, Color::White);
        order_moves(&mut second, None, &killers, &history, 0, Color::White);
        assert_eq!(first, second);
    }
}
