use crate::move_gen::{generate_legal_moves, is_checkmate};
use crate::position::Position;
use crate::types::Move;

/// Perft (performance test) results at each depth.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PerftResults {
    pub nodes: u64,
    pub captures: u64,
    pub en_passants: u64,
    pub castles: u64,
    pub promotions: u64,
    pub checks: u64,
    pub checkmates: u64,
}

impl PerftResults {
    /// Combines results from child nodes.
    pub fn add(&mut self, other: &Self) {
        self.nodes += other.nodes;
        self.captures += other.captures;
        self.en_passants += other.en_passants;
        self.castles += other.castles;
        self.promotions += other.promotions;
        self.checks += other.checks;
        self.checkmates += other.checkmates;
    }
}

/// Counts leaf nodes of the legal move tree to `depth`. The position is
/// walked with make/undo and left exactly as it was found.
pub fn perft(position: &mut Position, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = generate_legal_moves(position);

    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for &mv in moves.iter() {
        position.make_move(mv);
        nodes += perft(position, depth - 1);
        position.undo_move();
    }

    nodes
}

/// Per-root-move node counts, in generation order.
pub fn perft_divide(position: &mut Position, depth: u8) -> Vec<(Move, u64)> {
    let moves = generate_legal_moves(position);
    let mut results = Vec::with_capacity(moves.len());

    for &mv in moves.iter() {
        position.make_move(mv);
        let nodes = perft(position, depth.saturating_sub(1));
        position.undo_move();
        results.push((mv, nodes));
    }

    results
}

/// Performs perft test with detailed statistics about the leaf moves.
pub fn perft_detailed(position: &mut Position, depth: u8) -> PerftResults {
    let mut results = PerftResults::default();

    if depth == 0 {
        results.nodes = 1;
        return results;
    }

    let moves = generate_legal_moves(position);

    for &mv in moves.iter() {
        position.make_move(mv);

        if depth == 1 {
            results.nodes += 1;
            results.captures += u64::from(mv.is_capture());
            results.en_passants += u64::from(mv.is_en_passant());
            results.castles += u64::from(mv.is_castle());
            results.promotions += u64::from(mv.is_promotion());
            if position.in_check() {
                results.checks += 1;
                if is_checkmate(position) {
                    results.checkmates += 1;
                }
            }
        } else {
            results.add(&perft_detailed(position, depth - 1));
        }

        position.undo_move();
    }

    results
}

/// Standard perft positions with expected results.
pub mod positions {
    /// Starting position perft values.
    pub const STARTING_POSITION: &[(u8, u64)] = &[
        (1, 20),
        (2, 400),
        (3, 8902),
        (4, 197_281),
        (5, 4_865_609),
        (6, 119_060_324),
    ];

    /// Kiwipete: castling, en passant and promotions all in reach.
    pub const KIWIPETE: &str =
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    pub const KIWIPETE_PERFT: &[(u8, u64)] = &[
        (1, 48),
        (2, 2039),
        (3, 97_862),
        (4, 4_085_603),
        (5, 193_690_690),
    ];

    /// Position 3 from CPW.
    pub const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    pub const POSITION_3_PERFT: &[(u8, u64)] = &[
        (1, 14),
        (2, 191),
        (3, 2812),
        (4, 43238),
        (5, 674_624),
        (6, 11_030_083),
    ];

    /// Position 4 from CPW.
    pub const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    pub const POSITION_4_PERFT: &[(u8, u64)] =
        &[(1, 6), (2, 264), (3, 9467), (4, 422_333), (5, 15_833_292)];

    /// Position 5 from CPW.
    pub const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
    pub const POSITION_5_PERFT: &[(u8, u64)] = &[
        (1, 44),
        (2, 1486),
        (3, 62_379),
        (4, 2_103_487),
        (5, 89_941_194),
    ];
}
