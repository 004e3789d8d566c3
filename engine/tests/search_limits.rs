use std::time::{Duration, Instant};

use chess_core::{perft::positions, Position};
use chess_engine::{SearchEngine, SearchLimits};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Random middlegame-ish positions reached from the standard openings.
fn random_positions(count: usize) -> Vec<Position> {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut result = Vec::new();

    while result.len() < count {
        let mut position = Position::new();
        for _ in 0..16 {
            let moves = position.legal_moves();
            let Some(&mv) = moves.as_slice().choose(&mut rng) else {
                break;
            };
            position.make_move(mv);
        }
        if !position.status().is_terminal() {
            result.push(position);
        }
    }
    result
}

#[test]
fn timed_out_search_leaves_position_untouched() {
    let mut engine = SearchEngine::default();
    let mut position = Position::from_fen(positions::KIWIPETE).unwrap();
    let before = position.clone();

    let start = Instant::now();
    let result = engine.search(&mut position, &SearchLimits::move_time(50));

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(result.stopped);
    assert_eq!(position, before);
    assert!(position.legal_moves().contains(&result.best_move.unwrap()));
}

#[test]
fn node_limited_searches_restore_random_positions() {
    let mut engine = SearchEngine::default();

    for mut position in random_positions(12) {
        let before = position.clone();
        let result = engine.search(&mut position, &SearchLimits::nodes(3000));

        assert_eq!(position, before);
        let best = result.best_move.unwrap();
        assert!(position.legal_moves().contains(&best));
        assert_eq!(result.pv.first(), Some(&best).filter(|_| result.depth > 0));
    }
}

#[test]
fn node_limit_is_respected_loosely() {
    let mut engine = SearchEngine::default();
    let mut position = Position::new();
    let result = engine.search(&mut position, &SearchLimits::nodes(5000));

    // The limit is polled every 1024 nodes
    assert!(result.nodes < 5000 + 1024);
}
