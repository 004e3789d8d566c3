use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chess_core::{generate_tactical_moves, Color, Move, Position};
use log::{debug, trace};

use crate::evaluation::{evaluate, is_endgame};
use crate::ordering::{order_captures, order_moves, HistoryTable, KillerTable, MAX_PLY};
use crate::transposition::{NodeType, TranspositionTable};

pub const INFINITY: i32 = 1_000_000;
/// Score of being mated at the root; a mate `n` plies away scores `MATE_SCORE - n`.
pub const MATE_SCORE: i32 = 100_000;
/// Anything beyond this magnitude is a forced mate.
pub const MATE_THRESHOLD: i32 = MATE_SCORE - MAX_PLY as i32;

const NODE_CHECK_INTERVAL: u64 = 1024; // Poll the clock and stop flag every 1024 nodes
const MAX_DEPTH: u8 = 64;
const QUIESCENCE_DEPTH: u8 = 4; // Maximum depth for quiescence search

const NULL_MOVE_MIN_DEPTH: u8 = 3;
const NULL_MOVE_VERIFY_DEPTH: u8 = 6;
const LMR_MIN_DEPTH: u8 = 3;
const LMR_MIN_INDEX: usize = 3;
/// Slack added to a capture's gain before delta pruning discards it.
const DELTA_MARGIN: i32 = 200;
const QUEEN_VALUE: i32 = 900;

/// The search ran out of time, nodes, or was told to stop. Every frame
/// undoes its move before passing this upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aborted;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub score: i32,
    /// Deepest fully completed iteration
    pub depth: u8,
    pub nodes: u64,
    pub stopped: bool,
    pub pv: Vec<Move>,
}

#[derive(Debug, Clone)]
pub struct SearchProgress {
    pub depth: u8,
    pub score: i32,
    pub nodes: u64,
    pub pv: Vec<Move>,
    pub time_ms: u64,
}

pub type InfoCallback = Box<dyn Fn(&SearchProgress) + Send>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_depth: Option<u8>,
    pub move_time: Option<Duration>,
    pub nodes: Option<u64>,
    /// Search until stopped
    pub infinite: bool,
    pub white_time: Option<Duration>,
    pub black_time: Option<Duration>,
    pub white_increment: Option<Duration>,
    pub black_increment: Option<Duration>,
    pub moves_to_go: Option<u32>,
}

impl SearchLimits {
    pub fn depth(depth: u8) -> Self {
        Self {
            max_depth: Some(depth),
            ..Self::default()
        }
    }

    pub fn move_time(millis: u64) -> Self {
        Self {
            move_time: Some(Duration::from_millis(millis)),
            ..Self::default()
        }
    }

    pub fn nodes(nodes: u64) -> Self {
        Self {
            nodes: Some(nodes),
            ..Self::default()
        }
    }

    pub fn infinite() -> Self {
        Self {
            infinite: true,
            ..Self::default()
        }
    }

    pub fn time_control(
        white_time: Duration,
        black_time: Duration,
        white_inc: Duration,
        black_inc: Duration,
        moves_to_go: Option<u32>,
    ) -> Self {
        Self {
            white_time: Some(white_time),
            black_time: Some(black_time),
            white_increment: Some(white_inc),
            black_increment: Some(black_inc),
            moves_to_go,
            ..Self::default()
        }
    }
}

/// Wall-clock budget for this move: the explicit move time, otherwise a
/// share of the mover's clock. `None` means no deadline.
pub fn allocate_time(limits: &SearchLimits, position: &Position) -> Option<Duration> {
    if let Some(move_time) = limits.move_time {
        return Some(move_time);
    }
    if limits.infinite {
        return None;
    }

    // Get time for the side to move
    let (our_time, our_inc) = match position.side_to_move() {
        Color::White => (limits.white_time?, limits.white_increment.unwrap_or_default()),
        Color::Black => (limits.black_time?, limits.black_increment.unwrap_or_default()),
    };

    let our_time_ms = our_time.as_millis() as u64;
    let our_inc_ms = our_inc.as_millis() as u64;

    // Estimate moves remaining in the game
    let moves_left = match limits.moves_to_go {
        Some(mtg) => u64::from(mtg.max(1)),
        None => match position.fullmove_number() {
            0..=10 => 30,  // Opening: expect 30 more moves
            11..=30 => 20, // Middle game: expect 20 more moves
            _ => 10,       // Endgame: expect 10 more moves
        },
    };

    let base_time = our_time_ms / moves_left;
    let increment_bonus = our_inc_ms * 8 / 10; // Use 80% of increment

    // Never use more than 95% of the remaining clock
    let max_time = our_time_ms * 95 / 100;
    let allocated = (base_time + increment_bonus).min(max_time);

    // Minimum time (don't think less than 50ms)
    Some(Duration::from_millis(allocated.max(50)))
}

/// Plies to mate if `score` is a mate score; negative when being mated.
pub fn mate_in(score: i32) -> Option<i32> {
    if score >= MATE_THRESHOLD {
        Some((MATE_SCORE - score + 1) / 2)
    } else if score <= -MATE_THRESHOLD {
        Some(-(MATE_SCORE + score) / 2)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub tt_size_mb: usize,
    pub quiescence_depth: u8,
    pub null_move_pruning: bool,
    pub late_move_reductions: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tt_size_mb: 16,
            quiescence_depth: QUIESCENCE_DEPTH,
            null_move_pruning: true,
            late_move_reductions: true,
        }
    }
}

/// Iterative-deepening alpha-beta searcher. Owns every cache the search
/// touches; all of them are cleared when a new top-level search starts.
pub struct SearchEngine {
    config: SearchConfig,
    tt: TranspositionTable,
    killers: KillerTable,
    history: HistoryTable,
    stop: Arc<AtomicBool>,
    info_callback: Option<InfoCallback>,
    nodes: u64,
    start_time: Instant,
    deadline: Option<Instant>,
    node_limit: Option<u64>,
}

impl SearchEngine {
    pub fn new(mut config: SearchConfig) -> Self {
        let tt = TranspositionTable::new(config.tt_size_mb);
        config.tt_size_mb = tt.size_mb();
        Self {
            tt,
            config,
            killers: KillerTable::new(),
            history: HistoryTable::new(),
            stop: Arc::new(AtomicBool::new(false)),
            info_callback: None,
            nodes: 0,
            start_time: Instant::now(),
            deadline: None,
            node_limit: None,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Rebuilds the transposition table at the new size.
    pub fn set_hash_size(&mut self, size_mb: usize) {
        self.tt = TranspositionTable::new(size_mb);
        self.config.tt_size_mb = self.tt.size_mb();
    }

    /// Flag polled during search; setting it aborts the current iteration.
    /// The caller clears it before starting the next search.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn set_info_callback(&mut self, callback: Option<InfoCallback>) {
        self.info_callback = callback;
    }

    /// Forgets everything learned so far (new game).
    pub fn clear(&mut self) {
        self.tt.clear();
        self.killers.clear();
        self.history.clear();
    }

    /// Searches `position` within `limits` and returns the deepest fully
    /// completed iteration's result. The position is restored before return.
    ///
    /// Returns no move when the side to move is checkmated or stalemated.
    /// If not even depth 1 completes, the first move in ordering is returned.
    pub fn search(&mut self, position: &mut Position, limits: &SearchLimits) -> SearchResult {
        self.start_time = Instant::now();
        self.deadline = allocate_time(limits, position).map(|budget| self.start_time + budget);
        self.node_limit = limits.nodes;
        self.nodes = 0;
        self.clear();

        let mut root_moves = position.legal_moves();
        let mut result = SearchResult {
            best_move: None,
            score: 0,
            depth: 0,
            nodes: 0,
            stopped: false,
            pv: Vec::new(),
        };

        if root_moves.is_empty() {
            if position.in_check() {
                result.score = -MATE_SCORE;
            }
            debug!("no legal moves at the root");
            return result;
        }

        let us = position.side_to_move();
        order_moves(root_moves.as_mut_slice(), None, &self.killers, &self.history, 0, us);
        result.best_move = root_moves.as_slice().first().copied();

        let max_depth = limits.max_depth.unwrap_or(MAX_DEPTH).clamp(1, MAX_DEPTH);

        for depth in 1..=max_depth {
            match self.search_root(position, depth) {
                Ok((score, Some(best_move))) => {
                    result.best_move = Some(best_move);
                    result.score = score;
                    result.depth = depth;
                    result.pv = self.extract_pv(position, best_move, usize::from(depth));

                    let elapsed = self.start_time.elapsed();
                    debug!(
                        "depth {depth} score {score} nodes {} time {}ms best {best_move}",
                        self.nodes,
                        elapsed.as_millis()
                    );
                    if let Some(callback) = &self.info_callback {
                        callback(&SearchProgress {
                            depth,
                            score,
                            nodes: self.nodes,
                            pv: result.pv.clone(),
                            time_ms: elapsed.as_millis() as u64,
                        });
                    }

                    // Stop if we found a forced mate
                    if !limits.infinite && score.abs() >= MATE_THRESHOLD {
                        break;
                    }
                    if self.out_of_budget() {
                        result.stopped = true;
                        break;
                    }
                }
                Ok((_, None)) => break,
                Err(Aborted) => {
                    trace!("depth {depth} aborted after {} nodes", self.nodes);
                    result.stopped = true;
                    break;
                }
            }
        }

        result.nodes = self.nodes;
        debug!(
            "search finished: depth {} score {} nodes {} best {:?}",
            result.depth,
            result.score,
            result.nodes,
            result.best_move.map(|mv| mv.to_string())
        );
        result
    }

    fn out_of_budget(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
            || self.node_limit.is_some_and(|limit| self.nodes >= limit)
    }

    /// Counts a node and periodically checks whether to give up.
    fn visit(&mut self) -> Result<(), Aborted> {
        self.nodes += 1;
        if self.nodes % NODE_CHECK_INTERVAL == 0 && self.out_of_budget() {
            return Err(Aborted);
        }
        Ok(())
    }

    fn search_root(
        &mut self,
        position: &mut Position,
        depth: u8,
    ) -> Result<(i32, Option<Move>), Aborted> {
        let hash = position.hash();
        let us = position.side_to_move();
        let mut moves = position.legal_moves();
        let tt_move = self.tt.probe(hash).and_then(|entry| entry.best_move);
        order_moves(moves.as_mut_slice(), tt_move, &self.killers, &self.history, 0, us);

        let mut alpha = -INFINITY;
        let beta = INFINITY;
        let mut best_move = None;
        let mut best_score = -INFINITY;

        for &mv in moves.iter() {
            position.make_move(mv);
            let result = self.negamax(position, depth - 1, -beta, -alpha, 1, true);
            position.undo_move();
            let score = -result?;

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            alpha = alpha.max(score);
        }

        if best_score.abs() < MATE_THRESHOLD {
            self.tt.store(hash, best_move, best_score, depth, NodeType::Exact);
        }
        Ok((best_score, best_move))
    }

    fn negamax(
        &mut self,
        position: &mut Position,
        depth: u8,
        mut alpha: i32,
        mut beta: i32,
        ply: usize,
        allow_null: bool,
    ) -> Result<i32, Aborted> {
        if depth == 0 {
            return self.quiescence(position, alpha, beta, ply, 0);
        }

        self.visit()?;

        if ply >= MAX_PLY - 1 {
            return Ok(evaluate(position));
        }
        if position.is_bare_kings() {
            return Ok(0);
        }

        let hash = position.hash();
        let mut tt_move = None;

        if let Some(entry) = self.tt.probe(hash) {
            if entry.depth >= depth {
                match entry.node_type {
                    NodeType::Exact => return Ok(entry.score),
                    NodeType::LowerBound => alpha = alpha.max(entry.score),
                    NodeType::UpperBound => beta = beta.min(entry.score),
                }
                if alpha >= beta {
                    return Ok(entry.score);
                }
            }
            // Save the best move from TT for move ordering
            tt_move = entry.best_move;
        }
        let alpha_floor = alpha;

        let mut moves = position.legal_moves();
        let in_check = position.in_check();

        // No legal moves - checkmate or stalemate
        if moves.is_empty() {
            return Ok(if in_check { -MATE_SCORE + ply as i32 } else { 0 });
        }

        if allow_null
            && self.config.null_move_pruning
            && depth >= NULL_MOVE_MIN_DEPTH
            && !in_check
            && beta.abs() < MATE_THRESHOLD
            && !is_endgame(position)
            && evaluate(position) >= beta
        {
            if let Some(score) = self.null_move_cutoff(position, depth, beta, ply)? {
                return Ok(score);
            }
        }

        let us = position.side_to_move();
        order_moves(moves.as_mut_slice(), tt_move, &self.killers, &self.history, ply, us);

        let mut best_move = None;
        let mut best_score = -INFINITY;

        for (index, &mv) in moves.iter().enumerate() {
            position.make_move(mv);
            let reduce = self.config.late_move_reductions
                && index >= LMR_MIN_INDEX
                && depth >= LMR_MIN_DEPTH
                && mv.is_quiet()
                && !in_check
                && !position.in_check();
            let result = self.search_child(position, depth, alpha, beta, ply, reduce);
            position.undo_move();
            let score = result?;

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            alpha = alpha.max(score);

            // Beta cutoff
            if alpha >= beta {
                if mv.is_quiet() {
                    self.killers.record(ply, mv);
                    self.history.add(us, &mv, depth);
                }
                break;
            }
        }

        // Mate scores depend on the distance to the root, so they are not cached
        if best_score.abs() < MATE_THRESHOLD {
            let node_type = if best_score <= alpha_floor {
                NodeType::UpperBound
            } else if best_score >= beta {
                NodeType::LowerBound
            } else {
                NodeType::Exact
            };
            self.tt.store(hash, best_move, best_score, depth, node_type);
        }

        Ok(best_score)
    }

    /// Searches the move just made. Late quiet moves are first probed at
    /// reduced depth with a null window and only re-searched in full if
    /// the probe beats alpha.
    fn search_child(
        &mut self,
        position: &mut Position,
        depth: u8,
        alpha: i32,
        beta: i32,
        ply: usize,
        reduce: bool,
    ) -> Result<i32, Aborted> {
        if reduce {
            let probe = -self.negamax(position, depth - 2, -alpha - 1, -alpha, ply + 1, true)?;
            if probe <= alpha {
                return Ok(probe);
            }
        }
        Ok(-self.negamax(position, depth - 1, -beta, -alpha, ply + 1, true)?)
    }

    /// Lets the opponent move twice. If they still cannot get below beta the
    /// node is cut; at high depth the cut is confirmed by a reduced search
    /// without null moves, which catches zugzwang.
    fn null_move_cutoff(
        &mut self,
        position: &mut Position,
        depth: u8,
        beta: i32,
        ply: usize,
    ) -> Result<Option<i32>, Aborted> {
        let reduction = if depth >= NULL_MOVE_VERIFY_DEPTH { 3 } else { 2 };
        let reduced_depth = depth.saturating_sub(1 + reduction);

        position.make_null_move();
        let result = self.negamax(position, reduced_depth, -beta, -beta + 1, ply + 1, false);
        position.undo_move();
        let score = -result?;

        if score < beta {
            return Ok(None);
        }
        if depth < NULL_MOVE_VERIFY_DEPTH {
            return Ok(Some(beta));
        }

        let verified = self.negamax(position, depth - reduction, beta - 1, beta, ply, false)?;
        Ok((verified >= beta).then_some(beta))
    }

    /// Captures and promotions only, on top of a stand-pat score. When in
    /// check every evasion is searched instead.
    fn quiescence(
        &mut self,
        position: &mut Position,
        mut alpha: i32,
        beta: i32,
        ply: usize,
        qdepth: u8,
    ) -> Result<i32, Aborted> {
        self.visit()?;

        let in_check = position.in_check();
        let mut moves = if in_check {
            position.legal_moves()
        } else {
            generate_tactical_moves(position)
        };

        if moves.is_empty() && (in_check || position.legal_moves().is_empty()) {
            return Ok(if in_check { -MATE_SCORE + ply as i32 } else { 0 });
        }
        if position.is_bare_kings() {
            return Ok(0);
        }

        // Stand pat evaluation - can we beat beta without searching?
        let stand_pat = evaluate(position);
        if qdepth >= self.config.quiescence_depth || ply >= MAX_PLY - 1 {
            return Ok(stand_pat);
        }

        if !in_check {
            if stand_pat >= beta {
                return Ok(beta);
            }
            // Not even winning a queen would get back to alpha
            if stand_pat + QUEEN_VALUE + DELTA_MARGIN < alpha {
                return Ok(alpha);
            }
            alpha = alpha.max(stand_pat);
        }

        order_captures(moves.as_mut_slice());

        for &mv in moves.iter() {
            if !in_check && !mv.is_promotion() {
                let gain = mv.captured.map_or(0, |p| p.piece_type.value());
                if stand_pat + gain + DELTA_MARGIN < alpha {
                    continue;
                }
            }

            position.make_move(mv);
            let result = self.quiescence(position, -beta, -alpha, ply + 1, qdepth + 1);
            position.undo_move();
            let score = -result?;

            if score >= beta {
                return Ok(beta);
            }
            alpha = alpha.max(score);
        }

        Ok(alpha)
    }

    /// Follows best moves through the transposition table, starting with
    /// the root move. Stops at the first missing or illegal entry.
    fn extract_pv(&self, position: &mut Position, first: Move, max_len: usize) -> Vec<Move> {
        let mut pv = vec![first];
        position.make_move(first);

        while pv.len() < max_len {
            let Some(next) = self
                .tt
                .probe(position.hash())
                .and_then(|entry| entry.best_move)
            else {
                break;
            };
            let Some(&legal) = position.legal_moves().iter().find(|mv| **mv == next) else {
                break;
            };
            position.make_move(legal);
            pv.push(legal);
        }

        for _ in 0..pv.len() {
            position.undo_move();
        }
        pv
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

/// One-shot fixed-depth search with a fresh engine.
pub fn search(position: &mut Position, depth: u8) -> SearchResult {
    SearchEngine::default().search(position, &SearchLimits::depth(depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_constructors() {
        assert_eq!(SearchLimits::depth(5).max_depth, Some(5));
        assert_eq!(
            SearchLimits::move_time(250).move_time,
            Some(Duration::from_millis(250))
        );
        assert!(SearchLimits::infinite().infinite);
        assert_eq!(SearchLimits::nodes(1000).nodes, Some(1000));
    }

    #[test]
    fn test_allocate_time() {
        let position = Position::new();

        assert_eq!(allocate_time(&SearchLimits::depth(3), &position), None);
        assert_eq!(
            allocate_time(&SearchLimits::move_time(300), &position),
            Some(Duration::from_millis(300))
        );

        // 60s / 30 moves + 80% of 1s increment
        let limits = SearchLimits::time_control(
            Duration::from_secs(60),
            Duration::from_secs(10),
            Duration::from_secs(1),
            Duration::ZERO,
            None,
        );
        assert_eq!(
            allocate_time(&limits, &position),
            Some(Duration::from_millis(2000 + 800))
        );

        // Never more than 95% of the clock, never less than 50ms
        let scramble = SearchLimits::time_control(
            Duration::from_millis(100),
            Duration::from_millis(100),
            Duration::from_secs(5),
            Duration::ZERO,
            Some(1),
        );
        assert_eq!(
            allocate_time(&scramble, &position),
            Some(Duration::from_millis(95))
        );
        let flagging = SearchLimits::time_control(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::ZERO,
            Duration::ZERO,
            None,
        );
        assert_eq!(
            allocate_time(&flagging, &position),
            Some(Duration::from_millis(50))
        );
    }

    #[test]
    fn test_mate_in() {
        assert_eq!(mate_in(MATE_SCORE - 1), Some(1));
        assert_eq!(mate_in(MATE_SCORE - 3), Some(2));
        assert_eq!(mate_in(-(MATE_SCORE - 2)), Some(-1));
        assert_eq!(mate_in(-(MATE_SCORE - 4)), Some(-2));
        assert_eq!(mate_in(250), None);
    }

    #[test]
    fn test_finds_mate_in_one() {
        // Back-rank mate: Ra1-a8
        let mut position = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        let result = search(&mut position, 3);

        assert_eq!(result.best_move.map(|mv| mv.to_string()).as_deref(), Some("a1a8"));
        assert_eq!(result.score, MATE_SCORE - 1);
        assert_eq!(mate_in(result.score), Some(1));
    }

    #[test]
    fn test_captures_hanging_queen() {
        let mut position = Position::from_fen("4k3/8/8/8/3q4/5N2/8/4K3 w - - 0 1").unwrap();
        let result = search(&mut position, 3);

        assert_eq!(result.best_move.map(|mv| mv.to_string()).as_deref(), Some("f3d4"));
        assert!(result.score > 200);
    }

    #[test]
    fn test_terminal_positions_return_no_move() {
        let mut mated = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1").unwrap();
        let result = search(&mut mated, 4);
        assert!(result.best_move.is_none());
        assert_eq!(result.score, -MATE_SCORE);

        let mut stalemate = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let result = search(&mut stalemate, 4);
        assert!(result.best_move.is_none());
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_fixed_depth_is_deterministic() {
        let mut position = Position::from_fen(chess_core::positions::KIWIPETE).unwrap();
        let first = search(&mut position, 3);
        let second = search(&mut position, 3);

        assert_eq!(first.best_move, second.best_move);
        assert_eq!(first.score, second.score);
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.pv, second.pv);
    }

    #[test]
    fn test_pv_starts_with_best_move_and_is_legal() {
        let mut position = Position::from_fen(chess_core::positions::KIWIPETE).unwrap();
        let result = search(&mut position, 4);

        assert_eq!(result.pv.first().copied(), result.best_move);
        let mut replay = position.clone();
        for mv in &result.pv {
            assert!(replay.legal_moves().contains(mv));
            replay.make_move(*mv);
        }
    }

    #[test]
    fn test_stop_flag_aborts_and_restores_position() {
        let mut engine = SearchEngine::default();
        let mut position = Position::from_fen(chess_core::positions::KIWIPETE).unwrap();
        let before = position.clone();

        engine.stop_handle().store(true, Ordering::Relaxed);
        let result = engine.search(&mut position, &SearchLimits::infinite());

        assert!(result.stopped);
        assert!(result.best_move.is_some());
        assert!(position.legal_moves().contains(&result.best_move.unwrap()));
        assert_eq!(position, before);
    }

    #[test]
    fn test_info_callback_reports_each_depth() {
        use std::sync::Mutex;

        let depths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&depths);
        let mut engine = SearchEngine::default();
        engine.set_info_callback(Some(Box::new(move |progress: &SearchProgress| {
            sink.lock().unwrap().push(progress.depth);
        })));

        let mut position = Position::new();
        let result = engine.search(&mut position, &SearchLimits::depth(3));
        assert_eq!(result.depth, 3);
        assert_eq!(*depths.lock().unwrap(), vec![1, 2, 3]);
    }
}
