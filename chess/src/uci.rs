use std::io::{self, BufRead, Write};
use std::str::{FromStr, SplitWhitespace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use chess_core::Position;
use chess_engine::{
    mate_in, SearchConfig, SearchEngine, SearchLimits, SearchProgress, SearchResult, MAX_SIZE_MB,
};
use log::{debug, error, warn};

const ENGINE_NAME: &str = "Rust Chess Engine";
const ENGINE_AUTHOR: &str = "papersson";
/// Depth used when `go` carries no limit at all
const DEFAULT_DEPTH: u8 = 6;
pub const MAX_HASH_MB: usize = MAX_SIZE_MB;

/// Protocol output; shared with the search thread, which prints `info` and
/// `bestmove` lines.
pub type Output = Arc<Mutex<dyn Write + Send>>;

fn send(output: &Output, line: &str) {
    let mut out = output.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
        error!("failed to write protocol output: {e}");
    }
}

/// `info` line for one completed iteration.
pub fn format_info(progress: &SearchProgress) -> String {
    let score = match mate_in(progress.score) {
        Some(moves) => format!("mate {moves}"),
        None => format!("cp {}", progress.score),
    };
    let nps = if progress.time_ms > 0 {
        progress.nodes * 1000 / progress.time_ms
    } else {
        0
    };

    let mut line = format!(
        "info depth {} score {score} nodes {} time {} nps {nps}",
        progress.depth, progress.nodes, progress.time_ms
    );
    if !progress.pv.is_empty() {
        line.push_str(" pv");
        for mv in &progress.pv {
            line.push(' ');
            line.push_str(&mv.to_string());
        }
    }
    line
}

pub fn format_bestmove(result: &SearchResult) -> String {
    match result.best_move {
        Some(mv) => format!("bestmove {mv}"),
        // Null move (no legal moves)
        None => "bestmove 0000".to_string(),
    }
}

fn parse_value<'a, T: FromStr>(
    tokens: &mut impl Iterator<Item = &'a str>,
    name: &str,
) -> Option<T> {
    let token = tokens.next();
    let value = token.and_then(|t| t.parse().ok());
    if value.is_none() {
        warn!("invalid value for {name}: {token:?}");
    }
    value
}

/// Clock values may arrive negative when a GUI lets the clock run out.
fn parse_millis<'a>(tokens: &mut impl Iterator<Item = &'a str>, name: &str) -> Option<Duration> {
    parse_value::<i64>(tokens, name).map(|ms| Duration::from_millis(ms.max(0) as u64))
}

/// Parses the arguments of `go`. Unknown or malformed parameters are
/// skipped; a bare `go` searches to a fixed default depth.
pub fn parse_go<'a>(mut tokens: impl Iterator<Item = &'a str>) -> SearchLimits {
    let mut limits = SearchLimits::default();

    while let Some(token) = tokens.next() {
        match token {
            "depth" => limits.max_depth = parse_value(&mut tokens, token),
            "movetime" => {
                limits.move_time = parse_value(&mut tokens, token).map(Duration::from_millis)
            }
            "nodes" => limits.nodes = parse_value(&mut tokens, token),
            "infinite" => limits.infinite = true,
            "wtime" => limits.white_time = parse_millis(&mut tokens, token),
            "btime" => limits.black_time = parse_millis(&mut tokens, token),
            "winc" => limits.white_increment = parse_millis(&mut tokens, token),
            "binc" => limits.black_increment = parse_millis(&mut tokens, token),
            "movestogo" => limits.moves_to_go = parse_value(&mut tokens, token),
            other => debug!("ignoring go parameter {other}"),
        }
    }

    let unlimited = limits.max_depth.is_none()
        && limits.move_time.is_none()
        && limits.nodes.is_none()
        && !limits.infinite
        && limits.white_time.is_none()
        && limits.black_time.is_none();
    if unlimited {
        limits.max_depth = Some(DEFAULT_DEPTH);
    }
    limits
}

/// UCI front end. Commands are handled on the caller's thread; `go` hands
/// the search engine to a worker thread that gives it back when joined.
pub struct UciEngine {
    position: Position,
    /// `None` exactly while a search thread owns the engine
    engine: Option<SearchEngine>,
    search_thread: Option<JoinHandle<SearchEngine>>,
    stop: Arc<AtomicBool>,
    hash_mb: usize,
    output: Output,
    debug: bool,
}

impl UciEngine {
    pub fn new(output: Output, hash_mb: usize) -> Self {
        let engine = SearchEngine::new(SearchConfig {
            tt_size_mb: hash_mb.clamp(1, MAX_HASH_MB),
            ..SearchConfig::default()
        });
        Self {
            position: Position::new(),
            stop: engine.stop_handle(),
            hash_mb: engine.config().tt_size_mb,
            engine: Some(engine),
            search_thread: None,
            output,
            debug: false,
        }
    }

    /// Engine writing to standard output.
    pub fn stdout(hash_mb: usize) -> Self {
        let output: Output = Arc::new(Mutex::new(io::stdout()));
        Self::new(output, hash_mb)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn hash_mb(&self) -> usize {
        self.hash_mb
    }

    pub fn is_searching(&self) -> bool {
        self.search_thread.is_some()
    }

    /// Reads commands until `quit` or end of input.
    pub fn run(&mut self, input: impl BufRead) -> Result<()> {
        for line in input.lines() {
            let line = line.context("failed to read command")?;
            if !self.handle_command(&line) {
                break;
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Handles one command line. Returns `false` once the engine should exit.
    pub fn handle_command(&mut self, line: &str) -> bool {
        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else {
            return true;
        };

        match command {
            "uci" => self.handle_uci(),
            "debug" => match tokens.next() {
                Some("on") => self.debug = true,
                Some("off") => self.debug = false,
                other => warn!("malformed debug command: {other:?}"),
            },
            // Answered at once, even mid-search
            "isready" => self.send("readyok"),
            "setoption" => self.handle_setoption(tokens),
            "ucinewgame" => {
                self.wait_for_search();
                self.position = Position::new();
                if let Some(engine) = &mut self.engine {
                    engine.clear();
                }
            }
            "position" => self.handle_position(tokens),
            "go" => self.handle_go(tokens),
            "stop" => self.stop_search(),
            "quit" => {
                self.shutdown();
                return false;
            }
            _ => {
                debug!("ignoring unknown command: {line}");
                if self.debug {
                    self.send(&format!("info string unknown command {command}"));
                }
            }
        }
        true
    }

    fn send(&self, line: &str) {
        send(&self.output, line);
    }

    fn handle_uci(&self) {
        self.send(&format!("id name {ENGINE_NAME}"));
        self.send(&format!("id author {ENGINE_AUTHOR}"));
        self.send(&format!(
            "option name Hash type spin default {} min 1 max {MAX_HASH_MB}",
            SearchConfig::default().tt_size_mb
        ));
        self.send("uciok");
    }

    fn handle_setoption(&mut self, tokens: SplitWhitespace<'_>) {
        let words: Vec<&str> = tokens.collect();
        if words.first() != Some(&"name") {
            warn!("malformed setoption: {}", words.join(" "));
            return;
        }
        let name_end = words.iter().position(|w| *w == "value").unwrap_or(words.len());
        let name = words[1..name_end].join(" ");
        let value = words.get(name_end + 1..).unwrap_or_default().join(" ");

        if !name.eq_ignore_ascii_case("hash") {
            debug!("ignoring unknown option {name}");
            return;
        }
        let Ok(size_mb) = value.parse::<usize>() else {
            warn!("invalid Hash value: {value:?}");
            return;
        };

        self.wait_for_search();
        if let Some(engine) = &mut self.engine {
            engine.set_hash_size(size_mb.clamp(1, MAX_HASH_MB));
            self.hash_mb = engine.config().tt_size_mb;
        }
    }

    /// Loads the new position completely before replacing the current one,
    /// so a bad FEN leaves everything as it was. Moves are applied until the
    /// first one that is not legal.
    fn handle_position(&mut self, mut tokens: SplitWhitespace<'_>) {
        let (mut position, moves) = match tokens.next() {
            Some("startpos") => {
                match tokens.next() {
                    None | Some("moves") => {}
                    Some(other) => {
                        warn!("unexpected token after startpos: {other}");
                        return;
                    }
                }
                (Position::new(), tokens)
            }
            Some("fen") => {
                let fen = tokens
                    .by_ref()
                    .take_while(|token| *token != "moves")
                    .collect::<Vec<_>>()
                    .join(" ");
                match Position::from_fen(&fen) {
                    Ok(position) => (position, tokens),
                    Err(e) => {
                        warn!("rejecting position {fen:?}: {e}");
                        return;
                    }
                }
            }
            other => {
                warn!("malformed position command: {other:?}");
                return;
            }
        };

        for text in moves {
            if let Err(e) = position.apply_uci_move(text) {
                warn!("stopping at move {text}: {e}");
                break;
            }
        }

        self.wait_for_search();
        self.position = position;
    }

    fn handle_go(&mut self, tokens: SplitWhitespace<'_>) {
        let limits = parse_go(tokens);
        self.wait_for_search();
        let Some(mut engine) = self.engine.take() else {
            error!("no search engine available");
            return;
        };

        self.stop.store(false, Ordering::Relaxed);
        let info_output = Arc::clone(&self.output);
        engine.set_info_callback(Some(Box::new(move |progress: &SearchProgress| {
            send(&info_output, &format_info(progress));
        })));

        let mut position = self.position.clone();
        let output = Arc::clone(&self.output);
        self.search_thread = Some(thread::spawn(move || {
            let result = engine.search(&mut position, &limits);
            send(&output, &format_bestmove(&result));
            engine
        }));
    }

    /// Asks a running search to finish and waits for its `bestmove`.
    fn stop_search(&mut self) {
        if self.search_thread.is_some() {
            self.stop.store(true, Ordering::Relaxed);
        }
        self.wait_for_search();
    }

    fn wait_for_search(&mut self) {
        let Some(handle) = self.search_thread.take() else {
            return;
        };
        match handle.join() {
            Ok(engine) => self.engine = Some(engine),
            Err(_) => {
                error!("search thread panicked, starting a fresh engine");
                let engine = SearchEngine::new(SearchConfig {
                    tt_size_mb: self.hash_mb,
                    ..SearchConfig::default()
                });
                self.stop = engine.stop_handle();
                self.engine = Some(engine);
            }
        }
    }

    fn shutdown(&mut self) {
        self.stop_search();
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
