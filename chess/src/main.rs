use std::io::{self, Write};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chess_core::{perft, perft_divide, CastleSide, Color, Position};
use chess_engine::{Evaluatable, SearchConfig, SearchEngine, SearchLimits};
use chess_uci::{UciEngine, MAX_HASH_MB};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "UCI chess engine", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Transposition table size in MB (1 to 1024)
    #[arg(long, default_value_t = 16)]
    hash: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the UCI protocol on stdin/stdout (default)
    Uci,
    /// Count leaf nodes of the legal move tree
    Perft {
        depth: u8,
        #[arg(long)]
        fen: Option<String>,
    },
    /// Print the static evaluation of a position
    Eval {
        #[arg(long)]
        fen: Option<String>,
    },
    /// Search a position and print the best move
    Search {
        #[arg(long)]
        fen: Option<String>,
        #[arg(long, conflicts_with = "movetime")]
        depth: Option<u8>,
        /// Time limit in milliseconds
        #[arg(long)]
        movetime: Option<u64>,
    },
}

fn init_logging(debug: bool) {
    let log_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| {
        writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
    })
    .write_style(env_logger::WriteStyle::Never)
    // stdout carries protocol lines only
    .target(env_logger::Target::Stderr)
    .init();
}

fn load_position(fen: Option<&str>) -> Result<Position> {
    match fen {
        Some(fen) => Position::from_fen(fen).with_context(|| format!("invalid FEN: {fen}")),
        None => Ok(Position::new()),
    }
}

fn display_board(position: &Position) {
    println!("\n  a b c d e f g h");
    println!("  ---------------");

    for rank in (0..8).rev() {
        print!("{} ", rank + 1);
        for file in 0..8 {
            let square = chess_core::Square::from_index(rank * 8 + file);
            match square.and_then(|sq| position.piece_at(sq)) {
                Some(piece) => print!("{} ", piece.to_char()),
                None => print!(". "),
            }
        }
        println!("| {}", rank + 1);
    }

    println!("  ---------------");
    println!("  a b c d e f g h\n");

    let side = match position.side_to_move() {
        Color::White => "White",
        Color::Black => "Black",
    };
    println!("{side} to move");

    let castling = position.castling();
    let flags: String = [
        (Color::White, CastleSide::Kingside, 'K'),
        (Color::White, CastleSide::Queenside, 'Q'),
        (Color::Black, CastleSide::Kingside, 'k'),
        (Color::Black, CastleSide::Queenside, 'q'),
    ]
    .into_iter()
    .filter(|&(color, side, _)| castling.has(color, side))
    .map(|(_, _, flag)| flag)
    .collect();
    if !flags.is_empty() {
        println!("Castling: {flags}");
    }
    if let Some(ep) = position.en_passant() {
        println!("En passant: {ep}");
    }
    println!("Move {}", position.fullmove_number());
}

fn run_perft(depth: u8, fen: Option<&str>) -> Result<()> {
    let mut position = load_position(fen)?;
    println!("Running perft({depth})...");
    println!("Position: {}", position.to_fen());

    let start = Instant::now();
    if depth <= 3 {
        // Show move breakdown for shallow depths
        let results = perft_divide(&mut position, depth);
        let mut total = 0;
        for (mv, count) in &results {
            println!("{mv}: {count}");
            total += count;
        }
        println!("\nTotal: {total}");
    } else {
        let nodes = perft(&mut position, depth);
        let elapsed = start.elapsed();
        println!("Nodes: {nodes}");
        println!("Time: {:.2}s", elapsed.as_secs_f64());
        println!("NPS: {:.0}", nodes as f64 / elapsed.as_secs_f64().max(1e-9));
    }
    Ok(())
}

fn run_eval(fen: Option<&str>) -> Result<()> {
    let position = load_position(fen)?;
    display_board(&position);
    println!("Evaluation: {} cp (side to move)", position.evaluate());
    println!(
        "Absolute eval: {} cp (+ = White, - = Black)",
        position.evaluate_absolute()
    );
    Ok(())
}

fn run_search(fen: Option<&str>, limits: SearchLimits, hash_mb: usize) -> Result<()> {
    let mut position = load_position(fen)?;
    if let Some(depth) = limits.max_depth {
        if depth == 0 {
            bail!("depth must be at least 1");
        }
    }

    println!("Position: {}", position.to_fen());
    let mut engine = SearchEngine::new(SearchConfig {
        tt_size_mb: hash_mb,
        ..SearchConfig::default()
    });

    let start = Instant::now();
    let result = engine.search(&mut position, &limits);
    let elapsed = start.elapsed();

    let Some(best_move) = result.best_move else {
        println!("No legal moves available ({:?})", position.status());
        return Ok(());
    };
    println!("\nBest move: {best_move}");
    println!("Score: {} cp", result.score);
    println!("Depth: {}", result.depth);
    println!("Nodes: {}", result.nodes);
    let pv: Vec<String> = result.pv.iter().map(|mv| mv.to_string()).collect();
    println!("PV: {}", pv.join(" "));
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("NPS: {:.0}", result.nodes as f64 / elapsed.as_secs_f64().max(1e-9));
    if result.stopped {
        println!("(search stopped by limit)");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);
    let hash_mb = args.hash.clamp(1, MAX_HASH_MB);
    if hash_mb != args.hash {
        log::warn!("hash size {} MB out of range, using {hash_mb} MB", args.hash);
    }

    match args.command.unwrap_or(Command::Uci) {
        Command::Uci => {
            let mut engine = UciEngine::stdout(hash_mb);
            engine.run(io::stdin().lock())
        }
        Command::Perft { depth, fen } => run_perft(depth, fen.as_deref()),
        Command::Eval { fen } => run_eval(fen.as_deref()),
        Command::Search {
            fen,
            depth,
            movetime,
        } => {
            let limits = match (depth, movetime) {
                (_, Some(millis)) => SearchLimits::move_time(millis),
                (Some(depth), None) => SearchLimits::depth(depth),
                (None, None) => SearchLimits::depth(6),
            };
            run_search(fen.as_deref(), limits, hash_mb)
        }
    }
}
