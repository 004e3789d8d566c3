pub mod uci;

pub use uci::{format_bestmove, format_info, parse_go, Output, UciEngine, MAX_HASH_MB};
