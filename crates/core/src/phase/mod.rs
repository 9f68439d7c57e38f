//! Plot job progress and its inference from engine logs.
//!
//! Two log grammars are recognized, one per plotting engine. The grammars are
//! the only contract with the engines; wording changes there silently break
//! inference, which is why `tests/log_fixtures.rs` replays captured logs.

mod parser;
mod types;

pub use parser::{parse_log_header, parse_phase, LogDialect, LogHeader};
pub use types::Phase;
