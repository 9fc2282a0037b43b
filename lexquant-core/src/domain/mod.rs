//! Domain types for the token-to-signal pipeline.

pub mod signal;
pub mod token;
pub mod weight;

pub use signal::{StrategyToggle, TradeSignal};
pub use token::Token;
pub use weight::SemanticWeight;
