mod fen;
mod helpers;
mod secret;

pub mod op;

pub use fen::{Fen, FenConversionError, CURRENCY_CODE, MAX_DONATION_YUAN, MIN_DONATION_YUAN};
pub use helpers::parse_boolean_flag;
pub use secret::Secret;
