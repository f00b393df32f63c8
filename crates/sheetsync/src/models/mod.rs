//! Domain models for synced mail

mod message;
mod row;

pub use message::{MessageId, ParsedEmail};
pub use row::SheetRow;
