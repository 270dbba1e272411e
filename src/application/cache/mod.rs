//! In-memory mirror of remote state.

mod state_cache;
mod typing;

pub use state_cache::StateCache;
pub use typing::{TYPING_TIMEOUT, TypingRegistry};
