mod manager;
mod session;

pub use manager::AuthManager;
pub use session::{FileTokenStorage, MemoryTokenStorage, Session, TokenStorage};
