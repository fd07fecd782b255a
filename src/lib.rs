mod utils;

pub mod serial;
pub mod session;

pub use session::SessionContext;
pub use utils::uart_replay_error;
