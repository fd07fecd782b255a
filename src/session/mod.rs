pub mod context;
pub mod state;
pub mod storage;
pub mod terminator;

pub use self::context::{receive_loop, send_loop, SessionContext};
pub use self::state::{SessionState, StateError};
pub use self::storage::{ByteStore, StorageError, STORAGE_CAPACITY};
pub use self::terminator::{TerminatorDetector, EOT_MARKER, EOT_MARKER_LEN};
