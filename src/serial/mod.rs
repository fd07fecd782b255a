pub mod channel;
#[cfg(target_os = "espidf")]
pub mod uart;

pub use self::channel::{ByteReader, ByteWriter, ChannelError};
#[cfg(target_os = "espidf")]
pub use self::uart::{UARTError, UART};
