use std::time::Duration;

/// Enums the different errors possible when operating the byte channel
#[derive(Debug)]
pub enum ChannelError {
    ReadError,
    WriteError,
    TxTimeout,
}

/// Trait for the receiving half of a duplex byte channel.
pub trait ByteReader {
    /// Reads up to `buf.len()` bytes into `buf` and returns how many bytes
    /// arrived. Returns `Ok(0)` when the timeout expires with no data.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, ChannelError>;
}

/// Trait for the transmitting half of a duplex byte channel.
pub trait ByteWriter {
    /// Offers `bytes_to_write` to the channel and returns how many bytes it
    /// accepted, which may be fewer than offered.
    fn write(&mut self, bytes_to_write: &[u8]) -> Result<usize, ChannelError>;

    /// Waits until every previously accepted byte has left the transmitter.
    fn wait_tx_done(&mut self, timeout: Duration) -> Result<(), ChannelError>;
}
