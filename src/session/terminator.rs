/// Byte sequence marking the end of the inbound transmission.
pub const EOT_MARKER: [u8; 3] = [b'\n', b'\n', b'\n'];
pub const EOT_MARKER_LEN: usize = EOT_MARKER.len();

/// Outcome of feeding one byte through the detector.
pub struct Observation {
    /// Byte pushed out of the window, present once the window is full. On a
    /// stream ending with the marker, the evicted bytes are exactly the
    /// payload, in order.
    pub evicted: Option<u8>,
    /// True exactly when the window now equals [`EOT_MARKER`].
    pub matched: bool,
}

/// Sliding-window matcher for the end-of-transmission marker.
///
/// Holds the last [`EOT_MARKER_LEN`] bytes seen, zero-filled until that
/// many have arrived. The window doubles as a holdback: a byte leaves it
/// only once it can no longer be part of the marker, so marker bytes are
/// never handed on for storage. The outcome of a call depends only on the
/// ordered byte history, never on how the stream was chunked.
pub struct TerminatorDetector {
    window: [u8; EOT_MARKER_LEN],
    seen: usize,
}

impl TerminatorDetector {
    pub fn new() -> Self {
        TerminatorDetector {
            window: [0; EOT_MARKER_LEN],
            seen: 0,
        }
    }

    /// Shifts the window left by one, appends `byte` and compares against
    /// the marker.
    pub fn observe(&mut self, byte: u8) -> Observation {
        let evicted = if self.seen >= EOT_MARKER_LEN {
            Some(self.window[0])
        } else {
            self.seen += 1;
            None
        };
        self.window.rotate_left(1);
        self.window[EOT_MARKER_LEN - 1] = byte;
        Observation {
            evicted,
            matched: self.window == EOT_MARKER,
        }
    }
}

impl Default for TerminatorDetector {
    fn default() -> Self {
        Self::new()
    }
}
