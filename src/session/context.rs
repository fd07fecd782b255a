use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
    thread,
    time::Duration,
};

use log::{error, info, warn};

use crate::serial::{ByteReader, ByteWriter};

use super::{
    state::{SessionFlag, SessionState},
    storage::ByteStore,
    terminator::{TerminatorDetector, EOT_MARKER_LEN},
};

/// Most bytes moved through the channel in one operation.
pub const CHUNK_SIZE: usize = 1024;

const READ_TIMEOUT: Duration = Duration::from_millis(50);
const RECEIVE_IDLE_DELAY: Duration = Duration::from_millis(10);
const STATE_POLL_INTERVAL: Duration = Duration::from_millis(100);
const PRE_SEND_DELAY: Duration = Duration::from_millis(1000);
const INTER_CHUNK_DELAY: Duration = Duration::from_millis(50);
const TX_DONE_TIMEOUT: Duration = Duration::from_millis(100);

/// State shared by the receive and send tasks of one session.
/// - `flag`: the session state cell, the only coordination point between
///   the two tasks
/// - `store`: the payload storage, written by the receiver during
///   Receiving and read by the sender during Sending
/// - `total_received` / `total_sent`: monotonic byte counters
/// - `shutdown`: cancellation signal observed at every poll point
pub struct SessionContext {
    flag: SessionFlag,
    store: Mutex<ByteStore>,
    total_received: AtomicUsize,
    total_sent: AtomicUsize,
    shutdown: AtomicBool,
}

impl SessionContext {
    pub fn new(capacity: usize) -> Self {
        SessionContext {
            flag: SessionFlag::new(),
            store: Mutex::new(ByteStore::new(capacity)),
            total_received: AtomicUsize::new(0),
            total_sent: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        self.flag.current()
    }

    /// Bytes pulled off the channel so far, marker bytes included.
    pub fn total_received(&self) -> usize {
        self.total_received.load(Ordering::Acquire)
    }

    /// Bytes the channel has accepted back so far.
    pub fn total_sent(&self) -> usize {
        self.total_sent.load(Ordering::Acquire)
    }

    /// Asks both loops to stop at their next poll point.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Runs `operation` with the store locked.
    pub fn with_store<T>(&self, operation: impl FnOnce(&mut ByteStore) -> T) -> T {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        operation(&mut store)
    }
}

/// Pulls bytes off the channel while the session is in the Receiving
/// state, storing the payload and watching for the end-of-transmission
/// marker. On a match the logical size is pinned to the payload length,
/// the session moves to Sending and the task ends. Bytes arriving after
/// the marker within the same physical read are discarded; the device is
/// single-session and never returns to Receiving.
pub fn receive_loop(ctx: &SessionContext, reader: &mut impl ByteReader) {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut detector = TerminatorDetector::new();

    info!("Receive task started, waiting for data");

    while ctx.state() == SessionState::Receiving && !ctx.shutdown_requested() {
        let len = match reader.read(&mut chunk, READ_TIMEOUT) {
            Ok(len) => len,
            Err(e) => {
                warn!("Channel read failed: {:?}", e);
                0
            }
        };

        if len == 0 {
            thread::sleep(RECEIVE_IDLE_DELAY);
            continue;
        }

        info!("Received {} bytes", len);
        ctx.with_store(|store| {
            for &byte in &chunk[..len] {
                let received = ctx.total_received.load(Ordering::Acquire);
                let observation = detector.observe(byte);
                if let Some(evicted) = observation.evicted {
                    // Dropped on overflow, already logged by the store.
                    let _ = store.write(evicted, received - EOT_MARKER_LEN);
                }
                ctx.total_received.store(received + 1, Ordering::Release);

                if observation.matched {
                    info!("End of transmission detected after {} bytes", received + 1);
                    store.truncate(received + 1 - EOT_MARKER_LEN);
                    info!("Final data size: {} bytes", store.size());
                    if let Err(e) = ctx
                        .flag
                        .transition(SessionState::Receiving, SessionState::Sending)
                    {
                        error!("State transition rejected: {:?}", e);
                    }
                    break;
                }
            }
        });
    }

    info!("Received {} bytes total", ctx.total_received());
}

/// Waits for the session to reach the Sending state, then drains the
/// stored payload back through the channel in bounded chunks. Only bytes
/// the channel actually accepted advance `total_sent`; a short or empty
/// write is retried. Once the whole payload is out the session moves to
/// Idle and the task ends.
pub fn send_loop(ctx: &SessionContext, writer: &mut impl ByteWriter) {
    let mut chunk = [0u8; CHUNK_SIZE];

    info!("Send task started, waiting for state transition");

    while !ctx.flag.wait_for(SessionState::Sending, STATE_POLL_INTERVAL) {
        if ctx.shutdown_requested() {
            return;
        }
    }

    let actual_size = ctx.with_store(|store| store.size());
    info!("Starting to send exactly {} bytes back", actual_size);

    thread::sleep(PRE_SEND_DELAY);

    while ctx.total_sent() < actual_size && !ctx.shutdown_requested() {
        let sent_so_far = ctx.total_sent();
        let chunk_len = (actual_size - sent_so_far).min(CHUNK_SIZE);

        ctx.with_store(|store| {
            for (offset, slot) in chunk[..chunk_len].iter_mut().enumerate() {
                *slot = store.read(sent_so_far + offset);
            }
        });

        match writer.write(&chunk[..chunk_len]) {
            Ok(accepted) if accepted > 0 => {
                ctx.total_sent.fetch_add(accepted, Ordering::AcqRel);
                info!(
                    "Sent {} bytes, total: {}/{}",
                    accepted,
                    ctx.total_sent(),
                    actual_size
                );
            }
            Ok(_) => warn!("Channel accepted no bytes, retrying"),
            Err(e) => warn!("Channel write failed: {:?}", e),
        }

        if let Err(e) = writer.wait_tx_done(TX_DONE_TIMEOUT) {
            warn!("Transmit completion wait failed: {:?}", e);
        }
        thread::sleep(INTER_CHUNK_DELAY);
    }

    if ctx.total_sent() == actual_size {
        info!("Transmission complete. Sent {} bytes", ctx.total_sent());
        if let Err(e) = ctx
            .flag
            .transition(SessionState::Sending, SessionState::Idle)
        {
            error!("State transition rejected: {:?}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use std::{collections::VecDeque, sync::Arc};

    use crate::serial::ChannelError;

    use super::*;

    struct ScriptedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ScriptedReader {
        fn new(chunks: &[&[u8]]) -> Self {
            ScriptedReader {
                chunks: chunks.iter().map(|chunk| chunk.to_vec()).collect(),
            }
        }
    }

    impl ByteReader for ScriptedReader {
        fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, ChannelError> {
            match self.chunks.pop_front() {
                Some(mut chunk) => {
                    let len = chunk.len().min(buf.len());
                    if chunk.len() > len {
                        self.chunks.push_front(chunk.split_off(len));
                    }
                    buf[..len].copy_from_slice(&chunk);
                    Ok(len)
                }
                None => Ok(0),
            }
        }
    }

    struct RecordingWriter {
        written: Vec<u8>,
        accepted_per_call: Vec<usize>,
        accept_script: VecDeque<usize>,
    }

    impl RecordingWriter {
        fn new() -> Self {
            RecordingWriter {
                written: Vec::new(),
                accepted_per_call: Vec::new(),
                accept_script: VecDeque::new(),
            }
        }

        fn with_accept_script(script: &[usize]) -> Self {
            let mut writer = Self::new();
            writer.accept_script = script.iter().copied().collect();
            writer
        }
    }

    impl ByteWriter for RecordingWriter {
        fn write(&mut self, bytes_to_write: &[u8]) -> Result<usize, ChannelError> {
            let cap = self.accept_script.pop_front().unwrap_or(usize::MAX);
            let accepted = bytes_to_write.len().min(cap);
            self.written.extend_from_slice(&bytes_to_write[..accepted]);
            self.accepted_per_call.push(accepted);
            Ok(accepted)
        }

        fn wait_tx_done(&mut self, _timeout: Duration) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn payload_of(len: usize) -> Vec<u8> {
        // Never produces three consecutive line feeds.
        (0..len).map(|position| (position % 251) as u8).collect()
    }

    fn receive(ctx: &SessionContext, chunks: &[&[u8]]) {
        let mut reader = ScriptedReader::new(chunks);
        receive_loop(ctx, &mut reader);
    }

    #[test]
    fn test0_short_payload_is_stored_and_state_moves_to_sending() {
        let ctx = SessionContext::new(2048);
        receive(&ctx, &[&[0x41, 0x42, 0x43, 0x0A, 0x0A, 0x0A]]);

        assert_eq!(ctx.state(), SessionState::Sending);
        assert_eq!(ctx.total_received(), 6);
        ctx.with_store(|store| {
            assert_eq!(store.size(), 3);
            assert_eq!([store.read(0), store.read(1), store.read(2)], *b"ABC");
        });
    }

    #[test]
    fn test1_detection_is_independent_of_chunk_boundaries() {
        let stream = b"hello\nworld\n\n\n";
        let whole = SessionContext::new(64);
        receive(&whole, &[stream]);
        let split = SessionContext::new(64);
        receive(&split, &[&stream[..1], &stream[1..4], &stream[4..]]);

        assert_eq!(whole.total_received(), split.total_received());
        whole.with_store(|a| {
            split.with_store(|b| {
                assert_eq!(a.size(), b.size());
                for position in 0..a.size() {
                    assert_eq!(a.read(position), b.read(position));
                }
            })
        });
    }

    #[test]
    fn test2_bytes_after_the_marker_in_the_same_read_are_discarded() {
        let ctx = SessionContext::new(64);
        receive(&ctx, &[b"AB\n\n\nXYZ"]);

        assert_eq!(ctx.state(), SessionState::Sending);
        assert_eq!(ctx.total_received(), 5);
        ctx.with_store(|store| assert_eq!(store.size(), 2));
    }

    #[test]
    fn test3_payload_filling_the_capacity_stores_without_overflow() {
        let payload = payload_of(2048);
        let ctx = SessionContext::new(2048);
        receive(&ctx, &[&payload[..1024], &payload[1024..], b"\n\n\n"]);

        ctx.with_store(|store| {
            assert_eq!(store.size(), 2048);
            assert_eq!(store.overflow_count(), 0);
            assert_eq!(store.read(2047), payload[2047]);
        });
        assert_eq!(ctx.state(), SessionState::Sending);
    }

    #[test]
    fn test4_payload_past_the_capacity_drops_the_excess() {
        let payload = payload_of(2058);
        let ctx = SessionContext::new(2048);
        receive(
            &ctx,
            &[&payload[..1024], &payload[1024..2048], &payload[2048..], b"\n\n\n"],
        );

        ctx.with_store(|store| {
            assert_eq!(store.size(), 2048);
            assert_eq!(store.overflow_count(), 10);
            for position in (0..2048).step_by(97) {
                assert_eq!(store.read(position), payload[position]);
            }
        });
    }

    #[test]
    fn test5_empty_payload_sends_nothing_and_goes_idle() {
        let ctx = SessionContext::new(64);
        receive(&ctx, &[b"\n\n\n"]);
        ctx.with_store(|store| assert_eq!(store.size(), 0));

        let mut writer = RecordingWriter::new();
        send_loop(&ctx, &mut writer);
        assert_eq!(ctx.state(), SessionState::Idle);
        assert_eq!(ctx.total_sent(), 0);
        assert!(writer.written.is_empty());
    }

    #[test]
    fn test6_send_drains_the_payload_in_bounded_chunks() {
        let payload = payload_of(2500);
        let ctx = SessionContext::new(4096);
        ctx.with_store(|store| {
            for (position, &byte) in payload.iter().enumerate() {
                store.write(byte, position).unwrap();
            }
        });
        ctx.flag
            .transition(SessionState::Receiving, SessionState::Sending)
            .unwrap();

        let mut writer = RecordingWriter::new();
        send_loop(&ctx, &mut writer);

        assert_eq!(writer.accepted_per_call, [1024, 1024, 452]);
        assert_eq!(writer.written, payload);
        assert_eq!(ctx.total_sent(), 2500);
        assert_eq!(ctx.state(), SessionState::Idle);
    }

    #[test]
    fn test7_short_and_empty_writes_are_retried() {
        let payload = payload_of(250);
        let ctx = SessionContext::new(256);
        ctx.with_store(|store| {
            for (position, &byte) in payload.iter().enumerate() {
                store.write(byte, position).unwrap();
            }
        });
        ctx.flag
            .transition(SessionState::Receiving, SessionState::Sending)
            .unwrap();

        let mut writer = RecordingWriter::with_accept_script(&[0, 100]);
        send_loop(&ctx, &mut writer);

        assert_eq!(writer.accepted_per_call, [0, 100, 150]);
        assert_eq!(writer.written, payload);
        assert_eq!(ctx.total_sent(), 250);
        assert_eq!(ctx.state(), SessionState::Idle);
    }

    #[test]
    fn test8_concurrent_tasks_replay_the_payload() {
        let payload = payload_of(300);
        let ctx = Arc::new(SessionContext::new(2048));

        let receiver = {
            let ctx = ctx.clone();
            let chunks: Vec<Vec<u8>> = vec![
                payload[..128].to_vec(),
                payload[128..].to_vec(),
                b"\n\n\n".to_vec(),
            ];
            thread::spawn(move || {
                let mut reader = ScriptedReader {
                    chunks: chunks.into(),
                };
                receive_loop(&ctx, &mut reader);
            })
        };
        let sender = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                let mut writer = RecordingWriter::new();
                send_loop(&ctx, &mut writer);
                writer
            })
        };

        receiver.join().unwrap();
        let writer = sender.join().unwrap();

        assert_eq!(ctx.state(), SessionState::Idle);
        assert_eq!(ctx.total_received(), 303);
        assert_eq!(ctx.total_sent(), 300);
        assert_eq!(writer.written, payload);
    }

    #[test]
    fn test9_shutdown_stops_both_loops_before_any_transition() {
        let ctx = SessionContext::new(64);
        ctx.request_shutdown();

        let mut reader = ScriptedReader::new(&[]);
        receive_loop(&ctx, &mut reader);
        let mut writer = RecordingWriter::new();
        send_loop(&ctx, &mut writer);

        assert_eq!(ctx.state(), SessionState::Receiving);
        assert!(writer.written.is_empty());
    }
}
