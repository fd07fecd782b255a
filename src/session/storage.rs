use log::{error, info};

/// Capacity of the on-device payload storage, in bytes.
pub const STORAGE_CAPACITY: usize = 2048;

const PROGRESS_LOG_INTERVAL: usize = 100;

/// Enums the different errors possible when accessing the byte store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    Overflow { position: usize },
    OutOfRangeRead { position: usize },
}

/// Fixed-capacity append-only store holding the payload of one session.
/// - `data`: backing buffer, never resized
/// - `size`: number of logically valid bytes, always `<= capacity`
///
/// Writes past the capacity are rejected and reads past `size` yield a zero
/// byte; both are recoverable conditions tracked by the counters below.
pub struct ByteStore {
    data: Box<[u8]>,
    size: usize,
    overflow_count: usize,
    out_of_range_count: usize,
}

impl ByteStore {
    pub fn new(capacity: usize) -> Self {
        ByteStore {
            data: vec![0; capacity].into_boxed_slice(),
            size: 0,
            overflow_count: 0,
            out_of_range_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Amount of writes rejected because their position was at or past the
    /// capacity.
    pub fn overflow_count(&self) -> usize {
        self.overflow_count
    }

    /// Amount of reads attempted at or past `size`.
    pub fn out_of_range_count(&self) -> usize {
        self.out_of_range_count
    }

    /// Stores `byte` at `position` and extends `size` to cover it. A
    /// position at or past the capacity drops the byte, leaves `size`
    /// untouched and reports [`StorageError::Overflow`].
    pub fn write(&mut self, byte: u8, position: usize) -> Result<(), StorageError> {
        if position >= self.data.len() {
            self.overflow_count += 1;
            error!("Storage overflow at position {}", position);
            return Err(StorageError::Overflow { position });
        }
        self.data[position] = byte;
        self.size = position + 1;
        if position % PROGRESS_LOG_INTERVAL == 0 {
            info!("Stored {} bytes so far", position + 1);
        }
        Ok(())
    }

    /// Returns the byte stored at `position`. A position at or past `size`
    /// yields a zero byte; callers must not rely on reads past `size`, the
    /// default is not distinguishable from stored data.
    pub fn read(&mut self, position: usize) -> u8 {
        if position < self.size {
            self.data[position]
        } else {
            self.out_of_range_count += 1;
            error!("Attempt to retrieve beyond storage at position {}", position);
            0
        }
    }

    /// Lowers `size` to `len`, discarding the logical tail. Used to trim
    /// the end-of-transmission marker off the payload. A `len` at or past
    /// the current `size` changes nothing.
    pub fn truncate(&mut self, len: usize) {
        if len < self.size {
            self.size = len;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test0_write_updates_size_and_content() {
        let mut store = ByteStore::new(16);
        store.write(b'A', 0).unwrap();
        store.write(b'B', 1).unwrap();
        assert_eq!(store.size(), 2);
        assert_eq!(store.read(0), b'A');
        assert_eq!(store.read(1), b'B');
    }

    #[test]
    fn test1_write_at_capacity_overflows_and_keeps_size() {
        let mut store = ByteStore::new(4);
        for position in 0..4 {
            store.write(position as u8, position).unwrap();
        }
        let result = store.write(0xFF, 4);
        assert_eq!(result, Err(StorageError::Overflow { position: 4 }));
        assert_eq!(store.size(), 4);
        assert_eq!(store.overflow_count(), 1);
    }

    #[test]
    fn test2_read_past_size_yields_zero() {
        let mut store = ByteStore::new(8);
        store.write(0x41, 0).unwrap();
        assert_eq!(store.read(1), 0);
        assert_eq!(store.read(7), 0);
        assert_eq!(store.out_of_range_count(), 2);
    }

    #[test]
    fn test3_truncate_only_lowers_size() {
        let mut store = ByteStore::new(8);
        for position in 0..5 {
            store.write(position as u8, position).unwrap();
        }
        store.truncate(7);
        assert_eq!(store.size(), 5);
        store.truncate(3);
        assert_eq!(store.size(), 3);
        assert_eq!(store.read(4), 0);
    }
}
