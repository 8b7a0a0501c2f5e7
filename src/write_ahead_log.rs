/*!
The write-ahead log (WAL) persists writes to disk so that in-memory state can be recovered
after a crash.

# Format

A log file is a sequence of 32 KiB blocks. Each block holds physical records framed as:

1. A 4 byte masked CRC32C of the record type and payload
1. The payload length as a 2 byte little-endian integer
1. A 1 byte record type
1. The payload

A logical record larger than the space left in a block is fragmented: the pieces are typed
`First`, zero or more `Middle`, then `Last`; a record that fits emits a single `Full`. A block
never has room for a header in its last six bytes, so any such leftover is zero-filled and the
next record starts at the next block boundary. The type value zero is reserved so that
preallocated zero regions are never mistaken for real records.

Readers reassemble logical records with a small state machine and report corrupted or dropped
byte ranges to a caller-provided reporter while resuming at the next plausible record start.
*/

use integer_encoding::FixedInt;
use std::cmp;
use std::convert::TryFrom;

use crate::errors::{SiltDbError, SiltDbResult};
use crate::fs::{SequentialFile, WritableFile};
use crate::utils::crc::{masked_crc, unmask_checksum, CRC_CALCULATOR};

/// The length of a physical record header: checksum, length, and record type.
const HEADER_LENGTH_BYTES: usize = 4 + 2 + 1;

/// The size of blocks in the log file format. This is 32 KiB.
const BLOCK_SIZE_BYTES: usize = 32 * 1024;

/**
Physical record types.

The type states whether a physical record carries a whole logical record or which piece of a
fragmented one it is.
*/
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RecordType {
    /**
    Reserved for preallocated files.

    Zeroed regions of a block parse as this type and are skipped rather than reported as
    corruption.
    */
    Zero = 0,
    /// The record contains an entire logical record.
    Full = 1,
    /// The first fragment of a logical record.
    First = 2,
    /// An interior fragment of a logical record.
    Middle = 3,
    /// The last fragment of a logical record.
    Last = 4,
}

impl TryFrom<u8> for RecordType {
    type Error = SiltDbError;

    fn try_from(value: u8) -> SiltDbResult<RecordType> {
        let record_type = match value {
            0 => RecordType::Zero,
            1 => RecordType::Full,
            2 => RecordType::First,
            3 => RecordType::Middle,
            4 => RecordType::Last,
            _ => {
                return Err(SiltDbError::Corruption(format!(
                    "Unknown log record type. The value received was {}.",
                    value
                )))
            }
        };

        Ok(record_type)
    }
}

/// Handles all write activity to a log file.
pub struct LogWriter {
    /// The underlying file the log is written to.
    dest: Box<dyn WritableFile>,

    /**
    The offset within the current block being written to.

    This is not necessarily aligned to a block boundary mid-record.
    */
    current_block_offset: usize,
}

/// Public methods
impl LogWriter {
    /// Construct a [`LogWriter`] over a fresh file.
    pub fn new(dest: Box<dyn WritableFile>) -> Self {
        Self {
            dest,
            current_block_offset: 0,
        }
    }

    /**
    Construct a [`LogWriter`] that continues appending to a file that already holds
    `initial_length` bytes of log data.
    */
    pub fn new_for_reopened(dest: Box<dyn WritableFile>, initial_length: u64) -> Self {
        Self {
            dest,
            current_block_offset: (initial_length as usize) % BLOCK_SIZE_BYTES,
        }
    }

    /**
    Append one logical record to the log.

    The record is fragmented across blocks as necessary and the file is flushed after each
    physical record, so a crash can at worst leave one partially written physical record at
    the tail. An empty `data` still emits a single zero-length `Full` record.
    */
    pub fn add_record(&mut self, data: &[u8]) -> SiltDbResult<()> {
        let mut remaining = data;
        let mut is_first_fragment = true;

        loop {
            let leftover = BLOCK_SIZE_BYTES - self.current_block_offset;
            if leftover < HEADER_LENGTH_BYTES {
                if leftover > 0 {
                    // A header no longer fits. Fill the trailer with zeroes and switch to a
                    // new block.
                    const ZEROES: [u8; HEADER_LENGTH_BYTES - 1] = [0; HEADER_LENGTH_BYTES - 1];
                    self.dest.append(&ZEROES[..leftover])?;
                }

                self.current_block_offset = 0;
            }

            let available =
                BLOCK_SIZE_BYTES - self.current_block_offset - HEADER_LENGTH_BYTES;
            let fragment_length = cmp::min(remaining.len(), available);
            let is_last_fragment = fragment_length == remaining.len();

            let record_type = if is_first_fragment && is_last_fragment {
                RecordType::Full
            } else if is_first_fragment {
                RecordType::First
            } else if is_last_fragment {
                RecordType::Last
            } else {
                RecordType::Middle
            };

            self.emit_physical_record(record_type, &remaining[..fragment_length])?;
            remaining = &remaining[fragment_length..];
            is_first_fragment = false;

            if remaining.is_empty() {
                // Loop in do-while form so that an empty logical record still emits one
                // physical record.
                break;
            }
        }

        Ok(())
    }
}

/// Private methods
impl LogWriter {
    /// Frame and write a single physical record, then flush the sink.
    fn emit_physical_record(
        &mut self,
        record_type: RecordType,
        data: &[u8],
    ) -> SiltDbResult<()> {
        debug_assert!(data.len() <= u16::MAX as usize);
        debug_assert!(
            self.current_block_offset + HEADER_LENGTH_BYTES + data.len() <= BLOCK_SIZE_BYTES
        );

        let checksum = masked_crc(&[&[record_type as u8], data]);

        let mut header = [0u8; HEADER_LENGTH_BYTES];
        header[0..4].copy_from_slice(&u32::encode_fixed_vec(checksum));
        header[4] = (data.len() & 0xff) as u8;
        header[5] = (data.len() >> 8) as u8;
        header[6] = record_type as u8;

        self.dest.append(&header)?;
        self.dest.append(data)?;
        self.dest.flush()?;

        self.current_block_offset += HEADER_LENGTH_BYTES + data.len();

        Ok(())
    }
}

/// Receives notice of byte ranges the log reader had to drop.
pub trait CorruptionReporter {
    /// Some `bytes_dropped` bytes were skipped because of `reason`.
    fn corruption(&mut self, bytes_dropped: usize, reason: &str);
}

/// The outcome of reading one physical record.
enum PhysicalRecord {
    /// A whole physical record, with the file offset its header started at.
    Fragment {
        record_type: RecordType,
        data: Vec<u8>,
        offset: u64,
    },

    /// A physical record with an out-of-range type byte.
    UnknownType { tag: u8, length: usize },

    /// The end of the file, possibly with a partially written record at the tail.
    Eof,

    /// A record that had to be dropped. Any reporting has already happened.
    Bad,
}

/// Handles all read activity against a log file.
pub struct LogReader {
    /// The underlying file the log is read from.
    file: Box<dyn SequentialFile>,

    /// Receiver for notices about dropped bytes.
    reporter: Option<Box<dyn CorruptionReporter>>,

    /// Whether to verify record checksums while reading.
    verify_checksums: bool,

    /**
    The byte offset at which reading logically begins.

    Physical records that start before this offset are silently skipped, as are corruption
    reports for byte ranges wholly before it.
    */
    initial_offset: u64,

    /// The bytes of the block currently being consumed.
    block_buffer: Vec<u8>,

    /// The read position within `block_buffer`.
    buffer_offset: usize,

    /// The file offset just past the end of `block_buffer`.
    end_of_buffer_offset: u64,

    /// Set once a read returned fewer bytes than a full block.
    eof: bool,

    /// The file offset of the start of the last logical record returned.
    last_record_offset: u64,

    /**
    True while the reader may be positioned mid-record after an initial-offset seek.

    Until a record with a type other than `Middle` or `Last` is seen, every fragment is
    dropped so that the tail of a spanning record is not mistaken for a fresh logical record.
    */
    resyncing: bool,
}

/// Public methods
impl LogReader {
    /**
    Construct a new [`LogReader`].

    * `file` - The log file to read, positioned at its start.
    * `reporter` - Receiver for corruption notices. Pass [`None`] to drop them.
    * `verify_checksums` - Whether to check record CRCs.
    * `initial_offset` - The byte offset to start reading at.
    */
    pub fn new(
        file: Box<dyn SequentialFile>,
        reporter: Option<Box<dyn CorruptionReporter>>,
        verify_checksums: bool,
        initial_offset: u64,
    ) -> Self {
        Self {
            file,
            reporter,
            verify_checksums,
            initial_offset,
            block_buffer: vec![],
            buffer_offset: 0,
            end_of_buffer_offset: 0,
            eof: false,
            last_record_offset: 0,
            resyncing: initial_offset > 0,
        }
    }

    /**
    Read the next logical record.

    Corrupted regions are reported to the reporter and skipped. Returns [`None`] once the end
    of the log is reached.
    */
    pub fn read_record(&mut self) -> Option<Vec<u8>> {
        if self.last_record_offset < self.initial_offset && !self.skip_to_initial_block() {
            return None;
        }

        // Consolidates the fragments of the logical record being reassembled.
        let mut assembled: Vec<u8> = vec![];
        let mut in_fragmented_record = false;
        // The offset of the first fragment of the record being reassembled.
        let mut prospective_record_offset: u64 = 0;

        loop {
            let physical_record = self.read_physical_record();

            if self.resyncing {
                match &physical_record {
                    PhysicalRecord::Fragment {
                        record_type: RecordType::Middle,
                        ..
                    } => continue,
                    PhysicalRecord::Fragment {
                        record_type: RecordType::Last,
                        ..
                    } => {
                        self.resyncing = false;
                        continue;
                    }
                    _ => self.resyncing = false,
                }
            }

            match physical_record {
                PhysicalRecord::Fragment {
                    record_type: RecordType::Full,
                    data,
                    offset,
                } => {
                    if in_fragmented_record && !assembled.is_empty() {
                        self.report_corruption(
                            assembled.len(),
                            "partial record without end (lost tail)",
                        );
                    }

                    self.last_record_offset = offset;
                    return Some(data);
                }
                PhysicalRecord::Fragment {
                    record_type: RecordType::First,
                    data,
                    offset,
                } => {
                    if in_fragmented_record && !assembled.is_empty() {
                        self.report_corruption(
                            assembled.len(),
                            "partial record without end (lost tail)",
                        );
                    }

                    prospective_record_offset = offset;
                    assembled = data;
                    in_fragmented_record = true;
                }
                PhysicalRecord::Fragment {
                    record_type: RecordType::Middle,
                    data,
                    ..
                } => {
                    if !in_fragmented_record {
                        self.report_corruption(
                            data.len(),
                            "missing start of fragmented record",
                        );
                    } else {
                        assembled.extend(data);
                    }
                }
                PhysicalRecord::Fragment {
                    record_type: RecordType::Last,
                    data,
                    ..
                } => {
                    if !in_fragmented_record {
                        self.report_corruption(
                            data.len(),
                            "missing start of fragmented record",
                        );
                    } else {
                        assembled.extend(data);
                        self.last_record_offset = prospective_record_offset;
                        return Some(assembled);
                    }
                }
                PhysicalRecord::Fragment {
                    record_type: RecordType::Zero,
                    data,
                    ..
                } => {
                    // Zero is never emitted by the writer; `read_physical_record` filters the
                    // trailing-zero form so anything left is treated as unknown.
                    let dropped = data.len() + assembled.len();
                    self.report_corruption(dropped, "unknown record type Zero");
                    in_fragmented_record = false;
                    assembled.clear();
                }
                PhysicalRecord::UnknownType { tag, length } => {
                    let mut dropped = length;
                    if in_fragmented_record {
                        dropped += assembled.len();
                    }
                    self.report_corruption(dropped, &format!("unknown record type {}", tag));
                    in_fragmented_record = false;
                    assembled.clear();
                }
                PhysicalRecord::Eof => {
                    // A record being reassembled at EOF means the writer died mid-record.
                    // The tail is dropped without a report, matching the treatment of a
                    // truncated physical record.
                    return None;
                }
                PhysicalRecord::Bad => {
                    if in_fragmented_record {
                        self.report_corruption(assembled.len(), "error in middle of record");
                        in_fragmented_record = false;
                        assembled.clear();
                    }
                }
            }
        }
    }

    /// The file offset of the start of the last record returned by `read_record`.
    pub fn last_record_offset(&self) -> u64 {
        self.last_record_offset
    }
}

/// Private methods
impl LogReader {
    /// The number of unconsumed bytes in the block buffer.
    fn buffer_remaining(&self) -> usize {
        self.block_buffer.len() - self.buffer_offset
    }

    /**
    Skip ahead to the start of the first block at or before the initial offset.

    If the initial offset lands in a block's trailing zero region, reading starts at the next
    block instead. Returns false if the underlying skip failed.
    */
    fn skip_to_initial_block(&mut self) -> bool {
        let offset_in_block = self.initial_offset % (BLOCK_SIZE_BYTES as u64);
        let mut block_start_location = self.initial_offset - offset_in_block;

        // A header never starts in the trailer region.
        if offset_in_block > (BLOCK_SIZE_BYTES - (HEADER_LENGTH_BYTES - 1)) as u64 {
            block_start_location += BLOCK_SIZE_BYTES as u64;
        }

        self.end_of_buffer_offset = block_start_location;

        if block_start_location > 0 {
            if let Err(error) = self.file.skip(block_start_location) {
                self.report_drop(block_start_location as usize, &error.to_string());
                return false;
            }
        }

        true
    }

    /// Read and validate the next physical record, refilling the block buffer as needed.
    fn read_physical_record(&mut self) -> PhysicalRecord {
        loop {
            if self.buffer_remaining() < HEADER_LENGTH_BYTES {
                if !self.eof {
                    // The last block was fully consumed. Read the next one.
                    self.block_buffer.clear();
                    self.block_buffer.resize(BLOCK_SIZE_BYTES, 0);
                    self.buffer_offset = 0;

                    match self.file.read(&mut self.block_buffer) {
                        Ok(bytes_read) => {
                            self.block_buffer.truncate(bytes_read);
                            self.end_of_buffer_offset += bytes_read as u64;
                            if bytes_read < BLOCK_SIZE_BYTES {
                                self.eof = true;
                            }
                        }
                        Err(error) => {
                            self.block_buffer.clear();
                            self.report_drop(BLOCK_SIZE_BYTES, &error.to_string());
                            self.eof = true;
                            return PhysicalRecord::Eof;
                        }
                    }

                    continue;
                }

                // A truncated header at the end of the file. This happens when the writer
                // dies mid-header and is not reported as corruption.
                self.buffer_offset = self.block_buffer.len();
                return PhysicalRecord::Eof;
            }

            let header =
                &self.block_buffer[self.buffer_offset..self.buffer_offset + HEADER_LENGTH_BYTES];
            let length = (header[4] as usize) | ((header[5] as usize) << 8);
            let tag = header[6];
            let stored_checksum = u32::decode_fixed(&header[0..4]);

            if HEADER_LENGTH_BYTES + length > self.buffer_remaining() {
                let drop_size = self.buffer_remaining();
                self.buffer_offset = self.block_buffer.len();
                if !self.eof {
                    self.report_corruption(drop_size, "bad record length");
                    return PhysicalRecord::Bad;
                }

                // The writer died mid-payload. Not reported.
                return PhysicalRecord::Eof;
            }

            if tag == RecordType::Zero as u8 && length == 0 {
                // A zeroed region, e.g. from file preallocation. Skip the rest of the block
                // without reporting.
                self.buffer_offset = self.block_buffer.len();
                return PhysicalRecord::Bad;
            }

            let payload_start = self.buffer_offset + HEADER_LENGTH_BYTES;
            let payload = &self.block_buffer[payload_start..payload_start + length];

            if self.verify_checksums {
                let mut digest = CRC_CALCULATOR.digest();
                digest.update(&[tag]);
                digest.update(payload);
                if digest.finalize() != unmask_checksum(stored_checksum) {
                    // The whole rest of the block is suspect: a truncated record at a block
                    // boundary could otherwise make the tail of a real record look like a
                    // record start.
                    let drop_size = self.buffer_remaining();
                    self.buffer_offset = self.block_buffer.len();
                    self.report_corruption(drop_size, "checksum mismatch");
                    return PhysicalRecord::Bad;
                }
            }

            let data = payload.to_vec();
            self.buffer_offset += HEADER_LENGTH_BYTES + length;

            let record_start_offset = self.end_of_buffer_offset
                - self.buffer_remaining() as u64
                - (HEADER_LENGTH_BYTES + length) as u64;
            if record_start_offset < self.initial_offset {
                // The record started before the requested offset. Skip it silently.
                return PhysicalRecord::Bad;
            }

            return match RecordType::try_from(tag) {
                Ok(record_type) => PhysicalRecord::Fragment {
                    record_type,
                    data,
                    offset: record_start_offset,
                },
                Err(_) => PhysicalRecord::UnknownType { tag, length },
            };
        }
    }

    /// Report bytes dropped because corruption was detected.
    fn report_corruption(&mut self, bytes_dropped: usize, reason: &str) {
        self.report_drop(bytes_dropped, reason);
    }

    /**
    Report a dropped byte range to the reporter.

    Drops that lie wholly before the initial offset are suppressed.
    */
    fn report_drop(&mut self, bytes_dropped: usize, reason: &str) {
        let drop_end = self
            .end_of_buffer_offset
            .wrapping_sub(self.buffer_remaining() as u64)
            .wrapping_sub(bytes_dropped as u64);
        if let Some(reporter) = self.reporter.as_mut() {
            if drop_end >= self.initial_offset {
                log::warn!("Dropping {} bytes from the log: {}", bytes_dropped, reason);
                reporter.corruption(bytes_dropped, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, InMemoryFileSystem, RandomAccessFile};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// A reporter that accumulates reports for inspection.
    #[derive(Clone, Default)]
    struct CountingReporter {
        reports: Arc<Mutex<Vec<(usize, String)>>>,
    }

    impl CorruptionReporter for CountingReporter {
        fn corruption(&mut self, bytes_dropped: usize, reason: &str) {
            self.reports
                .lock()
                .unwrap()
                .push((bytes_dropped, reason.to_string()));
        }
    }

    impl CountingReporter {
        fn count(&self) -> usize {
            self.reports.lock().unwrap().len()
        }
    }

    const LOG_PATH: &str = "/db/000003.log";

    fn write_records(fs: &InMemoryFileSystem, records: &[Vec<u8>]) {
        let file = fs.create_file(Path::new(LOG_PATH)).unwrap();
        let mut writer = LogWriter::new(file);
        for record in records {
            writer.add_record(record).unwrap();
        }
    }

    fn read_all_records(fs: &InMemoryFileSystem, reporter: CountingReporter) -> Vec<Vec<u8>> {
        read_records_from(fs, reporter, 0)
    }

    fn read_records_from(
        fs: &InMemoryFileSystem,
        reporter: CountingReporter,
        initial_offset: u64,
    ) -> Vec<Vec<u8>> {
        let file = fs.open_sequential_file(Path::new(LOG_PATH)).unwrap();
        let mut reader = LogReader::new(file, Some(Box::new(reporter)), true, initial_offset);

        let mut records = vec![];
        while let Some(record) = reader.read_record() {
            records.push(record);
        }

        records
    }

    fn raw_log_bytes(fs: &InMemoryFileSystem) -> Vec<u8> {
        let file = fs.open_random_access_file(Path::new(LOG_PATH)).unwrap();
        let len = crate::fs::RandomAccessFile::len(file.as_ref()).unwrap() as usize;
        let mut buf = vec![0; len];
        file.read_at(&mut buf, 0).unwrap();

        buf
    }

    #[test]
    fn records_round_trip_in_order() {
        let fs = InMemoryFileSystem::new();
        let records = vec![
            b"first".to_vec(),
            vec![],
            vec![0xaa; 100_000],
            b"last".to_vec(),
        ];
        write_records(&fs, &records);

        let reporter = CountingReporter::default();
        let recovered = read_all_records(&fs, reporter.clone());

        assert_eq!(recovered, records);
        assert_eq!(reporter.count(), 0);
    }

    #[test]
    fn records_fragment_across_block_boundaries() {
        let fs = InMemoryFileSystem::new();
        let records = vec![vec![b'A'; 32_000], vec![b'B'; 1_000]];
        write_records(&fs, &records);

        let raw = raw_log_bytes(&fs);

        // The first record fits in the first block whole.
        assert_eq!(raw[6], RecordType::Full as u8);

        // The second starts at 32 007 and must split across the block boundary: a First
        // fragment filling the block, then a Last fragment in the next block.
        let second_header = 7 + 32_000;
        let first_fragment_length = BLOCK_SIZE_BYTES - second_header - HEADER_LENGTH_BYTES;
        assert_eq!(raw[second_header + 6], RecordType::First as u8);
        assert_eq!(
            (raw[second_header + 4] as usize) | ((raw[second_header + 5] as usize) << 8),
            first_fragment_length
        );
        assert_eq!(raw[BLOCK_SIZE_BYTES + 6], RecordType::Last as u8);

        let reporter = CountingReporter::default();
        let recovered = read_all_records(&fs, reporter.clone());
        assert_eq!(recovered, records);
        assert_eq!(reporter.count(), 0);
    }

    #[test]
    fn short_block_trailers_are_zero_filled() {
        let fs = InMemoryFileSystem::new();
        // Leaves 6 bytes in the first block, which cannot hold a header.
        let records = vec![vec![b'x'; BLOCK_SIZE_BYTES - HEADER_LENGTH_BYTES - 6], b"y".to_vec()];
        write_records(&fs, &records);

        let raw = raw_log_bytes(&fs);
        assert_eq!(&raw[BLOCK_SIZE_BYTES - 6..BLOCK_SIZE_BYTES], &[0u8; 6]);
        assert_eq!(raw[BLOCK_SIZE_BYTES + 6], RecordType::Full as u8);

        let reporter = CountingReporter::default();
        let recovered = read_all_records(&fs, reporter.clone());
        assert_eq!(recovered, records);
        assert_eq!(reporter.count(), 0);
    }

    #[test]
    fn truncated_tails_recover_a_record_prefix() {
        let fs = InMemoryFileSystem::new();
        let records = vec![vec![b'a'; 1_000], vec![b'b'; 90_000], vec![b'c'; 1_000]];
        write_records(&fs, &records);
        let raw = raw_log_bytes(&fs);

        for truncate_at in [raw.len() - 1, raw.len() - 500, 1_010, 1_007, 3, 0] {
            let truncated_fs = InMemoryFileSystem::new();
            let mut file = truncated_fs.create_file(Path::new(LOG_PATH)).unwrap();
            file.append(&raw[..truncate_at]).unwrap();

            let reporter = CountingReporter::default();
            let recovered = read_all_records(&truncated_fs, reporter.clone());

            assert!(recovered.len() <= records.len());
            assert_eq!(recovered, records[..recovered.len()].to_vec());
            assert!(
                reporter.count() <= 1,
                "Expected at most one report for a tail truncation at {}",
                truncate_at
            );
        }
    }

    #[test]
    fn a_corrupted_record_is_reported_and_skipped() {
        let fs = InMemoryFileSystem::new();
        let records = vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()];
        write_records(&fs, &records);

        let mut raw = raw_log_bytes(&fs);
        // Flip a payload byte of the first record.
        raw[HEADER_LENGTH_BYTES] ^= 0xff;
        let corrupted_fs = InMemoryFileSystem::new();
        let mut file = corrupted_fs.create_file(Path::new(LOG_PATH)).unwrap();
        file.append(&raw).unwrap();

        let reporter = CountingReporter::default();
        let recovered = read_all_records(&corrupted_fs, reporter.clone());

        // A checksum failure drops the rest of the block, so nothing survives here, but the
        // drop must be reported exactly once.
        assert!(recovered.is_empty());
        assert_eq!(reporter.count(), 1);
    }

    #[test]
    fn reading_from_an_initial_offset_skips_earlier_records() {
        let fs = InMemoryFileSystem::new();
        let records = vec![b"skipped".to_vec(), b"returned".to_vec()];
        write_records(&fs, &records);

        // Offset 1 is inside the first record's header, so only the second record survives,
        // and the skip generates no corruption reports.
        let reporter = CountingReporter::default();
        let recovered = read_records_from(&fs, reporter.clone(), 1);

        assert_eq!(recovered, vec![b"returned".to_vec()]);
        assert_eq!(reporter.count(), 0);
    }

    #[test]
    fn an_initial_offset_mid_spanning_record_resyncs_to_the_next_record() {
        let fs = InMemoryFileSystem::new();
        // The first record spans multiple blocks.
        let records = vec![vec![b'a'; 3 * BLOCK_SIZE_BYTES], b"after".to_vec()];
        write_records(&fs, &records);

        // Start at the third block boundary, which begins with fragments of the spanning
        // record. Resyncing must drop them without mistaking them for a record start.
        let reporter = CountingReporter::default();
        let recovered = read_records_from(&fs, reporter.clone(), (2 * BLOCK_SIZE_BYTES) as u64);

        assert_eq!(recovered, vec![b"after".to_vec()]);
        assert_eq!(reporter.count(), 0);
    }

    #[test]
    fn reopened_logs_continue_at_the_block_offset() {
        let fs = InMemoryFileSystem::new();
        write_records(&fs, &[b"existing".to_vec()]);

        let existing_length = fs.get_file_size(Path::new(LOG_PATH)).unwrap();

        // Re-open through a fresh appending handle backed by the same bytes.
        let raw = raw_log_bytes(&fs);
        let reopened_fs = InMemoryFileSystem::new();
        let mut file = reopened_fs.create_file(Path::new(LOG_PATH)).unwrap();
        file.append(&raw).unwrap();
        let mut writer = LogWriter::new_for_reopened(file, existing_length);
        writer.add_record(b"appended").unwrap();

        let reporter = CountingReporter::default();
        let recovered = read_all_records(&reopened_fs, reporter.clone());
        assert_eq!(recovered, vec![b"existing".to_vec(), b"appended".to_vec()]);
        assert_eq!(reporter.count(), 0);
    }
}
