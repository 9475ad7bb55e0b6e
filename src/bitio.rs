//! MSB-first bit-granular reader/writer shared by `ustream` and `cstream`.
//!
//! Bytes on the wire are MSB-first: bit 0 of the first byte is the
//! highest-order bit. The reader and writer are generic over the byte
//! source/sink traits below, so the same code serves an in-memory buffer
//! and a descriptor-backed stream without duplication, the same way a
//! codec built over a generic `R: Read + Seek` / `W: Write + Seek` serves
//! both transport kinds from one implementation.
//!
//! `peek`/`consume` are expressed as a register-based `peek(n) -> (u64,
//! usize)` rather than the C idiom of writing bits into a caller-supplied
//! buffer: Rust ownership makes "OR bits into a caller-supplied buffer"
//! awkward and unidiomatic, while a `u64` register (the codes here never
//! exceed 24 bits) captures the same "peek without consuming, learn how
//! many bits were actually available" semantics cleanly.

use crate::DYNRESULT;
use bit_vec::BitVec;
use std::io::{Read, Write};

/// Minimum size of a single refill chunk pulled from a descriptor.
const REFILL_CHUNK: usize = 1024;

/// Pull interface consumed by `BitReader`. `pull` returns `0` at EOF, the
/// same contract `std::io::Read::read` has for a fully-drained source.
pub trait ByteSource {
    fn pull(&mut self, dst: &mut [u8]) -> std::io::Result<usize>;
}

/// Push interface consumed by `BitWriter`. Implementations must retry
/// partial writes internally -- callers always get either "all of `src`
/// landed" or an error.
pub trait ByteSink {
    fn push(&mut self, src: &[u8]) -> std::io::Result<()>;
}

/// Adapts any `std::io::Read` descriptor into a `ByteSource`.
pub struct DescriptorSource<R: Read>(pub R);

impl<R: Read> ByteSource for DescriptorSource<R> {
    fn pull(&mut self, dst: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(dst)
    }
}

/// A fixed byte slice read as a `ByteSource`, simulating `read` over an
/// in-memory array.
pub struct MemSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MemSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> ByteSource for MemSource<'a> {
    fn pull(&mut self, dst: &mut [u8]) -> std::io::Result<usize> {
        let n = std::cmp::min(dst.len(), self.data.len() - self.pos);
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Adapts any `std::io::Write` descriptor into a `ByteSink`.
pub struct DescriptorSink<W: Write>(pub W);

impl<W: Write> ByteSink for DescriptorSink<W> {
    fn push(&mut self, src: &[u8]) -> std::io::Result<()> {
        self.0.write_all(src)
    }
}

/// A growable or fixed-capacity in-memory sink, the writer-side analogue of
/// `MemSource`. `get_buffer` exposes the bytes written so far.
pub struct MemSink {
    buf: Vec<u8>,
    can_realloc: bool,
    fixed_cap: usize,
}

impl MemSink {
    /// A sink that grows without bound (`max(1024, size*1.1)` at a time).
    pub fn growable() -> Self {
        Self { buf: Vec::new(), can_realloc: true, fixed_cap: 0 }
    }

    /// A sink that fails with `OutOfMemory` once `capacity` bytes have been
    /// written.
    pub fn fixed(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity), can_realloc: false, fixed_cap: capacity }
    }

    pub fn get_buffer(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buf
    }
}

impl ByteSink for MemSink {
    fn push(&mut self, src: &[u8]) -> std::io::Result<()> {
        if !self.can_realloc && self.buf.len() + src.len() > self.fixed_cap {
            return Err(std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                "fixed memory sink is full",
            ));
        }
        if self.can_realloc {
            let needed = self.buf.len() + src.len();
            if needed > self.buf.capacity() {
                let grown = std::cmp::max(REFILL_CHUNK, (self.buf.capacity() as f64 * 1.1) as usize);
                self.buf.reserve(std::cmp::max(grown, needed - self.buf.len()));
            }
        }
        self.buf.extend_from_slice(src);
        Ok(())
    }
}

/// MSB-first bit reader with transparent refill from an underlying
/// `ByteSource`.
///
/// Pending, not-yet-consumed bits live in `bits` (grounded directly on
/// `AdaptiveHuffman::bits`/`get_bit`/`drop_leading_bits` in
/// `tools/adaptive_huff.rs`): refilling appends freshly pulled bytes, and
/// whole already-consumed bytes are compacted off the front before a refill
/// once they are no longer needed, keeping the buffer bounded instead of
/// growing for the life of the stream.
pub struct BitReader<S: ByteSource> {
    source: S,
    bits: BitVec,
    ptr: usize,
    processed_bits: u64,
    source_eof: bool,
    last_deficit: Option<usize>,
}

impl<S: ByteSource> BitReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            bits: BitVec::new(),
            ptr: 0,
            processed_bits: 0,
            source_eof: false,
            last_deficit: None,
        }
    }

    pub fn processed_bits(&self) -> u64 {
        self.processed_bits
    }

    fn compact(&mut self) {
        if self.ptr == 0 {
            return;
        }
        let kept = self.bits.clone();
        self.bits = BitVec::new();
        for i in self.ptr..kept.len() {
            self.bits.push(kept.get(i).unwrap());
        }
        self.ptr = 0;
    }

    /// Ensures up to `n` unconsumed bits are buffered, refilling from the
    /// source in >= `REFILL_CHUNK`-byte chunks until either `n` bits are
    /// available or the source is exhausted.
    fn fill(&mut self, n: usize) {
        while !self.source_eof && self.bits.len() - self.ptr < n {
            if self.ptr >= 8 {
                self.compact();
            }
            let want = std::cmp::max(REFILL_CHUNK, (n + 7) / 8);
            let mut chunk = vec![0u8; want];
            match self.source.pull(&mut chunk) {
                Ok(0) => self.source_eof = true,
                Ok(got) => {
                    chunk.truncate(got);
                    self.bits.extend(BitVec::from_bytes(&chunk).iter());
                }
                Err(_) => self.source_eof = true,
            }
        }
    }

    /// Peeks up to `n` bits (`n <= 64`) without consuming them. The peeked
    /// bits are packed into the *high* end of the returned `u64`, so pulling
    /// out the top `k` bits of the peek (as `length_code::LengthCode::decode`
    /// does to index its 6-bit table) is a plain shift by `64 - k`.
    /// Returns `(value, bits_available)`; `bits_available < n` only at EOF.
    pub fn peek(&mut self, n: usize) -> (u64, usize) {
        debug_assert!(n <= 64);
        self.fill(n);
        let available = std::cmp::min(n, self.bits.len() - self.ptr);
        let mut value: u64 = 0;
        for i in 0..available {
            value <<= 1;
            value |= self.bits.get(self.ptr + i).unwrap() as u64;
        }
        if available > 0 {
            value <<= 64 - available;
        }
        (value, available)
    }

    /// Advances past `n` bits (clipped to what is actually available).
    pub fn consume(&mut self, n: usize) {
        let available = self.bits.len() - self.ptr;
        let take = std::cmp::min(n, available);
        self.ptr += take;
        self.processed_bits += take as u64;
    }

    /// Peeks then consumes exactly as many bits as were available.
    pub fn read(&mut self, n: usize) -> (u64, usize) {
        let (value, available) = self.peek(n);
        self.consume(available);
        (value, available)
    }

    /// Returns `true` if the most recent `peek`/`read` call starved (fewer
    /// bits came back than were requested) and a subsequent attempt at the
    /// same or larger width made no further progress -- the descriptor is
    /// genuinely exhausted mid-token rather than just needing one more
    /// refill. Callers implementing a peek-decode-retry loop (see
    /// `cstream::CStreamReader::decode_length`) use this to detect a
    /// truncated stream and surface `Error::UnexpectedEof` instead of
    /// spinning.
    pub fn stalled(&mut self, attempted: usize) -> bool {
        let stalled = self.source_eof && self.last_deficit == Some(attempted);
        self.last_deficit = Some(attempted);
        stalled
    }
}

/// MSB-first bit writer, buffering up to 64 pending bits and flushing whole
/// bytes to the underlying `ByteSink` as they fill.
pub struct BitWriter<K: ByteSink> {
    sink: K,
    pending: BitVec,
    processed_bits: u64,
}

impl<K: ByteSink> BitWriter<K> {
    pub fn new(sink: K) -> Self {
        Self { sink, pending: BitVec::new(), processed_bits: 0 }
    }

    pub fn processed_bits(&self) -> u64 {
        self.processed_bits
    }

    /// Appends the low `n` bits of `code` (`n <= 64`), MSB-first.
    pub fn write_bits(&mut self, code: u64, n: usize) -> DYNRESULT<()> {
        debug_assert!(n <= 64);
        for i in (0..n).rev() {
            self.pending.push((code >> i) & 1 != 0);
        }
        self.processed_bits += n as u64;
        self.flush_whole_bytes()
    }

    fn flush_whole_bytes(&mut self) -> DYNRESULT<()> {
        let whole_bytes = self.pending.len() / 8;
        if whole_bytes == 0 {
            return Ok(());
        }
        let bytes = self.pending.to_bytes();
        self.sink.push(&bytes[..whole_bytes])?;
        let remainder: BitVec = self.pending.iter().skip(whole_bytes * 8).collect();
        self.pending = remainder;
        Ok(())
    }

    /// Emits the padded tail byte (right-padded with zero bits) and flushes
    /// to the sink. Idempotent: calling it with no pending bits is a no-op
    /// write of zero bytes.
    pub fn flush_close(&mut self) -> DYNRESULT<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut tail = self.pending.clone();
        while tail.len() % 8 != 0 {
            tail.push(false);
        }
        let bytes = tail.to_bytes();
        self.sink.push(&bytes)?;
        self.pending = BitVec::new();
        Ok(())
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}
