//! Owns the sliding window, the look-ahead buffer, and (on the compression
//! side) the search tree; turns bytes into tokens and tokens back into
//! bytes.
//!
//! Tracks window/look-ahead position as ever-increasing absolute byte
//! counters into an append-and-occasionally-trim buffer rather than a true
//! circular ring buffer: `CompressorWindow`/`DecompressorWindow` never
//! rotate `SearchTree`'s slot array, they just never reuse a physical
//! array index for two different absolute positions (`slot = position mod
//! window_max`, re-derived on each access), and trim the front of their
//! buffers once the trimmed bytes can no longer be referenced.

use crate::bitio::{ByteSink, ByteSource};
use crate::search_tree::SearchTree;
use crate::{Error, Params};
use std::cmp::Ordering;

const REFILL_CHUNK: usize = 1024;
/// How far behind the window start a compressor's resident buffer is
/// allowed to lag before it is compacted.
const COMPRESS_COMPACT_SLACK: usize = 4096;
/// How far behind the reconstruction point a decompressor's resident
/// buffer is allowed to lag (beyond `window_max`) before flushing to the
/// sink.
const EXPAND_FLUSH_SLACK: usize = 4096;

/// A single LZ77 token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Symbol(u8),
    Phrase { offset: u16, length: u16 },
    Terminator,
}

/// Compression-side window: reads from a `ByteSource`, maintains the
/// sliding window/look-ahead over an append-only buffer of absolute
/// positions, and drives `SearchTree` to find the next token.
pub struct CompressorWindow<S: ByteSource> {
    source: S,
    params: Params,
    data: Vec<u8>,
    buffer_base: usize,
    wstart: usize,
    wsize: usize,
    lsize: usize,
    source_eof: bool,
    tree: SearchTree,
    started: bool,
    processed_bytes: u64,
}

impl<S: ByteSource> CompressorWindow<S> {
    pub fn new(source: S, params: Params) -> Self {
        Self {
            source,
            params,
            data: Vec::new(),
            buffer_base: 0,
            wstart: 0,
            wsize: 0,
            lsize: 0,
            source_eof: false,
            tree: SearchTree::new(params.window_max() as usize),
            started: false,
            processed_bytes: 0,
        }
    }

    pub fn processed_bytes(&self) -> u64 {
        self.processed_bytes
    }

    fn window_max(&self) -> usize {
        self.params.window_max() as usize
    }

    fn lookahead_max(&self) -> usize {
        self.params.lookahead_max() as usize
    }

    fn lookahead_pos(&self) -> usize {
        self.wstart + self.wsize
    }

    fn ensure_resident(&mut self, target_abs: usize) -> Result<(), Error> {
        while !self.source_eof && self.buffer_base + self.data.len() < target_abs {
            let need = target_abs - (self.buffer_base + self.data.len());
            let mut chunk = vec![0u8; std::cmp::max(REFILL_CHUNK, need)];
            let got = self.source.pull(&mut chunk)?;
            if got == 0 {
                self.source_eof = true;
                break;
            }
            chunk.truncate(got);
            self.data.extend_from_slice(&chunk);
        }
        Ok(())
    }

    fn maybe_compact(&mut self) {
        let behind = self.wstart.saturating_sub(self.buffer_base);
        if behind > self.window_max() + COMPRESS_COMPACT_SLACK {
            log::trace!(
                "ustream: compacting compressor buffer, dropping {behind} stale bytes (wstart={})",
                self.wstart
            );
            self.data.drain(0..behind);
            self.buffer_base = self.wstart;
        }
    }

    /// Pulls enough input to know the current look-ahead size, then updates
    /// `lsize` to `min(lookahead_max, real bytes resident from lookahead_pos)`.
    fn sync_lookahead(&mut self) -> Result<(), Error> {
        let lookahead_pos = self.lookahead_pos();
        self.ensure_resident(lookahead_pos + self.lookahead_max())?;
        let resident_end = self.buffer_base + self.data.len();
        self.lsize = std::cmp::min(self.lookahead_max(), resident_end.saturating_sub(lookahead_pos));
        Ok(())
    }

    fn byte_at(&self, abs_pos: usize) -> u8 {
        self.data[abs_pos - self.buffer_base]
    }

    /// Searches for and inserts the position `pos` into the tree at its
    /// natural slot (`pos % window_max`). The slot was last occupied
    /// `window_max` positions ago, by whichever position (if any) is now
    /// aging out of the window as `pos` enters it -- that stale entry must
    /// be properly unlinked via `SearchTree::delete` first, or the blind
    /// slot-array reset inside `find_and_insert` leaves a dangling
    /// reference to it (see the module doc comment). A no-op if the slot
    /// was never linked (during window growth, before `pos` reaches
    /// `window_max`).
    fn find_and_insert_at(&mut self, pos: usize) -> crate::search_tree::MatchResult {
        let slot = pos % self.window_max();
        self.tree.delete(slot);
        let lookahead_max = self.lookahead_max();
        let data = &self.data;
        let buffer_base = self.buffer_base;
        let wstart = self.wstart;
        let w = self.window_max();
        let resident_end = buffer_base + data.len();
        self.tree.find_and_insert(slot, lookahead_max, |p_slot| {
            let base_slot = wstart % w;
            let delta = (p_slot + w - base_slot) % w;
            let p_pos = wstart + delta;
            let effective_len = std::cmp::min(
                lookahead_max,
                std::cmp::min(
                    resident_end.saturating_sub(pos),
                    resident_end.saturating_sub(p_pos),
                ),
            );
            let mut i = 0;
            while i < effective_len {
                let a = data[pos + i - buffer_base];
                let b = data[p_pos + i - buffer_base];
                if a != b {
                    return (i, a.cmp(&b));
                }
                i += 1;
            }
            (effective_len, Ordering::Equal)
        })
    }

    /// Finds the next token: a symbol, a phrase, or (at end of input)
    /// `None`.
    pub fn next_token(&mut self) -> Result<Option<Token>, Error> {
        if !self.started {
            self.started = true;
            self.tree.init();
        }
        self.sync_lookahead()?;
        if self.lsize == 0 {
            return Ok(None);
        }

        let cur_pos = self.lookahead_pos();
        let result = self.find_and_insert_at(cur_pos);
        let length = std::cmp::min(result.length, self.lsize);
        let min_len = self.params.min_len() as usize;

        let (token, count) = if length < min_len {
            (Token::Symbol(self.byte_at(cur_pos)), 1)
        } else {
            (
                Token::Phrase { offset: result.offset as u16, length: length as u16 },
                length,
            )
        };

        for step in 0..count {
            if self.wsize < self.window_max() {
                self.wsize += 1;
            } else {
                self.wstart += 1;
            }

            if step + 1 < count {
                let new_pos = self.lookahead_pos();
                self.ensure_resident(new_pos + self.lookahead_max())?;
                self.find_and_insert_at(new_pos);
            }
        }
        self.processed_bytes += count as u64;
        self.maybe_compact();
        Ok(Some(token))
    }
}

/// Decompression-side window: writes to a `ByteSink`, reconstructing the
/// window purely from `Symbol`/`Phrase` tokens (no tree involved).
pub struct DecompressorWindow<K: ByteSink> {
    sink: K,
    params: Params,
    data: Vec<u8>,
    buffer_base: usize,
    window_pos: usize,
    processed_bytes: u64,
}

impl<K: ByteSink> DecompressorWindow<K> {
    pub fn new(sink: K, params: Params) -> Self {
        Self { sink, params, data: Vec::new(), buffer_base: 0, window_pos: 0, processed_bytes: 0 }
    }

    pub fn processed_bytes(&self) -> u64 {
        self.processed_bytes
    }

    fn window_max(&self) -> usize {
        self.params.window_max() as usize
    }

    fn lookahead_max(&self) -> usize {
        self.params.lookahead_max() as usize
    }

    fn wsize(&self) -> usize {
        std::cmp::min(self.window_pos, self.window_max())
    }

    fn push_to_sink(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.sink.push(bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::OutOfMemory {
                log::error!("ustream: decompressor sink out of memory writing {} bytes", bytes.len());
                Error::OutOfMemory
            } else {
                Error::Io(e)
            }
        })
    }

    fn maybe_flush(&mut self) -> Result<(), Error> {
        let keep_from = self.window_pos.saturating_sub(self.window_max());
        let behind = keep_from.saturating_sub(self.buffer_base);
        if behind > EXPAND_FLUSH_SLACK {
            let bytes = self.data[..behind].to_vec();
            self.push_to_sink(&bytes)?;
            self.data.drain(0..behind);
            self.buffer_base = keep_from;
        }
        Ok(())
    }

    /// Applies one token to the reconstruction, validating the phrase's
    /// `offset`/`length` against the current window state: `offset >=
    /// wsize`, or `length > lookahead_max`, are corruption.
    pub fn append_token(&mut self, token: Token) -> Result<(), Error> {
        match token {
            Token::Symbol(byte) => {
                self.data.push(byte);
                self.window_pos += 1;
                self.processed_bytes += 1;
            }
            Token::Phrase { offset, length } => {
                let offset = offset as usize;
                let length = length as usize;
                if length > self.lookahead_max() {
                    return Err(Error::CorruptStream(format!(
                        "phrase length {length} exceeds lookahead_max {}",
                        self.lookahead_max()
                    )));
                }
                if offset >= self.wsize() {
                    return Err(Error::CorruptStream(format!(
                        "phrase offset {offset} is outside the current window (size {})",
                        self.wsize()
                    )));
                }
                let src_start = self.window_pos - offset - 1;
                if offset + 1 >= length {
                    // No overlap: the matched run lies entirely before the
                    // write point, a bulk copy is safe.
                    let rel_start = src_start - self.buffer_base;
                    self.data.extend_from_within(rel_start..rel_start + length);
                } else {
                    // Intentional run-length encoding corner: the match
                    // extends into bytes this same token is producing, so a
                    // bulk memcpy would read stale/uninitialized output --
                    // copy byte by byte instead, each read seeing the
                    // previous iteration's write.
                    for i in 0..length {
                        let byte = self.data[src_start + i - self.buffer_base];
                        self.data.push(byte);
                    }
                }
                self.window_pos += length;
                self.processed_bytes += length as u64;
            }
            Token::Terminator => {
                return Err(Error::CorruptStream("Terminator passed to append_token".into()));
            }
        }
        self.maybe_flush()
    }

    /// Flushes any remaining resident bytes to the sink and returns it.
    pub fn close(mut self) -> Result<K, Error> {
        if !self.data.is_empty() {
            let bytes = std::mem::take(&mut self.data);
            self.push_to_sink(&bytes)?;
        }
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::{MemSink, MemSource};

    fn collect_tokens(data: &[u8], params: Params) -> Vec<Token> {
        let mut window = CompressorWindow::new(MemSource::new(data), params);
        let mut tokens = Vec::new();
        while let Some(tok) = window.next_token().unwrap() {
            tokens.push(tok);
        }
        tokens
    }

    fn apply_tokens(tokens: &[Token], params: Params) -> Vec<u8> {
        let mut window = DecompressorWindow::new(MemSink::growable(), params);
        for &tok in tokens {
            window.append_token(tok).unwrap();
        }
        window.close().unwrap().into_buffer()
    }

    #[test]
    fn round_trips_small_repetitive_input() {
        let params = Params::new(4, 2).unwrap();
        let data = b"BBAAABBC";
        let tokens = collect_tokens(data, params);
        let restored = apply_tokens(&tokens, params);
        assert_eq!(restored, data);
    }

    #[test]
    fn round_trips_window_sliding_through_all_positions() {
        let params = Params::new(4, 2).unwrap();
        let data = b"BAAABBCA";
        let tokens = collect_tokens(data, params);
        let restored = apply_tokens(&tokens, params);
        assert_eq!(restored, data);
    }

    #[test]
    fn round_trips_overlapping_match() {
        let params = Params::new(4, 2).unwrap();
        let data = b"AAABBCAB";
        let tokens = collect_tokens(data, params);
        let restored = apply_tokens(&tokens, params);
        assert_eq!(restored, data);
    }

    #[test]
    fn highly_compressible_run_exercises_overlap_copy() {
        let params = Params::new(512, 32).unwrap();
        let data = vec![0u8; 1024];
        let tokens = collect_tokens(&data, params);
        // at least one phrase should have offset < length (the
        // run-length-encoding corner).
        assert!(tokens.iter().any(|t| matches!(
            t,
            Token::Phrase { offset, length } if (*offset as usize) < *length as usize
        )));
        let restored = apply_tokens(&tokens, params);
        assert_eq!(restored, data);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let params = Params::new(8, 4).unwrap();
        let tokens = collect_tokens(b"", params);
        assert!(tokens.is_empty());
    }

    #[test]
    fn decompress_rejects_out_of_range_offset() {
        let params = Params::new(8, 4).unwrap();
        let mut window = DecompressorWindow::new(MemSink::growable(), params);
        window.append_token(Token::Symbol(b'A')).unwrap();
        let err = window.append_token(Token::Phrase { offset: 5, length: 2 }).unwrap_err();
        assert!(matches!(err, Error::CorruptStream(_)));
    }

    #[test]
    fn decompress_rejects_overlong_length() {
        let params = Params::new(8, 4).unwrap();
        let mut window = DecompressorWindow::new(MemSink::growable(), params);
        window.append_token(Token::Symbol(b'A')).unwrap();
        let err = window.append_token(Token::Phrase { offset: 0, length: 10 }).unwrap_err();
        assert!(matches!(err, Error::CorruptStream(_)));
    }
}
