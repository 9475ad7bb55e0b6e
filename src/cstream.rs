//! Compressed side: `bitio` plus the 12-byte wire header and the
//! symbol/phrase/terminator token layout.
//!
//! The header is a fixed big-endian `"LZ77"` magic / version / reserved /
//! window / lookahead layout, written and validated before the stream
//! switches into bit-granular token mode.

use crate::bitio::{BitReader, BitWriter, ByteSink, ByteSource};
use crate::length_code::{Decoded, LengthCode};
use crate::ustream::Token;
use crate::{Error, Params, DYNRESULT, HEADER_SIZE, MAGIC, VERSION};

/// Reads exactly `buf.len()` bytes from `source`, short of EOF. Used only
/// for the fixed-size 12-byte header, which is read before the stream
/// switches into bit-granular mode.
fn read_exact_from_source<S: ByteSource>(source: &mut S, buf: &mut [u8]) -> DYNRESULT<usize> {
    let mut got = 0;
    while got < buf.len() {
        let n = source.pull(&mut buf[got..])?;
        if n == 0 {
            break;
        }
        got += n;
    }
    Ok(got)
}

fn parse_header(buf: &[u8; HEADER_SIZE]) -> DYNRESULT<Params> {
    if buf[0..4] != MAGIC {
        log::warn!("cstream: bad magic {:?}", &buf[0..4]);
        return Err(Error::CorruptStream(format!("bad magic {:?}", &buf[0..4])));
    }
    if buf[4] != VERSION {
        log::warn!("cstream: unsupported version {:#04x} (expected {:#04x})", buf[4], VERSION);
        return Err(Error::CorruptStream(format!(
            "unsupported version {:#04x} (expected {:#04x})",
            buf[4], VERSION
        )));
    }
    let window_max = u16::from_be_bytes([buf[8], buf[9]]);
    let lookahead_max = u16::from_be_bytes([buf[10], buf[11]]);
    Params::new(window_max, lookahead_max).map_err(|_| {
        log::warn!("cstream: invalid header parameters window={window_max} lookahead={lookahead_max}");
        Error::CorruptStream(format!(
            "invalid header parameters window={window_max} lookahead={lookahead_max}"
        ))
    })
}

fn encode_header(params: Params) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&MAGIC);
    buf[4] = VERSION;
    // buf[5..8] reserved, left zero.
    buf[8..10].copy_from_slice(&params.window_max().to_be_bytes());
    buf[10..12].copy_from_slice(&params.lookahead_max().to_be_bytes());
    buf
}

/// Reader side of the compressed stream: validates the header, then
/// decodes the token stream.
pub struct CStreamReader<S: ByteSource> {
    bits: BitReader<S>,
    params: Params,
    length_code: LengthCode,
}

impl<S: ByteSource> CStreamReader<S> {
    /// Reads and validates the 12-byte header: refuses a mismatched magic,
    /// differing version, window < 4, lookahead < 2, or lookahead > window
    /// (the latter three are exactly what `Params::new` already rejects).
    pub fn open(mut source: S) -> DYNRESULT<Self> {
        let mut header = [0u8; HEADER_SIZE];
        let got = read_exact_from_source(&mut source, &mut header)?;
        if got < HEADER_SIZE {
            return Err(Error::UnexpectedEof);
        }
        let params = parse_header(&header)?;
        let length_code = LengthCode::new(params.min_len(), params.lookahead_max());
        Ok(Self { bits: BitReader::new(source), params, length_code })
    }

    pub fn params(&self) -> Params {
        self.params
    }

    pub fn processed_bits(&self) -> u64 {
        self.bits.processed_bits()
    }

    /// Reads one token: the discriminator bit, then either an 8-bit symbol
    /// or a `wbits`-wide offset plus a length code. A decoded length of `0`
    /// means end-of-stream and surfaces as `Token::Terminator`.
    pub fn read_token(&mut self) -> DYNRESULT<Token> {
        let (disc, avail) = self.bits.read(1);
        if avail == 0 {
            return Err(Error::UnexpectedEof);
        }
        if disc == 0 {
            let (byte, avail) = self.bits.read(8);
            if avail < 8 {
                return Err(Error::UnexpectedEof);
            }
            return Ok(Token::Symbol(byte as u8));
        }
        let wbits = self.params.wbits() as usize;
        let (offset, avail) = self.bits.read(wbits);
        if avail < wbits {
            return Err(Error::UnexpectedEof);
        }
        let length = self.decode_length()?;
        if length == 0 {
            Ok(Token::Terminator)
        } else {
            Ok(Token::Phrase { offset: offset as u16, length })
        }
    }

    /// Peek-decode-retry loop for the length code: peeks as many bits as
    /// are currently available, asks `LengthCode` to decode, and on
    /// `NeedMore` tries again with a wider peek. If a retry makes no
    /// further progress (the underlying source has genuinely reached EOF
    /// mid-token), surfaces `UnexpectedEof` instead of looping forever.
    fn decode_length(&mut self) -> DYNRESULT<u16> {
        let mut width = 16usize;
        loop {
            let (peeked, available) = self.bits.peek(width);
            match self.length_code.decode(peeked, available) {
                Decoded::Value(value, consumed) => {
                    self.bits.consume(consumed);
                    return Ok(value);
                }
                Decoded::Invalid => {
                    return Err(Error::CorruptStream(format!(
                        "decoded length outside [0, {}]",
                        self.params.lookahead_max()
                    )));
                }
                Decoded::NeedMore(required) => {
                    if available < width {
                        // `peek` already pulled everything the source would
                        // yield; retrying the same width again only
                        // resolves something if more bytes have since
                        // arrived. If a second attempt at the same width
                        // makes no further progress, the source is
                        // genuinely exhausted mid-token.
                        if self.bits.stalled(width) {
                            return Err(Error::UnexpectedEof);
                        }
                        continue;
                    }
                    width = std::cmp::max(required, width + 1).min(64);
                }
            }
        }
    }
}

/// Writer side of the compressed stream: emits the header, then the token
/// stream.
pub struct CStreamWriter<K: ByteSink> {
    bits: BitWriter<K>,
    params: Params,
    length_code: LengthCode,
}

impl<K: ByteSink> CStreamWriter<K> {
    /// Emits the 12-byte header filled from `params`.
    pub fn open(mut sink: K, params: Params) -> DYNRESULT<Self> {
        sink.push(&encode_header(params))?;
        let length_code = LengthCode::new(params.min_len(), params.lookahead_max());
        Ok(Self { bits: BitWriter::new(sink), params, length_code })
    }

    pub fn processed_bits(&self) -> u64 {
        self.bits.processed_bits()
    }

    /// Writes one token: discriminator bit, then either an 8-bit symbol or
    /// a `wbits`-wide offset plus the length code (a zero-length phrase
    /// encodes the terminator).
    pub fn write_token(&mut self, token: Token) -> DYNRESULT<()> {
        match token {
            Token::Symbol(byte) => {
                self.bits.write_bits(0, 1)?;
                self.bits.write_bits(byte as u64, 8)?;
            }
            Token::Phrase { offset, length } => {
                self.write_phrase_shaped(offset, length)?;
            }
            Token::Terminator => {
                self.write_phrase_shaped(0, 0)?;
            }
        }
        Ok(())
    }

    fn write_phrase_shaped(&mut self, offset: u16, length: u16) -> DYNRESULT<()> {
        self.bits.write_bits(1, 1)?;
        let wbits = self.params.wbits() as usize;
        self.bits.write_bits(offset as u64, wbits)?;
        let (bits, code) = self.length_code.encode(length).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "length {length} is not encodable for min_len {} max {}",
                self.params.min_len(),
                self.params.lookahead_max()
            ))
        })?;
        self.bits.write_bits(code as u64, bits as usize)
    }

    /// Flushes the padded tail byte and returns the underlying sink.
    pub fn close(mut self) -> DYNRESULT<K> {
        self.bits.flush_close()?;
        Ok(self.bits.into_sink())
    }
}
