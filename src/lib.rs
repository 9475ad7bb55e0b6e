//! # retrolz77
//!
//! An LZ77 compressor/expander core: a sliding-window match search accelerated
//! by a binary search tree over a circular array of window positions, a
//! variable-length prefix code for match lengths, and a self-describing
//! bitstream format.
//!
//! * `bitio` is the MSB-first bit reader/writer shared by both ends of the
//!   codec.
//! * `length_code` is the static prefix code used to encode match lengths.
//! * `search_tree` is the binary search tree used to find the longest match.
//! * `ustream` owns the sliding window, the look-ahead buffer, and the tree,
//!   and turns raw bytes into tokens (and back).
//! * `cstream` wraps `bitio` with the wire header and the token layout.
//! * `codec` drives `ustream` and `cstream` through the compress/expand token
//!   loop.
//!
//! ## Example
//!
//! ```rs
//! use retrolz77::{Params, codec};
//! let data = b"I am Sam. Sam I am. I do not like this Sam I am.\n";
//! let params = Params::new(4096, 60).expect("valid parameters");
//! let compressed = codec::compress_slice(data, params).expect("compression failed");
//! let expanded = codec::decompress_slice(&compressed).expect("expansion failed");
//! assert_eq!(data.to_vec(), expanded);
//! ```

pub mod bitio;
pub mod length_code;
pub mod search_tree;
pub mod ustream;
pub mod cstream;
pub mod codec;

/// Library errors.
///
/// These map onto the error-kind taxonomy a caller is expected to branch on:
/// bad arguments are the caller's fault, I/O errors come from the underlying
/// descriptor, out-of-memory comes from a fixed-capacity or failed-realloc
/// buffer, and the remaining two describe a malformed bitstream.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    #[error("out of memory")]
    OutOfMemory,
    #[error("corrupt stream: {0}")]
    CorruptStream(String),
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

pub type DYNRESULT<T> = Result<T, Error>;

/// Wire header magic, see `cstream`.
pub const MAGIC: [u8; 4] = *b"LZ77";

/// Wire format version: high nibble major, low nibble minor.
pub const VERSION: u8 = 0x10;

/// The 12-byte header size.
pub const HEADER_SIZE: usize = 12;

/// Compression parameters: the maximum sliding-window size and the maximum
/// look-ahead length. Everything else (`wbits`, `min_len`, `max_encoded`,
/// `diff_bits`) is derived from these two, behind one validated struct
/// rather than passing loose integers around.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Params {
    window_max: u16,
    lookahead_max: u16,
}

impl Params {
    /// Validates `(window_max, lookahead_max)` against the ranges in the
    /// format: `window_max` in `[4, 65535]`, `lookahead_max` in
    /// `[2, window_max]`.
    pub fn new(window_max: u16, lookahead_max: u16) -> DYNRESULT<Self> {
        if window_max < 4 {
            return Err(Error::InvalidArgument(format!(
                "window_max {window_max} below minimum of 4"
            )));
        }
        if lookahead_max < 2 {
            return Err(Error::InvalidArgument(format!(
                "lookahead_max {lookahead_max} below minimum of 2"
            )));
        }
        if lookahead_max > window_max {
            return Err(Error::InvalidArgument(format!(
                "lookahead_max {lookahead_max} exceeds window_max {window_max}"
            )));
        }
        Ok(Self { window_max, lookahead_max })
    }

    pub fn window_max(&self) -> u16 {
        self.window_max
    }

    pub fn lookahead_max(&self) -> u16 {
        self.lookahead_max
    }

    /// Bit-width of a window offset: `1 + floor(log2(max(1, W-1)))`.
    pub fn wbits(&self) -> u32 {
        bits_needed(std::cmp::max(1, self.window_max as u32 - 1))
    }

    /// Shortest match length worth tokenizing: a run of `N` literal symbols
    /// costs `9N` bits, a phrase costs `1 + wbits + (>=2)` bits, so matches
    /// only pay off once they're at least this long. Clamped to `2`: for
    /// very small windows (e.g. `W=4`) the raw formula can reach `1`, but
    /// `LengthCode` always requires `min_value >= 2`, and a one-byte
    /// "match" is not a meaningful phrase in the first place.
    pub fn min_len(&self) -> u16 {
        std::cmp::max(2, (1 + self.wbits() + 2) / 9 + 1) as u16
    }

    /// First length value that needs the 6-bit-prefix-plus-suffix code.
    pub fn max_encoded(&self) -> u16 {
        self.min_len() + 6
    }

    /// Width of the fixed suffix appended to lengths `>= max_encoded`.
    pub fn diff_bits(&self) -> u32 {
        let max_encoded = self.max_encoded();
        if self.lookahead_max <= max_encoded {
            0
        } else {
            bits_needed((self.lookahead_max - max_encoded) as u32)
        }
    }
}

/// Number of bits needed to represent the unsigned integer `x`: `0` for
/// `x == 0`, otherwise `floor(log2(x)) + 1`. Shared by `wbits` (bit-width of
/// a window offset) and `length_code`'s `diff_bits` (bit-width of a length
/// suffix range) -- both are the same "how many bits to hold this many
/// distinct values" computation.
pub(crate) fn bits_needed(x: u32) -> u32 {
    if x == 0 {
        0
    } else {
        32 - x.leading_zeros()
    }
}
