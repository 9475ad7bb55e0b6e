//! Drives `UStream` and `CStream` through the compress/expand token loop in
//! both directions, and exposes the memory-backed convenience entry points
//! the CLI and tests use.
//!
//! One free function per direction, parametrised over the byte source/sink:
//! open the dictionary, loop over tokens until the terminator, flush.

use crate::bitio::{ByteSink, ByteSource, MemSink, MemSource};
use crate::cstream::{CStreamReader, CStreamWriter};
use crate::ustream::{CompressorWindow, DecompressorWindow, Token};
use crate::{Error, Params, DYNRESULT};

/// Compresses everything `source` yields into `sink`, using `params` to
/// size the window/look-ahead. Loops `next_token`/`write_token` until the
/// source reports end of input, then emits the `Terminator` token. Returns
/// the number of bytes written to `sink`, including the 12-byte header.
pub fn compress<S: ByteSource, K: ByteSink>(source: S, sink: K, params: Params) -> DYNRESULT<u64> {
    let mut ustream = CompressorWindow::new(source, params);
    let mut cstream = CStreamWriter::open(sink, params)?;
    loop {
        match ustream.next_token()? {
            Some(token) => cstream.write_token(token)?,
            None => {
                cstream.write_token(Token::Terminator)?;
                break;
            }
        }
    }
    let bits = cstream.processed_bits();
    cstream.close()?;
    Ok(crate::HEADER_SIZE as u64 + (bits + 7) / 8)
}

/// Decompresses a full token stream from `source` into `sink`. Reads the
/// header (which determines `Params` for the paired reconstruction), then
/// loops reading a discriminator bit / offset+length / symbol byte per
/// token, applying each to the reconstruction, until a `Terminator` is
/// seen. Returns the number of bytes written to `sink`.
pub fn decompress<S: ByteSource, K: ByteSink>(source: S, sink: K) -> DYNRESULT<u64> {
    let mut cstream = CStreamReader::open(source)?;
    let params = cstream.params();
    let mut ustream = DecompressorWindow::new(sink, params);
    loop {
        match cstream.read_token()? {
            Token::Terminator => break,
            token => ustream.append_token(token)?,
        }
    }
    let written = ustream.processed_bytes();
    ustream.close()?;
    Ok(written)
}

/// Compresses an in-memory byte slice, returning the compressed bytes.
pub fn compress_slice(data: &[u8], params: Params) -> DYNRESULT<Vec<u8>> {
    let bytes_written = compress_into(data, params, MemSink::growable())?;
    Ok(bytes_written)
}

/// As `compress_slice`, but writes into a fixed-capacity sink that fails
/// with `Error::OutOfMemory` instead of growing once `capacity` bytes have
/// been written.
pub fn compress_slice_fixed(data: &[u8], params: Params, capacity: usize) -> DYNRESULT<Vec<u8>> {
    compress_into(data, params, MemSink::fixed(capacity))
}

fn compress_into(data: &[u8], params: Params, sink: MemSink) -> DYNRESULT<Vec<u8>> {
    let source = MemSource::new(data);
    let mut ustream = CompressorWindow::new(source, params);
    let mut cstream = CStreamWriter::open(sink, params)?;
    loop {
        match ustream.next_token()? {
            Some(token) => cstream.write_token(token)?,
            None => {
                cstream.write_token(Token::Terminator)?;
                break;
            }
        }
    }
    Ok(cstream.close()?.into_buffer())
}

/// Decompresses a byte slice produced by `compress_slice`, returning the
/// reconstructed bytes.
pub fn decompress_slice(data: &[u8]) -> DYNRESULT<Vec<u8>> {
    decompress_into(data, MemSink::growable())
}

/// As `decompress_slice`, but writes into a fixed-capacity sink that fails
/// with `Error::OutOfMemory` if the reconstruction would exceed `capacity`
/// bytes.
pub fn decompress_slice_fixed(data: &[u8], capacity: usize) -> DYNRESULT<Vec<u8>> {
    decompress_into(data, MemSink::fixed(capacity))
}

fn decompress_into(data: &[u8], sink: MemSink) -> DYNRESULT<Vec<u8>> {
    let source = MemSource::new(data);
    let mut cstream = CStreamReader::open(source)?;
    let params = cstream.params();
    let mut ustream = DecompressorWindow::new(sink, params);
    loop {
        match cstream.read_token()? {
            Token::Terminator => break,
            token => ustream.append_token(token)?,
        }
    }
    Ok(ustream.close()?.into_buffer())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(data: &[u8], params: Params) {
        let compressed = compress_slice(data, params).expect("compress");
        let expanded = decompress_slice(&compressed).expect("decompress");
        assert_eq!(expanded, data, "round-trip mismatch for {params:?}");
    }

    #[test]
    fn empty_input_is_header_plus_terminator_only() {
        let params = Params::new(512, 32).unwrap();
        let compressed = compress_slice(b"", params).unwrap();
        // header (12) + terminator (1 disc bit + wbits zero-offset + 6-bit
        // terminator code, padded up to a byte boundary).
        assert_eq!(&compressed[0..4], b"LZ77");
        assert!(compressed.len() > crate::HEADER_SIZE);
        let expanded = decompress_slice(&compressed).unwrap();
        assert!(expanded.is_empty());
    }

    #[test]
    fn scenario_w4_l2_tree_replacement() {
        round_trip(b"BBAAABBC", Params::new(4, 2).unwrap());
    }

    #[test]
    fn scenario_w4_l2_full_window_slide() {
        round_trip(b"BAAABBCA", Params::new(4, 2).unwrap());
    }

    #[test]
    fn scenario_w4_l2_overlapping_match() {
        round_trip(b"AAABBCAB", Params::new(4, 2).unwrap());
    }

    #[test]
    fn scenario_w8_l4_mostly_symbols() {
        round_trip(b"YAZABCDEFGHI", Params::new(8, 4).unwrap());
    }

    #[test]
    fn scenario_w512_l32_all_zero() {
        let params = Params::new(512, 32).unwrap();
        let data = vec![0u8; 1024];
        let compressed = compress_slice(&data, params).unwrap();
        assert!(compressed.len() < data.len() / 4);
        let expanded = decompress_slice(&compressed).unwrap();
        assert_eq!(expanded, data);
    }

    #[test]
    fn scenario_w512_l32_random_is_not_much_larger() {
        let params = Params::new(512, 32).unwrap();
        // Deterministic pseudo-random bytes (no rand dependency): an LCG is
        // plenty irregular to defeat matches >= min_len.
        let mut state: u32 = 0x2545F491;
        let data: Vec<u8> = (0..1024)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                (state >> 16) as u8
            })
            .collect();
        let compressed = compress_slice(&data, params).unwrap();
        let expanded = decompress_slice(&compressed).unwrap();
        assert_eq!(expanded, data);
        assert!((compressed.len() as i64 - data.len() as i64).abs() < (data.len() / 4) as i64);
    }

    #[test]
    fn triangular_lengths_exercise_length_code_widths() {
        let mut data = Vec::new();
        let mut byte = b'A';
        for n in 1..=20u8 {
            for _ in 0..n {
                data.push(byte);
            }
            byte = byte.wrapping_add(1);
        }
        round_trip(&data, Params::new(64, 24).unwrap());
    }

    #[test]
    fn header_fields_are_byte_exact() {
        let params = Params::new(4096, 60).unwrap();
        let compressed = compress_slice(b"hello, hello, hello", params).unwrap();
        assert_eq!(&compressed[0..4], b"LZ77");
        assert_eq!(compressed[4], crate::VERSION);
        assert_eq!(u16::from_be_bytes([compressed[8], compressed[9]]), 4096);
        assert_eq!(u16::from_be_bytes([compressed[10], compressed[11]]), 60);
        assert_eq!(hex::encode(&compressed[0..5]), "4c5a373710");
    }

    #[test]
    fn processed_byte_counts_match_input_length() {
        let params = Params::new(256, 16).unwrap();
        let data = b"the quick brown fox jumps over the lazy dog, the quick brown fox";
        let source = MemSource::new(data);
        let mut ustream = CompressorWindow::new(source, params);
        let mut cstream = CStreamWriter::open(MemSink::growable(), params).unwrap();
        loop {
            match ustream.next_token().unwrap() {
                Some(token) => cstream.write_token(token).unwrap(),
                None => {
                    cstream.write_token(Token::Terminator).unwrap();
                    break;
                }
            }
        }
        assert_eq!(ustream.processed_bytes(), data.len() as u64);
        let compressed = cstream.close().unwrap().into_buffer();

        let source = MemSource::new(&compressed);
        let mut reader = CStreamReader::open(source).unwrap();
        let mut dstream = DecompressorWindow::new(MemSink::growable(), params);
        loop {
            match reader.read_token().unwrap() {
                Token::Terminator => break,
                token => dstream.append_token(token).unwrap(),
            }
        }
        assert_eq!(dstream.processed_bytes(), data.len() as u64);
    }

    #[test]
    fn fixed_output_buffer_too_small_is_out_of_memory() {
        let params = Params::new(512, 32).unwrap();
        let data = vec![b'x'; 4096];
        let compressed = compress_slice(&data, params).unwrap();
        let err = decompress_slice_fixed(&compressed, 8).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory));
    }

    #[test]
    fn corrupt_header_is_rejected() {
        let mut compressed = compress_slice(b"abc", Params::new(64, 8).unwrap()).unwrap();
        compressed[0] = b'X';
        let err = decompress_slice(&compressed).unwrap_err();
        assert!(matches!(err, Error::CorruptStream(_)));
    }

    #[test]
    fn descriptor_round_trip_via_cursors() {
        let params = Params::new(1024, 48).unwrap();
        let data = b"mississippi river mississippi river mississippi".to_vec();
        let mut compressed_bytes = Vec::new();
        let written = compress(
            crate::bitio::DescriptorSource(std::io::Cursor::new(data.clone())),
            crate::bitio::DescriptorSink(&mut compressed_bytes),
            params,
        )
        .unwrap();
        assert_eq!(written, compressed_bytes.len() as u64);

        let mut expanded = Vec::new();
        let read_back = decompress(
            crate::bitio::DescriptorSource(std::io::Cursor::new(compressed_bytes)),
            crate::bitio::DescriptorSink(&mut expanded),
        )
        .unwrap();
        assert_eq!(read_back, data.len() as u64);
        assert_eq!(expanded, data);
    }
}
