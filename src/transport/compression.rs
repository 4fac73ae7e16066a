//! zlib payload compression used once a session negotiated `useCompression`.

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Compress a serialized command.
pub fn compress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(payload.len() / 2), Compression::default());
    encoder.write_all(payload)?;
    encoder.finish()
}

/// Inflate a compressed reply frame.
pub fn decompress(frame: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(frame);
    let mut payload = Vec::with_capacity(frame.len() * 4);
    decoder.read_to_end(&mut payload)?;
    Ok(payload)
}
