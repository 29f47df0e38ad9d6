//! Compression transformations.
//!
//! The legacy format frames its payload with gzip at the default level.
//! The current format uses a raw deflate stream at the best level.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};

use crate::error::CryptoResult;
use crate::transform::{Sink, Transformation, closed_error};

/// Gzip framed compression used by legacy license keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCompression;

impl Transformation for GzipCompression {
    fn apply<'a>(&self, sink: Box<dyn Sink + 'a>) -> CryptoResult<Box<dyn Sink + 'a>> {
        Ok(Box::new(GzipSink {
            encoder: Some(GzEncoder::new(sink, Compression::default())),
        }))
    }

    fn unapply<'a>(&self, source: Box<dyn Read + 'a>) -> CryptoResult<Box<dyn Read + 'a>> {
        Ok(Box::new(GzDecoder::new(source)))
    }
}

struct GzipSink<'a> {
    encoder: Option<GzEncoder<Box<dyn Sink + 'a>>>,
}

impl Write for GzipSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.as_mut().ok_or_else(closed_error)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.flush(),
            None => Ok(()),
        }
    }
}

impl Sink for GzipSink<'_> {
    fn close(&mut self) -> io::Result<()> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish()?.close(),
            None => Ok(()),
        }
    }
}

/// Raw deflate compression at the best level used by current license keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateCompression;

impl Transformation for DeflateCompression {
    fn apply<'a>(&self, sink: Box<dyn Sink + 'a>) -> CryptoResult<Box<dyn Sink + 'a>> {
        Ok(Box::new(DeflateSink {
            encoder: Some(DeflateEncoder::new(sink, Compression::best())),
        }))
    }

    fn unapply<'a>(&self, source: Box<dyn Read + 'a>) -> CryptoResult<Box<dyn Read + 'a>> {
        Ok(Box::new(DeflateDecoder::new(source)))
    }
}

struct DeflateSink<'a> {
    encoder: Option<DeflateEncoder<Box<dyn Sink + 'a>>>,
}

impl Write for DeflateSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.as_mut().ok_or_else(closed_error)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.flush(),
            None => Ok(()),
        }
    }
}

impl Sink for DeflateSink<'_> {
    fn close(&mut self) -> io::Result<()> {
        // finish() writes the final block and releases the compressor state.
        match self.encoder.take() {
            Some(encoder) => encoder.finish()?.close(),
            None => Ok(()),
        }
    }
}
