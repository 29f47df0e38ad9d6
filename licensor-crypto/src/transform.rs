//! Reversible decorators over byte sinks and sources.
//!
//! A [`Transformation`] wraps the write path with [`Transformation::apply`]
//! and the read path with [`Transformation::unapply`]. Compression and
//! encryption are both transformations; [`Composite`] nests two of them so
//! that the read path undoes the write path in mirrored order.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::error::CryptoResult;

/// A byte sink with explicit finalization.
///
/// `close` flushes any buffered state into the wrapped sink and then closes
/// that sink. Closing an already closed sink does nothing.
pub trait Sink: Write {
    fn close(&mut self) -> io::Result<()>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl Sink for Vec<u8> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for &mut Vec<u8> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed")
}

/// A reversible transformation of byte streams.
pub trait Transformation: Send + Sync {
    /// Wraps the write path.
    fn apply<'a>(&self, sink: Box<dyn Sink + 'a>) -> CryptoResult<Box<dyn Sink + 'a>>;

    /// Wraps the read path, undoing [`Transformation::apply`].
    fn unapply<'a>(&self, source: Box<dyn Read + 'a>) -> CryptoResult<Box<dyn Read + 'a>>;
}

impl<T: Transformation + ?Sized> Transformation for Arc<T> {
    fn apply<'a>(&self, sink: Box<dyn Sink + 'a>) -> CryptoResult<Box<dyn Sink + 'a>> {
        (**self).apply(sink)
    }

    fn unapply<'a>(&self, source: Box<dyn Read + 'a>) -> CryptoResult<Box<dyn Read + 'a>> {
        (**self).unapply(source)
    }
}

/// Passes bytes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transformation for Identity {
    fn apply<'a>(&self, sink: Box<dyn Sink + 'a>) -> CryptoResult<Box<dyn Sink + 'a>> {
        Ok(sink)
    }

    fn unapply<'a>(&self, source: Box<dyn Read + 'a>) -> CryptoResult<Box<dyn Read + 'a>> {
        Ok(source)
    }
}

/// Nests `outer` around `inner`.
///
/// Writing goes through `outer` first and `inner` second; reading undoes
/// `inner` first and `outer` second. `Composite::new(compression, encryption)`
/// therefore compresses, then encrypts, and on read decrypts, then
/// decompresses.
pub struct Composite {
    outer: Arc<dyn Transformation>,
    inner: Arc<dyn Transformation>,
}

impl Composite {
    pub fn new(outer: Arc<dyn Transformation>, inner: Arc<dyn Transformation>) -> Self {
        Self { outer, inner }
    }
}

impl Transformation for Composite {
    fn apply<'a>(&self, sink: Box<dyn Sink + 'a>) -> CryptoResult<Box<dyn Sink + 'a>> {
        self.outer.apply(self.inner.apply(sink)?)
    }

    fn unapply<'a>(&self, source: Box<dyn Read + 'a>) -> CryptoResult<Box<dyn Read + 'a>> {
        self.outer.unapply(self.inner.unapply(source)?)
    }
}

/// Runs `data` through the write path of a transformation into a buffer.
pub fn transform(transformation: &dyn Transformation, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut sink = transformation.apply(Box::new(&mut out))?;
        sink.write_all(data)?;
        sink.close()?;
    }
    Ok(out)
}

/// Runs `data` through the read path of a transformation into a buffer.
pub fn untransform(transformation: &dyn Transformation, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut source = transformation.unapply(Box::new(data))?;
    let mut out = Vec::new();
    source.read_to_end(&mut out)?;
    Ok(out)
}
