// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    io::{self, Read},
    sync::atomic::{AtomicBool, Ordering},
};

use ring::digest::Context;

/// A reader wrapper that hashes data as it's being read.
pub struct HashingReader<R> {
    inner: R,
    context: Context,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R, context: Context) -> Self {
        Self { inner, context }
    }

    pub fn finish(self) -> (R, Context) {
        (self.inner, self.context)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.context.update(&buf[..n]);
        Ok(n)
    }
}

/// Returns an I/O error with the [`io::ErrorKind::Interrupted`] type if
/// `cancel_signal` is true.
#[inline]
pub fn check_cancel(cancel_signal: &AtomicBool) -> io::Result<()> {
    if cancel_signal.load(Ordering::SeqCst) {
        return Err(io::Error::new(
            io::ErrorKind::Interrupted,
            "Received cancel signal",
        ));
    }

    Ok(())
}

/// Read `reader` until EOF, discarding the data, and return the number of
/// bytes read. Reads that fail with [`io::ErrorKind::Interrupted`] are retried.
/// The operation is cancelled on the next loop iteration if `cancel_signal` is
/// set to `true`.
pub fn read_to_eof(mut reader: impl Read, cancel_signal: &AtomicBool) -> io::Result<u64> {
    let mut buf = [0u8; 16384];
    let mut total = 0;

    loop {
        check_cancel(cancel_signal)?;

        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Cursor, Read},
        sync::atomic::{AtomicBool, Ordering},
    };

    use ring::digest::Context;

    use super::*;

    const FOOBAR_SHA256: [u8; 32] = [
        0xc3, 0xab, 0x8f, 0xf1, 0x37, 0x20, 0xe8, 0xad, 0x90, 0x47, 0xdd, 0x39, 0x46, 0x6b, 0x3c,
        0x89, 0x74, 0xe5, 0x92, 0xc2, 0xfa, 0x38, 0x3d, 0x4a, 0x39, 0x60, 0x71, 0x4c, 0xae, 0xf0,
        0xc4, 0xf2,
    ];

    #[test]
    fn hashing_reader() {
        let raw_reader = Cursor::new(b"foobar");
        let mut reader = HashingReader::new(raw_reader, Context::new(&ring::digest::SHA256));

        let mut buf = [0u8; 6];
        reader.read_exact(&mut buf[..0]).unwrap();
        reader.read_exact(&mut buf[..3]).unwrap();
        reader.read_exact(&mut buf[3..4]).unwrap();
        reader.read_exact(&mut buf[4..6]).unwrap();
        assert_eq!(&buf, b"foobar");

        let (_, context) = reader.finish();
        assert_eq!(context.finish().as_ref(), FOOBAR_SHA256);
    }

    /// Fails with [`io::ErrorKind::Interrupted`] every other call.
    struct FlakyReader<R> {
        inner: R,
        interrupt: bool,
        interrupted: usize,
    }

    impl<R: Read> Read for FlakyReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                self.interrupted += 1;
                return Err(io::ErrorKind::Interrupted.into());
            }

            let len = buf.len().min(2);
            self.inner.read(&mut buf[..len])
        }
    }

    #[test]
    fn read_to_eof_retries_interrupted() {
        let cancel_signal = AtomicBool::new(false);
        let mut reader = FlakyReader {
            inner: Cursor::new(b"foobar"),
            interrupt: false,
            interrupted: 0,
        };

        let n = read_to_eof(&mut reader, &cancel_signal).unwrap();
        assert_eq!(n, 6);
        assert_eq!(reader.interrupted, 4);
    }

    #[test]
    fn read_to_eof_cancelled() {
        let cancel_signal = AtomicBool::new(true);
        let mut reader = Cursor::new(b"foobar");

        let err = read_to_eof(&mut reader, &cancel_signal).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert_eq!(err.to_string(), "Received cancel signal");
        assert_eq!(reader.position(), 0);

        cancel_signal.store(false, Ordering::SeqCst);
        assert_eq!(read_to_eof(&mut reader, &cancel_signal).unwrap(), 6);
    }
}
