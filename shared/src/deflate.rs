//! Deflate framing for the TCP solver channel.
//!
//! The compressed stream is cut into frames, each prefixed with a 5 byte
//! header: a little endian `u32` payload length and a `finished` flag set on
//! the last frame of a packet. One packet is one complete deflate stream.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use log::trace;

#[derive(Debug)]
struct Header {
    length: usize,
    finished: bool,
}

impl Header {
    const LEN: usize = 5;

    fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];

        buf[..4].copy_from_slice(&(self.length as u32).to_le_bytes());
        buf[4] = u8::from(self.finished);

        buf
    }

    fn from_bytes(buf: [u8; Self::LEN]) -> io::Result<Self> {
        let finished = match buf[4] {
            0 => false,
            1 => true,
            flag => return Err(invalid(format!("invalid frame flag {flag}"))),
        };

        let mut length = [0u8; 4];
        length.copy_from_slice(&buf[..4]);

        Ok(Header { length: u32::from_le_bytes(length) as usize, finished })
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

pub struct Compressor<W> {
    dest: W,
    buffer: Vec<u8>,
    comp: flate2::Compress,
    duration: Duration,
    finished: bool,
}

impl<W> Compressor<W> {
    pub fn new(dest: W, level: u32) -> Self {
        Compressor {
            dest,
            buffer: vec![0u8; 1024 * 8],
            comp: flate2::Compress::new(flate2::Compression::new(level), true),
            duration: Duration::ZERO,
            finished: false,
        }
    }

    pub fn total_in(&self) -> u64 {
        self.comp.total_in()
    }

    pub fn total_out(&self) -> u64 {
        self.comp.total_out()
    }

    /// Time spent compressing so far.
    pub fn elapsed(&self) -> Duration {
        self.duration
    }
}

impl<W: Write> Compressor<W> {
    fn emit(&mut self, length: usize, finished: bool) -> io::Result<()> {
        let header = Header { length, finished };
        trace!("sending frame {header:?}");

        self.dest.write_all(&header.to_bytes())?;
        self.dest.write_all(&self.buffer[..length])
    }
}

impl<W: Write> Write for Compressor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.finished {
            return Err(invalid("write after the packet was finished".to_string()));
        }

        loop {
            let (before_in, before_out) = (self.comp.total_in(), self.comp.total_out());

            let instant = Instant::now();
            let status = self
                .comp
                .compress(buf, &mut self.buffer, flate2::FlushCompress::None)
                .map_err(|e| invalid(format!("failed to compress, {e}")))?;
            self.duration = self.duration.saturating_add(instant.elapsed());

            if status != flate2::Status::Ok {
                return Err(invalid(format!("unexpected compress status {status:?}")));
            }

            let produced = to_usize(self.comp.total_out() - before_out);
            if produced > 0 {
                self.emit(produced, false)?;
            }

            let consumed = to_usize(self.comp.total_in() - before_in);
            if consumed > 0 {
                return Ok(consumed);
            }
        }
    }

    /// Finishes the deflate stream, terminating the packet. Flushing again
    /// only flushes the destination.
    fn flush(&mut self) -> io::Result<()> {
        while !self.finished {
            let before_out = self.comp.total_out();

            let instant = Instant::now();
            let status = self
                .comp
                .compress(&[], &mut self.buffer, flate2::FlushCompress::Finish)
                .map_err(|e| invalid(format!("failed to finish compression, {e}")))?;
            self.duration = self.duration.saturating_add(instant.elapsed());

            if status == flate2::Status::BufError {
                return Err(invalid("BufError while finishing compression".to_string()));
            }

            let produced = to_usize(self.comp.total_out() - before_out);
            let finished = status == flate2::Status::StreamEnd;

            if produced > 0 || finished {
                self.emit(produced, finished)?;
            }

            self.finished = finished;
        }

        trace!("flushed packet, {} -> {} bytes", self.comp.total_in(), self.comp.total_out());
        self.dest.flush()
    }
}

pub struct Decompressor<R> {
    source: R,
    decomp: flate2::Decompress,
    header: Header,
    buffer: Vec<u8>,
    duration: Duration,
    start: usize,
    end: usize,
}

impl<R> Decompressor<R> {
    pub fn new(source: R) -> Self {
        Decompressor {
            source,
            decomp: flate2::Decompress::new(true),
            header: Header { length: 0, finished: false },
            buffer: vec![0u8; 1024 * 8],
            duration: Duration::ZERO,
            start: 0,
            end: 0,
        }
    }

    pub fn total_in(&self) -> u64 {
        self.decomp.total_in()
    }

    pub fn total_out(&self) -> u64 {
        self.decomp.total_out()
    }

    pub fn elapsed(&self) -> Duration {
        self.duration
    }
}

impl<R: Read> Decompressor<R> {
    /// Consumes whatever is left of the current packet so that the source is
    /// positioned at the next one.
    pub fn finish(&mut self) -> io::Result<()> {
        loop {
            if self.header.length == 0 {
                if self.header.finished {
                    return Ok(());
                }

                self.read_header()?;
                continue;
            }

            let max_len = std::cmp::min(self.buffer.len(), self.header.length);
            let read = self.source.read(&mut self.buffer[..max_len])?;
            if read == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            self.header.length -= read;
        }
    }

    fn read_header(&mut self) -> io::Result<()> {
        let mut bytes = [0u8; Header::LEN];
        self.source.read_exact(&mut bytes)?;
        self.header = Header::from_bytes(bytes)?;
        trace!("received frame {:?}", self.header);
        Ok(())
    }

    fn fill(&mut self) -> io::Result<bool> {
        self.start = 0;
        self.end = 0;

        while self.header.length == 0 {
            if self.header.finished {
                return Ok(false);
            }
            self.read_header()?;
        }

        let max_len = std::cmp::min(self.buffer.len(), self.header.length);
        self.end = self.source.read(&mut self.buffer[..max_len])?;
        if self.end == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.header.length -= self.end;

        Ok(true)
    }
}

impl<R: Read> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.start == self.end && !self.fill()? {
                return Ok(0);
            }

            let (before_in, before_out) = (self.decomp.total_in(), self.decomp.total_out());

            let instant = Instant::now();
            let status = self
                .decomp
                .decompress(&self.buffer[self.start..self.end], buf, flate2::FlushDecompress::None)
                .map_err(|e| invalid(format!("failed to decompress, {e}")))?;
            self.duration = self.duration.saturating_add(instant.elapsed());

            if status == flate2::Status::BufError {
                return Err(invalid("BufError while decompressing".to_string()));
            }

            self.start += to_usize(self.decomp.total_in() - before_in);

            let produced = to_usize(self.decomp.total_out() - before_out);
            if produced > 0 {
                return Ok(produced);
            }

            if status == flate2::Status::StreamEnd {
                return Ok(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packets_round_trip_through_frames() {
        let payload: Vec<u8> = (0..20_000u32).flat_map(|i| (i % 251).to_le_bytes()).collect();

        let mut wire = Vec::new();
        for _ in 0..2 {
            let mut compressor = Compressor::new(&mut wire, 6);
            compressor.write_all(&payload).unwrap();
            compressor.flush().unwrap();
        }

        let mut source = wire.as_slice();
        for _ in 0..2 {
            let mut decompressor = Decompressor::new(&mut source);
            let mut out = vec![0u8; payload.len()];
            decompressor.read_exact(&mut out).unwrap();
            decompressor.finish().unwrap();
            assert_eq!(out, payload);
        }

        assert!(source.is_empty());
    }

    #[test]
    fn counters_track_one_packet() {
        let payload = vec![7u8; 4096];
        let mut wire = Vec::new();

        let mut compressor = Compressor::new(&mut wire, 6);
        assert_eq!(compressor.elapsed(), Duration::ZERO);
        compressor.write_all(&payload).unwrap();
        compressor.flush().unwrap();
        assert_eq!(compressor.total_in(), payload.len() as u64);
        let compressed = compressor.total_out();

        let mut decompressor = Decompressor::new(wire.as_slice());
        assert_eq!(decompressor.elapsed(), Duration::ZERO);
        let mut out = Vec::new();
        decompressor.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
        assert_eq!(decompressor.total_in(), compressed);
        assert_eq!(decompressor.total_out(), payload.len() as u64);
    }

    #[test]
    fn bad_frame_flag_is_an_error() {
        let wire = [0u8, 0, 0, 0, 9];
        let mut decompressor = Decompressor::new(&wire[..]);
        let mut out = [0u8; 4];

        let err = decompressor.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
