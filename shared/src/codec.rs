//! Packet framing shared by both ends of a TCP solver channel.
//!
//! Every packet is a single bincode value. With compression enabled it is
//! wrapped in its own deflate stream (see [`crate::deflate`]).

use std::io::{BufWriter, Read, Write};

use bincode::error::{DecodeError, EncodeError};
use log::trace;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{
    deflate::{Compressor, Decompressor},
    CONFIG,
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("could not encode packet, {0}")]
    Encode(#[from] EncodeError),
    #[error("could not decode packet, {0}")]
    Decode(#[from] DecodeError),
    #[error("io error on solver channel, {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Whether the peer simply closed the connection.
    pub fn is_disconnect(&self) -> bool {
        match self {
            CodecError::Io(e) => is_eof(e),
            CodecError::Decode(DecodeError::Io { inner, .. }) => is_eof(inner),
            CodecError::Decode(DecodeError::UnexpectedEnd { .. }) => true,
            _ => false,
        }
    }
}

fn is_eof(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
    )
}

/// Writes one packet and flushes `writer`. Returns the uncompressed size.
pub fn write_packet<T, W>(writer: &mut W, value: &T, compress: Option<u32>) -> Result<usize, CodecError>
where
    T: Serialize,
    W: Write,
{
    let written = if let Some(level) = compress {
        let mut buffered = BufWriter::new(Compressor::new(&mut *writer, level));
        let written = bincode::serde::encode_into_std_write(value, &mut buffered, CONFIG)?;

        let mut compressor = buffered.into_inner().map_err(|e| e.into_error())?;
        compressor.flush()?;
        trace!(
            "wrote packet, {} -> {} bytes, {:?} compressing",
            compressor.total_in(),
            compressor.total_out(),
            compressor.elapsed()
        );

        written
    } else {
        let written = bincode::serde::encode_into_std_write(value, &mut *writer, CONFIG)?;
        writer.flush()?;
        trace!("wrote packet, {written} bytes");

        written
    };

    Ok(written)
}

/// Reads exactly one packet from `reader`.
pub fn read_packet<T, R>(reader: &mut R, compress: Option<u32>) -> Result<T, CodecError>
where
    T: DeserializeOwned,
    R: Read,
{
    if compress.is_some() {
        let mut decompressor = Decompressor::new(&mut *reader);
        let value = bincode::serde::decode_from_std_read(&mut decompressor, CONFIG)?;
        decompressor.finish()?;
        trace!(
            "read packet, {} -> {} bytes, {:?} decompressing",
            decompressor.total_in(),
            decompressor.total_out(),
            decompressor.elapsed()
        );

        Ok(value)
    } else {
        Ok(bincode::serde::decode_from_std_read(reader, CONFIG)?)
    }
}
