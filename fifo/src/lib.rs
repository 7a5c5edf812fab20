//! A bounded byte FIFO with rendezvous open semantics, shared between the
//! threads of one process.
//!
//! Producers and consumers each open their own endpoint, and an open
//! blocks until the opposite role is present. Transfers are all or
//! nothing: a write blocks until the whole payload fits in the buffer and
//! a read blocks until the whole request is buffered. A read on a channel
//! with no producers and nothing buffered returns an empty buffer to
//! signal end of stream, and a write on a channel with no consumers fails
//! with a broken pipe. When the last endpoint of both roles is gone the
//! buffer is discarded.
//!
//! ```
//! use std::thread;
//!
//! use fifo::reader::FifoReader;
//! use fifo::writer::FifoWriter;
//! use fifo::{FifoChannel, FifoConfig};
//!
//! let fifo = FifoChannel::new(FifoConfig::default()).unwrap();
//!
//! let chan = fifo.clone();
//! let consumer = thread::spawn(move || {
//!     let reader = FifoReader::open(&chan).unwrap();
//!     reader.read(5).unwrap()
//! });
//!
//! let writer = FifoWriter::open(&fifo).unwrap();
//! writer.write(b"hello").unwrap();
//! writer.close();
//!
//! assert_eq!(consumer.join().unwrap(), b"hello");
//! ```

mod core;
pub mod errors;
pub mod reader;
pub mod writer;

pub use crate::core::{CancelToken, ChannelStats, FifoChannel, FifoConfig};
pub use crate::errors::FifoError;

pub const DEFAULT_CAPACITY: usize = core::DEFAULT_CAPACITY;
pub const DEFAULT_MAX_TRANSFER: usize = core::DEFAULT_MAX_TRANSFER;

#[cfg(test)]
mod tests;
