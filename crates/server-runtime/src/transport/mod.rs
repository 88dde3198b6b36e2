//! Network transports for the server.

pub mod tcp;

pub use tcp::{connection_from_stream, DelimitedReader, DelimitedWriter, TcpTransportListener, FRAME_DELIMITER};
