//! Byte-stream transport abstraction and its TLS-backed implementation.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use rustls::{ClientConnection, StreamOwned};

/// Blocking bidirectional byte stream carrying the challenge dialogue.
///
/// `read_chunk` blocks until data arrives and returns the number of bytes
/// received, with `0` meaning the peer closed the stream in an orderly
/// fashion. The transport provides no framing; the protocol layer splits
/// lines itself.
pub trait Transport {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// TLS client stream over TCP.
pub struct TlsTransport {
    stream: StreamOwned<ClientConnection, TcpStream>,
}

impl TlsTransport {
    pub fn new(stream: StreamOwned<ClientConnection, TcpStream>) -> Self {
        Self { stream }
    }

    /// Negotiated cipher suite, once the handshake has completed.
    pub fn cipher(&self) -> Option<String> {
        self.stream
            .conn
            .negotiated_cipher_suite()
            .map(|suite| format!("{:?}", suite.suite()))
    }

    /// Send the TLS close-notify alert and shut down the socket.
    pub fn close(&mut self) {
        self.stream.conn.send_close_notify();
        let _ = self.stream.flush();
        let _ = self.stream.sock.shutdown(Shutdown::Both);
    }
}

impl Transport for TlsTransport {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }
}
