//! Network server protocol
//!
//! Requests to and from the network stack are IPC values carrying one of the
//! [`NetRequest`] tags. Packet-carrying requests also carry a page laid out
//! as a [`PacketPage`]: a little-endian `i32` length followed by the frame.

use core_types::PAGE_SIZE;
use std::fmt;
use thiserror::Error;

/// Bytes before the frame data in a packet page
pub const PACKET_HEADER_SIZE: usize = 4;

/// Largest frame a packet page can hold
pub const PACKET_MAX_LEN: usize = PAGE_SIZE - PACKET_HEADER_SIZE;

/// Request tags understood by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NetRequest {
    Accept = 1,
    Bind = 2,
    Shutdown = 3,
    Close = 4,
    Connect = 5,
    Listen = 6,
    Recv = 7,
    Send = 8,
    Socket = 9,
    /// Input relay → stack: a received frame
    Input = 10,
    /// Stack → output relay: a frame to transmit
    Output = 11,
    Timer = 12,
}

impl NetRequest {
    /// The IPC value for this request
    pub fn value(self) -> u32 {
        self as u32
    }

    /// Decodes an IPC value
    pub fn from_value(value: u32) -> Option<Self> {
        Some(match value {
            1 => NetRequest::Accept,
            2 => NetRequest::Bind,
            3 => NetRequest::Shutdown,
            4 => NetRequest::Close,
            5 => NetRequest::Connect,
            6 => NetRequest::Listen,
            7 => NetRequest::Recv,
            8 => NetRequest::Send,
            9 => NetRequest::Socket,
            10 => NetRequest::Input,
            11 => NetRequest::Output,
            12 => NetRequest::Timer,
            _ => return None,
        })
    }
}

impl fmt::Display for NetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.value())
    }
}

/// Packet page decoding failures
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PacketPageError {
    /// The page is shorter than its own header
    #[error("Packet page truncated: {0} bytes")]
    Truncated(usize),

    /// The length field is negative or runs past the page
    #[error("Packet length {0} out of range")]
    BadLength(i32),

    /// The frame does not fit in one page
    #[error("Frame of {0} bytes does not fit a packet page")]
    TooLarge(usize),
}

/// Encoder and decoder for the packet page layout
pub struct PacketPage;

impl PacketPage {
    /// Writes `frame` into `page`
    ///
    /// `page` is normally a whole page; the bytes after the frame are left
    /// as they were.
    pub fn encode(page: &mut [u8], frame: &[u8]) -> Result<(), PacketPageError> {
        let end = PACKET_HEADER_SIZE + frame.len();
        if frame.len() > PACKET_MAX_LEN || end > page.len() {
            return Err(PacketPageError::TooLarge(frame.len()));
        }
        let len = frame.len() as i32;
        page[..PACKET_HEADER_SIZE].copy_from_slice(&len.to_le_bytes());
        page[PACKET_HEADER_SIZE..end].copy_from_slice(frame);
        Ok(())
    }

    /// Returns the frame held in `page`
    pub fn decode(page: &[u8]) -> Result<&[u8], PacketPageError> {
        let header: [u8; PACKET_HEADER_SIZE] = page
            .get(..PACKET_HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or(PacketPageError::Truncated(page.len()))?;
        let len = i32::from_le_bytes(header);

        let end = usize::try_from(len)
            .ok()
            .filter(|&len| len <= PACKET_MAX_LEN)
            .map(|len| PACKET_HEADER_SIZE + len)
            .filter(|&end| end <= page.len())
            .ok_or(PacketPageError::BadLength(len))?;
        Ok(&page[PACKET_HEADER_SIZE..end])
    }
}
