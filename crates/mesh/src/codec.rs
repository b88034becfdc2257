//! Command framing for application payloads on the mesh transport.
//!
//! Every frame is one tag byte followed by a payload made of whole node
//! addresses:
//!
//! | Offset | Size        | Field                                   |
//! |--------|-------------|-----------------------------------------|
//! | 0      | 1           | tag: `0x55` KEYPRESS, `0x56` ROUTE_TABLE |
//! | 1      | 6 × N       | node addresses                          |
//!
//! KEYPRESS carries exactly one address, ROUTE_TABLE carries zero or more
//! up to the codec's capacity. Decoding is all-or-nothing.

use meshroute_core::{NodeAddress, ADDRESS_LEN};

use crate::error::DecodeError;

/// Tag byte of a keypress event frame.
pub const CMD_KEYPRESS: u8 = 0x55;
/// Tag byte of a routing table frame.
pub const CMD_ROUTE_TABLE: u8 = 0x56;

/// Recognized command tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandTag {
    /// Point event naming the node it happened on
    Keypress = CMD_KEYPRESS,
    /// Full routing table published by the root
    RouteTable = CMD_ROUTE_TABLE,
}

impl CommandTag {
    /// Map a wire byte to a tag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CMD_KEYPRESS => Some(CommandTag::Keypress),
            CMD_ROUTE_TABLE => Some(CommandTag::RouteTable),
            _ => None,
        }
    }

    /// Wire byte of this tag.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            CommandTag::Keypress => "KEYPRESS",
            CommandTag::RouteTable => "ROUTE_TABLE",
        }
    }
}

/// One decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Keypress reported by the given node
    Keypress(NodeAddress),
    /// Routing table in transmission order
    RouteTable(Vec<NodeAddress>),
}

impl Frame {
    /// Tag this frame is sent with.
    pub fn tag(&self) -> CommandTag {
        match self {
            Frame::Keypress(_) => CommandTag::Keypress,
            Frame::RouteTable(_) => CommandTag::RouteTable,
        }
    }
}

/// Encoder/decoder bound to a routing table capacity.
#[derive(Debug, Clone, Copy)]
pub struct CommandCodec {
    capacity: usize,
}

impl CommandCodec {
    /// Create a codec accepting routing tables of at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Maximum routing table entries per frame.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest frame this codec produces or accepts.
    pub fn max_frame_len(&self) -> usize {
        1 + self.capacity * ADDRESS_LEN
    }

    /// Check a payload length against the tag's size contract.
    pub fn check_payload_len(&self, tag: CommandTag, len: usize) -> Result<(), DecodeError> {
        let valid = match tag {
            CommandTag::Keypress => len == ADDRESS_LEN,
            CommandTag::RouteTable => len % ADDRESS_LEN == 0 && len / ADDRESS_LEN <= self.capacity,
        };
        if valid {
            Ok(())
        } else {
            Err(DecodeError::InvalidSize {
                command: tag.name(),
                len,
            })
        }
    }

    /// Frame an already-serialized payload: `[tag] + payload`.
    pub fn encode_raw(&self, tag: CommandTag, payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
        self.check_payload_len(tag, payload.len())?;
        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(tag.as_byte());
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Encode a frame. Fails with `InvalidSize` when a routing table is over
    /// capacity.
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, DecodeError> {
        match frame {
            Frame::Keypress(addr) => self.encode_raw(CommandTag::Keypress, addr.as_bytes()),
            Frame::RouteTable(table) => {
                self.check_payload_len(CommandTag::RouteTable, table.len() * ADDRESS_LEN)?;
                let mut out = Vec::with_capacity(1 + table.len() * ADDRESS_LEN);
                out.push(CMD_ROUTE_TABLE);
                for addr in table {
                    out.extend_from_slice(addr.as_bytes());
                }
                Ok(out)
            }
        }
    }

    /// Decode a received datagram.
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, DecodeError> {
        let (&tag_byte, payload) = bytes.split_first().ok_or(DecodeError::Empty)?;
        let tag = CommandTag::from_byte(tag_byte).ok_or(DecodeError::UnknownTag(tag_byte))?;
        self.check_payload_len(tag, payload.len())?;

        let mut addresses = payload.chunks_exact(ADDRESS_LEN).map(|chunk| {
            let mut raw = [0u8; ADDRESS_LEN];
            raw.copy_from_slice(chunk);
            NodeAddress::new(raw)
        });

        Ok(match tag {
            CommandTag::Keypress => match addresses.next() {
                Some(addr) => Frame::Keypress(addr),
                None => {
                    return Err(DecodeError::InvalidSize {
                        command: tag.name(),
                        len: payload.len(),
                    })
                }
            },
            CommandTag::RouteTable => Frame::RouteTable(addresses.collect()),
        })
    }
}
