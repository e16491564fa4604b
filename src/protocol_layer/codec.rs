//! Token framing of messages for FUSB302-style PHY FIFOs.
//!
//! Transmit frames are a token stream: SOP ordered set, packed-symbol length, header,
//! data objects, CRC jam, EOP and transmitter control tokens. The PHY generates the CRC.
//! Receive frames start with a token that encodes the SOP type in its top three bits, and end
//! with four CRC bytes.
use byteorder::{ByteOrder, LittleEndian};

use super::message::header::Header;
use super::message::{MAX_DATA_OBJECTS, Message, ParseError};

/// Transmitter on.
pub const TX_ON: u8 = 0xA1;
/// First symbol of the SOP ordered set (Sync-1).
pub const SOP1: u8 = 0x12;
/// Second symbol of the SOP ordered set (Sync-2).
pub const SOP2: u8 = 0x13;
/// Packed symbols follow. The lower bits carry the byte count.
pub const PACKSYM: u8 = 0x80;
/// Insert the CRC, generated by the PHY.
pub const JAM_CRC: u8 = 0xFF;
/// End of packet.
pub const EOP: u8 = 0x14;
/// Transmitter off.
pub const TX_OFF: u8 = 0xFE;

/// Number of CRC bytes that trail a received frame.
pub const CRC_SIZE: usize = 4;

/// Bytes before the data objects of a received frame: token and header.
pub const RX_HEAD_SIZE: usize = 3;

/// The largest transmit frame.
pub const MAX_TX_FRAME_SIZE: usize = 4 + 1 + 2 + 4 * MAX_DATA_OBJECTS + 4;

/// The largest receive frame.
pub const MAX_RX_FRAME_SIZE: usize = RX_HEAD_SIZE + 4 * MAX_DATA_OBJECTS + CRC_SIZE;

/// Errors during encoding.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// More than seven data objects were given.
    #[error("too many data objects `{0}`")]
    TooManyObjects(usize),
    /// The output buffer cannot hold the frame.
    #[error("buffer too small (required {required:?}, available {available:?})")]
    BufferTooSmall {
        /// Required buffer size.
        required: usize,
        /// Available buffer size.
        available: usize,
    },
}

/// Start-of-packet types, distinguishing the port partner from cable plugs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum SopType {
    Sop,
    SopPrime,
    SopDoublePrime,
    SopPrimeDebug,
    SopDoublePrimeDebug,
}

impl SopType {
    /// Derive the SOP type from the leading token of a received frame.
    pub fn from_token(token: u8) -> Result<Self, ParseError> {
        match token >> 5 {
            0b111 => Ok(Self::Sop),
            0b110 => Ok(Self::SopPrime),
            0b101 => Ok(Self::SopDoublePrime),
            0b100 => Ok(Self::SopPrimeDebug),
            0b011 => Ok(Self::SopDoublePrimeDebug),
            _ => Err(ParseError::InvalidSop(token)),
        }
    }

    /// The leading token that a PHY reports for this SOP type.
    pub fn token(self) -> u8 {
        match self {
            Self::Sop => 0b111 << 5,
            Self::SopPrime => 0b110 << 5,
            Self::SopDoublePrime => 0b101 << 5,
            Self::SopPrimeDebug => 0b100 << 5,
            Self::SopDoublePrimeDebug => 0b011 << 5,
        }
    }
}

/// A received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    /// The SOP type of the frame.
    pub sop: SopType,
    /// The message that the frame carries.
    pub message: Message,
}

/// Encode a header and its data objects as a transmit token stream.
///
/// The object count of the header is taken from `objects`. Returns the number of written bytes.
pub fn encode(header: Header, objects: &[u32], buffer: &mut [u8]) -> Result<usize, EncodeError> {
    if objects.len() > MAX_DATA_OBJECTS {
        return Err(EncodeError::TooManyObjects(objects.len()));
    }

    let payload_size = 2 + 4 * objects.len();
    let required = 4 + 1 + payload_size + 4;
    if buffer.len() < required {
        return Err(EncodeError::BufferTooSmall {
            required,
            available: buffer.len(),
        });
    }

    buffer[..4].copy_from_slice(&[SOP1, SOP1, SOP1, SOP2]);
    buffer[4] = PACKSYM | payload_size as u8;

    let mut size = 5;
    size += header.with_num_objects(objects.len() as u8).to_bytes(&mut buffer[size..]);

    for object in objects {
        LittleEndian::write_u32(&mut buffer[size..], *object);
        size += 4;
    }

    buffer[size..size + 4].copy_from_slice(&[JAM_CRC, EOP, TX_OFF, TX_ON]);
    Ok(size + 4)
}

/// The number of bytes that follow the token and header of a received frame.
pub fn tail_size(header: Header) -> usize {
    4 * header.num_objects() + CRC_SIZE
}

/// Decode a received frame from the start of `stream`.
///
/// Returns the frame and the number of consumed bytes, including the trailing CRC.
pub fn decode(stream: &[u8]) -> Result<(Frame, usize), ParseError> {
    if stream.len() < RX_HEAD_SIZE {
        return Err(ParseError::InvalidLength {
            expected: RX_HEAD_SIZE,
            found: stream.len(),
        });
    }

    let sop = SopType::from_token(stream[0])?;
    let header = Header::from_bytes(&stream[1..RX_HEAD_SIZE])?;

    let consumed = RX_HEAD_SIZE + tail_size(header);
    if stream.len() < consumed {
        return Err(ParseError::InvalidLength {
            expected: consumed,
            found: stream.len(),
        });
    }

    let message = Message::from_bytes(&stream[1..consumed - CRC_SIZE])?;
    Ok((Frame { sop, message }, consumed))
}
