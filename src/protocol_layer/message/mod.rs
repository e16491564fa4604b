//! Definitions of message content.
//!
//! A message is a header, followed by up to seven 32 bit data objects. Data objects are kept in
//! their raw form; typed views are provided by [`pdo`], [`request`] and [`bist`], since the
//! meaning of an object depends on the surrounding message.
pub mod bist;
pub mod header;
pub mod pdo;
pub mod request;

use byteorder::{ByteOrder, LittleEndian};
use heapless::Vec;
use header::{ControlMessageType, DataMessageType, Header, MessageType};

/// The maximum number of data objects in a message.
pub const MAX_DATA_OBJECTS: usize = 7;

/// Size of a serialized message without framing: header and data objects.
pub const MAX_MESSAGE_SIZE: usize = 2 + 4 * MAX_DATA_OBJECTS;

/// Raw data objects of a message.
pub type DataObjects = Vec<u32, MAX_DATA_OBJECTS>;

/// Errors that can occur during message/header parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// The input buffer has an invalid length.
    /// * `expected` - The expected length.
    /// * `found` - The actual length found.
    #[error("invalid input buffer length (expected {expected:?}, found {found:?})")]
    InvalidLength {
        /// The expected length.
        expected: usize,
        /// The actual length found.
        found: usize,
    },
    /// The specification revision field is not supported.
    #[error("unsupported specification revision `{0}`")]
    UnsupportedSpecificationRevision(u8),
    /// The leading token of a frame is not a valid SOP token.
    #[error("invalid SOP token `{0}`")]
    InvalidSop(u8),
    /// More than seven data objects were given.
    #[error("too many data objects `{0}`")]
    TooManyObjects(usize),
}

/// A USB PD message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// The message header.
    pub header: Header,
    /// Raw data objects, as many as the header announces.
    pub objects: DataObjects,
}

impl Message {
    /// Create a new message from a message header.
    pub fn new(header: Header) -> Self {
        Self {
            header,
            objects: Vec::new(),
        }
    }

    /// Create a new message from a header template and data objects.
    ///
    /// The object count of the header is set from `objects`.
    pub fn new_with_objects(header: Header, objects: &[u32]) -> Result<Self, ParseError> {
        let objects = Vec::from_slice(objects).map_err(|_| ParseError::TooManyObjects(objects.len()))?;

        Ok(Self {
            header: header.with_num_objects(objects.len() as u8),
            objects,
        })
    }

    /// The type of this message.
    pub fn message_type(&self) -> MessageType {
        self.header.message_type()
    }

    /// Whether this is a control message of the given type.
    pub fn is_control(&self, message_type: ControlMessageType) -> bool {
        self.message_type() == MessageType::Control(message_type)
    }

    /// Whether this is a data message of the given type.
    pub fn is_data(&self, message_type: DataMessageType) -> bool {
        self.message_type() == MessageType::Data(message_type)
    }

    /// Serialize header and data objects to a slice, returning the number of written bytes.
    pub fn to_bytes(&self, buffer: &mut [u8]) -> usize {
        let mut size = self.header.to_bytes(buffer);

        for object in &self.objects {
            LittleEndian::write_u32(&mut buffer[size..], *object);
            size += 4;
        }

        size
    }

    /// Parse a message from header bytes, followed by data object bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        let header = Header::from_bytes(data)?;
        let expected = 2 + 4 * header.num_objects();

        if data.len() < expected {
            return Err(ParseError::InvalidLength {
                expected,
                found: data.len(),
            });
        }

        let mut message = Self::new(header);
        for chunk in data[2..expected].chunks_exact(4) {
            // Cannot overflow, the header encodes at most seven objects.
            let _ = message.objects.push(LittleEndian::read_u32(chunk));
        }

        Ok(message)
    }
}
