//! Serialize and deserialize DHT messages.
//!
//! Every datagram starts with a fixed 30 bytes header:
//!
//! ```md
//! byte 0      : protocol version
//! byte 1      : message type
//! bytes 2-9   : transaction token (little endian u64)
//! bytes 10-29 : sender Id
//! bytes 30..  : payload
//! ```

use std::convert::TryFrom;
use std::net::Ipv4Addr;

use bytes::Bytes;

use crate::common::{Contact, Id, ID_SIZE};

/// Datagrams of any other version are ignored.
pub const PROTOCOL_VERSION: u8 = 0;

const HEADER_SIZE: usize = 2 + 8 + ID_SIZE;
const CONTACT_SIZE: usize = ID_SIZE + 4;

const FIND_VALUE_CONTACTS: u8 = 0;
const FIND_VALUE_DATA: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
/// The message type byte.
pub enum MessageKind {
    PingRequest = 0,
    StoreRequest = 1,
    FindNodeRequest = 2,
    FindValueRequest = 3,
    PingResponse = 4,
    StoreResponse = 5,
    FindNodeResponse = 6,
    FindValueResponse = 7,
}

impl TryFrom<u8> for MessageKind {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, DecodeError> {
        Ok(match byte {
            0 => MessageKind::PingRequest,
            1 => MessageKind::StoreRequest,
            2 => MessageKind::FindNodeRequest,
            3 => MessageKind::FindValueRequest,
            4 => MessageKind::PingResponse,
            5 => MessageKind::StoreResponse,
            6 => MessageKind::FindNodeResponse,
            7 => MessageKind::FindValueResponse,
            _ => return Err(DecodeError::UnknownMessageType(byte)),
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Message {
    /// Random for requests, echoed back in responses.
    pub token: u64,
    /// Id of the node that sent this message.
    pub sender_id: Id,
    pub message_type: MessageType,
}

#[derive(Debug, PartialEq, Clone)]
pub enum MessageType {
    Request(RequestSpecific),
    Response(ResponseSpecific),
}

#[derive(Debug, PartialEq, Clone)]
pub enum RequestSpecific {
    Ping,
    Store(Bytes),
    FindNode(Id),
    FindValue(Id),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResponseSpecific {
    Ping,
    Store,
    FindNode(Vec<Contact>),
    FindValue(FindValue),
}

#[derive(Debug, PartialEq, Clone)]
/// Answer to a FIND_VALUE request.
pub enum FindValue {
    /// The responder stores the value.
    Value(Bytes),
    /// The responder's closest contacts to the digest.
    Contacts(Vec<Contact>),
}

impl Message {
    pub fn request(token: u64, sender_id: Id, request: RequestSpecific) -> Self {
        Message {
            token,
            sender_id,
            message_type: MessageType::Request(request),
        }
    }

    pub fn response(token: u64, sender_id: Id, response: ResponseSpecific) -> Self {
        Message {
            token,
            sender_id,
            message_type: MessageType::Response(response),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match &self.message_type {
            MessageType::Request(request) => match request {
                RequestSpecific::Ping => MessageKind::PingRequest,
                RequestSpecific::Store(_) => MessageKind::StoreRequest,
                RequestSpecific::FindNode(_) => MessageKind::FindNodeRequest,
                RequestSpecific::FindValue(_) => MessageKind::FindValueRequest,
            },
            MessageType::Response(response) => match response {
                ResponseSpecific::Ping => MessageKind::PingResponse,
                ResponseSpecific::Store => MessageKind::StoreResponse,
                ResponseSpecific::FindNode(_) => MessageKind::FindNodeResponse,
                ResponseSpecific::FindValue(_) => MessageKind::FindValueResponse,
            },
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);

        bytes.push(PROTOCOL_VERSION);
        bytes.push(self.kind() as u8);
        bytes.extend_from_slice(&self.token.to_le_bytes());
        bytes.extend_from_slice(self.sender_id.as_bytes());

        match &self.message_type {
            MessageType::Request(request) => match request {
                RequestSpecific::Ping => {}
                RequestSpecific::Store(value) => bytes.extend_from_slice(value),
                RequestSpecific::FindNode(target) => bytes.extend_from_slice(target.as_bytes()),
                RequestSpecific::FindValue(digest) => bytes.extend_from_slice(digest.as_bytes()),
            },
            MessageType::Response(response) => match response {
                ResponseSpecific::Ping | ResponseSpecific::Store => {}
                ResponseSpecific::FindNode(contacts) => {
                    bytes.extend(contacts_to_bytes(contacts));
                }
                ResponseSpecific::FindValue(FindValue::Value(value)) => {
                    bytes.push(FIND_VALUE_DATA);
                    bytes.extend_from_slice(value);
                }
                ResponseSpecific::FindValue(FindValue::Contacts(contacts)) => {
                    bytes.push(FIND_VALUE_CONTACTS);
                    bytes.extend(contacts_to_bytes(contacts));
                }
            },
        }

        bytes
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Message, DecodeError> {
        let bytes = bytes.as_ref();

        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::TooShort(bytes.len()));
        }

        if bytes[0] != PROTOCOL_VERSION {
            return Err(DecodeError::UnsupportedVersion(bytes[0]));
        }

        let kind = MessageKind::try_from(bytes[1])?;

        let mut token = [0_u8; 8];
        token.copy_from_slice(&bytes[2..10]);
        let token = u64::from_le_bytes(token);

        let sender_id = read_id(&bytes[10..HEADER_SIZE])?;
        let payload = &bytes[HEADER_SIZE..];

        let message_type = match kind {
            MessageKind::PingRequest => MessageType::Request(RequestSpecific::Ping),
            MessageKind::StoreRequest => {
                MessageType::Request(RequestSpecific::Store(Bytes::copy_from_slice(payload)))
            }
            MessageKind::FindNodeRequest => {
                MessageType::Request(RequestSpecific::FindNode(read_id(payload)?))
            }
            MessageKind::FindValueRequest => {
                MessageType::Request(RequestSpecific::FindValue(read_id(payload)?))
            }
            MessageKind::PingResponse => MessageType::Response(ResponseSpecific::Ping),
            MessageKind::StoreResponse => MessageType::Response(ResponseSpecific::Store),
            MessageKind::FindNodeResponse => {
                MessageType::Response(ResponseSpecific::FindNode(bytes_to_contacts(payload)?))
            }
            MessageKind::FindValueResponse => {
                let find_value = match payload.split_first() {
                    Some((&FIND_VALUE_DATA, value)) => {
                        FindValue::Value(Bytes::copy_from_slice(value))
                    }
                    Some((&FIND_VALUE_CONTACTS, contacts)) => {
                        FindValue::Contacts(bytes_to_contacts(contacts)?)
                    }
                    Some((flag, _)) => return Err(DecodeError::InvalidFindValueFlag(*flag)),
                    None => return Err(DecodeError::MissingFindValueFlag),
                };

                MessageType::Response(ResponseSpecific::FindValue(find_value))
            }
        };

        Ok(Message {
            token,
            sender_id,
            message_type,
        })
    }
}

/// Pack contacts as `(20 bytes Id, 4 bytes IPv4)*`, in the order given.
pub fn contacts_to_bytes(contacts: &[Contact]) -> Vec<u8> {
    let mut vec = Vec::with_capacity(CONTACT_SIZE * contacts.len());

    for contact in contacts {
        vec.extend_from_slice(contact.id.as_bytes());
        vec.extend_from_slice(&contact.address.octets());
    }

    vec
}

pub fn bytes_to_contacts<T: AsRef<[u8]>>(bytes: T) -> Result<Vec<Contact>, DecodeError> {
    let bytes = bytes.as_ref();

    if bytes.len() % CONTACT_SIZE != 0 {
        return Err(DecodeError::InvalidContactsLength(bytes.len()));
    }

    bytes
        .chunks_exact(CONTACT_SIZE)
        .map(|chunk| {
            let id = read_id(&chunk[..ID_SIZE])?;
            let address = Ipv4Addr::new(
                chunk[ID_SIZE],
                chunk[ID_SIZE + 1],
                chunk[ID_SIZE + 2],
                chunk[ID_SIZE + 3],
            );

            Ok(Contact::new(id, address))
        })
        .collect()
}

fn read_id(bytes: &[u8]) -> Result<Id, DecodeError> {
    Id::from_bytes(bytes).map_err(|_| DecodeError::InvalidId(bytes.len()))
}

#[derive(thiserror::Error, Debug, PartialEq)]
/// Reasons a datagram could not be decoded into a [Message].
pub enum DecodeError {
    #[error("Datagram of {0} bytes is shorter than the message header")]
    TooShort(usize),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Expected a 20 bytes Id, got {0} bytes")]
    InvalidId(usize),

    #[error("Wrong number of bytes for contacts list ({0})")]
    InvalidContactsLength(usize),

    #[error("FIND_VALUE response is missing its flag byte")]
    MissingFindValueFlag,

    #[error("Invalid FIND_VALUE response flag: {0}")]
    InvalidFindValueFlag(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(message: Message) {
        let bytes = message.to_bytes();
        let parsed = Message::from_bytes(&bytes).unwrap();

        assert_eq!(parsed, message);
    }

    #[test]
    fn test_header() {
        let sender_id = Id::random();
        let message = Message::request(0x0102030405060708, sender_id, RequestSpecific::Ping);

        let bytes = message.to_bytes();

        assert_eq!(bytes.len(), 30);
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(bytes[1], MessageKind::PingRequest as u8);
        assert_eq!(&bytes[2..10], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&bytes[10..30], sender_id.as_bytes());
    }

    #[test]
    fn test_ping() {
        assert_round_trip(Message::request(1, Id::random(), RequestSpecific::Ping));
        assert_round_trip(Message::response(1, Id::random(), ResponseSpecific::Ping));
    }

    #[test]
    fn test_store() {
        let message = Message::request(
            2,
            Id::random(),
            RequestSpecific::Store(Bytes::from_static(b"Hello")),
        );

        assert_eq!(&message.to_bytes()[30..], b"Hello");
        assert_round_trip(message);
        assert_round_trip(Message::response(2, Id::random(), ResponseSpecific::Store));
    }

    #[test]
    fn test_find_node() {
        let target = Id::random();
        let message = Message::request(3, Id::random(), RequestSpecific::FindNode(target));

        assert_eq!(&message.to_bytes()[30..], target.as_bytes());
        assert_round_trip(message);

        let contacts = vec![Contact::random(), Contact::random()];
        let message = Message::response(3, Id::random(), ResponseSpecific::FindNode(contacts));

        assert_eq!(message.to_bytes().len(), 30 + 2 * 24);
        assert_round_trip(message);
    }

    #[test]
    fn test_find_value() {
        assert_round_trip(Message::request(
            4,
            Id::random(),
            RequestSpecific::FindValue(Id::random()),
        ));

        let message = Message::response(
            4,
            Id::random(),
            ResponseSpecific::FindValue(FindValue::Value(Bytes::from_static(b"hej"))),
        );
        assert_eq!(&message.to_bytes()[30..], &[1, b'h', b'e', b'j']);
        assert_round_trip(message);

        let contact = Contact::random();
        let message = Message::response(
            4,
            Id::random(),
            ResponseSpecific::FindValue(FindValue::Contacts(vec![contact])),
        );
        let bytes = message.to_bytes();
        assert_eq!(bytes[30], 0);
        assert_eq!(bytes.len(), 31 + 24);
        assert_round_trip(message);
    }

    #[test]
    fn test_contacts_round_trip() {
        let contacts = (0..8).map(|_| Contact::random()).collect::<Vec<_>>();

        let decoded = bytes_to_contacts(contacts_to_bytes(&contacts)).unwrap();

        assert_eq!(decoded, contacts);
        for (a, b) in decoded.iter().zip(contacts.iter()) {
            assert_eq!(a.address, b.address);
        }

        assert!(bytes_to_contacts([0_u8; 0]).unwrap().is_empty());
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            Message::from_bytes([0_u8; 29]),
            Err(DecodeError::TooShort(29))
        );

        let mut bytes = Message::request(5, Id::random(), RequestSpecific::Ping).to_bytes();
        bytes[0] = 1;
        assert_eq!(
            Message::from_bytes(&bytes),
            Err(DecodeError::UnsupportedVersion(1))
        );

        bytes[0] = PROTOCOL_VERSION;
        bytes[1] = 42;
        assert_eq!(
            Message::from_bytes(&bytes),
            Err(DecodeError::UnknownMessageType(42))
        );

        bytes[1] = MessageKind::FindNodeRequest as u8;
        assert_eq!(Message::from_bytes(&bytes), Err(DecodeError::InvalidId(0)));

        bytes[1] = MessageKind::FindValueResponse as u8;
        assert_eq!(
            Message::from_bytes(&bytes),
            Err(DecodeError::MissingFindValueFlag)
        );

        bytes[1] = MessageKind::FindNodeResponse as u8;
        bytes.extend_from_slice(&[0; 25]);
        assert_eq!(
            Message::from_bytes(&bytes),
            Err(DecodeError::InvalidContactsLength(25))
        );
    }
}
