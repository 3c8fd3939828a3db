//! Frame types and their wire encoding.
//!
//! Each frame is a four-byte header `{type, pad, length}` followed by
//! `length` body bytes. The length and every 16-bit body element are
//! big-endian on the wire; this module is the only place that byte order
//! appears.

use crate::token::Token;

/// Length of the fixed frame header.
pub const HEADER_LEN: usize = 4;

/// Protocol version carried by the initial message.
pub const INITIAL_VERSION: u16 = 1;

/// Magic number carried by the initial message.
pub const INITIAL_MAGIC: u16 = 0xDA10;

/// Size of one representation-message record.
const NAME_ENTRY_LEN: usize = 6;

/// Wire type bytes.
const TYPE_IM: u8 = 0;
const TYPE_RM: u8 = 1;
const TYPE_DM: u8 = 2;
const TYPE_FM: u8 = 3;
const TYPE_EM: u8 = 4;

/// A malformed frame. All variants are fatal to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("unknown frame type byte {0:#04x}")]
    BadType(u8),

    #[error("initial message body must be 4 bytes, got {0}")]
    BadInitialLength(usize),

    #[error("representation message body must be a multiple of 6 bytes, got {0}")]
    BadRepresentationLength(usize),

    #[error("diplomacy message body must be an even number of bytes, got {0}")]
    OddDiplomacyLength(usize),

    #[error("final message body must be empty, got {0} bytes")]
    BadFinalLength(usize),

    #[error("error message body must be 2 bytes, got {0}")]
    BadErrorLength(usize),
}

/// One record of a representation message: a token and its mnemonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub token: Token,
    pub name: String,
}

/// A single message frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// IM: opens the connection; client to server only.
    Initial { version: u16, magic: u16 },
    /// RM: the token dictionary for the session's powers and provinces.
    Representation(Vec<NameEntry>),
    /// DM: a sequence of language tokens.
    Diplomacy(Vec<Token>),
    /// FM: closes the connection.
    Final,
    /// EM: a fatal error code.
    Error(u16),
}

impl Frame {
    /// The type byte this frame carries on the wire.
    pub fn type_byte(&self) -> u8 {
        match self {
            Frame::Initial { .. } => TYPE_IM,
            Frame::Representation(_) => TYPE_RM,
            Frame::Diplomacy(_) => TYPE_DM,
            Frame::Final => TYPE_FM,
            Frame::Error(_) => TYPE_EM,
        }
    }

    /// Encodes header and body into wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.encode_body();
        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.push(self.type_byte());
        bytes.push(0); // pad
        bytes.extend_from_slice(&(body.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }

    fn encode_body(&self) -> Vec<u8> {
        match self {
            Frame::Initial { version, magic } => {
                let mut body = Vec::with_capacity(4);
                body.extend_from_slice(&version.to_be_bytes());
                body.extend_from_slice(&magic.to_be_bytes());
                body
            }
            Frame::Representation(entries) => {
                let mut body = Vec::with_capacity(entries.len() * NAME_ENTRY_LEN);
                for entry in entries {
                    body.push(entry.token.category());
                    body.push(entry.token.subtoken());
                    let mut name = [0u8; 4];
                    for (slot, byte) in name.iter_mut().zip(entry.name.bytes()) {
                        *slot = byte;
                    }
                    body.extend_from_slice(&name);
                }
                body
            }
            Frame::Diplomacy(tokens) => {
                let mut body = Vec::with_capacity(tokens.len() * 2);
                for token in tokens {
                    body.extend_from_slice(&token.raw().to_be_bytes());
                }
                body
            }
            Frame::Final => Vec::new(),
            Frame::Error(code) => code.to_be_bytes().to_vec(),
        }
    }

    /// Decodes a frame from its type byte and body bytes.
    pub fn decode(type_byte: u8, body: &[u8]) -> Result<Frame, FrameError> {
        match type_byte {
            TYPE_IM => {
                if body.len() != 4 {
                    return Err(FrameError::BadInitialLength(body.len()));
                }
                Ok(Frame::Initial {
                    version: u16::from_be_bytes([body[0], body[1]]),
                    magic: u16::from_be_bytes([body[2], body[3]]),
                })
            }
            TYPE_RM => {
                if body.len() % NAME_ENTRY_LEN != 0 {
                    return Err(FrameError::BadRepresentationLength(body.len()));
                }
                let mut entries = Vec::with_capacity(body.len() / NAME_ENTRY_LEN);
                for record in body.chunks_exact(NAME_ENTRY_LEN) {
                    let name: String = record[2..]
                        .iter()
                        .take_while(|&&b| b != 0)
                        .map(|&b| b as char)
                        .collect();
                    entries.push(NameEntry {
                        token: Token::new(record[0], record[1]),
                        name,
                    });
                }
                Ok(Frame::Representation(entries))
            }
            TYPE_DM => {
                if body.len() % 2 != 0 {
                    return Err(FrameError::OddDiplomacyLength(body.len()));
                }
                let tokens = body
                    .chunks_exact(2)
                    .map(|pair| Token::from_raw(u16::from_be_bytes([pair[0], pair[1]])))
                    .collect();
                Ok(Frame::Diplomacy(tokens))
            }
            TYPE_FM => {
                if !body.is_empty() {
                    return Err(FrameError::BadFinalLength(body.len()));
                }
                Ok(Frame::Final)
            }
            TYPE_EM => {
                if body.len() != 2 {
                    return Err(FrameError::BadErrorLength(body.len()));
                }
                Ok(Frame::Error(u16::from_be_bytes([body[0], body[1]])))
            }
            other => Err(FrameError::BadType(other)),
        }
    }

    /// The standard initial message.
    pub fn initial() -> Frame {
        Frame::Initial {
            version: INITIAL_VERSION,
            magic: INITIAL_MAGIC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::lexicon::*;

    fn roundtrip(frame: Frame) {
        let bytes = frame.encode();
        assert_eq!(bytes[0], frame.type_byte());
        assert_eq!(bytes[1], 0);
        let length = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        assert_eq!(length, bytes.len() - HEADER_LEN);
        let decoded = Frame::decode(bytes[0], &bytes[HEADER_LEN..]).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn initial_roundtrip() {
        roundtrip(Frame::initial());
        let bytes = Frame::initial().encode();
        assert_eq!(bytes, [0, 0, 0, 4, 0, 1, 0xDA, 0x10]);
    }

    #[test]
    fn diplomacy_roundtrip_is_big_endian() {
        let frame = Frame::Diplomacy(vec![HLO, OPEN_BRACKET, ENG, CLOSE_BRACKET]);
        roundtrip(frame.clone());
        let bytes = frame.encode();
        // HLO = 0x4804, high byte first on the wire.
        assert_eq!(&bytes[4..6], &[0x48, 0x04]);
    }

    #[test]
    fn representation_roundtrip() {
        let frame = Frame::Representation(vec![
            NameEntry {
                token: Token::new(0x41, 0x00),
                name: "AUS".to_string(),
            },
            NameEntry {
                token: Token::new(0x50, 0x07),
                name: "ZUR".to_string(),
            },
        ]);
        roundtrip(frame.clone());
        assert_eq!(frame.encode().len(), HEADER_LEN + 12);
    }

    #[test]
    fn final_and_error_roundtrip() {
        roundtrip(Frame::Final);
        roundtrip(Frame::Error(0x0A));
    }

    #[test]
    fn decode_rejects_bad_type() {
        assert_eq!(Frame::decode(9, &[]), Err(FrameError::BadType(9)));
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert_eq!(
            Frame::decode(0, &[0, 1]),
            Err(FrameError::BadInitialLength(2))
        );
        assert_eq!(
            Frame::decode(1, &[0, 1, 2]),
            Err(FrameError::BadRepresentationLength(3))
        );
        assert_eq!(
            Frame::decode(2, &[0x48]),
            Err(FrameError::OddDiplomacyLength(1))
        );
        assert_eq!(Frame::decode(3, &[1]), Err(FrameError::BadFinalLength(1)));
        assert_eq!(Frame::decode(4, &[1]), Err(FrameError::BadErrorLength(1)));
    }
}
