//! ISUP message codec: message type, 14-bit CIC, mandatory parameters,
//! and an optional-parameter TLV tail preserved unchanged when echoing a
//! message to a peer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsupError {
    TooShort,
    BadCic,
    TruncatedParameter,
}

impl std::fmt::Display for IsupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsupError::TooShort => write!(f, "message shorter than type+CIC"),
            IsupError::BadCic => write!(f, "CIC exceeds 14 bits"),
            IsupError::TruncatedParameter => write!(f, "parameter runs past end of message"),
        }
    }
}

impl std::error::Error for IsupError {}

impl From<IsupError> for gerror::GError {
    fn from(err: IsupError) -> Self {
        use gerror::codes::{ERR_BAD_CIC, ERR_TOO_SHORT, ERR_TRUNCATED_PARAMETER, SYS_ISUP, UC_DECODE};
        let error_code = match err {
            IsupError::TooShort => ERR_TOO_SHORT,
            IsupError::BadCic => ERR_BAD_CIC,
            IsupError::TruncatedParameter => ERR_TRUNCATED_PARAMETER,
        };
        gerror::GError::simple(SYS_ISUP, error_code, UC_DECODE)
    }
}

const MSG_IAM: u8 = 0x01;
const MSG_ACM: u8 = 0x06;
const MSG_ANM: u8 = 0x09;
const MSG_REL: u8 = 0x0C;
const MSG_RLC: u8 = 0x10;

/// An optional parameter, preserved byte-for-byte when this message is
/// echoed to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalParam {
    pub tag: u8,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsupMessage {
    Iam {
        cic: u16,
        calling: Option<String>,
        called: String,
        optional: Vec<OptionalParam>,
    },
    Acm { cic: u16, optional: Vec<OptionalParam> },
    Anm { cic: u16, optional: Vec<OptionalParam> },
    /// `cause` is the Q.850 cause value carried by the mandatory cause
    /// indicators parameter.
    Rel { cic: u16, cause: u8, optional: Vec<OptionalParam> },
    Rlc { cic: u16, optional: Vec<OptionalParam> },
    /// Unrecognized message type: surfaced as `UnknownMessage` without
    /// affecting per-CIC state.
    Unknown { message_type: u8, cic: u16, body: Vec<u8> },
}

impl IsupMessage {
    pub fn cic(&self) -> u16 {
        match self {
            IsupMessage::Iam { cic, .. }
            | IsupMessage::Acm { cic, .. }
            | IsupMessage::Anm { cic, .. }
            | IsupMessage::Rel { cic, .. }
            | IsupMessage::Rlc { cic, .. }
            | IsupMessage::Unknown { cic, .. } => *cic,
        }
    }

    fn encode_header(message_type: u8, cic: u16, out: &mut Vec<u8>) {
        out.push(message_type);
        out.push((cic & 0xFF) as u8);
        out.push(((cic >> 8) & 0x3F) as u8);
    }

    fn encode_optional(optional: &[OptionalParam], out: &mut Vec<u8>) {
        for p in optional {
            out.push(p.tag);
            out.push(p.value.len() as u8);
            out.extend_from_slice(&p.value);
        }
        out.push(0x00); // end of optional parameters
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            IsupMessage::Iam { cic, calling, called, optional } => {
                Self::encode_header(MSG_IAM, *cic, &mut out);
                out.push(0x00); // nature of connection indicators
                out.extend_from_slice(&[0x00, 0x00]); // forward call indicators
                out.push(0x0A); // calling party's category: ordinary
                out.push(0x03); // transmission medium requirement: speech
                out.push(called.len() as u8);
                out.extend_from_slice(called.as_bytes());
                match calling {
                    Some(c) => {
                        out.push(1);
                        out.push(c.len() as u8);
                        out.extend_from_slice(c.as_bytes());
                    }
                    None => out.push(0),
                }
                Self::encode_optional(optional, &mut out);
            }
            IsupMessage::Acm { cic, optional } => {
                Self::encode_header(MSG_ACM, *cic, &mut out);
                out.extend_from_slice(&[0x00, 0x00]); // backward call indicators
                Self::encode_optional(optional, &mut out);
            }
            IsupMessage::Anm { cic, optional } => {
                Self::encode_header(MSG_ANM, *cic, &mut out);
                Self::encode_optional(optional, &mut out);
            }
            IsupMessage::Rel { cic, cause, optional } => {
                Self::encode_header(MSG_REL, *cic, &mut out);
                out.push(2); // cause indicators parameter length
                out.push(0x80); // coding standard / location
                out.push(0x80 | (cause & 0x7F));
                Self::encode_optional(optional, &mut out);
            }
            IsupMessage::Rlc { cic, optional } => {
                Self::encode_header(MSG_RLC, *cic, &mut out);
                Self::encode_optional(optional, &mut out);
            }
            IsupMessage::Unknown { message_type, cic, body } => {
                Self::encode_header(*message_type, *cic, &mut out);
                out.extend_from_slice(body);
            }
        }
        out
    }

    fn decode_optional(bytes: &[u8], mut cursor: usize) -> Result<Vec<OptionalParam>, IsupError> {
        let mut optional = Vec::new();
        loop {
            let tag = *bytes.get(cursor).ok_or(IsupError::TruncatedParameter)?;
            if tag == 0x00 {
                break;
            }
            let len = *bytes.get(cursor + 1).ok_or(IsupError::TruncatedParameter)? as usize;
            let value = bytes.get(cursor + 2..cursor + 2 + len).ok_or(IsupError::TruncatedParameter)?.to_vec();
            optional.push(OptionalParam { tag, value });
            cursor += 2 + len;
        }
        Ok(optional)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IsupError> {
        if bytes.len() < 3 {
            return Err(IsupError::TooShort);
        }
        let message_type = bytes[0];
        let cic = (bytes[1] as u16) | (((bytes[2] & 0x3F) as u16) << 8);
        if bytes[2] & 0xC0 != 0 {
            return Err(IsupError::BadCic);
        }
        let body = &bytes[3..];

        match message_type {
            MSG_IAM => {
                let mut cursor = 5usize; // nature(1) + forward indicators(2) + category(1) + transmission(1) = 5
                let called_len = *body.get(cursor).ok_or(IsupError::TooShort)? as usize;
                cursor += 1;
                let called = String::from_utf8_lossy(body.get(cursor..cursor + called_len).ok_or(IsupError::TooShort)?).into_owned();
                cursor += called_len;
                let has_calling = *body.get(cursor).ok_or(IsupError::TooShort)?;
                cursor += 1;
                let calling = if has_calling != 0 {
                    let calling_len = *body.get(cursor).ok_or(IsupError::TooShort)? as usize;
                    cursor += 1;
                    let s = String::from_utf8_lossy(body.get(cursor..cursor + calling_len).ok_or(IsupError::TooShort)?).into_owned();
                    cursor += calling_len;
                    Some(s)
                } else {
                    None
                };
                let optional = Self::decode_optional(body, cursor)?;
                Ok(IsupMessage::Iam { cic, calling, called, optional })
            }
            MSG_ACM => {
                let optional = Self::decode_optional(body, 2)?;
                Ok(IsupMessage::Acm { cic, optional })
            }
            MSG_ANM => {
                let optional = Self::decode_optional(body, 0)?;
                Ok(IsupMessage::Anm { cic, optional })
            }
            MSG_REL => {
                let len = *body.first().ok_or(IsupError::TooShort)? as usize;
                let cause = *body.get(2).ok_or(IsupError::TooShort)? & 0x7F;
                let optional = Self::decode_optional(body, 1 + len)?;
                Ok(IsupMessage::Rel { cic, cause, optional })
            }
            MSG_RLC => {
                let optional = Self::decode_optional(body, 0)?;
                Ok(IsupMessage::Rlc { cic, optional })
            }
            other => Ok(IsupMessage::Unknown { message_type: other, cic, body: body.to_vec() }),
        }
    }
}
