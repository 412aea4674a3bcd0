//! Q.931 message codec: protocol discriminator, call reference,
//! message type, and a tolerant information-element parser that preserves
//! unknown tags byte-for-byte.
//!
//! `[ProtocolDiscriminator 1][CallRefLen 1 (low 4 bits)][CallRefValue N]
//! [MessageType 1][IEs...]`. An IE is either single-octet (high bit of the
//! tag set) or TLV (tag, length, value).

pub const PROTOCOL_DISCRIMINATOR: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Q931Error {
    TooShort,
    BadProtocolDiscriminator,
    BadCallReferenceLength,
    TruncatedIe,
}

impl std::fmt::Display for Q931Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Q931Error::TooShort => write!(f, "message shorter than discriminator+callref+type"),
            Q931Error::BadProtocolDiscriminator => write!(f, "protocol discriminator is not 0x08"),
            Q931Error::BadCallReferenceLength => write!(f, "call reference length exceeds 2 octets"),
            Q931Error::TruncatedIe => write!(f, "information element runs past end of message"),
        }
    }
}

impl std::error::Error for Q931Error {}

impl From<Q931Error> for gerror::GError {
    fn from(err: Q931Error) -> Self {
        use gerror::codes::{
            ERR_BAD_CALL_REFERENCE_LENGTH, ERR_BAD_PROTOCOL_DISCRIMINATOR, ERR_TOO_SHORT, ERR_TRUNCATED_IE, SYS_Q931, UC_DECODE,
        };
        let error_code = match err {
            Q931Error::TooShort => ERR_TOO_SHORT,
            Q931Error::BadProtocolDiscriminator => ERR_BAD_PROTOCOL_DISCRIMINATOR,
            Q931Error::BadCallReferenceLength => ERR_BAD_CALL_REFERENCE_LENGTH,
            Q931Error::TruncatedIe => ERR_TRUNCATED_IE,
        };
        gerror::GError::simple(SYS_Q931, error_code, UC_DECODE)
    }
}

/// Call reference: up to two octets, with a flag bit in the first octet
/// distinguishing which side originated the message that carries it.
/// Call references are unique within a D-channel's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallReference {
    pub flag: bool,
    pub value: u16,
    pub len: u8,
}

impl CallReference {
    pub fn new(value: u16, flag: bool) -> Self {
        let len = if value <= 0x7F { 1 } else { 2 };
        Self { flag, value, len }
    }

    fn encode(self) -> Vec<u8> {
        match self.len {
            1 => vec![((self.flag as u8) << 7) | (self.value as u8 & 0x7F)],
            _ => vec![
                ((self.flag as u8) << 7) | ((self.value >> 8) as u8 & 0x7F),
                (self.value & 0xFF) as u8,
            ],
        }
    }

    fn decode(len: u8, bytes: &[u8]) -> Result<Self, Q931Error> {
        match len {
            1 => {
                let b = *bytes.first().ok_or(Q931Error::TooShort)?;
                Ok(CallReference { flag: b & 0x80 != 0, value: (b & 0x7F) as u16, len: 1 })
            }
            2 => {
                let b0 = *bytes.first().ok_or(Q931Error::TooShort)?;
                let b1 = *bytes.get(1).ok_or(Q931Error::TooShort)?;
                Ok(CallReference {
                    flag: b0 & 0x80 != 0,
                    value: (((b0 & 0x7F) as u16) << 8) | b1 as u16,
                    len: 2,
                })
            }
            0 => Ok(CallReference { flag: false, value: 0, len: 0 }),
            _ => Err(Q931Error::BadCallReferenceLength),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Setup,
    SetupAcknowledge,
    CallProceeding,
    Alerting,
    Connect,
    ConnectAcknowledge,
    Disconnect,
    Release,
    ReleaseComplete,
    Status,
    StatusEnquiry,
    Progress,
    Information,
    /// Surfaced as an `UnknownMessageType` protocol event; the link
    /// itself is never torn down over it.
    Unknown(u8),
}

impl MessageType {
    fn code(self) -> u8 {
        match self {
            MessageType::Alerting => 0x01,
            MessageType::CallProceeding => 0x02,
            MessageType::Progress => 0x03,
            MessageType::Setup => 0x05,
            MessageType::Connect => 0x07,
            MessageType::SetupAcknowledge => 0x0D,
            MessageType::ConnectAcknowledge => 0x0F,
            MessageType::Disconnect => 0x45,
            MessageType::Release => 0x4D,
            MessageType::ReleaseComplete => 0x5A,
            MessageType::Status => 0x7D,
            MessageType::StatusEnquiry => 0x75,
            MessageType::Information => 0x7B,
            MessageType::Unknown(code) => code,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            0x01 => MessageType::Alerting,
            0x02 => MessageType::CallProceeding,
            0x03 => MessageType::Progress,
            0x05 => MessageType::Setup,
            0x07 => MessageType::Connect,
            0x0D => MessageType::SetupAcknowledge,
            0x0F => MessageType::ConnectAcknowledge,
            0x45 => MessageType::Disconnect,
            0x4D => MessageType::Release,
            0x5A => MessageType::ReleaseComplete,
            0x7D => MessageType::Status,
            0x75 => MessageType::StatusEnquiry,
            0x7B => MessageType::Information,
            other => MessageType::Unknown(other),
        }
    }
}

pub const IE_BEARER_CAPABILITY: u8 = 0x04;
pub const IE_CAUSE: u8 = 0x08;
pub const IE_PROGRESS_INDICATOR: u8 = 0x1E;
pub const IE_CALLING_PARTY_NUMBER: u8 = 0x6C;
pub const IE_CALLED_PARTY_NUMBER: u8 = 0x70;
pub const IE_SENDING_COMPLETE: u8 = 0xA1;

/// An information element, tolerant of tags this codec doesn't interpret:
/// every IE is stored as its raw tag/value and decoded on demand by the
/// accessors below, so an unrecognized tag still round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ie {
    /// Single-octet IE (format 1): the tag's high bit is set on the wire.
    Single { tag: u8 },
    /// Variable-length TLV IE: tag, length octet, then `value.len()` octets.
    Tlv { tag: u8, value: Vec<u8> },
}

impl Ie {
    pub fn sending_complete() -> Self {
        Ie::Single { tag: IE_SENDING_COMPLETE }
    }

    pub fn bearer_capability_speech() -> Self {
        Ie::Tlv { tag: IE_BEARER_CAPABILITY, value: vec![0x80, 0x90] }
    }

    /// `cause`: Q.850 cause value; `location`: Q.850 location code.
    pub fn cause(cause: u8, location: u8) -> Self {
        Ie::Tlv {
            tag: IE_CAUSE,
            value: vec![0x80 | (location & 0x0F), 0x80 | (cause & 0x7F)],
        }
    }

    pub fn progress_indicator(indicator: u8) -> Self {
        Ie::Tlv { tag: IE_PROGRESS_INDICATOR, value: vec![0x80, 0x80 | (indicator & 0x7F)] }
    }

    pub fn calling_party_number(digits: &str) -> Self {
        let mut value = vec![0x80]; // ton=unknown, npi=unknown, no presentation octet
        value.extend_from_slice(digits.as_bytes());
        Ie::Tlv { tag: IE_CALLING_PARTY_NUMBER, value }
    }

    pub fn called_party_number(digits: &str) -> Self {
        let mut value = vec![0x80];
        value.extend_from_slice(digits.as_bytes());
        Ie::Tlv { tag: IE_CALLED_PARTY_NUMBER, value }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Ie::Single { tag } => *tag,
            Ie::Tlv { tag, .. } => *tag,
        }
    }

    /// Decode a number IE's digits (calling/called party number), if this
    /// is one. Skips the one-octet ton/npi header.
    pub fn as_number(&self) -> Option<String> {
        match self {
            Ie::Tlv { tag, value } if *tag == IE_CALLING_PARTY_NUMBER || *tag == IE_CALLED_PARTY_NUMBER => {
                let digits = value.get(1..).unwrap_or(&[]);
                Some(String::from_utf8_lossy(digits).into_owned())
            }
            _ => None,
        }
    }

    /// Decode the Q.850 cause value out of a `Cause` IE.
    pub fn as_cause(&self) -> Option<u8> {
        match self {
            Ie::Tlv { tag, value } if *tag == IE_CAUSE => value.get(1).map(|b| b & 0x7F),
            _ => None,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Ie::Single { tag } => out.push(tag | 0x80),
            Ie::Tlv { tag, value } => {
                out.push(*tag);
                out.push(value.len() as u8);
                out.extend_from_slice(value);
            }
        }
    }

    /// Returns `(Ie, bytes_consumed)`.
    fn decode(bytes: &[u8]) -> Result<(Self, usize), Q931Error> {
        let first = *bytes.first().ok_or(Q931Error::TruncatedIe)?;
        if first & 0x80 != 0 {
            Ok((Ie::Single { tag: first & 0x7F }, 1))
        } else {
            let len = *bytes.get(1).ok_or(Q931Error::TruncatedIe)? as usize;
            let value = bytes.get(2..2 + len).ok_or(Q931Error::TruncatedIe)?.to_vec();
            Ok((Ie::Tlv { tag: first, value }, 2 + len))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub call_ref: CallReference,
    pub message_type: MessageType,
    /// Preserved in the order parsed/provided.
    pub ies: Vec<Ie>,
}

impl Message {
    pub fn new(call_ref: CallReference, message_type: MessageType) -> Self {
        Self { call_ref, message_type, ies: Vec::new() }
    }

    pub fn with_ie(mut self, ie: Ie) -> Self {
        self.ies.push(ie);
        self
    }

    pub fn ie(&self, tag: u8) -> Option<&Ie> {
        self.ies.iter().find(|ie| ie.tag() == tag)
    }

    pub fn calling_number(&self) -> Option<String> {
        self.ie(IE_CALLING_PARTY_NUMBER).and_then(Ie::as_number)
    }

    pub fn called_number(&self) -> Option<String> {
        self.ie(IE_CALLED_PARTY_NUMBER).and_then(Ie::as_number)
    }

    pub fn cause(&self) -> Option<u8> {
        self.ie(IE_CAUSE).and_then(Ie::as_cause)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(PROTOCOL_DISCRIMINATOR);
        out.push(self.call_ref.len & 0x0F);
        out.extend(self.call_ref.encode());
        out.push(self.message_type.code());
        for ie in &self.ies {
            ie.encode(&mut out);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Q931Error> {
        if bytes.len() < 3 {
            return Err(Q931Error::TooShort);
        }
        if bytes[0] != PROTOCOL_DISCRIMINATOR {
            return Err(Q931Error::BadProtocolDiscriminator);
        }
        let callref_len = bytes[1] & 0x0F;
        let mut cursor = 2usize;
        let call_ref = CallReference::decode(callref_len, &bytes[cursor..])?;
        cursor += callref_len as usize;
        let message_type = MessageType::from_code(*bytes.get(cursor).ok_or(Q931Error::TooShort)?);
        cursor += 1;

        let mut ies = Vec::new();
        while cursor < bytes.len() {
            let (ie, consumed) = Ie::decode(&bytes[cursor..])?;
            ies.push(ie);
            cursor += consumed;
        }

        Ok(Message { call_ref, message_type, ies })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_round_trips_with_known_ies() {
        let msg = Message::new(CallReference::new(0x1234, false), MessageType::Setup)
            .with_ie(Ie::bearer_capability_speech())
            .with_ie(Ie::calling_party_number("5551001"))
            .with_ie(Ie::called_party_number("5551002"))
            .with_ie(Ie::sending_complete());

        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.calling_number().as_deref(), Some("5551001"));
        assert_eq!(decoded.called_number().as_deref(), Some("5551002"));
    }

    #[test]
    fn unknown_ie_is_preserved_byte_for_byte() {
        let msg = Message::new(CallReference::new(1, true), MessageType::Setup)
            .with_ie(Ie::Tlv { tag: 0x7E, value: vec![0xDE, 0xAD, 0xBE, 0xEF] })
            .with_ie(Ie::Single { tag: 0x3A });

        let bytes = msg.encode();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.ies, msg.ies);
        assert_eq!(Message::decode(&decoded.encode()).unwrap(), msg);
    }

    #[test]
    fn unknown_message_type_decodes_without_error() {
        let msg = Message::new(CallReference::new(5, false), MessageType::Unknown(0x33));
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.message_type, MessageType::Unknown(0x33));
    }

    #[test]
    fn call_reference_two_octet_round_trips() {
        let cref = CallReference::new(0x4321, true);
        assert_eq!(cref.len, 2);
        let decoded = CallReference::decode(2, &cref.encode()).unwrap();
        assert_eq!(decoded, cref);
    }

    #[test]
    fn decode_rejects_bad_discriminator() {
        assert_eq!(Message::decode(&[0x01, 0x01, 0x00, 0x05]), Err(Q931Error::BadProtocolDiscriminator));
    }

    #[test]
    fn decode_rejects_too_short() {
        assert_eq!(Message::decode(&[0x08, 0x01]), Err(Q931Error::TooShort));
    }

    #[test]
    fn cause_ie_round_trips() {
        let ie = Ie::cause(17, 0); // user busy, location=user
        if let Ie::Tlv { value, .. } = &ie {
            assert_eq!(value[1] & 0x7F, 17);
        }
        let msg = Message::new(CallReference::new(9, false), MessageType::Disconnect).with_ie(ie);
        let decoded = Message::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.cause(), Some(17));
    }

    #[test]
    fn q931_error_converts_to_gerror_with_matching_code() {
        let gerr: gerror::GError = Q931Error::BadProtocolDiscriminator.into();
        assert_eq!(gerr.system(), &gerror::codes::SYS_Q931);
        assert_eq!(gerr.error_code(), &gerror::codes::ERR_BAD_PROTOCOL_DISCRIMINATOR);
    }
}
