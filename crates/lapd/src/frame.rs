//! LAPD frame encode/decode (Q.921 §3: address, control, information, FCS).
//!
//! `decode`/`encode` are pure functions with no knowledge of data-link
//! state; the engine calls them at its boundary and only ever holds
//! `Frame` values internally.

/// Information field length is bounded by N201 (default 260 octets).
pub const DEFAULT_N201: usize = 260;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    TooShort,
    BadAddress,
    BadControl,
    BadFcs,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::TooShort => write!(f, "frame shorter than address+control+FCS"),
            FrameError::BadAddress => write!(f, "address field EA bits malformed"),
            FrameError::BadControl => write!(f, "control field encodes no known frame kind"),
            FrameError::BadFcs => write!(f, "FCS mismatch"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<FrameError> for gerror::GError {
    fn from(err: FrameError) -> Self {
        use gerror::codes::{ERR_BAD_ADDRESS, ERR_BAD_CONTROL, ERR_BAD_FCS, ERR_TOO_SHORT, SYS_LAPD, UC_DECODE};
        let error_code = match err {
            FrameError::TooShort => ERR_TOO_SHORT,
            FrameError::BadAddress => ERR_BAD_ADDRESS,
            FrameError::BadControl => ERR_BAD_CONTROL,
            FrameError::BadFcs => ERR_BAD_FCS,
        };
        gerror::GError::simple(SYS_LAPD, error_code, UC_DECODE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub sapi: u8,
    /// Command/response bit, as carried on the wire (its sense depends on
    /// which side — network or user — originated the frame).
    pub command_response: bool,
    pub tei: u8,
}

impl Address {
    pub const SAPI_CALL_CONTROL: u8 = 0;
    pub const SAPI_LINK_MANAGEMENT: u8 = 63;

    fn encode(self) -> [u8; 2] {
        let octet1 = (self.sapi << 2) | ((self.command_response as u8) << 1);
        let octet2 = (self.tei << 1) | 1;
        [octet1, octet2]
    }

    fn decode(bytes: [u8; 2]) -> Result<Self, FrameError> {
        let ea0 = bytes[0] & 0x01;
        let ea1 = bytes[1] & 0x01;
        if ea0 != 0 || ea1 != 1 {
            return Err(FrameError::BadAddress);
        }
        Ok(Address {
            sapi: (bytes[0] >> 2) & 0x3F,
            command_response: (bytes[0] >> 1) & 0x01 != 0,
            tei: (bytes[1] >> 1) & 0x7F,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisoryKind {
    Rr,
    Rnr,
    Rej,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnnumberedKind {
    Sabme,
    Dm,
    Ui,
    Disc,
    Ua,
    Frmr,
    Xid,
}

impl UnnumberedKind {
    /// Internal 5-bit modifier assignment, distinct per command. Decode is
    /// the exact inverse of this table.
    fn modifier(self) -> u8 {
        match self {
            UnnumberedKind::Sabme => 0b00001,
            UnnumberedKind::Dm => 0b00010,
            UnnumberedKind::Ui => 0b00011,
            UnnumberedKind::Disc => 0b00100,
            UnnumberedKind::Ua => 0b00101,
            UnnumberedKind::Frmr => 0b00110,
            UnnumberedKind::Xid => 0b00111,
        }
    }

    fn from_modifier(m: u8) -> Option<Self> {
        match m {
            0b00001 => Some(UnnumberedKind::Sabme),
            0b00010 => Some(UnnumberedKind::Dm),
            0b00011 => Some(UnnumberedKind::Ui),
            0b00100 => Some(UnnumberedKind::Disc),
            0b00101 => Some(UnnumberedKind::Ua),
            0b00110 => Some(UnnumberedKind::Frmr),
            0b00111 => Some(UnnumberedKind::Xid),
            _ => None,
        }
    }
}

/// The control field, decoded into its three kinds (Q.921 §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    I { ns: u8, nr: u8, poll: bool },
    S { kind: SupervisoryKind, nr: u8, poll_final: bool },
    U { kind: UnnumberedKind, poll_final: bool },
}

impl Control {
    fn encode(self) -> Vec<u8> {
        match self {
            Control::I { ns, nr, poll } => {
                vec![(ns & 0x7F) << 1, ((nr & 0x7F) << 1) | (poll as u8)]
            }
            Control::S { kind, nr, poll_final } => {
                let stype = match kind {
                    SupervisoryKind::Rr => 0b00,
                    SupervisoryKind::Rnr => 0b01,
                    SupervisoryKind::Rej => 0b10,
                };
                vec![(stype << 2) | 0b01, ((nr & 0x7F) << 1) | (poll_final as u8)]
            }
            Control::U { kind, poll_final } => {
                // Q.921 §4.3.2: `M5 M4 M3 P/F M2 M1 1 1` — the 5 modifier
                // bits straddle the P/F bit rather than sitting contiguous.
                let modifier = kind.modifier();
                let upper3 = (modifier >> 2) & 0b111;
                let lower2 = modifier & 0b011;
                let octet = (upper3 << 5) | ((poll_final as u8) << 4) | (lower2 << 2) | 0b11;
                vec![octet]
            }
        }
    }

    /// Returns `(Control, bytes_consumed)`.
    fn decode(bytes: &[u8]) -> Result<(Self, usize), FrameError> {
        let first = *bytes.first().ok_or(FrameError::TooShort)?;
        if first & 0b01 == 0 {
            // I-frame: bit0 == 0
            let second = *bytes.get(1).ok_or(FrameError::TooShort)?;
            Ok((
                Control::I {
                    ns: (first >> 1) & 0x7F,
                    nr: (second >> 1) & 0x7F,
                    poll: second & 0x01 != 0,
                },
                2,
            ))
        } else if first & 0b11 == 0b01 {
            // S-frame: bits 1,0 == 01
            let second = *bytes.get(1).ok_or(FrameError::TooShort)?;
            let kind = match (first >> 2) & 0b11 {
                0b00 => SupervisoryKind::Rr,
                0b01 => SupervisoryKind::Rnr,
                0b10 => SupervisoryKind::Rej,
                _ => return Err(FrameError::BadControl),
            };
            Ok((
                Control::S {
                    kind,
                    nr: (second >> 1) & 0x7F,
                    poll_final: second & 0x01 != 0,
                },
                2,
            ))
        } else {
            // U-frame: bits 1,0 == 11. P/F sits at bit 4, splitting the
            // 5-bit modifier into an upper 3 bits (7-5) and a lower 2
            // bits (3-2) — the inverse of `Control::encode`'s U-frame arm.
            let upper3 = (first >> 5) & 0b111;
            let lower2 = (first >> 2) & 0b011;
            let modifier = (upper3 << 2) | lower2;
            let kind = UnnumberedKind::from_modifier(modifier).ok_or(FrameError::BadControl)?;
            Ok((
                Control::U {
                    kind,
                    poll_final: (first >> 4) & 0x01 != 0,
                },
                1,
            ))
        }
    }

    pub fn is_information(&self) -> bool {
        matches!(self, Control::I { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: Address,
    pub control: Control,
    pub information: Vec<u8>,
}

impl Frame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 2 + self.information.len() + 2);
        out.extend_from_slice(&self.address.encode());
        out.extend_from_slice(&self.control.encode());
        out.extend_from_slice(&self.information);
        let fcs = crc16_x25(&out);
        out.extend_from_slice(&fcs.to_le_bytes());
        out
    }

    pub fn decode(octets: &[u8]) -> Result<Self, FrameError> {
        if octets.len() < 2 + 1 + 2 {
            return Err(FrameError::TooShort);
        }
        let (payload, fcs_bytes) = octets.split_at(octets.len() - 2);
        let received_fcs = u16::from_le_bytes([fcs_bytes[0], fcs_bytes[1]]);
        if crc16_x25(payload) != received_fcs {
            return Err(FrameError::BadFcs);
        }

        let address = Address::decode([payload[0], payload[1]])?;
        let (control, consumed) = Control::decode(&payload[2..])?;
        let information = payload[2 + consumed..].to_vec();

        Ok(Frame {
            address,
            control,
            information,
        })
    }
}

/// CRC-16/X-25: poly 0x1021 (reflected: 0x8408), init 0xFFFF, final XOR
/// 0xFFFF, transmitted least-significant-octet first.
fn crc16_x25(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0x8408;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_address() -> Address {
        Address {
            sapi: Address::SAPI_CALL_CONTROL,
            command_response: true,
            tei: 5,
        }
    }

    #[test]
    fn address_round_trips() {
        let addr = sample_address();
        let encoded = addr.encode();
        assert_eq!(Address::decode(encoded).unwrap(), addr);
    }

    #[test]
    fn address_rejects_bad_ea_bits() {
        assert_eq!(Address::decode([0x01, 0x0B]), Err(FrameError::BadAddress));
    }

    #[test]
    fn i_frame_round_trips() {
        let frame = Frame {
            address: sample_address(),
            control: Control::I { ns: 3, nr: 5, poll: true },
            information: vec![1, 2, 3, 4],
        };
        let bytes = frame.encode();
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn s_frame_round_trips() {
        let frame = Frame {
            address: sample_address(),
            control: Control::S {
                kind: SupervisoryKind::Rej,
                nr: 9,
                poll_final: false,
            },
            information: vec![],
        };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 2 + 2 + 2); // no information on a supervisory frame
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn u_frame_round_trips_and_is_one_control_octet() {
        let frame = Frame {
            address: sample_address(),
            control: Control::U { kind: UnnumberedKind::Sabme, poll_final: true },
            information: vec![],
        };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 2 + 1 + 2);
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn u_frame_poll_final_sits_at_bit_four() {
        // Q.921 §4.3.2: `M5 M4 M3 P/F M2 M1 1 1` — bit 4 carries P/F,
        // not bit 2 (which is the low half of the modifier split).
        let control_octet = |poll_final| {
            Control::U { kind: UnnumberedKind::Sabme, poll_final }.encode()[0]
        };
        let p1 = control_octet(true);
        let p0 = control_octet(false);
        assert_eq!(p1 ^ p0, 0b0001_0000, "only bit 4 should change with P/F");
        assert_eq!(p1 & 0b0000_0100, 0, "bit 2 carries modifier, not P/F");
    }

    #[test]
    fn decode_rejects_too_short() {
        assert_eq!(Frame::decode(&[0, 0, 0]), Err(FrameError::TooShort));
    }

    #[test]
    fn decode_rejects_bad_fcs() {
        let frame = Frame {
            address: sample_address(),
            control: Control::U { kind: UnnumberedKind::Ua, poll_final: false },
            information: vec![],
        };
        let mut bytes = frame.encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert_eq!(Frame::decode(&bytes), Err(FrameError::BadFcs));
    }

    #[test]
    fn decode_rejects_unknown_control_pattern() {
        let addr = sample_address().encode();
        let mut bytes = addr.to_vec();
        // A U-frame octet whose modifier bits don't match any known command.
        bytes.push(0b1111_1111);
        let fcs = crc16_x25(&bytes);
        bytes.extend_from_slice(&fcs.to_le_bytes());
        assert_eq!(Frame::decode(&bytes), Err(FrameError::BadControl));
    }

    #[test]
    fn frame_error_converts_to_gerror_with_matching_code() {
        let gerr: gerror::GError = FrameError::BadFcs.into();
        assert_eq!(gerr.system(), &gerror::codes::SYS_LAPD);
        assert_eq!(gerr.error_code(), &gerror::codes::ERR_BAD_FCS);
    }
}
