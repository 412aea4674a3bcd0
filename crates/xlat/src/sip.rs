//! The shapes the translator produces for, and accepts from, the SIP
//! collaborator. The core
//! never touches the Via chain or transaction state; it only builds and
//! reads method/request-URI/headers/body.

/// Headers are an ordered multi-valued list, not a map — RFC 3261
/// requires preserving order and repeated headers (e.g. multiple `Via`,
/// though the core never writes those itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }
}

impl Default for Headers {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SipMessage {
    Request { method: String, request_uri: String, headers: Headers, body: Vec<u8> },
    Response { status: u16, reason: String, headers: Headers, body: Vec<u8> },
}

impl SipMessage {
    pub fn request(method: impl Into<String>, request_uri: impl Into<String>) -> Self {
        SipMessage::Request { method: method.into(), request_uri: request_uri.into(), headers: Headers::new(), body: Vec::new() }
    }

    pub fn response(status: u16, reason: impl Into<String>) -> Self {
        SipMessage::Response { status, reason: reason.into(), headers: Headers::new(), body: Vec::new() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            SipMessage::Request { headers, .. } | SipMessage::Response { headers, .. } => {
                headers.push(name, value);
            }
        }
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        match &mut self {
            SipMessage::Request { body: b, .. } | SipMessage::Response { body: b, .. } => *b = body,
        }
        self
    }

    pub fn headers(&self) -> &Headers {
        match self {
            SipMessage::Request { headers, .. } => headers,
            SipMessage::Response { headers, .. } => headers,
        }
    }
}

/// Minimal offer/answer for the gateway's own media negotiation: a
/// c-line, one `m=audio` line, and payload types. `None` fields are
/// omitted entirely rather than rendered empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpOffer {
    pub connection_ip: String,
    pub audio_port: u16,
    pub payload_types: Vec<u8>,
}

pub const PT_PCMU: u8 = 0;
pub const PT_PCMA: u8 = 8;
pub const PT_TELEPHONE_EVENT: u8 = 101;
pub const PT_CLEARMODE: u8 = 97;

impl SdpOffer {
    pub fn speech(connection_ip: impl Into<String>, audio_port: u16) -> Self {
        Self { connection_ip: connection_ip.into(), audio_port, payload_types: vec![PT_PCMU, PT_PCMA, PT_TELEPHONE_EVENT] }
    }

    /// Render to the octets the SIP collaborator will carry as the
    /// message body. Not a general SDP parser/writer — just enough
    /// structure for PCMU/PCMA/telephone-event rtpmap lines.
    pub fn encode(&self) -> Vec<u8> {
        let mut s = String::new();
        s.push_str("v=0\r\n");
        s.push_str(&format!("o=- 0 0 IN IP4 {}\r\n", self.connection_ip));
        s.push_str("s=-\r\n");
        s.push_str(&format!("c=IN IP4 {}\r\n", self.connection_ip));
        let pts = self.payload_types.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(" ");
        s.push_str(&format!("m=audio {} RTP/AVP {}\r\n", self.audio_port, pts));
        for &pt in &self.payload_types {
            let rtpmap = match pt {
                PT_PCMU => Some("PCMU/8000"),
                PT_PCMA => Some("PCMA/8000"),
                PT_TELEPHONE_EVENT => Some("telephone-event/8000"),
                PT_CLEARMODE => Some("clearmode/8000"),
                _ => None,
            };
            if let Some(rtpmap) = rtpmap {
                s.push_str(&format!("a=rtpmap:{} {}\r\n", pt, rtpmap));
            }
        }
        s.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut h = Headers::new();
        h.push("From", "sip:alice@example.com");
        assert_eq!(h.get("from"), Some("sip:alice@example.com"));
    }

    #[test]
    fn sdp_offer_carries_expected_payload_types() {
        let sdp = SdpOffer::speech("10.0.0.1", 20_000);
        let body = String::from_utf8(sdp.encode()).unwrap();
        assert!(body.contains("m=audio 20000 RTP/AVP 0 8 101"));
        assert!(body.contains("a=rtpmap:0 PCMU/8000"));
    }
}
