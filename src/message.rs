//! Diameter message header and message codec
//!
//! Message format (RFC 6733):
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Version    |                 Message Length                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | command flags |                  Command-Code                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Application-ID                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Hop-by-Hop Identifier                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      End-to-End Identifier                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  AVPs ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-
//! ```
//!
//! [`Header::decode`] parses only the 20-byte header and is the cheap path
//! used to classify inbound frames (request/answer, command code) before
//! committing to a full AVP decode.

use bytes::{BufMut, BytesMut};

use crate::avp::{self, Avp, AvpValue};
use crate::dictionary::Dictionary;
use crate::error::{DiameterError, DiameterResult};
use crate::DIAMETER_VERSION;

/// Diameter message header size
pub const DIAMETER_HEADER_SIZE: usize = 20;

/// Command flags
pub mod cmd_flags {
    /// Request bit
    pub const REQUEST: u8 = 0x80;
    /// Proxiable bit
    pub const PROXIABLE: u8 = 0x40;
    /// Error bit
    pub const ERROR: u8 = 0x20;
}

/// Diameter message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Protocol version (always 1)
    pub version: u8,
    /// Message length as declared on the wire (including header)
    pub length: u32,
    /// Command flags
    pub flags: u8,
    /// Command code (24-bit)
    pub command_code: u32,
    /// Application ID
    pub application_id: u32,
    /// Hop-by-Hop identifier
    pub hop_by_hop_id: u32,
    /// End-to-End identifier
    pub end_to_end_id: u32,
}

impl Header {
    /// Check if this is a request
    pub fn is_request(&self) -> bool {
        self.flags & cmd_flags::REQUEST != 0
    }

    /// Check if this is an answer
    pub fn is_answer(&self) -> bool {
        !self.is_request()
    }

    /// Check if this is proxiable
    pub fn is_proxiable(&self) -> bool {
        self.flags & cmd_flags::PROXIABLE != 0
    }

    /// Check if the error bit is set
    pub fn is_error(&self) -> bool {
        self.flags & cmd_flags::ERROR != 0
    }

    /// Encode the 20-byte header
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u8(((self.length >> 16) & 0xFF) as u8);
        buf.put_u16((self.length & 0xFFFF) as u16);
        buf.put_u8(self.flags);
        buf.put_u8(((self.command_code >> 16) & 0xFF) as u8);
        buf.put_u16((self.command_code & 0xFFFF) as u16);
        buf.put_u32(self.application_id);
        buf.put_u32(self.hop_by_hop_id);
        buf.put_u32(self.end_to_end_id);
    }

    /// Decode the first 20 bytes of a frame.
    ///
    /// The version byte occupies the top of the 4-byte length word and the
    /// flags byte the top of the command-code word; both are masked out of
    /// the 24-bit values.
    pub fn decode(buf: &[u8]) -> DiameterResult<Header> {
        if buf.len() < DIAMETER_HEADER_SIZE {
            return Err(DiameterError::InvalidMessage(format!(
                "header needs {DIAMETER_HEADER_SIZE} bytes, have {}",
                buf.len()
            )));
        }

        let version = buf[0];
        let length = ((buf[1] as u32) << 16) | ((buf[2] as u32) << 8) | buf[3] as u32;
        let flags = buf[4];
        let command_code = ((buf[5] as u32) << 16) | ((buf[6] as u32) << 8) | buf[7] as u32;
        let application_id = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let hop_by_hop_id = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let end_to_end_id = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);

        Ok(Header {
            version,
            length,
            flags,
            command_code,
            application_id,
            hop_by_hop_id,
            end_to_end_id,
        })
    }
}

/// Diameter message (header + AVPs, in wire order)
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Header,
    pub avps: Vec<Avp>,
}

impl Message {
    /// Create a message with explicit flags and identifiers
    pub fn new(
        command_code: u32,
        request: bool,
        proxiable: bool,
        application_id: u32,
        hop_by_hop_id: u32,
        end_to_end_id: u32,
        avps: Vec<Avp>,
    ) -> Self {
        let mut flags = 0u8;
        if request {
            flags |= cmd_flags::REQUEST;
        }
        if proxiable {
            flags |= cmd_flags::PROXIABLE;
        }
        Self {
            header: Header {
                version: DIAMETER_VERSION,
                length: 0,
                flags,
                command_code,
                application_id,
                hop_by_hop_id,
                end_to_end_id,
            },
            avps,
        }
    }

    /// Create a request with zero identifiers (assigned at send time)
    pub fn request(command_code: u32, proxiable: bool, application_id: u32) -> Self {
        Self::new(command_code, true, proxiable, application_id, 0, 0, Vec::new())
    }

    /// Create an answer to a request, echoing its command code, application
    /// id and hop-by-hop/end-to-end identifiers
    pub fn answer_to(request: &Header) -> Self {
        Self::new(
            request.command_code,
            false,
            request.is_proxiable(),
            request.application_id,
            request.hop_by_hop_id,
            request.end_to_end_id,
            Vec::new(),
        )
    }

    /// Append an AVP
    pub fn add_avp(&mut self, avp: Avp) {
        self.avps.push(avp);
    }

    /// Check if this is a request
    pub fn is_request(&self) -> bool {
        self.header.is_request()
    }

    /// Check if this is an answer
    pub fn is_answer(&self) -> bool {
        self.header.is_answer()
    }

    /// Find an AVP by vendor id and code
    pub fn find_avp(&self, vendor_id: u32, code: u32) -> Option<&Avp> {
        avp::find_avp(&self.avps, vendor_id, code)
    }

    /// Find all AVPs with a given vendor id and code
    pub fn find_all_avps(&self, vendor_id: u32, code: u32) -> Vec<&Avp> {
        avp::find_all_avps(&self.avps, vendor_id, code)
    }

    /// Total encoded length: header plus padded AVP lengths
    pub fn encoded_len(&self) -> usize {
        DIAMETER_HEADER_SIZE + self.avps.iter().map(|a| a.encoded_len()).sum::<usize>()
    }

    /// Encode the message; the length field is computed here, whatever the
    /// header currently declares
    pub fn encode(&self) -> BytesMut {
        let len = self.encoded_len();
        let mut buf = BytesMut::with_capacity(len);

        let mut header = self.header.clone();
        header.version = DIAMETER_VERSION;
        header.length = len as u32;
        header.encode(&mut buf);

        for avp in &self.avps {
            avp.encode(&mut buf);
        }
        buf
    }

    /// Decode a full message: header plus all AVPs.
    ///
    /// The declared message length is cross-checked against the actual byte
    /// count; a mismatch is logged and decoding proceeds on the declared
    /// length (clamped to the buffer).
    pub fn decode(buf: &[u8], dict: &Dictionary) -> DiameterResult<Message> {
        let header = Header::decode(buf)?;

        if header.length as usize != buf.len() {
            log::warn!(
                "message length mismatch: declared {}, actual {}",
                header.length,
                buf.len()
            );
        }
        let end = (header.length as usize).clamp(DIAMETER_HEADER_SIZE, buf.len());
        let avps = avp::decode_all(&buf[DIAMETER_HEADER_SIZE..end], dict);

        Ok(Message { header, avps })
    }

    /// Render the message for logging, resolving names through the dictionary
    pub fn render(&self, dict: &Dictionary) -> String {
        let mut out = Vec::new();
        out.push(format!("cmd_code:   {}", self.header.command_code));

        let mut flag_str = if self.is_request() { "Request" } else { "Answer" }.to_string();
        if self.header.is_proxiable() {
            flag_str.push_str(",Proxiable");
        }
        if self.header.is_error() {
            flag_str.push_str(",Error");
        }
        out.push(format!("flags:      0x{:x} {}", self.header.flags, flag_str));

        let app = match dict.application_name(self.header.application_id) {
            Some(name) => format!("{} ({name})", self.header.application_id),
            None => format!("{}", self.header.application_id),
        };
        out.push(format!("app_id:     {app}"));
        out.push(format!("hop_by_hop: 0x{:08x}", self.header.hop_by_hop_id));
        out.push(format!("end_to_end: 0x{:08x}", self.header.end_to_end_id));
        out.push("----".to_string());
        render_avps(&mut out, &self.avps, dict, 0);
        out.join("\n")
    }
}

fn render_avps(out: &mut Vec<String>, avps: &[Avp], dict: &Dictionary, level: usize) {
    let pref = "    ".repeat(level);
    for avp in avps {
        let def = dict.lookup(avp.vendor_id, avp.code);
        let mut flags = String::new();
        flags.push(if avp.is_vendor_specific() { 'V' } else { '-' });
        flags.push(if avp.is_mandatory() { 'M' } else { '-' });

        let mut line = format!("{pref}AVP: {}({}) f={flags}", def.name, avp.code);
        if avp.is_vendor_specific() {
            line.push_str(&format!(" vnd={}", avp.vendor_id));
        }

        if let AvpValue::Grouped(children) = &avp.value {
            out.push(line);
            render_avps(out, children, dict, level + 1);
        } else {
            line.push_str(&format!(" val={}", value_string(avp, dict)));
            out.push(line);
        }
    }
}

fn value_string(avp: &Avp, dict: &Dictionary) -> String {
    match &avp.value {
        AvpValue::Integer32(v) => v.to_string(),
        AvpValue::Integer64(v) => v.to_string(),
        AvpValue::Unsigned32(v) | AvpValue::Time(v) => v.to_string(),
        AvpValue::Unsigned64(v) => v.to_string(),
        AvpValue::Float32(v) => v.to_string(),
        AvpValue::Float64(v) => v.to_string(),
        AvpValue::Utf8String(s) => s.clone(),
        AvpValue::Enumerated(v) => match dict.enum_name(avp.vendor_id, avp.code, *v) {
            Some(name) => format!("{v} ({name})"),
            None => v.to_string(),
        },
        AvpValue::OctetString(b) | AvpValue::Unknown(b) => format!("0x{}", hex_string(b)),
        AvpValue::Address { family, addr } => format!("fam:{family} 0x{}", hex_string(addr)),
        AvpValue::Grouped(_) => String::new(),
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
