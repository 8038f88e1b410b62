//! Diameter AVP (Attribute-Value Pair) encoding and decoding
//!
//! AVP format (RFC 6733):
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           AVP Code                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V M P r r r r r|                  AVP Length                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Vendor-ID (opt)                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Data ...
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! Decoding is dictionary driven: the `(vendor_id, code)` pair selects the
//! wire type, and payload anomalies (wrong length for a fixed-size type,
//! unknown codes) are logged and handled best-effort rather than failing the
//! surrounding message. Encoding cannot fail: the value is a closed tagged
//! union, so a type/value mismatch is unrepresentable.

use bytes::{BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

use crate::common::addr_family;
use crate::dictionary::{AvpType, Dictionary};

/// AVP flags
pub mod avp_flags {
    /// Vendor-Specific bit
    pub const VENDOR: u8 = 0x80;
    /// Mandatory bit
    pub const MANDATORY: u8 = 0x40;
}

/// AVP header size without vendor ID
pub const AVP_HEADER_SIZE: usize = 8;
/// AVP header size with vendor ID
pub const AVP_HEADER_SIZE_VENDOR: usize = 12;

/// Offset between the NTP epoch (1900) and the Unix epoch (1970), in seconds.
/// The Time AVP type carries NTP seconds on the wire.
pub const NTP_UNIX_OFFSET: u32 = 2_208_988_800;

/// Diameter AVP
#[derive(Debug, Clone, PartialEq)]
pub struct Avp {
    /// AVP code
    pub code: u32,
    /// Vendor ID; zero means not vendor-specific
    pub vendor_id: u32,
    /// Mandatory bit
    pub mandatory_flag: bool,
    /// Decoded value
    pub value: AvpValue,
}

/// AVP value, one variant per wire type
#[derive(Debug, Clone, PartialEq)]
pub enum AvpValue {
    Integer32(i32),
    Integer64(i64),
    Unsigned32(u32),
    Unsigned64(u64),
    Float32(f32),
    Float64(f64),
    OctetString(Bytes),
    Utf8String(String),
    Enumerated(i32),
    /// Seconds since the Unix epoch; converted to/from NTP seconds on the wire
    Time(u32),
    /// Address family (IANA number) plus raw address bytes
    Address { family: u16, addr: Bytes },
    /// Nested AVPs, in wire order
    Grouped(Vec<Avp>),
    /// Raw payload of an AVP the dictionary does not know
    Unknown(Bytes),
}

impl Avp {
    /// Create a new AVP. The vendor bit on the wire follows from a nonzero
    /// `vendor_id`.
    pub fn new(code: u32, value: AvpValue, mandatory: bool, vendor_id: u32) -> Self {
        Self {
            code,
            vendor_id,
            mandatory_flag: mandatory,
            value,
        }
    }

    pub fn integer32(code: u32, value: i32, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Integer32(value), mandatory, vendor_id)
    }

    pub fn integer64(code: u32, value: i64, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Integer64(value), mandatory, vendor_id)
    }

    pub fn unsigned32(code: u32, value: u32, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Unsigned32(value), mandatory, vendor_id)
    }

    pub fn unsigned64(code: u32, value: u64, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Unsigned64(value), mandatory, vendor_id)
    }

    pub fn float32(code: u32, value: f32, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Float32(value), mandatory, vendor_id)
    }

    pub fn float64(code: u32, value: f64, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Float64(value), mandatory, vendor_id)
    }

    pub fn octet_string(
        code: u32,
        value: impl Into<Bytes>,
        mandatory: bool,
        vendor_id: u32,
    ) -> Self {
        Self::new(code, AvpValue::OctetString(value.into()), mandatory, vendor_id)
    }

    pub fn utf8_string(
        code: u32,
        value: impl Into<String>,
        mandatory: bool,
        vendor_id: u32,
    ) -> Self {
        Self::new(code, AvpValue::Utf8String(value.into()), mandatory, vendor_id)
    }

    pub fn enumerated(code: u32, value: i32, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Enumerated(value), mandatory, vendor_id)
    }

    /// Time AVP from Unix seconds
    pub fn time(code: u32, unix_secs: u32, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Time(unix_secs), mandatory, vendor_id)
    }

    pub fn address(
        code: u32,
        family: u16,
        addr: impl Into<Bytes>,
        mandatory: bool,
        vendor_id: u32,
    ) -> Self {
        Self::new(
            code,
            AvpValue::Address {
                family,
                addr: addr.into(),
            },
            mandatory,
            vendor_id,
        )
    }

    /// Address AVP for an IPv4 address
    pub fn address_ipv4(code: u32, addr: Ipv4Addr, mandatory: bool, vendor_id: u32) -> Self {
        Self::address(
            code,
            addr_family::IPV4,
            Bytes::copy_from_slice(&addr.octets()),
            mandatory,
            vendor_id,
        )
    }

    pub fn grouped(code: u32, avps: Vec<Avp>, mandatory: bool, vendor_id: u32) -> Self {
        Self::new(code, AvpValue::Grouped(avps), mandatory, vendor_id)
    }

    /// Check if AVP is vendor-specific (vendor bit on the wire)
    pub fn is_vendor_specific(&self) -> bool {
        self.vendor_id != 0
    }

    /// Check if AVP is mandatory
    pub fn is_mandatory(&self) -> bool {
        self.mandatory_flag
    }

    fn header_len(&self) -> usize {
        if self.is_vendor_specific() {
            AVP_HEADER_SIZE_VENDOR
        } else {
            AVP_HEADER_SIZE
        }
    }

    /// Encoded length of this AVP including padding
    pub fn encoded_len(&self) -> usize {
        let total = self.header_len() + self.value.encoded_len();
        (total + 3) & !3
    }

    /// Encode AVP to bytes, zero-padded to a 4-byte boundary. The length
    /// field covers header and payload, not the padding.
    pub fn encode(&self, buf: &mut BytesMut) {
        let data_len = self.value.encoded_len();
        let avp_len = self.header_len() + data_len;

        buf.put_u32(self.code);

        let mut flags = 0u8;
        if self.is_vendor_specific() {
            flags |= avp_flags::VENDOR;
        }
        if self.mandatory_flag {
            flags |= avp_flags::MANDATORY;
        }
        buf.put_u8(flags);
        buf.put_u8(((avp_len >> 16) & 0xFF) as u8);
        buf.put_u16((avp_len & 0xFFFF) as u16);

        if self.is_vendor_specific() {
            buf.put_u32(self.vendor_id);
        }

        self.value.encode(buf);

        let padding = (4 - (data_len % 4)) % 4;
        buf.put_bytes(0, padding);
    }

    /// Decode one AVP payload whose header has already been consumed.
    ///
    /// The wire type comes from a dictionary lookup on `(vendor_id, code)`;
    /// unknown pairs decode to [`AvpValue::Unknown`] carrying the raw bytes.
    /// Length mismatches for fixed-size types are logged and decoded
    /// best-effort; a single malformed AVP never fails the whole message.
    pub fn decode(
        code: u32,
        vendor_id: u32,
        mandatory_flag: bool,
        payload: &[u8],
        dict: &Dictionary,
    ) -> Avp {
        let def = dict.lookup(vendor_id, code);
        let value = AvpValue::decode(def.avp_type, code, payload, dict);
        Avp {
            code,
            vendor_id,
            mandatory_flag,
            value,
        }
    }

    /// Value as u32 where the representation allows it
    pub fn as_u32(&self) -> Option<u32> {
        match &self.value {
            AvpValue::Unsigned32(v) => Some(*v),
            AvpValue::Enumerated(v) | AvpValue::Integer32(v) => Some(*v as u32),
            AvpValue::Time(v) => Some(*v),
            _ => None,
        }
    }

    /// Value as i32 where the representation allows it
    pub fn as_i32(&self) -> Option<i32> {
        match &self.value {
            AvpValue::Integer32(v) | AvpValue::Enumerated(v) => Some(*v),
            AvpValue::Unsigned32(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Value as u64 where the representation allows it
    pub fn as_u64(&self) -> Option<u64> {
        match &self.value {
            AvpValue::Unsigned64(v) => Some(*v),
            AvpValue::Unsigned32(v) => Some(*v as u64),
            _ => None,
        }
    }

    /// Value as a string slice for text-typed AVPs
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            AvpValue::Utf8String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes for octet-string and unknown AVPs
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.value {
            AvpValue::OctetString(b) | AvpValue::Unknown(b) => Some(b),
            _ => None,
        }
    }

    /// Child AVPs of a grouped AVP
    pub fn as_grouped(&self) -> Option<&[Avp]> {
        match &self.value {
            AvpValue::Grouped(avps) => Some(avps),
            _ => None,
        }
    }

    /// Find a child AVP by vendor id and code inside a grouped AVP
    pub fn find_avp(&self, vendor_id: u32, code: u32) -> Option<&Avp> {
        find_avp(self.as_grouped()?, vendor_id, code)
    }
}

impl AvpValue {
    /// Unpadded encoded length of this value
    pub fn encoded_len(&self) -> usize {
        match self {
            AvpValue::Integer32(_)
            | AvpValue::Unsigned32(_)
            | AvpValue::Enumerated(_)
            | AvpValue::Float32(_)
            | AvpValue::Time(_) => 4,
            AvpValue::Integer64(_) | AvpValue::Unsigned64(_) | AvpValue::Float64(_) => 8,
            AvpValue::OctetString(b) | AvpValue::Unknown(b) => b.len(),
            AvpValue::Utf8String(s) => s.len(),
            AvpValue::Address { addr, .. } => 2 + addr.len(),
            // children are individually padded, so a group payload is
            // always a multiple of 4
            AvpValue::Grouped(avps) => avps.iter().map(|a| a.encoded_len()).sum(),
        }
    }

    /// Encode the payload bytes (no header, no padding)
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            AvpValue::Integer32(v) | AvpValue::Enumerated(v) => buf.put_i32(*v),
            AvpValue::Integer64(v) => buf.put_i64(*v),
            AvpValue::Unsigned32(v) => buf.put_u32(*v),
            AvpValue::Unsigned64(v) => buf.put_u64(*v),
            AvpValue::Float32(v) => buf.put_f32(*v),
            AvpValue::Float64(v) => buf.put_f64(*v),
            AvpValue::Time(v) => buf.put_u32(v.wrapping_add(NTP_UNIX_OFFSET)),
            AvpValue::OctetString(b) | AvpValue::Unknown(b) => buf.put_slice(b),
            AvpValue::Utf8String(s) => buf.put_slice(s.as_bytes()),
            AvpValue::Address { family, addr } => {
                buf.put_u16(*family);
                buf.put_slice(addr);
            }
            AvpValue::Grouped(avps) => {
                for avp in avps {
                    avp.encode(buf);
                }
            }
        }
    }

    fn decode(avp_type: AvpType, code: u32, payload: &[u8], dict: &Dictionary) -> AvpValue {
        match avp_type {
            AvpType::Integer32 => Self::fixed4(code, payload, |b| {
                AvpValue::Integer32(i32::from_be_bytes(b))
            }),
            AvpType::Enumerated => Self::fixed4(code, payload, |b| {
                AvpValue::Enumerated(i32::from_be_bytes(b))
            }),
            AvpType::Unsigned32 => Self::fixed4(code, payload, |b| {
                AvpValue::Unsigned32(u32::from_be_bytes(b))
            }),
            AvpType::Float32 => Self::fixed4(code, payload, |b| {
                AvpValue::Float32(f32::from_be_bytes(b))
            }),
            AvpType::Time => Self::fixed4(code, payload, |b| {
                AvpValue::Time(u32::from_be_bytes(b).wrapping_sub(NTP_UNIX_OFFSET))
            }),
            AvpType::Integer64 => Self::fixed8(code, payload, |b| {
                AvpValue::Integer64(i64::from_be_bytes(b))
            }),
            AvpType::Unsigned64 => Self::fixed8(code, payload, |b| {
                AvpValue::Unsigned64(u64::from_be_bytes(b))
            }),
            AvpType::Float64 => Self::fixed8(code, payload, |b| {
                AvpValue::Float64(f64::from_be_bytes(b))
            }),
            AvpType::OctetString => AvpValue::OctetString(Bytes::copy_from_slice(payload)),
            AvpType::Utf8String => match std::str::from_utf8(payload) {
                Ok(s) => AvpValue::Utf8String(s.to_string()),
                Err(_) => {
                    log::warn!("avp {code}: invalid utf-8 payload, keeping raw bytes");
                    AvpValue::Unknown(Bytes::copy_from_slice(payload))
                }
            },
            AvpType::Address => {
                if payload.len() < 2 {
                    log::warn!(
                        "avp length mismatch: type Address avp_code {code} content {payload:02x?}"
                    );
                    return AvpValue::Unknown(Bytes::copy_from_slice(payload));
                }
                let family = u16::from_be_bytes([payload[0], payload[1]]);
                let expected = match family {
                    addr_family::IPV4 => Some(4),
                    addr_family::IPV6 => Some(16),
                    _ => None,
                };
                if expected.is_some_and(|n| payload.len() - 2 != n) {
                    log::warn!(
                        "avp length mismatch: type Address avp_code {code} content {payload:02x?}"
                    );
                }
                AvpValue::Address {
                    family,
                    addr: Bytes::copy_from_slice(&payload[2..]),
                }
            }
            AvpType::Grouped => AvpValue::Grouped(decode_all(payload, dict)),
            AvpType::Unknown => {
                log::warn!("unknown avp: avp_code {code} content {payload:02x?}");
                AvpValue::Unknown(Bytes::copy_from_slice(payload))
            }
        }
    }

    fn fixed4(code: u32, payload: &[u8], make: impl Fn([u8; 4]) -> AvpValue) -> AvpValue {
        if payload.len() != 4 {
            log::warn!("avp length mismatch: avp_code {code} content {payload:02x?}");
        }
        match payload.get(..4) {
            Some(b) => make(b.try_into().unwrap()),
            None => AvpValue::Unknown(Bytes::copy_from_slice(payload)),
        }
    }

    fn fixed8(code: u32, payload: &[u8], make: impl Fn([u8; 8]) -> AvpValue) -> AvpValue {
        if payload.len() != 8 {
            log::warn!("avp length mismatch: avp_code {code} content {payload:02x?}");
        }
        match payload.get(..8) {
            Some(b) => make(b.try_into().unwrap()),
            None => AvpValue::Unknown(Bytes::copy_from_slice(payload)),
        }
    }
}

/// Decode a flat buffer of AVPs, consuming one at a time.
///
/// Stops (without error) when fewer bytes remain than a header needs or when
/// a declared length cannot fit the remaining buffer; AVPs decoded up to that
/// point are returned. The cursor advances by each AVP's padded length.
pub fn decode_all(buf: &[u8], dict: &Dictionary) -> Vec<Avp> {
    let mut avps = Vec::new();
    let mut rest = buf;

    while !rest.is_empty() {
        if rest.len() < AVP_HEADER_SIZE {
            log::warn!("avp length error, fewer than 8 bytes remain: {rest:02x?}");
            break;
        }

        let code = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let flags = rest[4];
        let vendor_flag = flags & avp_flags::VENDOR != 0;
        let mandatory_flag = flags & avp_flags::MANDATORY != 0;
        // top byte of the length word is the flags byte, mask it out
        let avp_len = ((rest[5] as usize) << 16) | ((rest[6] as usize) << 8) | rest[7] as usize;

        let (vendor_id, header_len) = if vendor_flag {
            if rest.len() < AVP_HEADER_SIZE_VENDOR {
                log::warn!("avp length error, fewer than 12 bytes remain: {rest:02x?}");
                break;
            }
            (
                u32::from_be_bytes([rest[8], rest[9], rest[10], rest[11]]),
                AVP_HEADER_SIZE_VENDOR,
            )
        } else {
            (0, AVP_HEADER_SIZE)
        };

        if avp_len < header_len || avp_len > rest.len() {
            log::warn!(
                "avp length error: declared {avp_len}, header {header_len}, remaining {}",
                rest.len()
            );
            break;
        }

        let payload = &rest[header_len..avp_len];
        avps.push(Avp::decode(code, vendor_id, mandatory_flag, payload, dict));

        let padded_len = (avp_len + 3) & !3;
        rest = if padded_len >= rest.len() {
            &[]
        } else {
            &rest[padded_len..]
        };
    }
    avps
}

/// Find an AVP by vendor id and code in a list
pub fn find_avp(avps: &[Avp], vendor_id: u32, code: u32) -> Option<&Avp> {
    avps.iter()
        .find(|a| a.code == code && a.vendor_id == vendor_id)
}

/// Find all AVPs with a given vendor id and code
pub fn find_all_avps<'a>(avps: &'a [Avp], vendor_id: u32, code: u32) -> Vec<&'a Avp> {
    avps.iter()
        .filter(|a| a.code == code && a.vendor_id == vendor_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{avp_code, vendor};
    use crate::dictionary::Dictionary;

    fn test_dict() -> Dictionary {
        Dictionary::load_json(
            r#"{
            "avps": [
                {"code": 263, "name": "Session-Id", "type": "UTF8String"},
                {"code": 264, "name": "Origin-Host", "type": "DiameterIdentity"},
                {"code": 268, "name": "Result-Code", "type": "Unsigned32"},
                {"code": 257, "name": "Host-IP-Address", "type": "Address"},
                {"code": 55, "name": "Event-Timestamp", "type": "Time"},
                {"code": 271, "name": "Test-Integer64", "type": "Integer64"},
                {"code": 429, "name": "Exponent", "type": "Integer32"},
                {"code": 416, "name": "CC-Request-Type", "type": "Enumerated"},
                {"code": 421, "name": "CC-Total-Octets", "type": "Unsigned64"},
                {"code": 413, "name": "Granted-Units", "type": "Grouped"},
                {"code": 873, "vendor-id": 10415, "name": "Service-Information", "type": "Grouped"},
                {"code": 30, "name": "Called-Station-Id", "type": "UTF8String"},
                {"code": 44, "name": "Accounting-Session-Id", "type": "OctetString"},
                {"code": 4001, "name": "Test-Float32", "type": "Float32"},
                {"code": 4002, "name": "Test-Float64", "type": "Float64"}
            ]
        }"#,
        )
        .unwrap()
    }

    fn roundtrip(avp: &Avp, dict: &Dictionary) -> Avp {
        let mut buf = BytesMut::new();
        avp.encode(&mut buf);
        assert_eq!(buf.len() % 4, 0, "encoded AVP must be padded to 4 bytes");
        let decoded = decode_all(&buf, dict);
        assert_eq!(decoded.len(), 1);
        decoded.into_iter().next().unwrap()
    }

    #[test]
    fn test_roundtrip_unsigned32() {
        let dict = test_dict();
        let avp = Avp::unsigned32(avp_code::RESULT_CODE, 2001, true, 0);
        let out = roundtrip(&avp, &dict);
        assert_eq!(out, avp);
    }

    #[test]
    fn test_roundtrip_integer_types() {
        let dict = test_dict();
        for avp in [
            Avp::integer32(429, -6, false, 0),
            Avp::integer64(271, -1234567890123, true, 0),
            Avp::unsigned64(421, u64::MAX - 1, true, 0),
            Avp::enumerated(416, 2, true, 0),
        ] {
            assert_eq!(roundtrip(&avp, &dict), avp);
        }

        assert_eq!(roundtrip(&Avp::integer32(429, -6, false, 0), &dict).as_i32(), Some(-6));
        assert_eq!(roundtrip(&Avp::unsigned64(421, 77, true, 0), &dict).as_u64(), Some(77));
    }

    #[test]
    fn test_roundtrip_float_types() {
        let dict = test_dict();
        for avp in [
            Avp::float32(4001, 2.5, false, 0),
            Avp::float64(4002, -1.0e-9, false, 0),
        ] {
            assert_eq!(roundtrip(&avp, &dict), avp);
        }
    }

    #[test]
    fn test_roundtrip_typed_octet_string() {
        let dict = test_dict();
        let avp = Avp::octet_string(44, Bytes::from_static(b"\x00\xffpayload"), true, 0);
        let out = roundtrip(&avp, &dict);
        assert_eq!(out, avp);
        // dictionary-typed decode, not the unknown fallback
        assert!(matches!(out.value, AvpValue::OctetString(_)));
        assert_eq!(out.as_bytes().map(|b| &b[..]), Some(&b"\x00\xffpayload"[..]));
    }

    #[test]
    fn test_roundtrip_time_uses_ntp_epoch() {
        let dict = test_dict();
        let avp = Avp::time(55, 1_700_000_000, false, 0);

        let mut buf = BytesMut::new();
        avp.encode(&mut buf);
        // payload starts after the 8-byte header; wire value is NTP seconds
        let wire = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        assert_eq!(wire, 1_700_000_000 + NTP_UNIX_OFFSET);

        assert_eq!(roundtrip(&avp, &dict), avp);
    }

    #[test]
    fn test_roundtrip_address() {
        let dict = test_dict();
        let avp = Avp::address_ipv4(avp_code::HOST_IP_ADDRESS, Ipv4Addr::new(10, 0, 0, 7), true, 0);
        let out = roundtrip(&avp, &dict);
        assert_eq!(out, avp);
        match out.value {
            AvpValue::Address { family, addr } => {
                assert_eq!(family, addr_family::IPV4);
                assert_eq!(&addr[..], &[10, 0, 0, 7]);
            }
            other => panic!("expected Address, got {other:?}"),
        }
    }

    #[test]
    fn test_address_unexpected_length_is_best_effort() {
        let dict = test_dict();
        // family IPv4 but only 3 address bytes: warned, decoded as-is
        let raw: &[u8] = &[
            0x00, 0x00, 0x01, 0x01, // code 257
            0x00, 0x00, 0x00, 0x0D, // length 13 (8 header + 5 payload)
            0x00, 0x01, 0x0A, 0x00, 0x01, // family 1, addr 10.0.1
            0x00, 0x00, 0x00, // padding
        ];
        let out = decode_all(raw, &dict);
        assert_eq!(out.len(), 1);
        match &out[0].value {
            AvpValue::Address { family, addr } => {
                assert_eq!(*family, addr_family::IPV4);
                assert_eq!(&addr[..], &[0x0A, 0x00, 0x01]);
            }
            other => panic!("expected Address, got {other:?}"),
        }
    }

    #[test]
    fn test_padding_odd_string() {
        let avp = Avp::utf8_string(avp_code::SESSION_ID, "abcde", true, 0);
        let mut buf = BytesMut::new();
        avp.encode(&mut buf);
        // 8 header + 5 data = 13, padded to 16
        assert_eq!(buf.len(), 16);
        // length field excludes padding
        let len = ((buf[5] as u32) << 16) | ((buf[6] as u32) << 8) | buf[7] as u32;
        assert_eq!(len, 13);
        assert_eq!(&buf[13..16], &[0, 0, 0]);
    }

    #[test]
    fn test_vendor_and_mandatory_bits() {
        let plain = Avp::unsigned32(avp_code::RESULT_CODE, 1, false, 0);
        let mut buf = BytesMut::new();
        plain.encode(&mut buf);
        assert_eq!(buf[4], 0);
        assert_eq!(buf.len(), 12); // 8-byte header + 4 data

        let vendored = Avp::enumerated(873, 1, true, vendor::THREEGPP);
        let mut buf = BytesMut::new();
        vendored.encode(&mut buf);
        assert_eq!(buf[4], avp_flags::VENDOR | avp_flags::MANDATORY);
        assert_eq!(buf.len(), 16); // 12-byte header + 4 data
        assert_eq!(
            u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            vendor::THREEGPP
        );
    }

    #[test]
    fn test_grouped_two_level_roundtrip() {
        let dict = test_dict();
        let inner = Avp::grouped(
            413,
            vec![Avp::utf8_string(263, "abc", true, 0)], // odd length child
            true,
            0,
        );
        let outer = Avp::grouped(
            873,
            vec![inner, Avp::unsigned32(268, 2001, true, 0)],
            true,
            vendor::THREEGPP,
        );

        let mut buf = BytesMut::new();
        outer.encode(&mut buf);
        assert_eq!(buf.len() % 4, 0);

        let out = roundtrip(&outer, &dict);
        assert_eq!(out, outer);

        let group = out.as_grouped().unwrap();
        assert_eq!(group.len(), 2);
        let nested = group[0].as_grouped().unwrap();
        assert_eq!(nested[0].as_str(), Some("abc"));
    }

    #[test]
    fn test_unknown_code_decodes_raw() {
        let dict = test_dict();
        let avp = Avp::octet_string(99999, Bytes::from_static(b"\x01\x02\x03"), false, 0);
        let mut buf = BytesMut::new();
        avp.encode(&mut buf);

        let out = decode_all(&buf, &dict);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, 99999);
        assert_eq!(
            out[0].value,
            AvpValue::Unknown(Bytes::from_static(b"\x01\x02\x03"))
        );
    }

    #[test]
    fn test_decode_all_short_tail_stops_cleanly() {
        let dict = test_dict();
        let avp = Avp::unsigned32(avp_code::RESULT_CODE, 2001, true, 0);
        let mut buf = BytesMut::new();
        avp.encode(&mut buf);
        buf.put_slice(&[0x00, 0x00, 0x01]); // trailing garbage under 8 bytes

        let out = decode_all(&buf, &dict);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_u32(), Some(2001));
    }

    #[test]
    fn test_decode_all_masks_flags_from_length() {
        let dict = test_dict();
        // Result-Code 2001 with mandatory flag set: the 0x40 flags byte shares
        // the length word and must not leak into the 24-bit length.
        let raw: &[u8] = &[
            0x00, 0x00, 0x01, 0x0C, // code 268
            0x40, 0x00, 0x00, 0x0C, // flags=M, length 12
            0x00, 0x00, 0x07, 0xD1, // 2001
        ];
        let out = decode_all(raw, &dict);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_mandatory());
        assert!(!out[0].is_vendor_specific());
        assert_eq!(out[0].as_u32(), Some(2001));
    }

    #[test]
    fn test_decode_all_overlong_declared_length_stops() {
        let dict = test_dict();
        let raw: &[u8] = &[
            0x00, 0x00, 0x01, 0x0C, // code 268
            0x00, 0x00, 0x00, 0x40, // declared length 64, buffer has 12
            0x00, 0x00, 0x07, 0xD1,
        ];
        assert!(decode_all(raw, &dict).is_empty());
    }

    #[test]
    fn test_length_mismatch_is_best_effort() {
        let dict = test_dict();
        // Result-Code with a 6-byte payload: warn, read the first 4 bytes
        let raw: &[u8] = &[
            0x00, 0x00, 0x01, 0x0C, // code 268
            0x00, 0x00, 0x00, 0x0E, // length 14
            0x00, 0x00, 0x07, 0xD1, 0xAA, 0xBB, // 6 payload bytes
            0x00, 0x00, // padding
        ];
        let out = decode_all(raw, &dict);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_u32(), Some(2001));
    }

    #[test]
    fn test_find_avp_helpers() {
        let avps = vec![
            Avp::unsigned32(268, 2001, true, 0),
            Avp::utf8_string(263, "s1", true, 0),
            Avp::utf8_string(263, "s2", true, 0),
        ];
        assert_eq!(find_avp(&avps, 0, 268).unwrap().as_u32(), Some(2001));
        assert!(find_avp(&avps, 10415, 268).is_none());
        assert_eq!(find_all_avps(&avps, 0, 263).len(), 2);
    }
}
