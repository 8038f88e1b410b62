//! Common Diameter constants: AVP codes, command codes, application ids

/// AVP codes for base-protocol AVPs (RFC 6733)
pub mod avp_code {
    pub const USER_NAME: u32 = 1;
    pub const HOST_IP_ADDRESS: u32 = 257;
    pub const AUTH_APPLICATION_ID: u32 = 258;
    pub const SESSION_ID: u32 = 263;
    pub const ORIGIN_HOST: u32 = 264;
    pub const VENDOR_ID: u32 = 266;
    pub const RESULT_CODE: u32 = 268;
    pub const PRODUCT_NAME: u32 = 269;
    pub const DISCONNECT_CAUSE: u32 = 273;
    pub const ORIGIN_STATE_ID: u32 = 278;
    pub const DESTINATION_REALM: u32 = 283;
    pub const DESTINATION_HOST: u32 = 293;
    pub const ORIGIN_REALM: u32 = 296;
}

/// Base Diameter command codes (RFC 6733)
pub mod cmd_code {
    /// Capabilities-Exchange-Request/Answer
    pub const CAPABILITIES_EXCHANGE: u32 = 257;
    /// Re-Auth-Request/Answer
    pub const RE_AUTH: u32 = 258;
    /// Credit-Control-Request/Answer (RFC 8506)
    pub const CREDIT_CONTROL: u32 = 272;
    /// Device-Watchdog-Request/Answer
    pub const DEVICE_WATCHDOG: u32 = 280;
    /// Disconnect-Peer-Request/Answer
    pub const DISCONNECT_PEER: u32 = 282;
}

/// Application ids
pub mod app_id {
    /// Diameter common messages (base protocol)
    pub const COMMON: u32 = 0;
    /// Diameter Credit-Control
    pub const CREDIT_CONTROL: u32 = 4;
}

/// Address families for the Address AVP type (IANA AddressFamilyNumbers)
pub mod addr_family {
    pub const IPV4: u16 = 1;
    pub const IPV6: u16 = 2;
}

/// Well-known vendor ids
pub mod vendor {
    pub const NONE: u32 = 0;
    pub const THREEGPP: u32 = 10415;
}
