//! NAS security context and capability bitmaps.

use serde::{Deserialize, Serialize};

/// EPS Encryption Algorithm identifiers (TS 33.401).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Eea {
    Eea0 = 0,
    Eea1 = 1,
    Eea2 = 2,
    Eea3 = 3,
}

/// EPS Integrity Algorithm identifiers (TS 33.401).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Eia {
    Eia0 = 0,
    Eia1 = 1,
    Eia2 = 2,
    Eia3 = 3,
}

/// Key-Set Identifier. `NONE` means "no NAS security context".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ksi(pub u8);

impl Ksi {
    pub const NOT_AVAILABLE: Ksi = Ksi(7);
}

/// UE capability bits relevant to algorithm and feature negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UeCapabilities {
    pub eea: u8,
    pub eia: u8,
    pub umts_present: bool,
    pub uea: u8,
    pub uia: u8,
    pub ucs2: bool,
    pub gprs_present: bool,
    pub gea: u8,
}

/// Authentication vector obtained from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthVector {
    pub rand: [u8; 16],
    pub autn: [u8; 16],
    pub xres: Vec<u8>,
    pub k_asme: [u8; 32],
}

/// NAS security context established after a successful security-mode
/// control procedure, or a placeholder `EEA0`/`EIA0` one for unauthenticated
/// emergency attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub ksi: Ksi,
    pub k_asme: [u8; 32],
    pub k_nas_enc: [u8; 32],
    pub k_nas_int: [u8; 32],
    pub selected_eea: Eea,
    pub selected_eia: Eia,
    pub uplink_count: u32,
    pub downlink_count: u32,
}

impl SecurityContext {
    /// A zero NAS security context using the null algorithms, used as the
    /// starting point for security-mode control.
    pub fn null() -> Self {
        SecurityContext {
            ksi: Ksi::NOT_AVAILABLE,
            k_asme: [0; 32],
            k_nas_enc: [0; 32],
            k_nas_int: [0; 32],
            selected_eea: Eea::Eea0,
            selected_eia: Eia::Eia0,
            uplink_count: 0,
            downlink_count: 0,
        }
    }
}
