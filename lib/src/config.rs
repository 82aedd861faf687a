//! Engine configuration (§6, §10.3): feature flags, the default GUMMEI used
//! for GUTI synthesis, and timer durations. Mirrors the daemon config's
//! shape: a `Default` impl supplying every sentinel, `#[serde(default)]`
//! throughout so a partial TOML document is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::Gummei;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GummeiConfig {
    pub mcc: u16,
    pub mnc: u16,
    pub mnc_len: u8,
    pub mme_group_id: u16,
    pub mme_code: u8,
    /// Tracking area code handed out alongside a synthesized GUTI (§6).
    pub tac: u16,
    /// Size of the tracking-area list accompanying that TAC.
    pub n_tacs: u8,
}

impl Default for GummeiConfig {
    fn default() -> Self {
        GummeiConfig {
            mcc: 1,
            mnc: 1,
            mnc_len: 2,
            mme_group_id: 1,
            mme_code: 1,
            tac: 1,
            n_tacs: 1,
        }
    }
}

impl From<GummeiConfig> for Gummei {
    fn from(c: GummeiConfig) -> Self {
        Gummei {
            mcc: c.mcc,
            mnc: c.mnc,
            mnc_len: c.mnc_len,
            mme_group_id: c.mme_group_id,
            mme_code: c.mme_code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub t3450_millis: u64,
    pub t3460_millis: u64,
    pub t3470_millis: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            t3450_millis: 6_000,
            t3460_millis: 6_000,
            t3470_millis: 6_000,
        }
    }
}

impl TimerConfig {
    pub fn t3450(&self) -> Duration {
        Duration::from_millis(self.t3450_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether an `EMERGENCY` attach type is admitted without the usual
    /// identity/authentication requirements. `MME_API_EMERGENCY_ATTACH`.
    pub emergency_attach_enabled: bool,
    /// Whether an unauthenticated IMSI is accepted for emergency attach.
    /// `MME_API_UNAUTHENTICATED_IMSI`.
    pub unauthenticated_imsi_allowed: bool,
    /// Forces GUTI-only identification on every GUTI-bearing Attach Request
    /// rather than only when the GUTI fails to resolve through the context
    /// store (§9). Defaults to the latter, cheaper behavior.
    pub force_identification_on_guti: bool,
    pub gummei: GummeiConfig,
    pub timers: TimerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            emergency_attach_enabled: false,
            unauthenticated_imsi_allowed: false,
            force_identification_on_guti: false,
            gummei: GummeiConfig::default(),
            timers: TimerConfig::default(),
        }
    }
}
