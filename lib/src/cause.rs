use serde::{Deserialize, Serialize};

/// EMM cause values carried on ATTACH REJECT, per 3GPP TS 24.301 Annex A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EmmCause {
    Success = 0,
    IllegalUe = 3,
    ImeiNotAccepted = 5,
    EsmFailure = 14,
    ProtocolError = 111,
}

impl EmmCause {
    pub fn is_success(self) -> bool {
        matches!(self, EmmCause::Success)
    }
}

impl Default for EmmCause {
    fn default() -> Self {
        EmmCause::Success
    }
}
