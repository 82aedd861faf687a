//! Parameter-change detector (C8): distinguishes a duplicate Attach Request
//! from one that invalidates the in-progress attempt per §4.3.

use crate::identity::{Guti, Imei, Imsi};
use crate::security::UeCapabilities;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachRequestParams {
    pub is_emergency: bool,
    pub ksi: crate::security::Ksi,
    pub caps: UeCapabilities,
    pub guti: Option<Guti>,
    pub imsi: Option<Imsi>,
    pub imei: Option<Imei>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeResult {
    Duplicate,
    Changed,
}

/// Returns `Changed` iff any field that's part of the agreed
/// security/mobility posture differs between the previously accepted
/// Attach Request and a freshly arrived one. Both sides are the raw fields
/// the UE sent — never network-assigned values like a synthesized GUTI,
/// which the UE has no way to echo back.
pub fn classify(previous: &AttachRequestParams, new: &AttachRequestParams) -> ChangeResult {
    if previous.is_emergency != new.is_emergency {
        return ChangeResult::Changed;
    }
    if previous.ksi != new.ksi {
        return ChangeResult::Changed;
    }
    if previous.caps.eea != new.caps.eea || previous.caps.eia != new.caps.eia {
        return ChangeResult::Changed;
    }
    if previous.caps.umts_present != new.caps.umts_present {
        return ChangeResult::Changed;
    }
    if previous.caps.gprs_present != new.caps.gprs_present {
        return ChangeResult::Changed;
    }
    if previous.caps.umts_present
        && new.caps.umts_present
        && (previous.caps.ucs2 != new.caps.ucs2
            || previous.caps.uea != new.caps.uea
            || previous.caps.uia != new.caps.uia)
    {
        return ChangeResult::Changed;
    }
    if previous.caps.gprs_present && new.caps.gprs_present && previous.caps.gea != new.caps.gea {
        return ChangeResult::Changed;
    }
    if previous.guti != new.guti {
        return ChangeResult::Changed;
    }
    if previous.imsi != new.imsi {
        return ChangeResult::Changed;
    }
    if previous.imei != new.imei {
        return ChangeResult::Changed;
    }
    ChangeResult::Duplicate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Ksi;

    fn base_params() -> AttachRequestParams {
        AttachRequestParams {
            is_emergency: false,
            ksi: Ksi(0),
            caps: UeCapabilities {
                eea: 0xF0,
                ..Default::default()
            },
            guti: None,
            imsi: None,
            imei: None,
        }
    }

    #[test]
    fn identical_request_is_duplicate() {
        assert_eq!(classify(&base_params(), &base_params()), ChangeResult::Duplicate);
    }

    #[test]
    fn changed_eea_is_detected() {
        let ctx = base_params();
        let mut params = base_params();
        params.caps.eea = 0x70;
        assert_eq!(classify(&ctx, &params), ChangeResult::Changed);
    }

    #[test]
    fn presence_asymmetry_on_identity_is_changed() {
        let ctx = base_params();
        let mut params = base_params();
        params.imsi = Some(Imsi("001010000000001".into()));
        assert_eq!(classify(&ctx, &params), ChangeResult::Changed);
    }
}
