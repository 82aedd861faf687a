//! The per-UE EMM context and its lifecycle state.

use crate::cause::EmmCause;
use crate::identity::{Guti, Imei, Imsi, Tai};
use crate::security::{AuthVector, SecurityContext, UeCapabilities};

/// Lower-layer UE identifier. Opaque to the core; unique among active
/// contexts at any instant.
pub type UeId = u32;

/// EMM mobility-management state relevant to the Attach procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmStatus {
    Invalid,
    Deregistered,
    CommonProcedureInitiated,
    RegisteredInitiated,
    Registered,
    DeregisteredInitiated,
}

impl FsmStatus {
    /// Whether an Attach procedure is already in progress or complete for
    /// this context, i.e. a new Attach Request on the same `ue_id` must be
    /// arbitrated by the parameter-change detector rather than treated as
    /// the start of a fresh attempt.
    pub fn attach_in_progress(self) -> bool {
        !matches!(self, FsmStatus::Invalid | FsmStatus::Deregistered)
    }
}

/// Retransmission state bound to a running T3450 (§3/§4.2). Exactly one
/// exists per context while T3450 is active.
#[derive(Debug, Clone)]
pub struct AttachRetransmissionData {
    pub ue_id: UeId,
    pub retries: u8,
    pub esm_container: Vec<u8>,
}

pub const ATTACH_COUNTER_MAX: u8 = 5;

impl AttachRetransmissionData {
    pub fn new(ue_id: UeId, esm_container: Vec<u8>) -> Self {
        AttachRetransmissionData {
            ue_id,
            retries: 0,
            esm_container,
        }
    }
}

/// The per-UE EMM context (§3).
#[derive(Debug, Clone)]
pub struct EmmContext {
    pub ue_id: UeId,
    pub is_dynamic: bool,

    pub guti: Option<Guti>,
    pub old_guti: Option<Guti>,
    pub guti_is_new: bool,

    pub imsi: Option<Imsi>,
    pub imei: Option<Imei>,

    pub security: Option<SecurityContext>,
    pub vector: Option<AuthVector>,
    pub ksi: crate::security::Ksi,
    pub caps: UeCapabilities,

    pub tai: Option<Tai>,
    /// Size of the tracking-area list assigned alongside `tai`, per §3/§6.
    /// Meaningless while `tai` is `None`.
    pub n_tacs: u8,
    pub is_emergency: bool,
    pub is_attached: bool,

    pub emm_cause: EmmCause,
    pub esm_msg: Vec<u8>,

    pub fsm_status: FsmStatus,

    pub t3450_id: Option<crate::timer::TimerId>,

    /// The fields of the most recently accepted Attach Request, as the UE
    /// presented them — used by the parameter-change detector (§4.3). Kept
    /// separate from the fields above because those get overwritten with
    /// network-assigned values (e.g. a synthesized GUTI) that the UE never
    /// sent and must not be compared against its next retransmission.
    pub last_attach_params: Option<crate::change_detector::AttachRequestParams>,
}

impl EmmContext {
    pub fn new(ue_id: UeId, is_dynamic: bool) -> Self {
        EmmContext {
            ue_id,
            is_dynamic,
            guti: None,
            old_guti: None,
            guti_is_new: false,
            imsi: None,
            imei: None,
            security: None,
            vector: None,
            ksi: crate::security::Ksi::NOT_AVAILABLE,
            caps: UeCapabilities::default(),
            tai: None,
            n_tacs: 0,
            is_emergency: false,
            is_attached: false,
            emm_cause: EmmCause::Success,
            esm_msg: Vec::new(),
            fsm_status: FsmStatus::Deregistered,
            t3450_id: None,
            last_attach_params: None,
        }
    }

    pub fn t3450_running(&self) -> bool {
        self.t3450_id.is_some()
    }
}
