//! Identity-provider API (§6): subscriber identity validation, GUTI
//! allocation, and authentication-vector retrieval. Treated as an external
//! collaborator; this module defines the contract plus a small reference
//! implementation used by tests and demos.

use std::sync::Arc;

use async_trait::async_trait;

use crate::identity::{Gummei, Guti, Imei, Imsi, MTmsiAllocator, RandomMTmsiAllocator, Tai};
use crate::security::AuthVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MncLengthError {
    Unknown,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify_imsi(&self, imsi: &Imsi) -> bool;
    async fn identify_imei(&self, imei: &Imei) -> bool;
    /// Resolves a GUTI the context store could not itself map to a live
    /// context (e.g. the owning MME restarted) back to an IMSI.
    async fn identify_guti(&self, guti: &Guti) -> Option<Imsi>;
    async fn auth_info_req(&self, imsi: &Imsi, num_vectors: u8) -> Vec<AuthVector>;
    /// MNC length for the given MCC, needed to parse IMSI digits into
    /// MCC/MNC/MSIN. A PLMN is identified by its MCC alone here.
    async fn find_mnc_length(&self, mcc: &str) -> Result<u8, MncLengthError>;
    /// Allocates a new GUTI and its tracking-area assignment for this IMSI
    /// (§4.4 step 5, §4.5 GUTI reallocation, §6's
    /// `new_guti(imsi) → (guti, tac, n_tacs)`). The mobility component
    /// owning this decision picks the M-TMSI and the TA list atomically
    /// with the GUTI, so both live behind this one call rather than being
    /// synthesized by the core from raw config.
    async fn new_guti(&self, imsi: &Imsi) -> (Guti, Tai, u8);
    fn notify_ue_id_changed(&self, old: u32, new: u32);
    fn notify_new_guti(&self, ue_id: u32, guti: Guti);
}

/// An always-available in-memory identity provider: accepts any IMSI/IMEI,
/// returns a deterministic authentication vector, and allocates GUTIs from a
/// fixed GUMMEI/TAI. Not a production implementation — a real deployment
/// talks to an HSS/UDM — but the engine has nothing to exercise end-to-end
/// without something behind this trait.
pub struct StaticIdentityProvider {
    gummei: Gummei,
    tac: u16,
    n_tacs: u8,
    allocator: Arc<dyn MTmsiAllocator>,
}

impl std::fmt::Debug for StaticIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticIdentityProvider")
            .field("gummei", &self.gummei)
            .field("tac", &self.tac)
            .field("n_tacs", &self.n_tacs)
            .finish_non_exhaustive()
    }
}

impl StaticIdentityProvider {
    pub fn new(gummei: Gummei, tac: u16, n_tacs: u8, allocator: Arc<dyn MTmsiAllocator>) -> Self {
        StaticIdentityProvider {
            gummei,
            tac,
            n_tacs,
            allocator,
        }
    }
}

impl Default for StaticIdentityProvider {
    fn default() -> Self {
        StaticIdentityProvider {
            gummei: Gummei {
                mcc: 1,
                mnc: 1,
                mnc_len: 2,
                mme_group_id: 1,
                mme_code: 1,
            },
            tac: 1,
            n_tacs: 1,
            allocator: Arc::new(RandomMTmsiAllocator),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn identify_imsi(&self, _imsi: &Imsi) -> bool {
        true
    }

    async fn identify_imei(&self, _imei: &Imei) -> bool {
        true
    }

    async fn identify_guti(&self, _guti: &Guti) -> Option<Imsi> {
        Some(Imsi("001010000000001".to_string()))
    }

    async fn auth_info_req(&self, _imsi: &Imsi, num_vectors: u8) -> Vec<AuthVector> {
        (0..num_vectors.max(1))
            .map(|i| AuthVector {
                rand: [i; 16],
                autn: [0; 16],
                xres: vec![0; 8],
                k_asme: [i; 32],
            })
            .collect()
    }

    async fn find_mnc_length(&self, _mcc: &str) -> Result<u8, MncLengthError> {
        Ok(2)
    }

    async fn new_guti(&self, _imsi: &Imsi) -> (Guti, Tai, u8) {
        let guti = Guti {
            gummei: self.gummei,
            m_tmsi: self.allocator.allocate(),
        };
        let tai = Tai {
            mcc: self.gummei.mcc,
            mnc: self.gummei.mnc,
            mnc_len: self.gummei.mnc_len,
            tac: self.tac,
        };
        (guti, tai, self.n_tacs)
    }

    fn notify_ue_id_changed(&self, _old: u32, _new: u32) {}

    fn notify_new_guti(&self, _ue_id: u32, _guti: Guti) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_guti_uses_configured_gummei_and_tac() {
        let provider = StaticIdentityProvider::new(
            Gummei {
                mcc: 999,
                mnc: 99,
                mnc_len: 2,
                mme_group_id: 3,
                mme_code: 4,
            },
            42,
            2,
            Arc::new(RandomMTmsiAllocator),
        );

        let (guti, tai, n_tacs) = provider.new_guti(&Imsi("001010000000001".to_string())).await;
        assert_eq!(guti.gummei.mcc, 999);
        assert_eq!(tai.tac, 42);
        assert_eq!(n_tacs, 2);
    }
}
