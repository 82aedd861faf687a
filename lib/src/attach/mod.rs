//! Attach State Machine (C4) and subordinate-procedure dispatch (C5).
//!
//! Identification, authentication, and security-mode control chain
//! together as a sequence of suspension points: each step below is a plain
//! `async fn` that awaits its collaborator and is resumed once the result
//! is ready, which is §5's continuation-passing discipline expressed
//! without hand-rolled callback plumbing. The engine still runs as a
//! single task per shard (§5), so within one shard these awaits are never
//! concurrent with each other — only with other shards' work.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::cause::EmmCause;
use crate::change_detector::{self, AttachRequestParams, ChangeResult};
use crate::config::Config;
use crate::context::{AttachRetransmissionData, EmmContext, FsmStatus, UeId, ATTACH_COUNTER_MAX};
use crate::error::EngineError;
use crate::identity::{Guti, Imei, Imsi, Tai};
use crate::identity_provider::IdentityProvider;
use crate::sap::{
    AsSap, EsmContainer, EsmSap, EsmStatus, EstablishConfirm, EstablishReject, RegEvent, RegSink,
};
use crate::security::{Eea, Eia, UeCapabilities};
use crate::store::ContextStore;
use crate::timer::TimerController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachType {
    Eps,
    Emergency,
}

/// The decoded contents of an ATTACH REQUEST, as handed to the core by the
/// (out-of-scope) message codec.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    pub ue_id: UeId,
    pub attach_type: AttachType,
    pub ksi: crate::security::Ksi,
    pub guti: Option<Guti>,
    pub imsi: Option<Imsi>,
    pub imei: Option<Imei>,
    pub tai: Option<Tai>,
    pub caps: UeCapabilities,
    pub esm_container: EsmContainer,
}

/// Delivered back to the engine when a UE's T3450 expires. The host (C9)
/// owns the channel this travels on and forwards it verbatim to
/// [`AttachEngine::on_t3450_expired`].
#[derive(Debug, Clone, Copy)]
pub struct T3450Expiry(pub UeId);

/// Drives every UE through the Attach procedure. Single-threaded per the
/// concurrency model in §5: callers must not invoke two methods on the same
/// engine concurrently for different UEs if they want the engine's own
/// per-UE serialization guarantee, since a single `AttachEngine` instance
/// represents one shard.
pub struct AttachEngine {
    store: ContextStore,
    timers: TimerController<T3450Expiry>,
    retransmissions: HashMap<UeId, AttachRetransmissionData>,
    config: Config,
    identity_provider: Arc<dyn IdentityProvider>,
    as_sap: Arc<dyn AsSap>,
    esm_sap: Arc<dyn EsmSap>,
    reg_sink: Arc<dyn RegSink>,
}

impl AttachEngine {
    pub fn new(
        config: Config,
        timer_tx: tokio::sync::mpsc::Sender<T3450Expiry>,
        identity_provider: Arc<dyn IdentityProvider>,
        as_sap: Arc<dyn AsSap>,
        esm_sap: Arc<dyn EsmSap>,
        reg_sink: Arc<dyn RegSink>,
    ) -> Self {
        let mut store = ContextStore::new();
        let observer_provider = identity_provider.clone();
        store.set_ueid_change_observer(Box::new(move |old, new| {
            observer_provider.notify_ue_id_changed(old, new);
        }));

        AttachEngine {
            store,
            timers: TimerController::new(timer_tx),
            retransmissions: HashMap::new(),
            config,
            identity_provider,
            as_sap,
            esm_sap,
            reg_sink,
        }
    }

    pub fn context_count(&self) -> usize {
        self.store.len()
    }

    pub fn fsm_status(&self, ue_id: UeId) -> Option<FsmStatus> {
        self.store.get_by_ueid(ue_id).map(|c| c.fsm_status)
    }

    /// §4.4 entry point: `on_attach_request`.
    pub async fn on_attach_request(&mut self, req: AttachRequest) -> Result<(), EngineError> {
        if req.ue_id == 0 {
            return Err(EngineError::IllegalUeId(req.ue_id));
        }

        if matches!(req.attach_type, AttachType::Emergency) && !self.config.emergency_attach_enabled
        {
            warn!("rejecting emergency attach for ue_id {}: disabled", req.ue_id);
            self.as_sap
                .establish_reject(EstablishReject {
                    ue_id: req.ue_id,
                    cause: EmmCause::ImeiNotAccepted,
                    esm_container: None,
                })
                .await;
            return Ok(());
        }

        let params = AttachRequestParams {
            is_emergency: matches!(req.attach_type, AttachType::Emergency),
            ksi: req.ksi,
            caps: req.caps,
            guti: req.guti,
            imsi: req.imsi.clone(),
            imei: req.imei.clone(),
        };

        if let Some(ctx) = self.store.get_by_ueid(req.ue_id) {
            if ctx.fsm_status.attach_in_progress() {
                let previous = ctx.last_attach_params.clone().unwrap_or_else(|| params.clone());
                return match change_detector::classify(&previous, &params) {
                    ChangeResult::Duplicate => {
                        debug!("duplicate attach request for ue_id {}", req.ue_id);
                        Ok(())
                    }
                    ChangeResult::Changed => {
                        info!(
                            "attach parameters changed for ue_id {}, restarting procedure",
                            req.ue_id
                        );
                        // emm_attach_release is the sole EMMREG_PROC_ABORT emitter;
                        // notifying here too would double-fire it for one restart.
                        self.emm_attach_release(req.ue_id);
                        Box::pin(self.on_attach_request(req)).await
                    }
                };
            }
        }

        let ctx_existed_before = self.store.get_by_ueid(req.ue_id).is_some();
        let rebind_from = if !ctx_existed_before {
            req.guti
                .and_then(|guti| self.store.get_by_guti(guti))
                .map(|ctx| ctx.ue_id)
        } else {
            None
        };
        // The GUTI the UE presented didn't resolve through the store at
        // all: the context below is being created from scratch on the
        // strength of the GUTI alone, so (absent the opt-in config flag)
        // §4.5's GUTI-only branch must identify before trusting it.
        let guti_lookup_failed = !ctx_existed_before && rebind_from.is_none() && req.guti.is_some();

        if let Some(old_ue_id) = rebind_from {
            self.store.rebind_ueid(old_ue_id, req.ue_id)?;
        } else if !ctx_existed_before {
            self.store.insert(EmmContext::new(req.ue_id, true))?;
        }

        self.apply_request_fields(&req, &params).await?;

        self.emm_attach_identify(req.ue_id, guti_lookup_failed).await
    }

    async fn apply_request_fields(
        &mut self,
        req: &AttachRequest,
        params: &AttachRequestParams,
    ) -> Result<(), EngineError> {
        let ue_id = req.ue_id;
        let previous_guti = self.store.get_by_ueid(ue_id).and_then(|c| c.guti);

        let mut synthesized_guti = None;
        if req.guti.is_none() {
            if let Some(imsi) = &req.imsi {
                self.identity_provider
                    .find_mnc_length(imsi.mcc())
                    .await
                    .map_err(|_| EngineError::UnknownMncLength(imsi.mcc().to_string()))?;
                synthesized_guti = Some(self.identity_provider.new_guti(imsi).await);
            }
        }

        let ctx = self
            .store
            .get_by_ueid_mut(ue_id)
            .ok_or(EngineError::IllegalUeId(ue_id))?;

        if let Some(tai) = req.tai {
            ctx.tai = Some(tai);
        }
        ctx.caps = req.caps;
        ctx.ksi = req.ksi;
        ctx.is_emergency = matches!(req.attach_type, AttachType::Emergency);
        if let Some(imsi) = &req.imsi {
            ctx.imsi = Some(imsi.clone());
        }
        if let Some(imei) = &req.imei {
            ctx.imei = Some(imei.clone());
        }
        if let Some(guti) = req.guti {
            ctx.guti = Some(guti);
        } else if let Some((guti, tai, n_tacs)) = synthesized_guti {
            ctx.old_guti = ctx.guti;
            ctx.guti = Some(guti);
            ctx.guti_is_new = true;
            ctx.tai = Some(tai);
            ctx.n_tacs = n_tacs;
        }
        ctx.esm_msg = req.esm_container.clone();
        ctx.last_attach_params = Some(params.clone());

        self.store.reindex_guti(ue_id, previous_guti);
        Ok(())
    }

    /// §4.5: selects an identification strategy by the highest-priority
    /// identity present, then proceeds to authentication/security.
    async fn emm_attach_identify(
        &mut self,
        ue_id: UeId,
        guti_lookup_failed: bool,
    ) -> Result<(), EngineError> {
        let snapshot = self
            .store
            .get_by_ueid(ue_id)
            .ok_or(EngineError::IllegalUeId(ue_id))?
            .clone();

        // GUTI-only: resolve to an IMSI via the identity provider, but only
        // when the store itself couldn't resolve the UE. Setting
        // `force_identification_on_guti` re-identifies unconditionally.
        if snapshot.imsi.is_none() && snapshot.guti.is_some() {
            let need_identify = self.config.force_identification_on_guti || guti_lookup_failed;
            if need_identify {
                let guti = snapshot.guti.unwrap();
                match self.identity_provider.identify_guti(&guti).await {
                    Some(imsi) => {
                        self.store.get_by_ueid_mut(ue_id).unwrap().imsi = Some(imsi);
                    }
                    None => {
                        return self.emm_attach_reject(ue_id, Some(EmmCause::IllegalUe)).await;
                    }
                }
            }
        }

        let snapshot = self.store.get_by_ueid(ue_id).unwrap().clone();

        if let Some(imsi) = snapshot.imsi.clone() {
            if !self.identity_provider.identify_imsi(&imsi).await {
                warn!("imsi identification failed for ue_id {ue_id}");
                return self.emm_attach_reject(ue_id, Some(EmmCause::IllegalUe)).await;
            }

            if snapshot.security.is_some() {
                // Re-attach over an existing security context: reallocate
                // the GUTI per §4.5.
                let (new_guti, new_tai, n_tacs) = self.identity_provider.new_guti(&imsi).await;
                let ctx = self.store.get_by_ueid_mut(ue_id).unwrap();
                ctx.old_guti = ctx.guti;
                ctx.guti = Some(new_guti);
                ctx.guti_is_new = true;
                ctx.tai = Some(new_tai);
                ctx.n_tacs = n_tacs;
                self.store.reindex_guti(ue_id, snapshot.guti);
                return self.emm_attach(ue_id).await;
            }

            if snapshot.vector.is_none() {
                let vectors = self.identity_provider.auth_info_req(&imsi, 1).await;
                self.store.get_by_ueid_mut(ue_id).unwrap().vector = vectors.into_iter().next();
            }
        } else if let Some(imei) = snapshot.imei.clone() {
            if !snapshot.is_emergency {
                return self.emm_attach_reject(ue_id, Some(EmmCause::IllegalUe)).await;
            }
            if !self.identity_provider.identify_imei(&imei).await {
                return self
                    .emm_attach_reject(ue_id, Some(EmmCause::ImeiNotAccepted))
                    .await;
            }
            // An IMEI alone carries no IMSI to run authentication against;
            // proceeding with no security context is only admissible when
            // the deployment explicitly allows an unauthenticated emergency
            // attach (`unauthenticated_imsi_allowed`, §6).
            if !self.config.unauthenticated_imsi_allowed {
                warn!("imei-only emergency attach rejected for ue_id {ue_id}: unauthenticated imsi not permitted");
                return self.emm_attach_reject(ue_id, Some(EmmCause::IllegalUe)).await;
            }
        } else {
            return self.emm_attach_reject(ue_id, Some(EmmCause::IllegalUe)).await;
        }

        if snapshot.security.is_some() {
            self.emm_attach(ue_id).await
        } else {
            // Either emergency-without-authentication is permitted, or the
            // authentication common procedure (modeled here as already
            // having produced `vector`, since the identity provider is
            // synchronous from the engine's point of view) has succeeded.
            self.emm_attach_security(ue_id).await
        }
    }

    /// §4.5 `_emm_attach_security`: establishes the NAS security context.
    async fn emm_attach_security(&mut self, ue_id: UeId) -> Result<(), EngineError> {
        let ctx = self
            .store
            .get_by_ueid_mut(ue_id)
            .ok_or(EngineError::IllegalUeId(ue_id))?;
        if ctx.security.is_none() {
            ctx.security = Some(crate::security::SecurityContext::null());
        }

        if let Some(vector) = self.store.get_by_ueid(ue_id).unwrap().vector.clone() {
            let ctx = self.store.get_by_ueid_mut(ue_id).unwrap();
            if let Some(sec) = ctx.security.as_mut() {
                sec.k_asme = vector.k_asme;
                sec.selected_eea = Eea::Eea1;
                sec.selected_eia = Eia::Eia1;
                sec.ksi = ctx.ksi;
            }
        }

        self.emm_attach(ue_id).await
    }

    /// §4.4 `_emm_attach`: hands the ESM container to the ESM peer and, on
    /// success, proceeds to ATTACH ACCEPT.
    async fn emm_attach(&mut self, ue_id: UeId) -> Result<(), EngineError> {
        let esm_container = self
            .store
            .get_by_ueid(ue_id)
            .ok_or(EngineError::IllegalUeId(ue_id))?
            .esm_msg
            .clone();

        let (status, response) = self
            .esm_sap
            .pdn_connectivity_request(ue_id, esm_container)
            .await;

        match status {
            EsmStatus::Discarded => Ok(()),
            EsmStatus::Success => {
                let accept_container = response.unwrap_or_default();
                self.retransmissions.insert(
                    ue_id,
                    AttachRetransmissionData::new(ue_id, accept_container),
                );
                let guti_is_new = {
                    let ctx = self.store.get_by_ueid_mut(ue_id).unwrap();
                    ctx.fsm_status = FsmStatus::RegisteredInitiated;
                    ctx.guti_is_new
                };
                if guti_is_new {
                    self.reg_sink.notify(ue_id, RegEvent::CommonProcReq);
                }
                self.send_attach_accept(ue_id).await
            }
            EsmStatus::Failure => {
                let Some(esm_msg) = response else {
                    // No ESM reject PDU to carry: an internal inconsistency,
                    // fatal for this UE.
                    self.emm_attach_release(ue_id);
                    return Err(EngineError::MissingEsmRejectPdu(ue_id));
                };
                let ctx = self.store.get_by_ueid_mut(ue_id).unwrap();
                ctx.emm_cause = EmmCause::EsmFailure;
                ctx.esm_msg = esm_msg;
                self.emm_attach_reject(ue_id, None).await
            }
        }
    }

    /// §4.4 `send_attach_accept`: emits `EMMAS_ESTABLISH_CNF` and arms/rearms
    /// T3450.
    async fn send_attach_accept(&mut self, ue_id: UeId) -> Result<(), EngineError> {
        let buf = self
            .retransmissions
            .get(&ue_id)
            .cloned()
            .ok_or(EngineError::MissingRetransmissionBuffer(ue_id))?;

        let confirm = {
            let ctx = self
                .store
                .get_by_ueid(ue_id)
                .ok_or(EngineError::IllegalUeId(ue_id))?;

            let (old_guti, new_guti) = if ctx.guti_is_new {
                (ctx.old_guti, ctx.guti)
            } else {
                (None, ctx.guti)
            };

            EstablishConfirm {
                ue_id,
                old_guti,
                new_guti,
                tai: ctx.tai,
                n_tacs: ctx.n_tacs,
                selected_eea: ctx
                    .security
                    .as_ref()
                    .map(|s| s.selected_eea)
                    .unwrap_or(Eea::Eea0),
                selected_eia: ctx
                    .security
                    .as_ref()
                    .map(|s| s.selected_eia)
                    .unwrap_or(Eia::Eia0),
                ksi: ctx.ksi,
                esm_container: buf.esm_container.clone(),
            }
        };

        self.as_sap.establish_confirm(confirm).await;
        if let Some(guti) = self.store.get_by_ueid(ue_id).and_then(|c| c.guti) {
            self.identity_provider.notify_new_guti(ue_id, guti);
        }

        let duration = self.config.timers.t3450();
        let previous = self
            .store
            .get_by_ueid_mut(ue_id)
            .and_then(|c| c.t3450_id.take());
        if let Some(id) = previous {
            self.timers.stop(id);
        }
        let new_id = self.timers.start(duration, T3450Expiry(ue_id));
        if let Some(ctx) = self.store.get_by_ueid_mut(ue_id) {
            ctx.t3450_id = Some(new_id);
        }

        Ok(())
    }

    /// §4.4 T3450 expiry handler.
    pub async fn on_t3450_expired(&mut self, ue_id: UeId) -> Result<(), EngineError> {
        // A harmless race: ATTACH COMPLETE may have already removed the
        // buffer and stopped the timer by the time this event is drained.
        let retries = match self.retransmissions.get_mut(&ue_id) {
            Some(buf) => {
                buf.retries += 1;
                buf.retries
            }
            None => return Ok(()),
        };

        if retries < ATTACH_COUNTER_MAX {
            warn!("t3450 expired for ue_id {ue_id}, retransmitting (retry {retries})");
            self.send_attach_accept(ue_id).await
        } else {
            warn!("t3450 exhausted for ue_id {ue_id}, aborting attach");
            self.emm_attach_abort(ue_id).await
        }
    }

    /// §4.4 `on_attach_complete`.
    pub async fn on_attach_complete(
        &mut self,
        ue_id: UeId,
        esm_container: EsmContainer,
    ) -> Result<(), EngineError> {
        self.retransmissions.remove(&ue_id);

        let had_context = match self.store.get_by_ueid_mut(ue_id) {
            Some(ctx) => {
                if let Some(id) = ctx.t3450_id.take() {
                    self.timers.stop(id);
                }
                ctx.old_guti = None;
                ctx.guti_is_new = false;
                true
            }
            None => false,
        };
        if !had_context {
            warn!("attach complete for unknown ue_id {ue_id}");
            return Ok(());
        }

        let status = self
            .esm_sap
            .default_bearer_activate_confirm(ue_id, esm_container)
            .await;

        match status {
            EsmStatus::Success => {
                if let Some(ctx) = self.store.get_by_ueid_mut(ue_id) {
                    ctx.is_attached = true;
                    ctx.fsm_status = FsmStatus::Registered;
                }
                self.reg_sink.notify(ue_id, RegEvent::AttachCnf);
            }
            EsmStatus::Discarded => {}
            EsmStatus::Failure => {
                self.reg_sink.notify(ue_id, RegEvent::AttachRej);
            }
        }
        Ok(())
    }

    /// §4.4 `_emm_attach_abort`.
    async fn emm_attach_abort(&mut self, ue_id: UeId) -> Result<(), EngineError> {
        self.retransmissions.remove(&ue_id);
        if let Some(ctx) = self.store.get_by_ueid_mut(ue_id) {
            if let Some(id) = ctx.t3450_id.take() {
                self.timers.stop(id);
            }
        }
        self.esm_sap.pdn_connectivity_reject(ue_id).await;
        self.reg_sink.notify(ue_id, RegEvent::AttachRej);
        self.emm_attach_release(ue_id);
        Ok(())
    }

    /// §4.4 `_emm_attach_release`.
    fn emm_attach_release(&mut self, ue_id: UeId) {
        if let Some(ctx) = self.store.get_by_ueid_mut(ue_id) {
            if let Some(id) = ctx.t3450_id.take() {
                self.timers.stop(id);
            }
        }
        self.retransmissions.remove(&ue_id);
        self.store.remove(ue_id);
        self.reg_sink.notify(ue_id, RegEvent::ProcAbort);
    }

    /// §4.4 `_emm_attach_reject`. `cause_override` is `Some` when the
    /// caller already knows the cause (e.g. identification failure);
    /// `None` means the cause was already set on the context (ESM failure).
    async fn emm_attach_reject(
        &mut self,
        ue_id: UeId,
        cause_override: Option<EmmCause>,
    ) -> Result<(), EngineError> {
        let missing_esm_pdu = {
            let ctx = self
                .store
                .get_by_ueid_mut(ue_id)
                .ok_or(EngineError::IllegalUeId(ue_id))?;
            if let Some(cause) = cause_override {
                ctx.emm_cause = cause;
            }
            if ctx.emm_cause.is_success() {
                ctx.emm_cause = EmmCause::IllegalUe;
            }
            matches!(ctx.emm_cause, EmmCause::EsmFailure) && ctx.esm_msg.is_empty()
        };
        if missing_esm_pdu {
            // Internal inconsistency, fatal for this UE: release rather
            // than leave a dangling context behind.
            self.emm_attach_release(ue_id);
            return Err(EngineError::MissingEsmRejectPdu(ue_id));
        }

        let (cause, esm_container, is_dynamic) = {
            let ctx = self
                .store
                .get_by_ueid(ue_id)
                .ok_or(EngineError::IllegalUeId(ue_id))?;
            let esm = if matches!(ctx.emm_cause, EmmCause::EsmFailure) {
                Some(ctx.esm_msg.clone())
            } else {
                None
            };
            (ctx.emm_cause, esm, ctx.is_dynamic)
        };

        self.as_sap
            .establish_reject(EstablishReject {
                ue_id,
                cause,
                esm_container,
            })
            .await;

        if is_dynamic {
            self.emm_attach_release(ue_id);
        }
        Ok(())
    }
}
