//! Context Store (C1): keyed storage of per-UE EMM contexts.
//!
//! Indexed by lower-layer UE-ID and, when assigned, by GUTI. Modeled on the
//! dual-index bookkeeping of a recording store that tracks current/by-name
//! entries: exactly one canonical owner per key, atomic add/remove pairs,
//! and an explicit error type for lookup misses.

use std::collections::HashMap;

use thiserror::Error;

use crate::context::{EmmContext, UeId};
use crate::identity::Guti;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no context for ue_id {0}")]
    NoSuchUe(UeId),
    #[error("ue_id {0} already has a context")]
    DuplicateUe(UeId),
    #[error("no context for guti {0:?}")]
    NoSuchGuti(Guti),
}

/// Guti doesn't derive Hash by default layout; key on its flattened fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GutiKey {
    mcc: u16,
    mnc: u16,
    mme_group_id: u16,
    mme_code: u8,
    m_tmsi: u32,
}

impl From<Guti> for GutiKey {
    fn from(g: Guti) -> Self {
        GutiKey {
            mcc: g.gummei.mcc,
            mnc: g.gummei.mnc,
            mme_group_id: g.gummei.mme_group_id,
            mme_code: g.gummei.mme_code,
            m_tmsi: g.m_tmsi,
        }
    }
}

/// Invoked after a context's `ue_id` key changes, before the store's
/// internal indices are updated, so subscribers (e.g. AS-layer correlation
/// tables) can react. Mirrors §4.1's `on_ueid_change` contract.
pub type UeIdChangeObserver = Box<dyn FnMut(UeId, UeId) + Send>;

#[derive(Default)]
pub struct ContextStore {
    by_ue_id: HashMap<UeId, EmmContext>,
    guti_index: HashMap<GutiKey, UeId>,
    observer: Option<UeIdChangeObserver>,
}

impl ContextStore {
    pub fn new() -> Self {
        ContextStore::default()
    }

    pub fn set_ueid_change_observer(&mut self, observer: UeIdChangeObserver) {
        self.observer = Some(observer);
    }

    pub fn get_by_ueid(&self, ue_id: UeId) -> Option<&EmmContext> {
        self.by_ue_id.get(&ue_id)
    }

    pub fn get_by_ueid_mut(&mut self, ue_id: UeId) -> Option<&mut EmmContext> {
        self.by_ue_id.get_mut(&ue_id)
    }

    pub fn get_by_guti(&self, guti: Guti) -> Option<&EmmContext> {
        let ue_id = *self.guti_index.get(&guti.into())?;
        self.by_ue_id.get(&ue_id)
    }

    /// Inserts a freshly allocated context. A no-op (logged, not an error)
    /// if one already exists for this `ue_id` — duplicate indexing would be
    /// a store-consistency bug, not a recoverable runtime condition.
    pub fn insert(&mut self, ctx: EmmContext) -> Result<(), StoreError> {
        if self.by_ue_id.contains_key(&ctx.ue_id) {
            return Err(StoreError::DuplicateUe(ctx.ue_id));
        }
        if let Some(guti) = ctx.guti {
            self.guti_index.insert(guti.into(), ctx.ue_id);
        }
        self.by_ue_id.insert(ctx.ue_id, ctx);
        Ok(())
    }

    /// Synchronizes the GUTI index after a context's `guti` field changes
    /// in place. Must be called by anything that mutates `ctx.guti`.
    pub fn reindex_guti(&mut self, ue_id: UeId, previous: Option<Guti>) {
        if let Some(prev) = previous {
            self.guti_index.remove(&prev.into());
        }
        if let Some(ctx) = self.by_ue_id.get(&ue_id) {
            if let Some(guti) = ctx.guti {
                self.guti_index.insert(guti.into(), ue_id);
            }
        }
    }

    pub fn remove(&mut self, ue_id: UeId) -> Option<EmmContext> {
        let ctx = self.by_ue_id.remove(&ue_id)?;
        if let Some(guti) = ctx.guti {
            self.guti_index.remove(&guti.into());
        }
        Some(ctx)
    }

    /// Moves a context from `old` to `new` lower-layer UE-ID, notifying the
    /// observer first. Used when a GUTI-matched re-attach arrives on a new
    /// radio connection (§8 scenario 4).
    pub fn rebind_ueid(&mut self, old: UeId, new: UeId) -> Result<(), StoreError> {
        if !self.by_ue_id.contains_key(&old) {
            return Err(StoreError::NoSuchUe(old));
        }
        if let Some(observer) = self.observer.as_mut() {
            observer(old, new);
        }
        let mut ctx = self.by_ue_id.remove(&old).expect("checked above");
        ctx.ue_id = new;
        if let Some(guti) = ctx.guti {
            self.guti_index.insert(guti.into(), new);
        }
        self.by_ue_id.insert(new, ctx);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_ue_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ue_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Gummei;

    fn guti(m_tmsi: u32) -> Guti {
        Guti {
            gummei: Gummei {
                mcc: 1,
                mnc: 1,
                mnc_len: 2,
                mme_group_id: 1,
                mme_code: 1,
            },
            m_tmsi,
        }
    }

    #[test]
    fn insert_and_lookup_by_both_keys() {
        let mut store = ContextStore::new();
        let mut ctx = EmmContext::new(1, true);
        ctx.guti = Some(guti(42));
        store.insert(ctx).unwrap();

        assert!(store.get_by_ueid(1).is_some());
        assert!(store.get_by_guti(guti(42)).is_some());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut store = ContextStore::new();
        store.insert(EmmContext::new(1, true)).unwrap();
        assert_eq!(
            store.insert(EmmContext::new(1, true)),
            Err(StoreError::DuplicateUe(1))
        );
    }

    #[test]
    fn remove_clears_guti_index() {
        let mut store = ContextStore::new();
        let mut ctx = EmmContext::new(1, true);
        ctx.guti = Some(guti(7));
        store.insert(ctx).unwrap();
        store.remove(1);
        assert!(store.get_by_guti(guti(7)).is_none());
        assert!(store.get_by_ueid(1).is_none());
    }

    #[test]
    fn rebind_preserves_context_and_guti_index() {
        let mut store = ContextStore::new();
        let mut ctx = EmmContext::new(7, true);
        ctx.guti = Some(guti(99));
        ctx.imsi = Some(crate::identity::Imsi("001010000000001".into()));
        store.insert(ctx).unwrap();

        store.rebind_ueid(7, 12).unwrap();

        assert!(store.get_by_ueid(7).is_none());
        let moved = store.get_by_ueid(12).unwrap();
        assert_eq!(moved.ue_id, 12);
        assert!(moved.imsi.is_some());
        assert_eq!(store.get_by_guti(guti(99)).unwrap().ue_id, 12);
    }

    #[test]
    fn rebind_notifies_observer_before_move() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let mut store = ContextStore::new();
        store.set_ueid_change_observer(Box::new(move |old, new| {
            *seen_clone.lock().unwrap() = Some((old, new));
        }));
        store.insert(EmmContext::new(3, true)).unwrap();
        store.rebind_ueid(3, 9).unwrap();

        assert_eq!(*seen.lock().unwrap(), Some((3, 9)));
    }
}
