// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::BTreeMap,
    sync::{
        PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::frontend::AdminError;

/// Number of LUN slots per target.
pub const MAX_LUNS: u32 = 1024;

/// A named iSCSI target and its LUN slots.
///
/// Sessions hold an `Arc<Target>`; removing the target from the frontend
/// only detaches it, the memory goes away with the last session.
#[derive(Debug)]
pub struct Target {
    pub name: String,
    pub alias: Option<String>,
    /// Backend port number assigned to this target.
    pub targ_port: u32,
    /// target LUN -> backend LUN id
    luns: RwLock<BTreeMap<u32, u32>>,
    removed: AtomicBool,
}

impl Target {
    pub fn new(name: String, alias: Option<String>, targ_port: u32) -> Self {
        Self {
            name,
            alias,
            targ_port,
            luns: RwLock::new(BTreeMap::new()),
            removed: AtomicBool::new(false),
        }
    }

    /// Backend LUN mapped at `lun`, `None` for an empty slot.
    pub fn lookup(&self, lun: u32) -> Option<u32> {
        self.luns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&lun)
            .copied()
    }

    /// LUN numbers with a mapping, ascending.
    pub fn luns(&self) -> Vec<u32> {
        self.luns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub(crate) fn map_lun(&self, lun: u32, backend_lun: u32) -> Result<(), AdminError> {
        if lun >= MAX_LUNS {
            return Err(AdminError::LunOutOfRange(lun));
        }
        let mut luns = self.luns.write().unwrap_or_else(PoisonError::into_inner);
        if luns.contains_key(&lun) {
            return Err(AdminError::LunBusy(lun));
        }
        luns.insert(lun, backend_lun);
        Ok(())
    }

    pub(crate) fn unmap_lun(&self, lun: u32) -> Result<u32, AdminError> {
        self.luns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&lun)
            .ok_or(AdminError::LunNotMapped(lun))
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }
}
