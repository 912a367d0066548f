// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use log::warn;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read access that survives a poisoned lock; the last written state is kept.
pub fn read_guard<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{} lock poisoned; reading last written state", name);
            poisoned.into_inner()
        }
    }
}

pub fn write_guard<'a, T>(lock: &'a RwLock<T>, name: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{} lock poisoned; writing over last state", name);
            poisoned.into_inner()
        }
    }
}
