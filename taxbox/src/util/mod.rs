// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod locks;
pub mod log_level_changer;
pub mod test_fixtures;

pub use locks::{read_guard, write_guard};
pub use log_level_changer::{init_logger, quiet_transport_rules};
