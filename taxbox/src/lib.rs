// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod cli;
pub mod config;
pub mod controller;
pub mod item;
pub mod registry;
pub mod store;
pub mod term;
pub mod util;
pub mod view;
