// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use env_logger::Logger;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `(target_prefix, from, to)`: records from a matching target logged at
/// `from` are re-emitted at `to`.
pub type LevelRule = (String, Level, Level);

struct LevelModifierLogger {
    inner: Logger,
    rules: Vec<LevelRule>,
}

impl LevelModifierLogger {
    fn remapped<'a>(&self, metadata: &Metadata<'a>) -> Metadata<'a> {
        Metadata::builder()
            .level(remap_level(&self.rules, metadata.target(), metadata.level()))
            .target(metadata.target())
            .build()
    }
}

fn remap_level(rules: &[LevelRule], target: &str, level: Level) -> Level {
    rules
        .iter()
        .find(|(prefix, from, _)| *from == level && target.starts_with(prefix.as_str()))
        .map(|(_, _, to)| *to)
        .unwrap_or(level)
}

impl Log for LevelModifierLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(&self.remapped(metadata))
    }

    fn log(&self, record: &Record) {
        let metadata = self.remapped(record.metadata());
        if !self.inner.enabled(&metadata) {
            return;
        }
        self.inner.log(
            &Record::builder()
                .metadata(metadata)
                .args(*record.args())
                .module_path(record.module_path())
                .file(record.file())
                .line(record.line())
                .build(),
        );
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// HTTP client chatter that is noise at `info` for an interactive shell.
pub fn quiet_transport_rules() -> Vec<LevelRule> {
    vec![
        ("reqwest".to_string(), Level::Info, Level::Debug),
        ("hyper".to_string(), Level::Info, Level::Debug),
        ("hyper_util".to_string(), Level::Info, Level::Debug),
        ("rustls".to_string(), Level::Warn, Level::Debug),
    ]
}

/// Installs `logger` behind the level rules. The global max level is the
/// logger's own filter, raised to the highest level any rule rewrites.
pub fn init_logger(rules: Vec<LevelRule>, logger: Logger) -> Result<(), SetLoggerError> {
    let max_level = rules
        .iter()
        .map(|(_, from, _)| from.to_level_filter())
        .fold(logger.filter(), Ord::max);
    log::set_boxed_logger(Box::new(LevelModifierLogger {
        inner: logger,
        rules,
    }))?;
    log::set_max_level(max_level);
    Ok(())
}
