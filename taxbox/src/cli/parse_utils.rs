// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::CliError;
use crate::term::{PanelContext, TermId};

pub(crate) fn parse_required_arg<'a>(
    args: &'a [String],
    label: &str,
) -> Result<(String, &'a [String]), CliError> {
    if args.is_empty() {
        return Err(CliError::usage(format!("Missing {}", label)));
    }
    Ok((args[0].clone(), &args[1..]))
}

pub(crate) fn next_value(args: &[String], idx: &mut usize, flag: &str) -> Result<String, CliError> {
    if *idx >= args.len() {
        return Err(CliError::usage(format!("{} requires a value", flag)));
    }
    let value = args[*idx].clone();
    *idx += 1;
    Ok(value)
}

pub(crate) fn parse_term_id(raw: &str) -> Result<TermId, CliError> {
    raw.trim_start_matches('#')
        .parse::<TermId>()
        .map_err(|_| CliError::usage(format!("Invalid term id '{}'", raw)))
}

pub(crate) fn parse_context(raw: &str) -> Result<PanelContext, CliError> {
    PanelContext::parse(raw)
        .ok_or_else(|| CliError::usage(format!("Invalid panel '{}', expected all or pop", raw)))
}

pub(crate) fn reject_extra(args: &[String], command: &str) -> Result<(), CliError> {
    match args.first() {
        Some(extra) => Err(CliError::usage(format!(
            "Unexpected argument for {}: {}",
            command, extra
        ))),
        None => Ok(()),
    }
}

/// Splits a shell line on whitespace. Double quotes group words.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}
