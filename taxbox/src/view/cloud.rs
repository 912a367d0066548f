// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::fmt;

pub const DEFAULT_SMALLEST: f64 = 8.0;
pub const DEFAULT_LARGEST: f64 = 22.0;
pub const DEFAULT_UNIT: &str = "pt";

/// Font size range the cloud maps usage weights onto.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudScale {
    pub smallest: f64,
    pub largest: f64,
    pub unit: String,
}

impl Default for CloudScale {
    fn default() -> Self {
        Self {
            smallest: DEFAULT_SMALLEST,
            largest: DEFAULT_LARGEST,
            unit: DEFAULT_UNIT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSize {
    pub value: f64,
    pub unit: String,
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = (self.value * 1000.0).round() / 1000.0;
        write!(f, "{}{}", rounded, self.unit)
    }
}

/// `round(log10(count + 1) * 100)`
pub fn topic_weight(count: u64) -> i64 {
    ((count as f64 + 1.0).log10() * 100.0).round() as i64
}

/// Maps each count linearly from the weight range onto `scale`. Equal
/// weights collapse to `scale.smallest`.
pub fn font_sizes(counts: &[u64], scale: &CloudScale) -> Vec<FontSize> {
    let weights: Vec<i64> = counts.iter().map(|count| topic_weight(*count)).collect();
    let (Some(min), Some(max)) = (weights.iter().min(), weights.iter().max()) else {
        return Vec::new();
    };
    let spread = match max - min {
        spread if spread <= 0 => 1,
        spread => spread,
    };
    let range = scale.largest - scale.smallest;
    weights
        .iter()
        .map(|weight| FontSize {
            value: scale.smallest + (weight - min) as f64 * range / spread as f64,
            unit: scale.unit.clone(),
        })
        .collect()
}
