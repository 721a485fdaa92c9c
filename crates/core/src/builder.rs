use std::collections::BTreeMap;

use tracing::warn;

use crate::location::LocationCode;
use crate::types::{
    ArticleLocationRecord, Bin, Level, Line, LocationSourceKind, RackModel, RejectedLocation,
    RejectionReason,
};

/// Highest level number placed in a model.
pub const MAX_LEVEL: u32 = 99;
/// Highest bin number placed in a model; larger bins would widen every level.
pub const MAX_BIN: u32 = 999;

/// Builds complete rack models from flat location search results.
pub struct RackBuilder;

impl RackBuilder {
    /// Builds the model for `rack_code`.
    ///
    /// `known_locations` are bins confirmed to exist even when no record maps
    /// to them. Records and locations that cannot be placed are dropped and
    /// reported in [`RackModel::rejected`]. The result is rectangular: every
    /// level between the lowest and highest observed one is present, and every
    /// level carries bins `1..=max_bin` where `max_bin` is the highest bin seen
    /// on any level.
    pub fn build(
        rack_code: &str,
        records: &[ArticleLocationRecord],
        known_locations: &[String],
    ) -> RackModel {
        let rack_code = rack_code.trim();
        let mut grid: BTreeMap<u32, BTreeMap<u32, Vec<ArticleLocationRecord>>> = BTreeMap::new();
        let mut rejected = Vec::new();
        let mut accepted_records = 0usize;

        for record in records {
            match locate(rack_code, &record.location_code) {
                Ok(code) => {
                    grid.entry(code.level)
                        .or_default()
                        .entry(code.bin)
                        .or_default()
                        .push(record.clone());
                    accepted_records += 1;
                }
                Err(reason) => rejected.push(RejectedLocation {
                    raw: record.location_code.clone(),
                    source: LocationSourceKind::Record,
                    clave: Some(record.clave.clone()),
                    reason,
                }),
            }
        }

        for raw in known_locations {
            match locate(rack_code, raw) {
                Ok(code) => {
                    grid.entry(code.level).or_default().entry(code.bin).or_default();
                }
                Err(reason) => rejected.push(RejectedLocation {
                    raw: raw.clone(),
                    source: LocationSourceKind::KnownLocation,
                    clave: None,
                    reason,
                }),
            }
        }

        for entry in &rejected {
            warn!(
                stage = "builder",
                rack = %rack_code,
                raw = %entry.raw,
                source = entry.source.as_str(),
                reason = %entry.reason,
                "dropping location"
            );
        }

        let (Some(min_level), Some(max_level)) = (
            grid.keys().next().copied(),
            grid.keys().next_back().copied(),
        ) else {
            let mut model = RackModel::empty(rack_code);
            model.rejected = rejected;
            return model;
        };

        let max_bin = grid
            .values()
            .filter_map(|bins| bins.keys().next_back().copied())
            .max()
            .unwrap_or(0);

        let levels: Vec<Level> = (min_level..=max_level)
            .map(|level| {
                let mut occupied = grid.remove(&level).unwrap_or_default();
                let bins = (1..=max_bin)
                    .map(|bin| {
                        let articles = occupied.remove(&bin).unwrap_or_default();
                        Bin::new(&LocationCode::new(rack_code, level, bin), articles)
                    })
                    .collect();
                let (lower, upper) = split_lines(bins);
                Level {
                    level,
                    lines: [upper, lower],
                }
            })
            .collect();

        let total_bins = levels.iter().map(Level::bin_count).sum();

        RackModel {
            code: rack_code.to_string(),
            levels,
            total_bins,
            total_article_records: accepted_records,
            rejected,
        }
    }
}

/// Splits a level's ascending bin run across its two shelves.
///
/// The lower shelf takes the first `ceil(n / 2)` bins; the upper shelf takes
/// the rest.
pub fn split_lines(mut bins: Vec<Bin>) -> (Line, Line) {
    let lower_len = bins.len().div_ceil(2);
    let upper = bins.split_off(lower_len);
    (Line { bins }, Line { bins: upper })
}

fn locate(rack_code: &str, raw: &str) -> Result<LocationCode, RejectionReason> {
    let code = LocationCode::parse(raw).map_err(|error| RejectionReason::Malformed { error })?;
    if code.rack_code != rack_code {
        return Err(RejectionReason::RackMismatch {
            found: code.rack_code,
        });
    }
    if code.level > MAX_LEVEL {
        return Err(RejectionReason::LevelOutOfRange { level: code.level });
    }
    if code.bin == 0 || code.bin > MAX_BIN {
        return Err(RejectionReason::BinOutOfRange { bin: code.bin });
    }
    Ok(code)
}
