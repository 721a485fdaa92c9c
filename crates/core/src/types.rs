use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::location::{LocationCode, ParseError};

/// Article stored at a rack location, as returned by the location search.
///
/// Only `article_id`, `clave` and `location_code` are populated by the search;
/// the remaining fields are filled in by overlay merges and stay `None` until
/// their dimension has loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLocationRecord {
    pub article_id: u64,
    pub clave: String,
    pub name: String,
    pub location_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existencia: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estatus: Option<StockStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clase: Option<ArticleClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dias_quiebre: Option<u32>,
}

impl ArticleLocationRecord {
    /// Creates a record with no overlay data attached.
    pub fn new(
        article_id: u64,
        clave: impl Into<String>,
        name: impl Into<String>,
        location_code: impl Into<String>,
    ) -> Self {
        Self {
            article_id,
            clave: clave.into(),
            name: name.into(),
            location_code: location_code.into(),
            existencia: None,
            estatus: None,
            clase: None,
            dias_quiebre: None,
        }
    }
}

/// Live stock status reported by the inventory source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StockStatus {
    Disponible,
    Bajo,
    Agotado,
    SinDatos,
    Other(String),
}

impl StockStatus {
    /// Maps the wire representation onto a status, keeping unknown values verbatim.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DISPONIBLE" => Self::Disponible,
            "BAJO" => Self::Bajo,
            "AGOTADO" => Self::Agotado,
            "SIN_DATOS" | "" => Self::SinDatos,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Disponible => "DISPONIBLE",
            Self::Bajo => "BAJO",
            Self::Agotado => "AGOTADO",
            Self::SinDatos => "SIN_DATOS",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StockStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StockStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// Rotation classification of an article (ABC analysis plus `D` for unclassified).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArticleClass {
    A,
    B,
    C,
    D,
}

impl ArticleClass {
    /// Parses a single class letter, case-insensitively.
    pub fn from_letter(value: &str) -> Option<Self> {
        match value.trim() {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            "C" | "c" => Some(Self::C),
            "D" | "d" => Some(Self::D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Smallest addressable slot of a rack.
///
/// A bin with no articles is a confirmed-empty slot. Slots that were never
/// observed are filled in by the builder and are indistinguishable from
/// confirmed-empty ones once the rack is rectangular.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bin {
    pub number: u32,
    pub full_code: String,
    pub articles: Vec<ArticleLocationRecord>,
}

impl Bin {
    pub(crate) fn new(code: &LocationCode, articles: Vec<ArticleLocationRecord>) -> Self {
        Self {
            number: code.bin,
            full_code: code.to_string(),
            articles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// One physical shelf of a level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Line {
    pub bins: Vec<Bin>,
}

impl Line {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Horizontal tier of a rack. `lines` is ordered top to bottom: `[upper, lower]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Level {
    pub level: u32,
    pub lines: [Line; 2],
}

impl Level {
    pub fn upper(&self) -> &Line {
        &self.lines[0]
    }

    pub fn lower(&self) -> &Line {
        &self.lines[1]
    }

    /// Bins in ascending number order (lower shelf first).
    pub fn bins(&self) -> impl Iterator<Item = &Bin> {
        self.lower().bins.iter().chain(self.upper().bins.iter())
    }

    pub fn bin_count(&self) -> usize {
        self.lower().len() + self.upper().len()
    }
}

/// Complete, gap-filled model of a rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackModel {
    pub code: String,
    pub levels: Vec<Level>,
    pub total_bins: usize,
    pub total_article_records: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedLocation>,
}

impl RackModel {
    /// Model with no levels; callers treat it as "nothing found".
    pub fn empty(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            levels: Vec::new(),
            total_bins: 0,
            total_article_records: 0,
            rejected: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, level: u32) -> Option<&Level> {
        self.levels.iter().find(|candidate| candidate.level == level)
    }

    pub fn bin(&self, level: u32, bin: u32) -> Option<&Bin> {
        self.level(level)?.bins().find(|candidate| candidate.number == bin)
    }

    /// Iterates over every placed article record.
    pub fn articles(&self) -> impl Iterator<Item = &ArticleLocationRecord> {
        self.levels
            .iter()
            .flat_map(|level| level.lines.iter())
            .flat_map(|line| line.bins.iter())
            .flat_map(|bin| bin.articles.iter())
    }

    /// Rebuilds the model with every article record passed through `apply`.
    ///
    /// Structure (levels, bins, codes, membership) is carried over unchanged.
    pub fn map_articles<F>(&self, mut apply: F) -> Self
    where
        F: FnMut(&ArticleLocationRecord) -> ArticleLocationRecord,
    {
        let levels = self
            .levels
            .iter()
            .map(|level| Level {
                level: level.level,
                lines: [
                    map_line(&level.lines[0], &mut apply),
                    map_line(&level.lines[1], &mut apply),
                ],
            })
            .collect();

        Self {
            code: self.code.clone(),
            levels,
            total_bins: self.total_bins,
            total_article_records: self.total_article_records,
            rejected: self.rejected.clone(),
        }
    }
}

fn map_line<F>(line: &Line, apply: &mut F) -> Line
where
    F: FnMut(&ArticleLocationRecord) -> ArticleLocationRecord,
{
    Line {
        bins: line
            .bins
            .iter()
            .map(|bin| Bin {
                number: bin.number,
                full_code: bin.full_code.clone(),
                articles: bin.articles.iter().map(|article| apply(article)).collect(),
            })
            .collect(),
    }
}

/// Where a rejected location string came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSourceKind {
    Record,
    KnownLocation,
}

impl LocationSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::KnownLocation => "known_location",
        }
    }
}

/// Reason a location was left out of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    Malformed { error: ParseError },
    RackMismatch { found: String },
    LevelOutOfRange { level: u32 },
    BinOutOfRange { bin: u32 },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { error } => write!(f, "{error}"),
            Self::RackMismatch { found } => write!(f, "belongs to rack {found}"),
            Self::LevelOutOfRange { level } => {
                write!(f, "level {level} is outside the addressable range")
            }
            Self::BinOutOfRange { bin } => write!(f, "bin {bin} is outside the addressable range"),
        }
    }
}

/// Diagnostic for a record or known location the builder could not place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedLocation {
    pub raw: String,
    pub source: LocationSourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clave: Option<String>,
    pub reason: RejectionReason,
}
