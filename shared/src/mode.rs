use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Aggregation level a map is composited at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapMode {
    County,
    Duchy,
    Kingdom,
    Empire,
    Nation,
}

impl MapMode {
    pub const ALL: [MapMode; 5] = [
        MapMode::County,
        MapMode::Duchy,
        MapMode::Kingdom,
        MapMode::Empire,
        MapMode::Nation,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            MapMode::County => "county",
            MapMode::Duchy => "duchy",
            MapMode::Kingdom => "kingdom",
            MapMode::Empire => "empire",
            MapMode::Nation => "nation",
        }
    }

    /// Next finer level in the title hierarchy. Counties and nations list
    /// provinces directly.
    pub const fn child(self) -> Option<MapMode> {
        match self {
            MapMode::Empire => Some(MapMode::Kingdom),
            MapMode::Kingdom => Some(MapMode::Duchy),
            MapMode::Duchy => Some(MapMode::County),
            MapMode::County | MapMode::Nation => None,
        }
    }

    /// Levels walked when resolving this mode's colors, coarsest first,
    /// always ending at a level whose members are provinces.
    pub fn chain(self) -> Vec<MapMode> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(child) = current.child() {
            chain.push(child);
            current = child;
        }
        chain
    }

    /// Only nations carry overlord/subject edges.
    pub const fn has_overlords(self) -> bool {
        matches!(self, MapMode::Nation)
    }
}

impl fmt::Display for MapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown map mode: {}", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for MapMode {
    type Err = UnknownMode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "county" => Ok(MapMode::County),
            "duchy" => Ok(MapMode::Duchy),
            "kingdom" => Ok(MapMode::Kingdom),
            "empire" => Ok(MapMode::Empire),
            "nation" => Ok(MapMode::Nation),
            _ => Err(UnknownMode(raw.to_string())),
        }
    }
}
