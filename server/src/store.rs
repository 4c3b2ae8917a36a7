//! In-memory view of provinces and political entities.
//!
//! Everything here is rebuilt from disk at the start of each regeneration run;
//! nothing is cached across runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use realmmap_shared::{EntityDefinitions, MapMode, MemberRef, Rgb, parse_rgb};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DataPaths;
use crate::error::{MapError, Result};

/// Bidirectional province id <-> raster color lookup.
#[derive(Debug, Clone, Default)]
pub struct ProvinceIndex {
    by_color: HashMap<Rgb, u32>,
    by_id: HashMap<u32, Rgb>,
}

impl ProvinceIndex {
    /// Parse `<id> = <r>,<g>,<b>` records. Blank lines and `##` comments are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut index = Self::default();
        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("##") {
                continue;
            }
            let malformed = || {
                MapError::MalformedInput(format!("provinces line {}: {trimmed:?}", line_no + 1))
            };
            let (raw_id, raw_rgb) = trimmed.split_once('=').ok_or_else(malformed)?;
            let id = raw_id.trim().parse::<u32>().map_err(|_| malformed())?;
            let rgb = parse_rgb(raw_rgb).ok_or_else(malformed)?;
            index.insert(id, rgb);
        }
        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn insert(&mut self, id: u32, rgb: Rgb) {
        if let Some(previous) = self.by_color.insert(rgb, id)
            && previous != id
        {
            warn!(province = id, previous, ?rgb, "province color reused, later id wins");
        }
        self.by_id.insert(id, rgb);
    }

    pub fn id_of(&self, rgb: Rgb) -> Option<u32> {
        self.by_color.get(&rgb).copied()
    }

    pub fn color_of(&self, id: u32) -> Option<Rgb> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// All entities of one aggregation level, plus the derived subject edges.
#[derive(Debug, Clone)]
pub struct EntityTable {
    mode: MapMode,
    records: EntityDefinitions,
    colors: BTreeMap<String, Rgb>,
    by_color: HashMap<Rgb, String>,
    subjects: BTreeMap<String, Vec<String>>,
}

impl EntityTable {
    pub fn empty(mode: MapMode) -> Self {
        Self::from_definitions(mode, EntityDefinitions::new())
    }

    pub fn from_definitions(mode: MapMode, records: EntityDefinitions) -> Self {
        let mut colors = BTreeMap::new();
        let mut by_color = HashMap::new();
        for (id, record) in &records {
            let Some(rgb) = record.color() else {
                warn!(
                    %mode,
                    entity = %id,
                    rgb = %record.rgb,
                    "entity has unparseable rgb, skipping"
                );
                continue;
            };
            colors.insert(id.clone(), rgb);
            if let Some(existing) = by_color.get(&rgb) {
                warn!(
                    %mode,
                    entity = %id,
                    existing = %existing,
                    ?rgb,
                    "duplicate entity color, first id kept"
                );
            } else {
                by_color.insert(rgb, id.clone());
            }
        }

        let mut subjects: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if mode.has_overlords() {
            for (id, record) in &records {
                let Some(overlord) = record.overlord.as_deref() else {
                    continue;
                };
                if overlord == id {
                    warn!(%mode, entity = %id, "entity names itself as overlord, ignoring");
                    continue;
                }
                if records.contains_key(overlord) {
                    subjects
                        .entry(overlord.to_string())
                        .or_default()
                        .push(id.clone());
                }
            }
        }

        let table = Self {
            mode,
            records,
            colors,
            by_color,
            subjects,
        };
        table.overlord_cycles();
        table
    }

    pub fn load(path: &Path, mode: MapMode) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let records: EntityDefinitions = serde_json::from_str(&text)?;
        Ok(Self::from_definitions(mode, records))
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Entity ids in stable order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn color_of(&self, id: &str) -> Option<Rgb> {
        self.colors.get(id).copied()
    }

    pub fn id_of_color(&self, rgb: Rgb) -> Option<&str> {
        self.by_color.get(&rgb).map(String::as_str)
    }

    pub fn members(&self, id: &str) -> &[MemberRef] {
        self.records
            .get(id)
            .map(|record| record.members.as_slice())
            .unwrap_or_default()
    }

    /// Immediate overlord, only if it exists in this table.
    pub fn overlord_of(&self, id: &str) -> Option<&str> {
        let overlord = self.records.get(id)?.overlord.as_deref()?;
        (overlord != id && self.records.contains_key(overlord)).then_some(overlord)
    }

    pub fn subjects_of(&self, id: &str) -> &[String] {
        self.subjects
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every direct and indirect subject of `id`, never including `id` itself.
    pub fn subject_closure(&self, id: &str) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut stack: Vec<&str> = self.subjects_of(id).iter().map(String::as_str).collect();
        let mut closure = Vec::new();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                if current == id {
                    warn!(mode = %self.mode, entity = %id, "entity is its own transitive subject");
                }
                continue;
            }
            closure.push(current.to_string());
            stack.extend(self.subjects_of(current).iter().map(String::as_str));
        }
        closure
    }

    pub fn own_province_count(&self, id: &str) -> usize {
        self.members(id).len()
    }

    /// Own provinces plus those of every transitive subject.
    pub fn size_of(&self, id: &str) -> usize {
        self.own_province_count(id)
            + self
                .subject_closure(id)
                .iter()
                .map(|subject| self.own_province_count(subject))
                .sum::<usize>()
    }

    /// Entities at which an overlord cycle closes. Logged once per cycle.
    pub fn overlord_cycles(&self) -> Vec<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Walk {
            OnPath,
            Done,
        }

        let mut state: HashMap<&str, Walk> = HashMap::new();
        let mut cycles = Vec::new();
        for start in self.ids() {
            let mut path = Vec::new();
            let mut current = Some(start);
            while let Some(id) = current {
                match state.get(id) {
                    Some(Walk::Done) => break,
                    Some(Walk::OnPath) => {
                        warn!(
                            mode = %self.mode,
                            entity = %id,
                            "overlord cycle detected in entity data"
                        );
                        cycles.push(id.to_string());
                        break;
                    }
                    None => {
                        state.insert(id, Walk::OnPath);
                        path.push(id);
                        current = self.overlord_of(id);
                    }
                }
            }
            for id in path {
                state.insert(id, Walk::Done);
            }
        }
        cycles
    }
}

/// Province index plus one table per aggregation level.
#[derive(Debug, Clone)]
pub struct WorldData {
    pub provinces: ProvinceIndex,
    tables: HashMap<MapMode, EntityTable>,
}

impl WorldData {
    pub fn new(provinces: ProvinceIndex) -> Self {
        Self {
            provinces,
            tables: HashMap::new(),
        }
    }

    pub fn with_table(mut self, table: EntityTable) -> Self {
        self.tables.insert(table.mode(), table);
        self
    }

    /// Load the province index and every definitions file that exists. The
    /// nation table comes from the caller, who reads it under the nation-file
    /// lock so one run sees one version of it.
    pub fn load(paths: &DataPaths, nations: EntityTable) -> Result<Self> {
        let provinces = ProvinceIndex::load(&paths.provinces_txt())?;
        if provinces.is_empty() {
            warn!(path = %paths.provinces_txt().display(), "province index is empty");
        }
        let mut world = Self::new(provinces);
        debug!(mode = %MapMode::Nation, entities = nations.len(), "definitions loaded");
        world = world.with_table(nations);
        for mode in MapMode::ALL.into_iter().filter(|mode| *mode != MapMode::Nation) {
            let path = paths.definitions(mode);
            let table = if path.exists() {
                EntityTable::load(&path, mode)?
            } else {
                debug!(%mode, path = %path.display(), "no definitions file, using empty table");
                EntityTable::empty(mode)
            };
            debug!(%mode, entities = table.len(), "definitions loaded");
            world = world.with_table(table);
        }
        info!(provinces = world.provinces.len(), "world data loaded");
        Ok(world)
    }

    pub fn table(&self, mode: MapMode) -> Option<&EntityTable> {
        self.tables.get(&mode)
    }
}

/// Serialize `value` next to `path` and rename it into place, so readers see
/// either the previous document or the new one, never a partial write.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return Err(MapError::MalformedInput(format!(
            "{} has no file name",
            path.display()
        )));
    };
    let staging = path.with_file_name(format!(".{name}.tmp"));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&staging, serde_json::to_vec_pretty(value)?)?;
    if let Err(e) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }
    Ok(())
}
