use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use realmmap_shared::{EntityDefinitions, MapMode, MemberRef, Rgb, parse_rgb};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::DataPaths;
use crate::error::{MapError, Result};
use crate::store::{EntityTable, write_json_atomic};

/// Serializes every read-modify-write of `input/nation.json`. Claim and
/// enqueue handlers hold it for their edit, a regeneration run holds it while
/// it takes its snapshot.
#[derive(Debug, Clone, Default)]
pub struct NationLock {
    lock: Arc<Mutex<()>>,
}

impl NationLock {
    pub fn hold(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Compile `input/nation.json` into `defines/nation.json`, adding each
/// nation's direct `subjects` and total `size` (own provinces plus those of
/// every transitive subject). Fields the engine does not know about are
/// carried through untouched. `raw` is the caller's snapshot of the input
/// file. Returns the number of nations written.
pub fn compile_nations(paths: &DataPaths, raw: &Map<String, Value>) -> Result<usize> {
    let started = Instant::now();
    let input = paths.nation_input();
    if !input.exists() {
        warn!(path = %input.display(), "no nation input, skipping nation compile");
        return Ok(0);
    }

    let table = nation_table(raw)?;
    let mut compiled = raw.clone();
    for (id, value) in compiled.iter_mut() {
        let Value::Object(nation) = value else {
            return Err(MapError::MalformedInput(format!(
                "nation {id} is not a JSON object"
            )));
        };
        nation.insert(
            "subjects".to_string(),
            Value::from(table.subjects_of(id).to_vec()),
        );
        nation.insert("size".to_string(), Value::from(table.size_of(id)));
    }

    let output = paths.compiled_nations();
    write_json_atomic(&output, &compiled)?;

    info!(
        nations = compiled.len(),
        path = %output.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "compiled nation data"
    );
    Ok(compiled.len())
}

/// Entity view of raw nation records.
pub fn nation_table(raw: &Map<String, Value>) -> Result<EntityTable> {
    let definitions: EntityDefinitions = serde_json::from_value(Value::Object(raw.clone()))?;
    Ok(EntityTable::from_definitions(MapMode::Nation, definitions))
}

/// Editable nation records as raw JSON so unknown fields survive a rewrite.
/// A missing file reads as no nations.
pub fn read_nation_input(paths: &DataPaths) -> Result<Map<String, Value>> {
    let path = paths.nation_input();
    if !path.exists() {
        return Ok(Map::new());
    }
    let text = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn write_nation_input(paths: &DataPaths, nations: &Map<String, Value>) -> Result<()> {
    write_json_atomic(&paths.nation_input(), nations)
}

/// Id of the nation whose `rgb` parses to `rgb`.
pub fn nation_with_color(nations: &Map<String, Value>, rgb: Rgb) -> Option<String> {
    nations.iter().find_map(|(id, nation)| {
        let color = nation.get("rgb")?.as_str().and_then(parse_rgb)?;
        (color == rgb).then(|| id.clone())
    })
}

/// Id of the nation already holding `province_id`, if any.
pub fn claimant_of(nations: &Map<String, Value>, province_id: u32) -> Option<String> {
    nations.iter().find_map(|(id, nation)| {
        let provinces = nation.get("provinces")?.as_array()?;
        provinces
            .iter()
            .filter_map(|member| serde_json::from_value::<MemberRef>(member.clone()).ok())
            .any(|member| member.province_id() == Some(province_id))
            .then(|| id.clone())
    })
}
