//! Province color -> entity color resolution for one aggregation level.

use std::collections::{BTreeMap, HashMap, HashSet};

use realmmap_shared::{BLACK, MapMode, Rgb};
use tracing::{debug, warn};

use crate::store::WorldData;

/// Province raster color -> color of the owning entity at some level.
pub type ColorMapping = HashMap<Rgb, Rgb>;

/// Subject color -> immediate overlord color. Nation mode only.
pub type ColorOverrides = HashMap<Rgb, Rgb>;

/// Walk the title hierarchy from `mode` down to the level that lists
/// provinces, carrying each top-level color down, then key the result by
/// province raster color.
///
/// An entity that no parent claims resolves to black. Provinces that no
/// entity lists are left out entirely.
pub fn build_color_mapping(world: &WorldData, mode: MapMode) -> ColorMapping {
    let chain = mode.chain();
    let Some(top) = world.table(chain[0]).filter(|table| !table.is_empty()) else {
        warn!(%mode, "no definitions loaded for mode, mapping is empty");
        return ColorMapping::new();
    };

    let mut resolved: BTreeMap<String, Rgb> = top
        .ids()
        .filter_map(|id| top.color_of(id).map(|rgb| (id.to_string(), rgb)))
        .collect();

    for levels in chain.windows(2) {
        let (parent_mode, child_mode) = (levels[0], levels[1]);
        let (Some(parent), Some(child)) = (world.table(parent_mode), world.table(child_mode))
        else {
            warn!(%mode, level = %child_mode, "hierarchy level missing, mapping is empty");
            return ColorMapping::new();
        };

        let mut child_to_color: HashMap<String, Rgb> = HashMap::new();
        for (parent_id, rgb) in &resolved {
            for member in parent.members(parent_id) {
                child_to_color.insert(member.as_title(), *rgb);
            }
        }

        let mut unclaimed = 0usize;
        resolved = child
            .ids()
            .map(|id| {
                let rgb = child_to_color.get(id).copied().unwrap_or_else(|| {
                    unclaimed += 1;
                    BLACK
                });
                (id.to_string(), rgb)
            })
            .collect();
        if unclaimed > 0 {
            warn!(
                %mode,
                level = %child_mode,
                unclaimed,
                "entities without a parent default to black"
            );
        }
    }

    let Some(leaf) = world.table(chain[chain.len() - 1]) else {
        return ColorMapping::new();
    };
    let mut mapping = ColorMapping::new();
    for (entity_id, rgb) in &resolved {
        for member in leaf.members(entity_id) {
            let Some(province_id) = member.province_id() else {
                warn!(%mode, entity = %entity_id, member = %member, "non-numeric province id");
                continue;
            };
            match world.provinces.color_of(province_id) {
                Some(province_rgb) => {
                    mapping.insert(province_rgb, *rgb);
                }
                None => debug!(%mode, entity = %entity_id, province_id, "unknown province id"),
            }
        }
    }
    mapping
}

/// Map each subject nation's color to its immediate overlord's color.
///
/// Only the immediate overlord is recorded; the compositor follows the map
/// repeatedly when it needs the whole chain.
pub fn color_overrides(world: &WorldData, mode: MapMode) -> ColorOverrides {
    let mut overrides = ColorOverrides::new();
    if !mode.has_overlords() {
        return overrides;
    }
    let Some(table) = world.table(mode) else {
        return overrides;
    };

    for id in table.ids() {
        let Some(overlord) = table.overlord_of(id) else {
            continue;
        };
        if let (Some(rgb), Some(overlord_rgb)) = (table.color_of(id), table.color_of(overlord)) {
            overrides.insert(rgb, overlord_rgb);
        }
    }
    overrides
}

/// Successive overlord colors of `rgb`, nearest first. Stops on a loop.
pub fn overlord_colors(overrides: &ColorOverrides, rgb: Rgb) -> Vec<Rgb> {
    let mut seen = HashSet::from([rgb]);
    let mut chain = Vec::new();
    let mut current = rgb;
    while let Some(&next) = overrides.get(&current) {
        if !seen.insert(next) {
            break;
        }
        chain.push(next);
        current = next;
    }
    chain
}

#[cfg(test)]
mod tests {
    use realmmap_shared::{BLACK, MapMode};

    use super::{ColorOverrides, build_color_mapping, color_overrides, overlord_colors};
    use crate::store::tests::{provinces, record, table, titles};
    use crate::store::{ProvinceIndex, WorldData};

    fn province_index() -> ProvinceIndex {
        let mut index = ProvinceIndex::default();
        for id in 1..=6u8 {
            index.insert(u32::from(id), (id, id, id));
        }
        index
    }

    fn hierarchy_world() -> WorldData {
        WorldData::new(province_index())
            .with_table(table(
                MapMode::County,
                vec![
                    ("c_a", record("100,0,0", &provinces(&[1, 2]), None)),
                    ("c_b", record("0,100,0", &provinces(&[3]), None)),
                    ("c_orphan", record("0,0,100", &provinces(&[4]), None)),
                ],
            ))
            .with_table(table(
                MapMode::Duchy,
                vec![("d_one", record("50,50,0", &titles(&["c_a", "c_b"]), None))],
            ))
            .with_table(table(
                MapMode::Kingdom,
                vec![("k_one", record("9,9,9", &titles(&["d_one"]), None))],
            ))
    }

    #[test]
    fn county_mode_uses_county_colors() {
        let mapping = build_color_mapping(&hierarchy_world(), MapMode::County);
        assert_eq!(mapping.get(&(1, 1, 1)), Some(&(100, 0, 0)));
        assert_eq!(mapping.get(&(2, 2, 2)), Some(&(100, 0, 0)));
        assert_eq!(mapping.get(&(3, 3, 3)), Some(&(0, 100, 0)));
        assert_eq!(mapping.get(&(4, 4, 4)), Some(&(0, 0, 100)));
    }

    #[test]
    fn coarser_modes_carry_parent_colors_and_default_orphans_to_black() {
        let world = hierarchy_world();

        let duchy = build_color_mapping(&world, MapMode::Duchy);
        assert_eq!(duchy.get(&(1, 1, 1)), Some(&(50, 50, 0)));
        assert_eq!(duchy.get(&(3, 3, 3)), Some(&(50, 50, 0)));
        assert_eq!(duchy.get(&(4, 4, 4)), Some(&BLACK));

        let kingdom = build_color_mapping(&world, MapMode::Kingdom);
        assert_eq!(kingdom.get(&(2, 2, 2)), Some(&(9, 9, 9)));
        assert_eq!(kingdom.get(&(4, 4, 4)), Some(&BLACK));
    }

    #[test]
    fn provinces_outside_every_entity_are_absent() {
        let mapping = build_color_mapping(&hierarchy_world(), MapMode::Kingdom);
        assert_eq!(mapping.len(), 4);
        assert!(!mapping.contains_key(&(5, 5, 5)));
        assert!(!mapping.contains_key(&(6, 6, 6)));
    }

    #[test]
    fn missing_level_yields_empty_mapping() {
        let mapping = build_color_mapping(&hierarchy_world(), MapMode::Empire);
        assert!(mapping.is_empty());
    }

    fn nation_world() -> WorldData {
        WorldData::new(province_index()).with_table(table(
            MapMode::Nation,
            vec![
                ("A", record("1,0,0", &provinces(&[1]), Some("C"))),
                ("B", record("2,0,0", &provinces(&[2]), Some("A"))),
                ("C", record("3,0,0", &provinces(&[3]), None)),
                ("D", record("4,0,0", &provinces(&[4]), Some("GONE"))),
            ],
        ))
    }

    #[test]
    fn overrides_point_at_the_immediate_overlord() {
        let world = nation_world();
        let overrides = color_overrides(&world, MapMode::Nation);
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides.get(&(2, 0, 0)), Some(&(1, 0, 0)));
        assert_eq!(overrides.get(&(1, 0, 0)), Some(&(3, 0, 0)));
        assert!(!overrides.contains_key(&(4, 0, 0)));

        assert_eq!(
            overlord_colors(&overrides, (2, 0, 0)),
            vec![(1, 0, 0), (3, 0, 0)]
        );
        assert!(color_overrides(&world, MapMode::County).is_empty());
    }

    #[test]
    fn overlord_colors_stops_on_loops() {
        let overrides: ColorOverrides = [((1, 0, 0), (2, 0, 0)), ((2, 0, 0), (1, 0, 0))]
            .into_iter()
            .collect();
        assert_eq!(overlord_colors(&overrides, (1, 0, 0)), vec![(2, 0, 0)]);
    }
}
