use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::colors::{Rgb, parse_rgb};

/// One definitions file: entity id -> record.
pub type EntityDefinitions = BTreeMap<String, EntityRecord>;

/// A county, duchy, kingdom, empire or nation as stored on disk.
///
/// The member list is keyed differently per level (`provinces`, `counties`,
/// `duchies`, `kingdoms`, or the generic `titles`); all spellings land in
/// `members`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Left empty when absent; an empty or malformed color skips the record.
    #[serde(default)]
    pub rgb: String,
    #[serde(
        default,
        rename = "provinces",
        alias = "counties",
        alias = "duchies",
        alias = "kingdoms",
        alias = "titles"
    )]
    pub members: Vec<MemberRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlord: Option<String>,
}

impl EntityRecord {
    pub fn color(&self) -> Option<Rgb> {
        parse_rgb(&self.rgb)
    }
}

/// Member id at the next finer level. Provinces are numeric, titles are
/// named, but files in the wild mix `12` and `"12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    Province(u32),
    Title(String),
}

impl MemberRef {
    pub fn province_id(&self) -> Option<u32> {
        match self {
            MemberRef::Province(id) => Some(*id),
            MemberRef::Title(raw) => raw.trim().parse().ok(),
        }
    }

    pub fn as_title(&self) -> String {
        match self {
            MemberRef::Province(id) => id.to_string(),
            MemberRef::Title(name) => name.clone(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRef::Province(id) => write!(f, "{id}"),
            MemberRef::Title(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityDefinitions, MemberRef};

    #[test]
    fn members_accept_every_level_spelling() {
        let raw = r#"{
            "c_alpha": {"rgb": "1,2,3", "provinces": [1, "2"]},
            "d_beta": {"rgb": "4,5,6", "counties": ["c_alpha"]},
            "k_gamma": {"rgb": "7,8,9", "duchies": ["d_beta"]},
            "e_delta": {"rgb": "9,9,9", "titles": ["k_gamma"]}
        }"#;
        let defs: EntityDefinitions = serde_json::from_str(raw).expect("parse definitions");

        let alpha = &defs["c_alpha"];
        assert_eq!(alpha.color(), Some((1, 2, 3)));
        let ids: Vec<_> = alpha.members.iter().filter_map(MemberRef::province_id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert_eq!(defs["d_beta"].members[0].as_title(), "c_alpha");
        assert_eq!(defs["k_gamma"].members[0].as_title(), "d_beta");
        assert_eq!(defs["e_delta"].members[0].as_title(), "k_gamma");
    }

    #[test]
    fn overlord_is_optional_and_extra_fields_are_ignored() {
        let raw = r#"{
            "NATION_1": {"rgb": "10,20,30", "provinces": [], "overlord": "NATION_2",
                         "subjects": ["ignored"], "banner": "x"},
            "NATION_2": {"rgb": "40,50,60"}
        }"#;
        let defs: EntityDefinitions = serde_json::from_str(raw).expect("parse nations");
        assert_eq!(defs["NATION_1"].overlord.as_deref(), Some("NATION_2"));
        assert!(defs["NATION_2"].overlord.is_none());
        assert!(defs["NATION_2"].members.is_empty());
    }

    #[test]
    fn missing_rgb_reads_as_empty_color() {
        let defs: EntityDefinitions =
            serde_json::from_str(r#"{"NATION_9": {"provinces": [4]}}"#).expect("parse nations");
        assert_eq!(defs["NATION_9"].rgb, "");
        assert_eq!(defs["NATION_9"].color(), None);
    }
}
