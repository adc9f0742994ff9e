// God catalog: the names that may be banned or picked.

use serde::Serialize;

use crate::draft::SessionRecord;

/// Default catalog, alphabetical.
pub const SMITE2_GODS: &[&str] = &[
    "Achilles",
    "Agni",
    "Aladdin",
    "Amaterasu",
    "Anhur",
    "Anubis",
    "Aphrodite",
    "Apollo",
    "Ares",
    "Artemis",
    "Artio",
    "Athena",
    "Awilix",
    "Bacchus",
    "Baron Samedi",
    "Bellona",
    "Cabrakan",
    "Cerberus",
    "Cernunnos",
    "Chaac",
    "Cupid",
    "Da Ji",
    "Danzaburou",
    "Eset",
    "Fenrir",
    "Ganesha",
    "Geb",
    "Guan Yu",
    "Hades",
    "Hecate",
    "Hercules",
    "Hou Yi",
    "Hua Mulan",
    "Hun Batz",
    "Izanami",
    "Janus",
    "Jing Wei",
    "Jormungandr",
    "Kali",
    "Khepri",
    "Kukulkan",
    "Loki",
    "Medusa",
    "Mercury",
    "Merlin",
    "Mordred",
    "Neith",
    "Nemesis",
    "Nu Wa",
    "Odin",
    "Osiris",
    "Pele",
    "Poseidon",
    "Princess Bari",
    "Ra",
    "Rama",
    "Scylla",
    "Sobek",
    "Sol",
    "Sun Wukong",
    "Susano",
    "Sylvanus",
    "Thanatos",
    "The Morrigan",
    "Thor",
    "Tsukuyomi",
    "Ullr",
    "Vulcan",
    "Xbalanque",
    "Yemoja",
    "Ymir",
    "Zeus",
];

/// Where a god stands in a given session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GodStatus {
    Available,
    Banned,
    Picked,
}

/// The set of gods a session drafts from, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GodPool {
    names: Vec<String>,
}

impl Default for GodPool {
    fn default() -> Self {
        GodPool::new(SMITE2_GODS.iter().map(|s| s.to_string()).collect())
    }
}

impl GodPool {
    pub fn new(names: Vec<String>) -> Self {
        GodPool { names }
    }

    /// Build from an optional configured roster, falling back to the default
    /// catalog.
    pub fn from_roster(roster: Option<&[String]>) -> Self {
        match roster {
            Some(names) if !names.is_empty() => GodPool::new(names.to_vec()),
            _ => GodPool::default(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, god: &str) -> bool {
        self.names.iter().any(|n| n == god)
    }

    pub fn status(&self, god: &str, record: &SessionRecord) -> GodStatus {
        if record.all_bans().any(|g| g == god) {
            GodStatus::Banned
        } else if record.all_picks().any(|g| g == god) {
            GodStatus::Picked
        } else {
            GodStatus::Available
        }
    }

    /// Gods still open in `record`, in catalog order.
    pub fn available<'a>(&'a self, record: &SessionRecord) -> Vec<&'a str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|god| !record.is_unavailable(god))
            .collect()
    }
}
