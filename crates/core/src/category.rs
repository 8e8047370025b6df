//! Canonical categories and per-site category mapping.
//!
//! Callers speak the canonical (torznab) category ids; each site has its own
//! local ids. A [`CategoryMapping`] translates between the two.

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

pub const CONSOLE: i64 = 1000;
pub const MOVIES: i64 = 2000;
pub const MOVIES_SD: i64 = 2030;
pub const MOVIES_HD: i64 = 2040;
pub const AUDIO: i64 = 3000;
pub const PC: i64 = 4000;
pub const TV: i64 = 5000;
pub const TV_SD: i64 = 5030;
pub const TV_HD: i64 = 5040;
pub const XXX: i64 = 6000;
pub const BOOKS: i64 = 7000;
pub const OTHER: i64 = 8000;

/// The standard canonical category table.
const STANDARD: &[(i64, &str)] = &[
    (1000, "Console"),
    (1010, "Console/NDS"),
    (1020, "Console/PSP"),
    (1030, "Console/Wii"),
    (1040, "Console/XBox"),
    (1050, "Console/XBox 360"),
    (1060, "Console/Wiiware"),
    (1070, "Console/XBox 360 DLC"),
    (1080, "Console/PS3"),
    (1090, "Console/Other"),
    (1110, "Console/3DS"),
    (1120, "Console/PS Vita"),
    (1130, "Console/WiiU"),
    (1140, "Console/XBox One"),
    (1180, "Console/PS4"),
    (2000, "Movies"),
    (2010, "Movies/Foreign"),
    (2020, "Movies/Other"),
    (2030, "Movies/SD"),
    (2040, "Movies/HD"),
    (2050, "Movies/3D"),
    (2060, "Movies/BluRay"),
    (2070, "Movies/DVD"),
    (2080, "Movies/WEBDL"),
    (3000, "Audio"),
    (3010, "Audio/MP3"),
    (3020, "Audio/Video"),
    (3030, "Audio/Audiobook"),
    (3040, "Audio/Lossless"),
    (3050, "Audio/Other"),
    (3060, "Audio/Foreign"),
    (4000, "PC"),
    (4010, "PC/0day"),
    (4020, "PC/ISO"),
    (4030, "PC/Mac"),
    (4040, "PC/Phone-Other"),
    (4050, "PC/Games"),
    (4060, "PC/Phone-IOS"),
    (4070, "PC/Phone-Android"),
    (5000, "TV"),
    (5020, "TV/Foreign"),
    (5030, "TV/SD"),
    (5040, "TV/HD"),
    (5050, "TV/Other"),
    (5060, "TV/Sport"),
    (5070, "TV/Anime"),
    (5080, "TV/Documentary"),
    (6000, "XXX"),
    (6010, "XXX/DVD"),
    (6020, "XXX/WMV"),
    (6030, "XXX/XviD"),
    (6040, "XXX/x264"),
    (6050, "XXX/Other"),
    (6060, "XXX/Imageset"),
    (6070, "XXX/Packs"),
    (7000, "Books"),
    (7010, "Books/Magazines"),
    (7020, "Books/Ebook"),
    (7030, "Books/Comics"),
    (8000, "Other"),
    (8010, "Other/Misc"),
];

/// A canonical category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl Category {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Look up a standard category by id.
    pub fn standard(id: i64) -> Option<Self> {
        STANDARD
            .iter()
            .find(|(std_id, _)| *std_id == id)
            .map(|(id, name)| Self::new(*id, *name))
    }

    /// Look up a standard category by name, ignoring ASCII case.
    pub fn standard_by_name(name: &str) -> Option<Self> {
        STANDARD
            .iter()
            .find(|(_, std_name)| std_name.eq_ignore_ascii_case(name))
            .map(|(id, name)| Self::new(*id, *name))
    }
}

/// One row of a site's mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryMapEntry {
    /// Site-local category id.
    pub local: i64,
    /// Canonical category the local id belongs to.
    pub category: Category,
}

/// Canonical reference as written in a definition: a name or a numeric id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Id(i64),
    Name(String),
}

/// A mapping entry as written in a definition.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCategoryMapping {
    pub id: i64,
    pub cat: CategoryRef,
}

/// Bidirectional local <-> canonical category table for one site.
///
/// Read-only once built; safe to share between concurrent operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RawCategoryMapping>")]
pub struct CategoryMapping {
    entries: Vec<CategoryMapEntry>,
}

impl TryFrom<Vec<RawCategoryMapping>> for CategoryMapping {
    type Error = DefinitionError;

    fn try_from(raw: Vec<RawCategoryMapping>) -> Result<Self, Self::Error> {
        let entries = raw
            .into_iter()
            .map(|r| {
                let category = match r.cat {
                    CategoryRef::Id(id) => {
                        Category::standard(id).unwrap_or_else(|| Category::new(id, id.to_string()))
                    }
                    CategoryRef::Name(name) => Category::standard_by_name(&name)
                        .ok_or(DefinitionError::UnknownCategory(name))?,
                };
                Ok(CategoryMapEntry {
                    local: r.id,
                    category,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;

        Ok(Self { entries })
    }
}

impl CategoryMapping {
    /// Build a mapping from `(canonical id, local id)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(canonical, local)| CategoryMapEntry {
                local,
                category: Category::standard(canonical)
                    .unwrap_or_else(|| Category::new(canonical, canonical.to_string())),
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forward lookup: the canonical category for a site-local id.
    pub fn resolve(&self, local: i64) -> Option<&Category> {
        self.entries
            .iter()
            .find(|e| e.local == local)
            .map(|e| &e.category)
    }

    /// Reverse lookup: distinct local ids for the given canonical ids, in
    /// first-seen order. Canonical ids the site has no mapping for are dropped.
    pub fn reverse_map(&self, canonical: &[i64]) -> Vec<i64> {
        let mut locals = Vec::new();
        for id in canonical {
            for entry in self.entries.iter().filter(|e| e.category.id == *id) {
                if !locals.contains(&entry.local) {
                    locals.push(entry.local);
                }
            }
        }
        locals
    }

    /// Distinct canonical categories this site exposes, in table order.
    pub fn categories(&self) -> Vec<&Category> {
        let mut seen: Vec<&Category> = Vec::new();
        for entry in &self.entries {
            if !seen.iter().any(|c| c.id == entry.category.id) {
                seen.push(&entry.category);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv_mapping() -> CategoryMapping {
        CategoryMapping::from_pairs([(TV_SD, 7), (TV_HD, 7), (MOVIES_HD, 12), (AUDIO, 3)])
    }

    #[test]
    fn test_standard_lookup() {
        assert_eq!(Category::standard(TV_HD).unwrap().name, "TV/HD");
        assert_eq!(Category::standard_by_name("movies/hd").unwrap().id, 2040);
        assert!(Category::standard(4242).is_none());
    }

    #[test]
    fn test_forward_lookup() {
        let mapping = tv_mapping();
        assert_eq!(mapping.resolve(12).unwrap().id, MOVIES_HD);
        assert_eq!(mapping.resolve(7).unwrap().id, TV_SD);
        assert!(mapping.resolve(99).is_none());
    }

    #[test]
    fn test_reverse_map_deduplicates() {
        let mapping = tv_mapping();
        assert_eq!(mapping.reverse_map(&[TV_SD, TV_HD]), vec![7]);
    }

    #[test]
    fn test_reverse_map_first_seen_order() {
        let mapping = tv_mapping();
        assert_eq!(mapping.reverse_map(&[AUDIO, MOVIES_HD, TV_HD]), vec![3, 12, 7]);
    }

    #[test]
    fn test_reverse_map_drops_unmapped() {
        let mapping = tv_mapping();
        assert!(mapping.reverse_map(&[BOOKS]).is_empty());
        assert_eq!(mapping.reverse_map(&[BOOKS, AUDIO]), vec![3]);
    }

    #[test]
    fn test_round_trip() {
        let mapping = CategoryMapping::from_pairs([(MOVIES_HD, 12)]);
        assert_eq!(mapping.resolve(12).unwrap().id, MOVIES_HD);
        assert_eq!(mapping.reverse_map(&[MOVIES_HD]), vec![12]);
    }

    #[test]
    fn test_deserialize_names_and_ids() {
        let json = r#"[
            {"id": 1, "cat": "TV/HD"},
            {"id": 2, "cat": 2040},
            {"id": 3, "cat": 9999}
        ]"#;
        let mapping: CategoryMapping = serde_json::from_str(json).unwrap();

        assert_eq!(mapping.resolve(1).unwrap().id, TV_HD);
        assert_eq!(mapping.resolve(2).unwrap().name, "Movies/HD");
        assert_eq!(mapping.resolve(3).unwrap().name, "9999");
    }

    #[test]
    fn test_deserialize_unknown_name_fails() {
        let json = r#"[{"id": 1, "cat": "Knitting"}]"#;
        let result: Result<CategoryMapping, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_categories_distinct() {
        let mapping = tv_mapping();
        let ids: Vec<_> = mapping.categories().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![TV_SD, TV_HD, MOVIES_HD, AUDIO]);
    }
}
