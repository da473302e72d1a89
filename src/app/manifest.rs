//! Manifest fragment and document assembly
//!
//! Derives the servable catalog descriptor for one built item set: filter
//! options according to the catalog's filter kind, a display name derived
//! from the dot-separated name id (or an explicit display name plus the
//! content-type label), and the fixed pagination extras. Fragments aggregate
//! into the addon-level manifest document persisted as the `manifest`
//! singleton.

use serde::{Deserialize, Serialize};

use crate::app::models::{CatalogConfig, CatalogItemRecord, ContentType, FilterKind};
use crate::constants::{addon, catalog};

/// One advertised extra field on a catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraField {
    /// Extra name ("genre" or "skip")
    pub name: String,
    /// Filter options, present for the genre extra only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Servable catalog descriptor derived from a built item set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFragment {
    /// Stable composite id (`"{name_id}.{type}"`, lower-cased)
    pub id: String,
    /// Display name
    pub name: String,
    /// Category label shown as the catalog's type
    #[serde(rename = "type")]
    pub category: String,
    /// Advertised extras: the genre filter with its options, and skip
    pub extra: Vec<ExtraField>,
    /// Names of the extras this catalog supports
    #[serde(rename = "extraSupported")]
    pub extra_supported: Vec<String>,
}

/// Addon-level manifest document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDocument {
    /// Stable addon identifier
    pub id: String,
    /// Addon version
    pub version: String,
    /// Addon display name
    pub name: String,
    /// Addon description
    pub description: String,
    /// Id prefixes served by this addon
    #[serde(rename = "idPrefixes")]
    pub id_prefixes: Vec<String>,
    /// Supported resources
    pub resources: Vec<String>,
    /// Supported content types
    pub types: Vec<String>,
    /// Catalog fragments, in build order
    pub catalogs: Vec<ManifestFragment>,
}

impl ManifestDocument {
    /// Assemble the manifest document around the built fragments
    pub fn assemble(catalogs: Vec<ManifestFragment>) -> Self {
        Self {
            id: addon::ID.to_string(),
            version: addon::VERSION.to_string(),
            name: addon::NAME.to_string(),
            description: addon::DESCRIPTION.to_string(),
            id_prefixes: vec![addon::ID_PREFIX.to_string()],
            resources: vec!["catalog".to_string(), "meta".to_string()],
            types: vec![
                ContentType::Series.as_str().to_string(),
                ContentType::Movie.as_str().to_string(),
            ],
            catalogs,
        }
    }
}

/// Derives manifest fragments from built item sets
#[derive(Debug, Default)]
pub struct ManifestAssembler;

impl ManifestAssembler {
    /// Assemble the fragment for one (config, content type) item set
    pub fn assemble(
        config: &CatalogConfig,
        content_type: ContentType,
        items: &[CatalogItemRecord],
    ) -> ManifestFragment {
        let options = Self::filter_options(config.filter_kind, items);
        let (name, category) = Self::derive_naming(config, content_type);

        ManifestFragment {
            id: config.composite_id(content_type),
            name,
            category,
            extra: vec![
                ExtraField {
                    name: "genre".to_string(),
                    options: Some(options),
                },
                ExtraField {
                    name: "skip".to_string(),
                    options: None,
                },
            ],
            extra_supported: vec!["genre".to_string(), "skip".to_string()],
        }
    }

    /// Derive the filter option list for one item set
    ///
    /// Categories: unique genre tags, ascending. Years: unique years,
    /// descending, truncated to at most 15. None: empty.
    pub fn filter_options(filter_kind: FilterKind, items: &[CatalogItemRecord]) -> Vec<String> {
        let mut unique: Vec<String> = match filter_kind {
            FilterKind::Categories => {
                let mut genres: Vec<String> =
                    items.iter().flat_map(|i| i.genres.iter().cloned()).collect();
                genres.sort();
                genres.dedup();
                genres
            }
            FilterKind::Years => {
                let mut years: Vec<String> = items
                    .iter()
                    .filter(|i| !i.year.is_empty())
                    .map(|i| i.year.clone())
                    .collect();
                years.sort();
                years.dedup();
                years.reverse();
                years
            }
            FilterKind::None => Vec::new(),
        };

        if filter_kind == FilterKind::Years {
            unique.truncate(catalog::MAX_YEAR_FILTERS);
        }
        unique
    }

    /// Derive (display name, category label) from the config's name id
    ///
    /// Multi-segment ids use the first segment as the category and the rest,
    /// with the content-type token appended, as the title-cased name; an
    /// explicit display name instead gets the content-type label appended.
    /// Single-segment ids use the content type itself as the category.
    fn derive_naming(config: &CatalogConfig, content_type: ContentType) -> (String, String) {
        let segments: Vec<&str> = config.name_id.split('.').collect();

        if segments.len() > 1 {
            let category = title_case(segments[0]);
            let name = match &config.display_name {
                Some(display) => format!("{} {}", display, plural_label(content_type)),
                None => {
                    let base = config
                        .name_id
                        .strip_prefix(&format!("{}.", segments[0]))
                        .unwrap_or(&config.name_id);
                    title_case(&format!("{}.{}", base, plural_token(content_type)))
                }
            };
            (name, category)
        } else {
            let category = content_type.as_str().to_string();
            let name = config
                .display_name
                .clone()
                .unwrap_or_else(|| title_case(segments[0]));
            (name, category)
        }
    }
}

/// Plural wire token for name derivation ("movies"/"series")
fn plural_token(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Movie => "movies",
        ContentType::Series => "series",
    }
}

/// Plural display label ("Movies"/"Series")
fn plural_label(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Movie => "Movies",
        ContentType::Series => "Series",
    }
}

/// Title-case a name-id fragment: `_` and `.` become spaces, each word
/// capitalized
fn title_case(fragment: &str) -> String {
    fragment
        .replace(['_', '.'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Short md5-derived catalog id used by the web configuration surface
pub fn short_id(composite_id: &str) -> String {
    let digest = md5::compute(composite_id.as_bytes());
    format!("{digest:x}")[..catalog::SHORT_ID_LEN].to_string()
}
