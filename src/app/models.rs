//! Data models for Catalog Forge
//!
//! This module defines the core data structures used throughout the
//! application: content types, catalog configuration, catalog item records,
//! enrichment metadata, and the change-audit row written by the cache store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type of a catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Feature films
    Movie,
    /// Episodic series
    Series,
}

impl ContentType {
    /// Wire token used in composite ids and provider schemas (e.g., "movie")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }

    /// Title-cased label for display names (e.g., "Movie")
    pub fn label(&self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::Series => "Series",
        }
    }

    /// Parse from the wire token
    pub fn from_str_token(token: &str) -> Option<Self> {
        match token {
            "movie" => Some(Self::Movie),
            "series" => Some(Self::Series),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Filter derivation mode for a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Unique genre tags, ascending lexical order
    #[default]
    Categories,
    /// Unique release years, descending, capped
    Years,
    /// No filter options
    None,
}

/// Static description of one buildable catalog
///
/// Loaded once at process start; read-only during builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Dot-separated catalog identifier (e.g., "action.movies")
    pub name_id: String,
    /// Provider registry key this catalog is fetched from
    pub provider_id: String,
    /// Content types requested for this catalog
    pub content_types: Vec<ContentType>,
    /// Provider query schema, with `$type` substituted per content type
    pub query_schema: String,
    /// Filter derivation mode
    #[serde(default)]
    pub filter_kind: FilterKind,
    /// Explicit display name; derived from `name_id` when absent
    #[serde(default)]
    pub display_name: Option<String>,
    /// Time-to-live of a built entry
    #[serde(with = "humantime_serde", default = "default_ttl")]
    pub ttl: Duration,
    /// Number of provider pages to fetch (provider default when absent)
    #[serde(default)]
    pub page_count: Option<u32>,
    /// Rebuild even when the cached entry is still fresh
    #[serde(default)]
    pub force_update: bool,
}

fn default_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl CatalogConfig {
    /// Stable composite id for one (catalog, content type) pair
    ///
    /// Lower-cased, dot-joined: `"action.movies.movie"`.
    pub fn composite_id(&self, content_type: ContentType) -> String {
        format!("{}.{}", self.name_id.to_lowercase(), content_type.as_str())
    }
}

/// One canonical catalog item produced by a provider
///
/// Identity is `(id, content_type)`. Genres and year are filled in by the
/// enrichment merge and are immutable for the rest of the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItemRecord {
    /// Canonical external identifier (e.g., "tt0111161")
    pub id: String,
    /// Content type of this item
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Simplified genre tags
    #[serde(default)]
    pub genres: Vec<String>,
    /// Simplified release year
    #[serde(default)]
    pub year: String,
}

impl CatalogItemRecord {
    /// Create a bare record, before enrichment
    pub fn new(id: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            id: id.into(),
            content_type,
            genres: Vec::new(),
            year: String::new(),
        }
    }
}

/// Cached build output for one (catalog, content type) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCatalogEntry {
    /// Ordered item sequence, unique by (id, content_type)
    pub items: Vec<CatalogItemRecord>,
    /// Instant after which the entry is stale
    pub expires_at: DateTime<Utc>,
}

impl CachedCatalogEntry {
    /// Freshness check: an entry is fresh while `now` is strictly before
    /// `expires_at`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Enrichment payload for one canonical id
///
/// Entries grow monotonically in the `metas` table; they are overwritten,
/// never expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Canonical external identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Poster URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Long-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Simplified genre tags
    #[serde(default)]
    pub genres: Vec<String>,
    /// Simplified release year
    #[serde(default, rename = "releaseInfo")]
    pub release_info: String,
}

/// Raw detail record as returned by a provider's detail lookup
///
/// Title or poster absence means the item must be dropped by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDetailRecord {
    /// Canonical external identifier
    pub id: String,
    /// Display title, if the provider knows it
    #[serde(default)]
    pub title: Option<String>,
    /// Poster URL, if the provider knows it
    #[serde(default)]
    pub poster: Option<String>,
    /// Long-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Provider genre names, before simplification
    #[serde(default)]
    pub genres: Vec<String>,
    /// Raw release info (e.g., "2008–2013")
    #[serde(default, rename = "releaseInfo")]
    pub release_info: String,
}

impl RawDetailRecord {
    /// Whether this record is complete enough to reach a catalog
    pub fn is_servable(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
            && self.poster.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Convert into an enrichment record with simplified genres and year
    ///
    /// Returns `None` when the record is not servable.
    pub fn into_metadata(self) -> Option<MetadataRecord> {
        if !self.is_servable() {
            return None;
        }
        let mut genres: Vec<String> = self
            .genres
            .iter()
            .filter_map(|g| simplify_genre(g))
            .map(str::to_string)
            .collect();
        genres.sort();
        genres.dedup();
        Some(MetadataRecord {
            id: self.id,
            title: self.title.unwrap_or_default(),
            poster: self.poster,
            description: self.description,
            genres,
            release_info: simplify_year(&self.release_info),
        })
    }
}

/// Append-only audit row, one per confirmed cache-store write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Table the write targeted
    pub table: String,
    /// Keys present in the candidate but not the snapshot
    pub inserted_keys: Vec<String>,
    /// Keys present in both with differing values
    pub updated_keys: Vec<String>,
    /// Keys present in the snapshot but not the candidate (audit only,
    /// no physical delete)
    pub deleted_keys: Vec<String>,
    /// When the write was confirmed
    pub timestamp: DateTime<Utc>,
}

impl ChangeRecord {
    /// Whether the write carried any difference at all
    pub fn is_empty(&self) -> bool {
        self.inserted_keys.is_empty()
            && self.updated_keys.is_empty()
            && self.deleted_keys.is_empty()
    }
}

/// Map a provider genre name onto the simplified tag set
///
/// Unknown genres map to `None` and are dropped from the item.
pub fn simplify_genre(name: &str) -> Option<&'static str> {
    let tag = match name {
        "Action" | "Action & Adventure" => "Action",
        "Adventure" => "Adventure",
        "Animation" => "Animation",
        "Adult" => "Adult",
        "Comedy" => "Comedy",
        "Crime" => "Crime",
        "Documentary" | "Biography" | "War" | "War & Politics" => "Documentary",
        "Drama" | "Film-Noir" => "Drama",
        "Family" => "Family",
        "Fantasy" => "Fantasy",
        "History" => "History",
        "Horror" => "Horror",
        "Kids" => "Kids",
        "Music" | "Musical" => "Music",
        "Mystery" => "Mystery",
        "Romance" => "Romance",
        "Sci-Fi" | "Science Fiction" | "Sci-Fi & Fantasy" => "Sci-Fi",
        "Short" | "TV" => "Short",
        "Sport" => "Sport",
        "Thriller" => "Thriller",
        "Western" => "Western",
        "Reality-TV" | "TV Movie" | "Talk-Show" | "Soap" | "Reality" | "Game-Show" | "News"
        | "Talk" => "TV",
        _ => return None,
    };
    Some(tag)
}

/// Reduce a raw release-info string to its leading year
///
/// Series ranges arrive as "2008–2013" (en dash) or "2008-2013"; only the
/// first year is kept.
pub fn simplify_year(release_info: &str) -> String {
    let head = release_info
        .split(['–', '-'])
        .next()
        .unwrap_or(release_info);
    head.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_content_type_tokens() {
        assert_eq!(ContentType::Movie.as_str(), "movie");
        assert_eq!(ContentType::Series.label(), "Series");
        assert_eq!(
            ContentType::from_str_token("series"),
            Some(ContentType::Series)
        );
        assert_eq!(ContentType::from_str_token("any"), None);
    }

    #[test]
    fn test_composite_id_is_lowercase_dot_joined() {
        let config = CatalogConfig {
            name_id: "Action.Movies".to_string(),
            provider_id: "jsonapi".to_string(),
            content_types: vec![ContentType::Movie],
            query_schema: "discover/$type?sort_by=popularity.desc".to_string(),
            filter_kind: FilterKind::Categories,
            display_name: None,
            ttl: Duration::from_secs(60),
            page_count: None,
            force_update: false,
        };
        assert_eq!(config.composite_id(ContentType::Movie), "action.movies.movie");
    }

    #[test]
    fn test_freshness_boundary() {
        let now = Utc::now();
        let entry = CachedCatalogEntry {
            items: vec![],
            expires_at: now,
        };
        // now >= expires_at means stale
        assert!(!entry.is_fresh(now));
        assert!(entry.is_fresh(now - TimeDelta::seconds(1)));
        assert!(!entry.is_fresh(now + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_detail_record_without_poster_is_dropped() {
        let detail = RawDetailRecord {
            id: "tt1".to_string(),
            title: Some("Example".to_string()),
            poster: None,
            ..Default::default()
        };
        assert!(!detail.is_servable());
        assert!(detail.into_metadata().is_none());
    }

    #[test]
    fn test_detail_record_genre_simplification() {
        let detail = RawDetailRecord {
            id: "tt1".to_string(),
            title: Some("Example".to_string()),
            poster: Some("http://img/p.jpg".to_string()),
            genres: vec![
                "Science Fiction".to_string(),
                "Sci-Fi".to_string(),
                "Mockumentary".to_string(),
            ],
            release_info: "2008–2013".to_string(),
            ..Default::default()
        };
        let meta = detail.into_metadata().unwrap();
        assert_eq!(meta.genres, vec!["Sci-Fi".to_string()]);
        assert_eq!(meta.release_info, "2008");
    }

    #[test]
    fn test_simplify_year_variants() {
        assert_eq!(simplify_year("2020"), "2020");
        assert_eq!(simplify_year("1999–2004"), "1999");
        assert_eq!(simplify_year("1999-2004"), "1999");
        assert_eq!(simplify_year(""), "");
    }

    #[test]
    fn test_catalog_config_toml_round_trip() {
        let toml_src = r#"
            name_id = "action.movies"
            provider_id = "jsonapi"
            content_types = ["movie", "series"]
            query_schema = "discover/$type?with_genres=28"
            filter_kind = "years"
            ttl = "1day"
            page_count = 3
        "#;
        let config: CatalogConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.name_id, "action.movies");
        assert_eq!(config.filter_kind, FilterKind::Years);
        assert_eq!(config.ttl, Duration::from_secs(86400));
        assert_eq!(config.page_count, Some(3));
        assert!(!config.force_update);
    }

    #[test]
    fn test_change_record_empty() {
        let record = ChangeRecord {
            table: "metas".to_string(),
            inserted_keys: vec![],
            updated_keys: vec![],
            deleted_keys: vec![],
            timestamp: Utc::now(),
        };
        assert!(record.is_empty());
    }
}
