//! Declarative filter + sort over a catalog snapshot
//!
//! Filtering is a precedence chain, not a conjunction: once a branch applies,
//! the later branches are skipped. The same goes for the multi-filter, where
//! only the first non-empty predicate (colors, ratio, rating, formats) is used.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::color;
use crate::state::{CategoryNode, MediaRecord};

/// Sidebar-level filter
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryFilter {
    #[default]
    All,
    Favorites,
    Recent,
    Photos,
    Videos,
}

/// What the user has selected: a virtual category or a real node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Virtual(PrimaryFilter),
    Category(String),
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Virtual(PrimaryFilter::All)
    }
}

/// Toolbar filters. Only the first non-empty one is applied.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MultiFilter {
    #[serde(default)]
    pub colors: Vec<String>,
    /// Aspect ratios such as "16:9"
    #[serde(default)]
    pub ratio: Vec<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    /// Extensions without the dot
    #[serde(default)]
    pub formats: Vec<String>,
    /// Color-match precision; the catalog default is used when unset
    #[serde(default)]
    pub precision: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Date,
    Size,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A complete query over the catalog
#[derive(Debug, Clone)]
pub struct Query {
    pub filter: PrimaryFilter,
    pub selection: Selection,
    pub multi: MultiFilter,
    /// Tag search terms, all of which must match
    pub tags: Vec<String>,
    pub sort: SortKey,
    pub direction: SortDirection,
    /// Window of the Recent filter
    pub recent_days: i64,
    /// Fallback color precision when `multi.precision` is unset
    pub default_precision: f64,
    /// Reference time for the Recent filter
    pub now: DateTime<Utc>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            filter: PrimaryFilter::All,
            selection: Selection::default(),
            multi: MultiFilter::default(),
            tags: Vec::new(),
            sort: SortKey::Name,
            direction: SortDirection::Asc,
            recent_days: 7,
            default_precision: 0.8,
            now: Utc::now(),
        }
    }
}

impl Query {
    fn wants_videos(&self) -> bool {
        self.filter == PrimaryFilter::Videos
            || self.selection == Selection::Virtual(PrimaryFilter::Videos)
    }

    /// Run the query against a snapshot. Never mutates the snapshot.
    pub fn run<'a>(
        &self,
        records: &'a [MediaRecord],
        categories: &[CategoryNode],
    ) -> Vec<&'a MediaRecord> {
        // 1. Base set: everything that isn't a video
        let base: Vec<&MediaRecord> = records.iter().filter(|r| !r.is_video()).collect();

        // 2. Tag search
        let terms: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let tagged: Vec<&MediaRecord> = if terms.is_empty() {
            base.clone()
        } else {
            base.iter()
                .copied()
                .filter(|r| matches_all_terms(r, &terms))
                .collect()
        };

        // 3 - 6. First matching branch wins
        let selected: Vec<&MediaRecord> = if self.wants_videos() {
            records.iter().filter(|r| r.is_video()).collect()
        } else if self.filter == PrimaryFilter::Favorites {
            tagged.into_iter().filter(|r| r.favorite).collect()
        } else if self.filter == PrimaryFilter::Recent {
            let since = self.now - Duration::days(self.recent_days);
            base.into_iter().filter(|r| r.date_modified >= since).collect()
        } else if let Selection::Category(id) = &self.selection {
            let members: HashSet<&str> = categories
                .iter()
                .find(|c| &c.id == id)
                .map(|node| node.images.iter().map(String::as_str).collect())
                .unwrap_or_default();
            tagged
                .into_iter()
                .filter(|r| r.categories.contains(id) || members.contains(r.id.as_str()))
                .collect()
        } else {
            tagged
        };

        // 7. Multi-filter
        let mut result = self.apply_multi_filter(selected);

        // 8. Sort
        result.sort_by(|a, b| {
            let ordering = compare(self.sort, a, b);
            match self.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        result
    }

    fn apply_multi_filter<'a>(&self, records: Vec<&'a MediaRecord>) -> Vec<&'a MediaRecord> {
        let multi = &self.multi;

        if !multi.colors.is_empty() {
            let precision = multi.precision.unwrap_or(self.default_precision);
            return records
                .into_iter()
                .filter(|r| {
                    r.colors.iter().any(|have| {
                        multi
                            .colors
                            .iter()
                            .any(|want| color::is_similar(&have.color, want, precision))
                    })
                })
                .collect();
        }

        if !multi.ratio.is_empty() {
            return records
                .into_iter()
                .filter(|r| r.ratio().is_some_and(|ratio| multi.ratio.contains(&ratio)))
                .collect();
        }

        if let Some(rating) = multi.rating {
            return records.into_iter().filter(|r| r.rating == rating).collect();
        }

        if !multi.formats.is_empty() {
            return records
                .into_iter()
                .filter(|r| multi.formats.iter().any(|format| has_format(r, format)))
                .collect();
        }

        records
    }
}

/// Every term must be a substring of some tag (case-insensitive)
fn matches_all_terms(record: &MediaRecord, terms: &[String]) -> bool {
    let tags: Vec<String> = record.tags.iter().map(|t| t.to_lowercase()).collect();
    terms
        .iter()
        .all(|term| tags.iter().any(|tag| tag.contains(term.as_str())))
}

fn has_format(record: &MediaRecord, format: &str) -> bool {
    let format = format.trim_start_matches('.').to_lowercase();
    record.extension.eq_ignore_ascii_case(&format)
        || record.path.to_lowercase().ends_with(&format!(".{}", format))
}

fn compare(key: SortKey, a: &MediaRecord, b: &MediaRecord) -> Ordering {
    match key {
        SortKey::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        SortKey::Date => a.date_modified.cmp(&b.date_modified),
        SortKey::Size => a.size.cmp(&b.size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ColorInfo, MediaKind};

    fn record(id: &str) -> MediaRecord {
        let mut record = MediaRecord::new(id, format!("https://example.com/{}.jpg", id), id);
        record.extension = "jpg".to_string();
        record
    }

    fn ids(result: &[&MediaRecord]) -> Vec<String> {
        result.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_default_query_excludes_videos() {
        let mut video = record("v");
        video.kind = MediaKind::video();
        let records = vec![record("a"), video];

        let result = Query::default().run(&records, &[]);
        assert_eq!(ids(&result), vec!["a"]);
    }

    #[test]
    fn test_videos_selection_replaces_tag_search() {
        let mut video = record("v");
        video.kind = MediaKind::video();
        let mut tagged = record("a");
        tagged.tags.insert("Beach".to_string());
        let records = vec![tagged, video];

        let query = Query {
            selection: Selection::Virtual(PrimaryFilter::Videos),
            tags: vec!["beach".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&query.run(&records, &[])), vec!["v"]);
    }

    #[test]
    fn test_tag_search_is_and_across_terms() {
        let mut a = record("a");
        a.tags.extend(["Sunset".to_string(), "beach".to_string()]);
        let mut b = record("b");
        b.tags.insert("sunset".to_string());
        let records = vec![a, b];

        let query = Query {
            tags: vec!["SUN".to_string(), "bea".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&query.run(&records, &[])), vec!["a"]);
    }

    #[test]
    fn test_favorites_respects_tag_search() {
        let mut a = record("a");
        a.favorite = true;
        a.tags.insert("cat".to_string());
        let mut b = record("b");
        b.favorite = true;
        let records = vec![a, b, record("c")];

        let query = Query {
            filter: PrimaryFilter::Favorites,
            tags: vec!["cat".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&query.run(&records, &[])), vec!["a"]);
    }

    #[test]
    fn test_category_selection_uses_either_side_of_the_link() {
        let mut a = record("a");
        a.categories.insert("trips".to_string());
        let b = record("b");
        let mut node = CategoryNode::new("trips", "Trips");
        node.set_images(vec!["b".to_string()]);
        let records = vec![a, b, record("c")];

        let query = Query {
            selection: Selection::Category("trips".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&query.run(&records, &[node])), vec!["a", "b"]);
    }

    #[test]
    fn test_multi_filter_ratio_then_formats() {
        let mut wide = record("wide");
        wide.width = Some(1920);
        wide.height = Some(1080);
        let mut png = record("png");
        png.extension = "PNG".to_string();
        png.path = "https://example.com/png.PNG".to_string();
        let records = vec![wide, png];

        let query = Query {
            multi: MultiFilter {
                ratio: vec!["16:9".to_string()],
                formats: vec!["png".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        // Ratio wins, formats ignored
        assert_eq!(ids(&query.run(&records, &[])), vec!["wide"]);

        let query = Query {
            multi: MultiFilter {
                formats: vec!["png".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(ids(&query.run(&records, &[])), vec!["png"]);
    }

    #[test]
    fn test_color_filter_uses_precision() {
        let mut red = record("red");
        red.colors.push(ColorInfo {
            color: "#FE0101".to_string(),
            percentage: 0.5,
        });
        let records = vec![red, record("plain")];

        let mut query = Query {
            multi: MultiFilter {
                colors: vec!["#FF0000".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(ids(&query.run(&records, &[])), vec!["red"]);

        query.multi.colors = vec!["#0000FF".to_string()];
        assert!(query.run(&records, &[]).is_empty());
    }

    #[test]
    fn test_sort_by_name_size_and_date() {
        let mut a = record("a");
        a.name = "banana".to_string();
        a.size = 10;
        let mut b = record("b");
        b.name = "Apple".to_string();
        b.size = 30;
        b.date_modified = a.date_modified - Duration::days(1);
        let mut c = record("c");
        c.name = "cherry".to_string();
        c.size = 20;
        c.date_modified = a.date_modified + Duration::days(1);
        let records = vec![a, b, c];

        let by_name = Query::default().run(&records, &[]);
        assert_eq!(ids(&by_name), vec!["b", "a", "c"]);

        let by_size_desc = Query {
            sort: SortKey::Size,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        assert_eq!(ids(&by_size_desc.run(&records, &[])), vec!["b", "c", "a"]);

        let by_date = Query {
            sort: SortKey::Date,
            ..Default::default()
        };
        assert_eq!(ids(&by_date.run(&records, &[])), vec!["b", "a", "c"]);
    }
}
