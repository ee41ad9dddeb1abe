//! Page materialization
//!
//! Turns the currently loaded listing page into the complete, deduplicated
//! set of a folder's direct children, driving the scroll strategy that fits
//! what the parent listing declared about the folder.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use crate::config::{ScrollSettings, UiSelectors};
use crate::error::{FlattenError, Result};
use crate::label::parse_label;
use crate::scroll::{ScrollDriver, ScrollStrategy};
use crate::session::{class_selector, BrowserSession};
use crate::types::Item;

/// Folder whose listing is currently displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// URL the listing was navigated to
    pub listing_url: String,
    /// Canonical folder URL child URLs are derived from
    pub base_url: String,
    /// Depth of the folder itself
    pub depth: usize,
}

/// Running set of children collected across scroll passes, keyed by URL
///
/// Rows keep the position they were first seen at; a later pass that renders
/// the same URL again replaces the stored item in place.
#[derive(Debug, Default)]
pub struct ChildSet {
    items: Vec<Item>,
    index: HashMap<String, usize>,
}

impl ChildSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one pass of rows, returning how many URLs were new
    pub fn merge(&mut self, rows: impl IntoIterator<Item = Item>) -> usize {
        let mut added = 0;
        for row in rows {
            match self.index.get(&row.url) {
                Some(&pos) => self.items[pos] = row,
                None => {
                    self.index.insert(row.url.clone(), self.items.len());
                    self.items.push(row);
                    added += 1;
                }
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

/// Parse every row currently rendered on the page
pub async fn harvest_rows<S>(
    session: &mut S,
    selectors: &UiSelectors,
    page: &PageContext,
) -> Result<Vec<Item>>
where
    S: BrowserSession + ?Sized,
{
    let labels = session
        .attribute_all(&selectors.row_selector, &selectors.label_attribute)
        .await?;

    labels
        .into_iter()
        .map(|label| {
            let label = label.ok_or_else(|| FlattenError::Parse {
                label: String::new(),
                reason: format!("row without {} attribute", selectors.label_attribute),
            })?;
            let row = parse_label(&label)?;
            Ok(Item::child(
                &page.base_url,
                row.name,
                row.kind,
                row.expected_count,
                page.depth,
            ))
        })
        .collect()
}

/// Pin the canonical URL of the displayed folder from its breadcrumb
///
/// The breadcrumb attribute holds a JSON array of path segments, some of
/// them `null`; the last usable one is the folder's server-relative path.
pub async fn resolve_base_url<S>(
    session: &mut S,
    selectors: &UiSelectors,
    origin: &Url,
    timeout: Duration,
) -> Result<String>
where
    S: BrowserSession + ?Sized,
{
    let selector = class_selector(&selectors.breadcrumb_class);
    session.wait_for_element(&selector, timeout).await?;

    let raw = session
        .attribute(&selector, &selectors.breadcrumb_attribute)
        .await?
        .ok_or_else(|| FlattenError::BaseUrlResolution {
            message: format!("breadcrumb has no {} attribute", selectors.breadcrumb_attribute),
        })?;

    base_url_from_breadcrumb(origin, &raw)
}

fn base_url_from_breadcrumb(origin: &Url, raw: &str) -> Result<String> {
    let segments: Vec<Option<String>> =
        serde_json::from_str(raw).map_err(|e| FlattenError::BaseUrlResolution {
            message: format!("unreadable breadcrumb '{}': {}", raw, e),
        })?;

    let path = segments
        .iter()
        .rev()
        .flatten()
        .map(|s| s.trim_start_matches('/'))
        .find(|s| !s.is_empty())
        .ok_or_else(|| FlattenError::BaseUrlResolution {
            message: "no path items found".to_string(),
        })?;

    Ok(format!("{}/{}", origin.origin().ascii_serialization(), path))
}

/// Fully enumerates the direct children of one folder
pub struct Materializer<'a> {
    selectors: &'a UiSelectors,
    scroll: &'a ScrollSettings,
    origin: &'a Url,
    wait_timeout: Duration,
}

impl<'a> Materializer<'a> {
    pub fn new(
        selectors: &'a UiSelectors,
        scroll: &'a ScrollSettings,
        origin: &'a Url,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            selectors,
            scroll,
            origin,
            wait_timeout,
        }
    }

    /// Enumerate the folder currently displayed by the session
    ///
    /// `expected_count` is what the parent listing declared for this folder;
    /// it decides between the count-based and height-based scroll strategy.
    pub async fn materialize<S>(
        &self,
        session: &mut S,
        listing_url: &str,
        depth: usize,
        expected_count: Option<usize>,
    ) -> Result<Vec<Item>>
    where
        S: BrowserSession + ?Sized,
    {
        let container = class_selector(&self.selectors.scroll_container_class);
        session.wait_for_element(&container, self.wait_timeout).await?;

        let base_url =
            resolve_base_url(session, self.selectors, self.origin, self.wait_timeout).await?;
        let page = PageContext {
            listing_url: listing_url.to_string(),
            base_url,
            depth,
        };
        debug!(url = %page.listing_url, base = %page.base_url, "Resolved folder base url");

        let mut children = ChildSet::new();
        let driver = ScrollDriver::new(self.scroll, self.selectors);
        driver
            .drive(
                session,
                ScrollStrategy::for_expected(expected_count),
                &page,
                &mut children,
            )
            .await?;

        Ok(children.into_items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLibrary;
    use crate::types::ItemKind;

    fn origin() -> Url {
        Url::parse("https://contoso.sharepoint.com/sites/team?id=1").unwrap()
    }

    fn row(name: &str) -> Item {
        Item::child("https://host/a", name.to_string(), ItemKind::File, None, 0)
    }

    #[test]
    fn test_child_set_dedup() {
        let mut set = ChildSet::new();
        assert_eq!(set.merge(vec![row("a"), row("b"), row("c")]), 3);
        assert_eq!(set.merge(vec![row("b"), row("c"), row("d")]), 1);
        assert_eq!(set.merge(vec![row("a")]), 0);

        let names: Vec<_> = set.into_items().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_child_set_later_pass_replaces_item() {
        let mut set = ChildSet::new();
        set.merge(vec![row("a")]);
        let mut updated = row("a");
        updated.expected_count = Some(7);
        set.merge(vec![updated]);

        let items = set.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].expected_count, Some(7));
    }

    #[test]
    fn test_breadcrumb_uses_last_usable_segment() {
        let raw = r#"[null, "sites/team/Shared Documents", "/sites/team/Shared Documents/2024", null, ""]"#;
        assert_eq!(
            base_url_from_breadcrumb(&origin(), raw).unwrap(),
            "https://contoso.sharepoint.com/sites/team/Shared Documents/2024"
        );
    }

    #[test]
    fn test_breadcrumb_without_path_fails() {
        for raw in ["[null, null]", "[]", "not json"] {
            assert!(matches!(
                base_url_from_breadcrumb(&origin(), raw),
                Err(FlattenError::BaseUrlResolution { .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_harvest_derives_urls_from_base() {
        let mut library = MockLibrary::new("https://host");
        library.add_folder(
            "https://host/start",
            "sites/docs",
            &["Plan.docx, File", "Archive, Folder, Folder has 2 items"],
        );
        library.navigate_now("https://host/start");

        let page = PageContext {
            listing_url: "https://host/start".to_string(),
            base_url: "https://host/sites/docs".to_string(),
            depth: 1,
        };
        let rows = harvest_rows(&mut library, &UiSelectors::default(), &page)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].url, "https://host/sites/docs/Plan.docx");
        assert_eq!(rows[1].kind, ItemKind::Folder);
        assert_eq!(rows[1].expected_count, Some(2));
        assert!(rows.iter().all(|r| r.depth == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_materialize_pins_base_from_breadcrumb() {
        let mut library = MockLibrary::new("https://host");
        library.add_folder(
            "https://host/start?view=all",
            "sites/docs/Shared Documents",
            &["a.txt, File", "b.txt, File"],
        );
        library.navigate_now("https://host/start?view=all");

        let selectors = UiSelectors::default();
        let scroll = ScrollSettings::default();
        let origin = Url::parse("https://host/start?view=all").unwrap();
        let materializer = Materializer::new(&selectors, &scroll, &origin, Duration::from_secs(5));

        let items = materializer
            .materialize(&mut library, "https://host/start?view=all", 0, None)
            .await
            .unwrap();
        let urls: Vec<_> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://host/sites/docs/Shared Documents/a.txt",
                "https://host/sites/docs/Shared Documents/b.txt",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_materialize_times_out_without_container() {
        let mut library = MockLibrary::new("https://host");
        library.add_folder("https://host/start", "sites/docs", &["a.txt, File"]);
        library.hide_container("https://host/start");
        library.navigate_now("https://host/start");

        let selectors = UiSelectors::default();
        let scroll = ScrollSettings::default();
        let origin = Url::parse("https://host/start").unwrap();
        let materializer = Materializer::new(&selectors, &scroll, &origin, Duration::from_secs(3));

        let result = materializer
            .materialize(&mut library, "https://host/start", 0, None)
            .await;
        match result {
            Err(FlattenError::Timeout { selector, .. }) => {
                assert_eq!(selector, ".od-ItemsScopeItemContent-list")
            }
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_row_is_fatal() {
        let mut library = MockLibrary::new("https://host");
        library.add_folder(
            "https://host/start",
            "sites/docs",
            &["a.txt, File", "Broken, Folder"],
        );
        library.navigate_now("https://host/start");

        let selectors = UiSelectors::default();
        let scroll = ScrollSettings::default();
        let origin = Url::parse("https://host/start").unwrap();
        let materializer = Materializer::new(&selectors, &scroll, &origin, Duration::from_secs(3));

        assert!(matches!(
            materializer
                .materialize(&mut library, "https://host/start", 0, Some(2))
                .await,
            Err(FlattenError::Parse { .. })
        ));
    }
}
