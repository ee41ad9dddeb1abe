//! Scripted in-memory library used by the unit tests

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::UiSelectors;
use crate::error::Result;
use crate::session::{class_selector, BrowserSession};

const ROW_HEIGHT: u64 = 10;

struct MockFolder {
    breadcrumb_path: String,
    labels: Vec<String>,
    heights: Option<Vec<u64>>,
    container_hidden: bool,
}

/// Virtualized library listing
///
/// A page shows `window` rows; each scroll step loads `step` more rows and
/// slides the window to the newest ones. The scroll height is the loaded
/// row count times a fixed row height unless a height sequence (indexed by
/// scroll steps on the current page) overrides it.
pub struct MockLibrary {
    origin: String,
    selectors: UiSelectors,
    folders: HashMap<String, MockFolder>,
    current: Option<String>,
    page_scrolls: usize,
    window: usize,
    step: usize,
    scrolls: usize,
    screenshots: usize,
    navigations: Vec<String>,
}

impl MockLibrary {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            selectors: UiSelectors::default(),
            folders: HashMap::new(),
            current: None,
            page_scrolls: 0,
            window: 50,
            step: 10,
            scrolls: 0,
            screenshots: 0,
            navigations: Vec::new(),
        }
    }

    pub fn add_folder(&mut self, listing_url: &str, breadcrumb_path: &str, labels: &[&str]) {
        self.folders.insert(
            listing_url.to_string(),
            MockFolder {
                breadcrumb_path: breadcrumb_path.to_string(),
                labels: labels.iter().map(|l| l.to_string()).collect(),
                heights: None,
                container_hidden: false,
            },
        );
    }

    pub fn set_window(&mut self, window: usize, step: usize) {
        self.window = window;
        self.step = step;
    }

    pub fn set_heights(&mut self, listing_url: &str, heights: &[u64]) {
        if let Some(folder) = self.folders.get_mut(listing_url) {
            folder.heights = Some(heights.to_vec());
        }
    }

    pub fn hide_container(&mut self, listing_url: &str) {
        if let Some(folder) = self.folders.get_mut(listing_url) {
            folder.container_hidden = true;
        }
    }

    /// Load a page without going through the async trait
    pub fn navigate_now(&mut self, url: &str) {
        self.navigations.push(url.to_string());
        self.current = self.folders.contains_key(url).then(|| url.to_string());
        self.page_scrolls = 0;
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls
    }

    pub fn screenshots(&self) -> usize {
        self.screenshots
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    fn page(&self) -> Option<&MockFolder> {
        self.current.as_ref().and_then(|url| self.folders.get(url))
    }

    fn loaded(&self, folder: &MockFolder) -> usize {
        folder
            .labels
            .len()
            .min(self.window + self.page_scrolls * self.step)
    }

    fn visible(&self) -> Vec<String> {
        match self.page() {
            Some(folder) => {
                let loaded = self.loaded(folder);
                folder.labels[loaded.saturating_sub(self.window)..loaded].to_vec()
            }
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl BrowserSession for MockLibrary {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.navigate_now(url);
        Ok(())
    }

    async fn element_present(&mut self, selector: &str) -> Result<bool> {
        let Some(folder) = self.page() else {
            return Ok(false);
        };
        if selector == class_selector(&self.selectors.scroll_container_class) {
            Ok(!folder.container_hidden)
        } else if selector == class_selector(&self.selectors.breadcrumb_class) {
            Ok(true)
        } else if selector == self.selectors.row_selector {
            Ok(!self.visible().is_empty())
        } else {
            Ok(false)
        }
    }

    async fn attribute(&mut self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let Some(folder) = self.page() else {
            return Ok(None);
        };
        if selector == class_selector(&self.selectors.breadcrumb_class)
            && attribute == self.selectors.breadcrumb_attribute
        {
            let segments = vec![None, Some(folder.breadcrumb_path.clone())];
            return Ok(Some(serde_json::to_string(&segments)?));
        }
        Ok(None)
    }

    async fn attribute_all(
        &mut self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>> {
        if selector == self.selectors.row_selector && attribute == self.selectors.label_attribute {
            return Ok(self.visible().into_iter().map(Some).collect());
        }
        Ok(Vec::new())
    }

    async fn scroll_height(&mut self, _class_name: &str) -> Result<u64> {
        let Some(folder) = self.page() else {
            return Ok(0);
        };
        match &folder.heights {
            Some(heights) if !heights.is_empty() => {
                Ok(heights[self.page_scrolls.min(heights.len() - 1)])
            }
            _ => Ok(self.loaded(folder) as u64 * ROW_HEIGHT),
        }
    }

    async fn scroll_by(&mut self, _class_name: &str, _delta: f64) -> Result<()> {
        self.scrolls += 1;
        self.page_scrolls += 1;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.screenshots += 1;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    fn identifier(&self) -> String {
        format!("mock://{}", self.origin)
    }
}
