use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{FlattenError, Result};

/// First delay between two polls of a page condition
pub const INITIAL_POLL_DELAY: Duration = Duration::from_millis(50);

/// Longest delay between two polls of a page condition
pub const MAX_POLL_DELAY: Duration = Duration::from_secs(1);

/// Controllable browser session the discovery stage drives
///
/// A session is a single stateful resource: navigation and scrolling mutate
/// the page every other call observes. Every operation therefore takes
/// `&mut self`, and callers hand the one session down by reference.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load a URL and wait for the navigation to finish
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Whether at least one element matches a CSS selector
    async fn element_present(&mut self, selector: &str) -> Result<bool>;

    /// Attribute of the first element matching a selector
    ///
    /// `None` when there is no such element or it lacks the attribute.
    async fn attribute(&mut self, selector: &str, attribute: &str) -> Result<Option<String>>;

    /// Attribute of every element matching a selector, in document order
    async fn attribute_all(&mut self, selector: &str, attribute: &str)
        -> Result<Vec<Option<String>>>;

    /// Scrollable height of the first element with the given class
    async fn scroll_height(&mut self, class_name: &str) -> Result<u64>;

    /// Scroll the nearest scrollable ancestor of the element with the given class
    async fn scroll_by(&mut self, class_name: &str, delta: f64) -> Result<()>;

    /// PNG capture of the current viewport
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    /// Get a human-readable identifier for this session (for logging/debugging)
    fn identifier(&self) -> String;

    /// Wait until an element matching the selector is present
    ///
    /// Polls with exponential backoff and fails with `FlattenError::Timeout`
    /// once `timeout` has elapsed.
    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut delay = INITIAL_POLL_DELAY;

        loop {
            if self.element_present(selector).await? {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(FlattenError::Timeout {
                    selector: selector.to_string(),
                    waited: timeout,
                });
            }

            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = (delay * 2).min(MAX_POLL_DELAY);
        }
    }
}

/// CSS selector for an element carrying the given class
pub fn class_selector(class_name: &str) -> String {
    format!(".{}", class_name)
}
