//! Scroll Driver
//!
//! The library list is virtualized: only a window of rows is in the DOM at
//! any time and more appear as the container scrolls. The driver scrolls one
//! step at a time and re-harvests the whole rendered window after each step,
//! since rows may have been replaced rather than appended.

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::{ScrollSettings, UiSelectors};
use crate::error::{FlattenError, Result};
use crate::materialize::{harvest_rows, ChildSet, PageContext};
use crate::session::{BrowserSession, INITIAL_POLL_DELAY, MAX_POLL_DELAY};

/// How the end of a listing is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStrategy {
    /// Stop once this many distinct rows have been seen
    CountBased { expected: usize },
    /// Stop once the scroll height no longer grows
    HeightBased,
}

impl ScrollStrategy {
    pub fn for_expected(expected_count: Option<usize>) -> Self {
        match expected_count {
            Some(expected) => ScrollStrategy::CountBased { expected },
            None => ScrollStrategy::HeightBased,
        }
    }
}

/// Summary of one driven listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub strategy: ScrollStrategy,
    /// Scroll steps performed
    pub iterations: usize,
    /// Distinct rows collected
    pub rows: usize,
}

pub struct ScrollDriver<'a> {
    settings: &'a ScrollSettings,
    selectors: &'a UiSelectors,
}

impl<'a> ScrollDriver<'a> {
    pub fn new(settings: &'a ScrollSettings, selectors: &'a UiSelectors) -> Self {
        Self {
            settings,
            selectors,
        }
    }

    /// Scroll the displayed listing until the strategy reports completion,
    /// merging every harvested row into `rows`
    pub async fn drive<S>(
        &self,
        session: &mut S,
        strategy: ScrollStrategy,
        page: &PageContext,
        rows: &mut ChildSet,
    ) -> Result<ScrollOutcome>
    where
        S: BrowserSession + ?Sized,
    {
        rows.merge(harvest_rows(session, self.selectors, page).await?);

        let iterations = match strategy {
            ScrollStrategy::CountBased { expected } => {
                self.until_count(session, expected, page, rows).await?
            }
            ScrollStrategy::HeightBased => self.until_stable_height(session, page, rows).await?,
        };

        debug!(
            url = %page.listing_url,
            iterations,
            rows = rows.len(),
            "Listing fully rendered"
        );
        Ok(ScrollOutcome {
            strategy,
            iterations,
            rows: rows.len(),
        })
    }

    async fn until_count<S>(
        &self,
        session: &mut S,
        expected: usize,
        page: &PageContext,
        rows: &mut ChildSet,
    ) -> Result<usize>
    where
        S: BrowserSession + ?Sized,
    {
        let container = &self.selectors.scroll_container_class;
        let mut iterations = 0;
        let mut stalled = 0;

        while rows.len() < expected {
            if iterations >= self.settings.max_iterations {
                warn!(url = %page.listing_url, iterations, "Scroll ceiling reached");
                return Err(incomplete(page, expected, rows));
            }

            let before = session.scroll_height(container).await?;
            session.scroll_by(container, self.settings.delta).await?;
            sleep(self.settings.count_wait).await;
            self.save_debug_screenshot(session).await?;

            let added = rows.merge(harvest_rows(session, self.selectors, page).await?);
            let after = session.scroll_height(container).await?;
            iterations += 1;

            if added == 0 && after == before {
                stalled += 1;
                if stalled >= self.settings.stall_limit {
                    warn!(
                        url = %page.listing_url,
                        expected,
                        found = rows.len(),
                        "Listing ended before its declared item count"
                    );
                    return Err(incomplete(page, expected, rows));
                }
            } else {
                stalled = 0;
            }

            debug!(iterations, found = rows.len(), expected, height = after, "Scrolled");
        }

        Ok(iterations)
    }

    async fn until_stable_height<S>(
        &self,
        session: &mut S,
        page: &PageContext,
        rows: &mut ChildSet,
    ) -> Result<usize>
    where
        S: BrowserSession + ?Sized,
    {
        let container = &self.selectors.scroll_container_class;
        let mut iterations = 0;

        loop {
            if iterations >= self.settings.max_iterations {
                return Err(FlattenError::ScrollLimit {
                    url: page.listing_url.clone(),
                    iterations,
                });
            }

            let before = session.scroll_height(container).await?;
            session.scroll_by(container, self.settings.delta).await?;
            self.settle(session, before).await?;
            self.save_debug_screenshot(session).await?;

            rows.merge(harvest_rows(session, self.selectors, page).await?);
            let after = session.scroll_height(container).await?;
            iterations += 1;

            debug!(iterations, found = rows.len(), height = after, "Scrolled");
            if after == before {
                return Ok(iterations);
            }
        }
    }

    /// Wait for the height to move away from `before`, polling with
    /// exponential backoff for at most the configured settle time
    async fn settle<S>(&self, session: &mut S, before: u64) -> Result<u64>
    where
        S: BrowserSession + ?Sized,
    {
        let deadline = Instant::now() + self.settings.height_wait;
        let mut delay = INITIAL_POLL_DELAY;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return session
                    .scroll_height(&self.selectors.scroll_container_class)
                    .await;
            }
            sleep(delay.min(deadline - now)).await;

            let height = session
                .scroll_height(&self.selectors.scroll_container_class)
                .await?;
            if height != before {
                return Ok(height);
            }
            delay = (delay * 2).min(MAX_POLL_DELAY);
        }
    }

    async fn save_debug_screenshot<S>(&self, session: &mut S) -> Result<()>
    where
        S: BrowserSession + ?Sized,
    {
        if let Some(path) = &self.settings.debug_screenshot {
            let png = session.screenshot().await?;
            tokio::fs::write(path, png).await?;
        }
        Ok(())
    }
}

fn incomplete(page: &PageContext, expected: usize, rows: &ChildSet) -> FlattenError {
    FlattenError::IncompleteListing {
        url: page.listing_url.clone(),
        expected,
        found: rows.len(),
    }
}
