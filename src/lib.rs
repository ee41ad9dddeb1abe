pub mod chrome;
pub mod config;
pub mod download;
pub mod error;
pub mod label;
pub mod materialize;
pub mod output;
pub mod scroll;
pub mod session;
pub mod types;
pub mod walker;

#[cfg(test)]
mod testing;

pub use chrome::ChromeSession;
pub use config::{DepthLimit, DownloadConfig, FlattenConfig, ScrollSettings, UiSelectors};
pub use download::{DownloadPlan, DownloadReport, Downloader, RetryConfig};
pub use error::{FlattenError, Result};
pub use label::{parse_label, RowLabel};
pub use materialize::{ChildSet, Materializer, PageContext};
pub use output::{read_tree, write_tree};
pub use scroll::{ScrollDriver, ScrollOutcome, ScrollStrategy};
pub use session::BrowserSession;
pub use types::{Item, ItemKind, ItemTree, NodeId, VisitState};
pub use walker::{TreeWalker, WalkReport};
