use tracing::{debug, info};

use crate::config::{DepthLimit, FlattenConfig};
use crate::error::Result;
use crate::materialize::Materializer;
use crate::session::BrowserSession;
use crate::types::{ItemKind, ItemTree, NodeId};

/// Result of one traversal
#[derive(Debug, Clone)]
pub struct WalkReport {
    pub tree: ItemTree,
    /// Folders whose listing was materialized
    pub folders_visited: usize,
    /// Folders left unvisited because they sit at the depth bound
    pub folders_skipped: usize,
    /// Whether the traversal stopped early at the depth bound
    pub halted: bool,
}

/// Breadth-first discovery of a library tree
///
/// The frontier is an append-only list of folders visited in discovery
/// order; a folder is enqueued exactly once, when its parent is visited.
pub struct TreeWalker<'a> {
    config: &'a FlattenConfig,
}

impl<'a> TreeWalker<'a> {
    pub fn new(config: &'a FlattenConfig) -> Self {
        Self { config }
    }

    /// Discover the tree below the configured start URL
    pub async fn walk<S>(&self, session: &mut S) -> Result<WalkReport>
    where
        S: BrowserSession + ?Sized,
    {
        let start_url = self.config.start_url.as_str();
        let materializer = Materializer::new(
            &self.config.selectors,
            &self.config.scroll,
            &self.config.start_url,
            self.config.wait_timeout,
        );

        let mut tree = ItemTree::with_root(start_url);
        let mut frontier: Vec<NodeId> = vec![tree.root()];
        let mut cursor = 0;
        let mut folders_visited = 0;
        let mut folders_skipped = 0;
        let mut halted = false;

        info!(session = %session.identifier(), url = start_url, "Starting traversal");

        while let Some(&id) = frontier.get(cursor) {
            cursor += 1;
            let node = tree.node(id);

            if self.at_depth_bound(node.depth) {
                match self.config.depth_limit {
                    DepthLimit::Halt => {
                        info!(depth = node.depth, url = %node.url, "Depth bound reached, stopping traversal");
                        halted = true;
                        break;
                    }
                    DepthLimit::Prune => {
                        debug!(depth = node.depth, url = %node.url, "Skipping folder at depth bound");
                        folders_skipped += 1;
                        continue;
                    }
                }
            }

            let url = node.url.clone();
            let depth = node.depth;
            let expected_count = node.expected_count;

            session.navigate(&url).await?;
            let children = materializer
                .materialize(session, &url, depth, expected_count)
                .await?;
            folders_visited += 1;

            let ids = tree.attach_children(id, children);
            frontier.extend(
                ids.into_iter()
                    .filter(|&child| tree.node(child).kind == ItemKind::Folder),
            );

            info!(
                url = %url,
                depth,
                children = tree.node(id).children().len(),
                pending = frontier.len() - cursor,
                "Folder materialized"
            );
        }

        if halted {
            folders_skipped = frontier.len() - cursor + 1;
        }

        Ok(WalkReport {
            tree,
            folders_visited,
            folders_skipped,
            halted,
        })
    }

    fn at_depth_bound(&self, depth: usize) -> bool {
        self.config.max_depth.is_some_and(|max| depth >= max)
    }
}
