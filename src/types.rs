use serde::{Deserialize, Serialize};

/// Kind of a library entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    File,
}

/// A file or folder of the document library, as written to the tree document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Display name, unique among siblings
    pub name: String,
    /// Direct fetch URL for files, listing URL for folders
    pub url: String,
    /// Type of entry
    pub kind: ItemKind,
    /// Number of children the listing declared up front, folders only
    pub expected_count: Option<usize>,
    /// Direct children, populated for visited folders
    pub children: Vec<Item>,
    /// Distance from the root (root is 0)
    pub depth: usize,
}

impl Item {
    /// A child entry discovered in the listing of a folder at `parent_depth`
    pub fn child(
        base_url: &str,
        name: String,
        kind: ItemKind,
        expected_count: Option<usize>,
        parent_depth: usize,
    ) -> Self {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), name);
        Self {
            name,
            url,
            kind,
            expected_count,
            children: Vec::new(),
            depth: parent_depth + 1,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    /// Number of files anywhere below this item
    pub fn file_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| if c.is_folder() { c.file_count() } else { 1 })
            .sum()
    }

    /// Number of folders anywhere below this item
    pub fn folder_count(&self) -> usize {
        self.children
            .iter()
            .filter(|c| c.is_folder())
            .map(|c| 1 + c.folder_count())
            .sum()
    }
}

/// Index of a node inside an [`ItemTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Traversal state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    /// Enqueued (or never enqueued, for files); children not yet known
    Pending,
    /// Listing materialized and children attached
    Visited,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub url: String,
    pub kind: ItemKind,
    pub expected_count: Option<usize>,
    pub depth: usize,
    pub state: VisitState,
    children: Vec<NodeId>,
}

impl Node {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena holding the tree while it is being discovered
///
/// Nodes refer to their children by index, so there are no parent
/// back-references to keep alive.
#[derive(Debug, Clone)]
pub struct ItemTree {
    nodes: Vec<Node>,
}

impl ItemTree {
    /// Synthesize the root folder for a start URL
    pub fn with_root(start_url: &str) -> Self {
        Self {
            nodes: vec![Node {
                name: "base".to_string(),
                url: start_url.to_string(),
                kind: ItemKind::Folder,
                expected_count: None,
                depth: 0,
                state: VisitState::Pending,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach the materialized children of `parent` and mark it visited
    ///
    /// Returns the ids of the new nodes in listing order. A parent is only
    /// ever populated once; a second call leaves the tree untouched.
    pub fn attach_children(&mut self, parent: NodeId, children: Vec<Item>) -> Vec<NodeId> {
        if self.nodes[parent.0].state == VisitState::Visited {
            return Vec::new();
        }

        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let id = NodeId(self.nodes.len());
            self.nodes.push(Node {
                name: child.name,
                url: child.url,
                kind: child.kind,
                expected_count: child.expected_count,
                depth: child.depth,
                state: VisitState::Pending,
                children: Vec::new(),
            });
            ids.push(id);
        }

        let node = &mut self.nodes[parent.0];
        node.children = ids.clone();
        node.state = VisitState::Visited;
        ids
    }

    /// Convert the arena into the nested document shape
    pub fn to_item(&self) -> Item {
        self.item_at(self.root())
    }

    fn item_at(&self, id: NodeId) -> Item {
        let node = self.node(id);
        Item {
            name: node.name.clone(),
            url: node.url.clone(),
            kind: node.kind,
            expected_count: node.expected_count,
            children: node.children.iter().map(|&c| self.item_at(c)).collect(),
            depth: node.depth,
        }
    }
}
