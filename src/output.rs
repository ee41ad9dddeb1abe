use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;

use crate::error::{FlattenError, Result};
use crate::types::Item;

/// Render a tree as an indented JSON document
pub fn to_json(root: &Item) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    root.serialize(&mut serializer)?;
    Ok(buf)
}

/// Write the tree document
///
/// The document is written next to its destination first and renamed into
/// place, so readers never observe a half-written tree.
pub async fn write_tree(path: &Path, root: &Item) -> Result<()> {
    let json = to_json(root)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(path);
    fs::write(&staging, &json).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}

/// Load a tree document written by [`write_tree`]
pub async fn read_tree(path: &Path) -> Result<Item> {
    let raw = fs::read(path).await?;
    let root: Item = serde_json::from_slice(&raw)?;
    if !root.is_folder() {
        return Err(FlattenError::InvalidStructure {
            message: format!("root of {} is not a folder", path.display()),
        });
    }
    Ok(root)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
