//! Row label parsing
//!
//! Every rendered row of the library list carries an accessible label of the
//! form `<name>, <type>[, Folder has <N> items, ...]`. The parser is strict:
//! a label that does not follow this grammar means the page layout is not the
//! one we know how to read, and the whole listing can no longer be trusted.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FlattenError, Result};
use crate::types::ItemKind;

static ITEM_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Folder has (\d+) items?").expect("Invalid item count regex"));

/// Structured form of one row label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLabel {
    pub name: String,
    pub kind: ItemKind,
    pub expected_count: Option<usize>,
}

/// Parse the accessible label of one list row
pub fn parse_label(label: &str) -> Result<RowLabel> {
    let fields: Vec<&str> = label.split(',').collect();

    let name = fields[0].trim();
    if name.is_empty() {
        return Err(parse_error(label, "empty name field"));
    }

    let type_field = fields
        .get(1)
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| parse_error(label, "missing type field"))?;

    let kind = if type_field.eq_ignore_ascii_case("folder") {
        ItemKind::Folder
    } else {
        ItemKind::File
    };

    let expected_count = match kind {
        ItemKind::Folder => Some(folder_count(label, fields.get(2).copied())?),
        ItemKind::File => None,
    };

    Ok(RowLabel {
        name: name.to_string(),
        kind,
        expected_count,
    })
}

fn folder_count(label: &str, field: Option<&str>) -> Result<usize> {
    let field = field.ok_or_else(|| parse_error(label, "folder row without item count"))?;
    let captures = ITEM_COUNT
        .captures(field)
        .ok_or_else(|| parse_error(label, "item count pattern not found"))?;

    captures[1]
        .parse()
        .map_err(|e| parse_error(label, &format!("invalid item count: {}", e)))
}

fn parse_error(label: &str, reason: &str) -> FlattenError {
    FlattenError::Parse {
        label: label.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_label() {
        let row = parse_label("Report.pdf, File").unwrap();
        assert_eq!(row.name, "Report.pdf");
        assert_eq!(row.kind, ItemKind::File);
        assert_eq!(row.expected_count, None);
    }

    #[test]
    fn test_folder_label() {
        let row = parse_label("2024 Docs, Folder, Folder has 12 items").unwrap();
        assert_eq!(row.name, "2024 Docs");
        assert_eq!(row.kind, ItemKind::Folder);
        assert_eq!(row.expected_count, Some(12));

        let single = parse_label("Misc, Folder, Folder has 1 item").unwrap();
        assert_eq!(single.expected_count, Some(1));
    }

    #[test]
    fn test_type_is_case_insensitive() {
        let row = parse_label("Archive, FOLDER, Folder has 0 items").unwrap();
        assert_eq!(row.kind, ItemKind::Folder);
        assert_eq!(row.expected_count, Some(0));
    }

    #[test]
    fn test_trailing_whitespace_is_ignored() {
        let plain = parse_label("Budget.xlsx, Microsoft Excel Worksheet, Modified Monday").unwrap();
        let padded =
            parse_label("Budget.xlsx   , Microsoft Excel Worksheet  , Modified Monday \t").unwrap();
        assert_eq!(plain, padded);

        let folder = parse_label("Team, Folder, Folder has 3 items   ").unwrap();
        assert_eq!(folder.expected_count, Some(3));
    }

    #[test]
    fn test_non_folder_types_are_files() {
        let row = parse_label("notes.docx, Microsoft Word Document").unwrap();
        assert_eq!(row.kind, ItemKind::File);
    }

    #[test]
    fn test_missing_type_field() {
        assert!(matches!(
            parse_label("lonely-name"),
            Err(FlattenError::Parse { .. })
        ));
        assert!(matches!(
            parse_label("name,   "),
            Err(FlattenError::Parse { .. })
        ));
    }

    #[test]
    fn test_folder_without_count_is_fatal() {
        match parse_label("Projects, Folder") {
            Err(FlattenError::Parse { label, .. }) => assert_eq!(label, "Projects, Folder"),
            other => panic!("Expected parse error, got {:?}", other),
        }
        assert!(parse_label("Projects, Folder, Shared with you").is_err());
    }

    #[test]
    fn test_empty_name() {
        assert!(parse_label(" , File").is_err());
    }
}
