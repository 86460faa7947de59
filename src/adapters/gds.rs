use crate::domain::ports::CellSource;
use crate::utils::error::{CheckError, Result};
use std::collections::HashSet;
use std::path::PathBuf;

/// Reads cell names from a GDSII stream, in definition order.
#[derive(Debug, Clone)]
pub struct GdsCellSource {
    path: PathBuf,
}

impl GdsCellSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CellSource for GdsCellSource {
    fn cells(&self) -> Result<Vec<String>> {
        tracing::debug!("Reading layout {}", self.path.display());
        let library =
            gds21::GdsLibrary::load(&self.path).map_err(|e| CheckError::LayoutError {
                path: self.path.clone(),
                message: format!("{:?}", e),
            })?;

        let mut seen = HashSet::new();
        Ok(library
            .structs
            .iter()
            .map(|s| s.name.to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect())
    }
}

/// A fixed list of cells, for `--cell` overrides.
#[derive(Debug, Clone, Default)]
pub struct ListCellSource {
    cells: Vec<String>,
}

impl ListCellSource {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }
}

impl CellSource for ListCellSource {
    fn cells(&self) -> Result<Vec<String>> {
        Ok(self.cells.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_source_keeps_order() {
        let source = ListCellSource::new(["NAND2_X1", "INV_X1"]);
        assert_eq!(source.cells().unwrap(), vec!["NAND2_X1", "INV_X1"]);
    }

    #[test]
    fn test_gds_structs_in_definition_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdcells.gds");

        let mut library = gds21::GdsLibrary::new("stdcells");
        for name in ["FILL", "INV_X1", "NAND2_X1", "INV_X1"] {
            library.structs.push(gds21::GdsStruct::new(name));
        }
        library.save(&path).unwrap();

        let cells = GdsCellSource::new(&path).cells().unwrap();
        assert_eq!(cells, vec!["FILL", "INV_X1", "NAND2_X1"]);
    }

    #[test]
    fn test_unreadable_layout_is_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.gds");

        let err = GdsCellSource::new(&path).cells().unwrap_err();
        assert!(matches!(err, CheckError::LayoutError { .. }));
    }
}
