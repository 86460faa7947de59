use crate::domain::ports::CellSource;
use crate::utils::error::Result;
use std::collections::HashSet;

/// Cells to verify: the source's cells in order, each once, minus `skip`.
pub fn enumerate_cells(source: &dyn CellSource, skip: &[String]) -> Result<Vec<String>> {
    let skip: HashSet<&str> = skip.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    let cells: Vec<String> = source
        .cells()?
        .into_iter()
        .filter(|cell| !skip.contains(cell.as_str()))
        .filter(|cell| seen.insert(cell.clone()))
        .collect();

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ListCellSource;

    #[test]
    fn test_skip_set_and_duplicates() {
        let source = ListCellSource::new(["FILL", "INV_X1", "NAND2_X1", "INV_X1", "TAP"]);
        let skip = vec!["FILL".to_string(), "TAP".to_string()];

        assert_eq!(
            enumerate_cells(&source, &skip).unwrap(),
            vec!["INV_X1", "NAND2_X1"]
        );
    }

    #[test]
    fn test_empty_skip_set() {
        let source = ListCellSource::new(["FILL"]);
        assert_eq!(enumerate_cells(&source, &[]).unwrap(), vec!["FILL"]);
    }
}
