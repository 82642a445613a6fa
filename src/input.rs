//! Input readers: plain key lists and delimited dealer/product pair files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::RunInput;

const DEALER_COLUMNS: &[&str] = &["dealer", "imbloja"];
const PRODUCT_COLUMNS: &[&str] = &["product", "barcode", "codigobarras"];

/// Read one key per line. Lines are trimmed; blank lines and `#` comments
/// are skipped.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = read(path)?;
    Ok(parse_lines(&content))
}

pub fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Legacy input from two list files.
pub fn read_cross(dealers: &Path, products: &Path) -> Result<RunInput> {
    Ok(RunInput::cross(read_lines(dealers)?, read_lines(products)?))
}

/// Read a delimited pair file into explicit-pair input.
///
/// The first line is a header naming a dealer column and a product column
/// (case-insensitive). The delimiter is whichever of tab, semicolon or comma
/// appears in the header. Rows missing either cell are skipped; repeated
/// pairs are kept.
pub fn read_pairs(path: &Path) -> Result<RunInput> {
    let content = read(path)?;
    parse_pairs(&content).map_err(|(line, message)| Error::Input {
        path: path.to_path_buf(),
        line,
        message,
    })
}

/// Parse pair-file content. Errors carry the 1-based line number.
pub fn parse_pairs(content: &str) -> std::result::Result<RunInput, (usize, String)> {
    // Spreadsheet exports often start with a UTF-8 BOM.
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(header) = content.lines().next().filter(|h| !h.trim().is_empty()) else {
        return Err((1, "file is empty".to_string()));
    };

    let delimiter = [b'\t', b';', b',']
        .into_iter()
        .find(|d| header.as_bytes().contains(d))
        .ok_or((1, "header has a single column".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| (1, format!("failed to read header: {e}")))?
        .iter()
        .map(str::to_lowercase)
        .collect();
    let find = |names: &[&str]| columns.iter().position(|c| names.contains(&c.as_str()));
    let dealer_idx = find(DEALER_COLUMNS)
        .ok_or((1, format!("no dealer column (expected one of {DEALER_COLUMNS:?})")))?;
    let product_idx = find(PRODUCT_COLUMNS)
        .ok_or((1, format!("no product column (expected one of {PRODUCT_COLUMNS:?})")))?;

    let mut pairs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut dealers = BTreeSet::new();
    let mut products = BTreeSet::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| {
            let line = e.position().map_or(0, |p| p.line() as usize);
            (line, e.to_string())
        })?;
        let (Some(dealer), Some(product)) = (record.get(dealer_idx), record.get(product_idx)) else {
            skipped += 1;
            continue;
        };
        if dealer.is_empty() || product.is_empty() {
            skipped += 1;
            continue;
        }
        dealers.insert(dealer.to_string());
        products.insert(product.to_string());
        pairs
            .entry(dealer.to_string())
            .or_default()
            .push(product.to_string());
    }

    debug!(dealers = dealers.len(), products = products.len(), skipped, "pair file parsed");

    Ok(RunInput {
        dealer_keys: dealers.into_iter().collect(),
        product_keys: products.into_iter().collect(),
        pairs,
    })
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Input {
        path: PathBuf::from(path),
        line: 0,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_skip_blanks_and_comments() {
        let keys = parse_lines("  123 \n\n# header\n456\n   \n789");
        assert_eq!(keys, vec!["123", "456", "789"]);
    }

    #[test]
    fn pairs_keep_exact_combinations() {
        let content = "IMBLOJA;CODIGOBARRAS\n123;A\n123;B\n456;A\n123;A\n";
        let input = parse_pairs(content).unwrap();

        assert!(input.is_explicit());
        assert_eq!(input.pairs["123"], vec!["A", "B", "A"]);
        assert_eq!(input.pairs["456"], vec!["A"]);
        assert_eq!(input.dealer_keys, vec!["123", "456"]);
        assert_eq!(input.product_keys, vec!["A", "B"]);
    }

    #[test]
    fn pairs_skip_short_and_empty_rows() {
        let content = "name,dealer,barcode\nx,1,A\ny,,B\nz,2\nw,3,C\n";
        let input = parse_pairs(content).unwrap();
        assert_eq!(input.pairs.len(), 2);
        assert_eq!(input.pairs["3"], vec!["C"]);
    }

    #[test]
    fn missing_column_is_reported_on_header_line() {
        let err = parse_pairs("dealer\tsku\n1\tA\n").unwrap_err();
        assert_eq!(err.0, 1);
        assert!(err.1.contains("product column"));
    }

    #[test]
    fn quoted_cell_keeps_its_delimiter() {
        let input = parse_pairs("dealer,product\n\"12,3\",A\n").unwrap();
        assert_eq!(input.pairs.len(), 1);
        assert_eq!(input.pairs["12,3"], vec!["A"]);
    }

    #[test]
    fn byte_order_mark_before_header_is_ignored() {
        let input = parse_pairs("\u{feff}IMBLOJA;CODIGOBARRAS\n123;A\n").unwrap();
        assert_eq!(input.pairs["123"], vec!["A"]);
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(parse_pairs("").is_err());
    }
}
