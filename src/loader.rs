use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use regex::Regex;
use tracing::{info, warn};

use crate::domain::AccessionId;
use crate::error::KiraError;

pub const NULL_MARKERS: &[&str] = &["", "NULL"];

pub fn load_accessions(path: &Path, column: &str) -> Result<Vec<AccessionId>, KiraError> {
    let input_err = |message: String| KiraError::InputRead {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|err| input_err(err.to_string()))?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut table = ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = table
        .headers()
        .map_err(|err| input_err(err.to_string()))?
        .clone();
    let index = headers
        .iter()
        .position(|name| name.trim() == column)
        .ok_or_else(|| KiraError::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
        })?;

    let mut cells = Vec::new();
    for row in table.records() {
        let row = row.map_err(|err| input_err(err.to_string()))?;
        cells.push(row.get(index).unwrap_or_default().to_string());
    }

    let ids = unique_sorted(cells);
    info!(
        path = %path.display(),
        column,
        count = ids.len(),
        "loaded accessions"
    );
    Ok(ids)
}

pub fn unique_sorted<I, S>(cells: I) -> Vec<AccessionId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for (row, cell) in cells.into_iter().enumerate() {
        let cell = cell.as_ref().trim();
        if NULL_MARKERS.contains(&cell) {
            continue;
        }
        let id: AccessionId = match cell.parse() {
            Ok(id) => id,
            Err(err) => {
                warn!(row = row + 1, "skipping cell: {err}");
                continue;
            }
        };
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    ids.sort_by(|a, b| natural_cmp(a.as_str(), b.as_str()));
    ids
}

// Digit runs compare by numeric value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = tokens(a);
    let mut right = tokens(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (is_digits(x), is_digits(y)) {
                    (true, true) => cmp_numeric(x, y),
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn tokens(value: &str) -> impl Iterator<Item = &str> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(r"\d+|\D+").expect("static regex"))
        .find_iter(value)
        .map(|m| m.as_str())
}

fn is_digits(token: &str) -> bool {
    token.bytes().all(|b| b.is_ascii_digit())
}

fn cmp_numeric(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

fn delimiter_for(path: &Path) -> u8 {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    if name.ends_with(".csv") { b',' } else { b'\t' }
}
