//! Header row normalization shared by the CSV and workbook readers.

use std::collections::HashSet;

/// Turn raw header cells into unique column names.
///
/// - cell text is kept as written, surrounding whitespace included
/// - a blank cell at index `i` becomes `Unnamed: i`
/// - a repeated name gets a numeric suffix: `id`, `id.1`, `id.2`, ...
pub fn normalize_header<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let named: Vec<String> = raw
        .into_iter()
        .enumerate()
        .map(|(idx, cell)| {
            let text = cell.as_ref();
            if text.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                text.to_string()
            }
        })
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(named.len());
    let mut out = Vec::with_capacity(named.len());
    for name in named {
        if seen.insert(name.clone()) {
            out.push(name);
            continue;
        }
        let mut n = 1usize;
        let unique = loop {
            let candidate = format!("{name}.{n}");
            if !seen.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        seen.insert(unique.clone());
        out.push(unique);
    }
    out
}
