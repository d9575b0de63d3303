use crate::models::{MediaItem, QueryCriteria, SortMode};
use std::cmp::Ordering;

/// Pure visible-set computation: filter then sort, no side effects, safe to
/// call on every keystroke. Ties keep the input (gateway retrieval) order,
/// which is unspecified; callers must not depend on it.
pub fn visible<'a>(items: &'a [MediaItem], criteria: &QueryCriteria) -> Vec<&'a MediaItem> {
    let query = criteria.text_query.trim().to_lowercase();

    let mut list: Vec<&MediaItem> = items
        .iter()
        .filter(|item| {
            if let Some(folder) = &criteria.folder_filter {
                if &item.folder != folder {
                    return false;
                }
            }
            if let Some(kind) = criteria.kind_filter {
                if item.kind != kind {
                    return false;
                }
            }
            if !query.is_empty() {
                let in_name = item.name_lower.contains(&query);
                let in_tags = item.tags.iter().any(|t| t.to_lowercase().contains(&query));
                if !in_name && !in_tags {
                    return false;
                }
            }
            true
        })
        .collect();

    match criteria.sort_mode {
        SortMode::Newest => list.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortMode::Name => list.sort_by(|a, b| natural_cmp(&a.name, &b.name)),
        SortMode::Size => list.sort_by(|a, b| b.size.cmp(&a.size)),
    }

    list
}

/// Case- and accent-insensitive compare that orders embedded digit runs
/// numerically, so "img2" sorts before "img10" and "Água" next to "agua".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a: String = a.to_lowercase().chars().map(fold_accent).collect();
    let b: String = b.to_lowercase().chars().map(fold_accent).collect();
    let mut ac = a.chars().peekable();
    let mut bc = b.chars().peekable();

    loop {
        match (ac.peek().copied(), bc.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let na = take_digits(&mut ac);
                    let nb = take_digits(&mut bc);
                    let ord = compare_digit_runs(&na, &nb);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                } else {
                    let ord = x.cmp(&y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                    ac.next();
                    bc.next();
                }
            }
        }
    }
}

/// Collapses the Latin accents common in media file names to their base
/// letter, approximating base-sensitivity collation.
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ç' => 'c',
        'ñ' => 'n',
        _ => c,
    }
}

fn take_digits<I: Iterator<Item = char>>(it: &mut std::iter::Peekable<I>) -> String {
    let mut run = String::new();
    while let Some(c) = it.peek() {
        if c.is_ascii_digit() {
            run.push(*c);
            it.next();
        } else {
            break;
        }
    }
    run
}

/// Numeric compare without parsing: strip leading zeros, then shorter means
/// smaller, same length falls back to lexicographic.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
