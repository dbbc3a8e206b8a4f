use crate::check::CheckIdentity;
use crate::types::Category;
use crate::CategoryFilterError;
use std::collections::HashSet;

/// Largest edit distance still offered as a suggestion.
const MAX_SUGGESTION_DISTANCE: usize = 2;
const MAX_SUGGESTIONS: usize = 3;

/// Ignore surrounding whitespace, lowercase and treat `_` as `-`.
pub fn normalize_name(input: &str) -> String {
    input.trim().to_lowercase().replace('_', "-")
}

/// Indices of selected checks in registration order, plus tokens that matched nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterResult {
    pub matched: Vec<usize>,
    pub unmatched: Vec<String>,
}

/// Resolve name-or-category tokens.
///
/// Per token, an exact normalized check name wins; otherwise every check of a
/// case-insensitively matching category is taken. A check selected by several
/// tokens appears once. No tokens selects everything.
pub fn filter_checks(checks: &[CheckIdentity], tokens: &[String]) -> FilterResult {
    if tokens.is_empty() {
        return FilterResult {
            matched: (0..checks.len()).collect(),
            unmatched: Vec::new(),
        };
    }

    let mut result = FilterResult::default();
    let mut seen = HashSet::new();
    for token in tokens {
        let normalized = normalize_name(token);
        if let Some(idx) = checks
            .iter()
            .position(|check| normalize_name(check.name) == normalized)
        {
            if seen.insert(idx) {
                result.matched.push(idx);
            }
            continue;
        }

        let mut matched = false;
        for (idx, check) in checks.iter().enumerate() {
            if check.category.as_str().eq_ignore_ascii_case(token.trim()) {
                matched = true;
                if seen.insert(idx) {
                    result.matched.push(idx);
                }
            }
        }
        if !matched {
            result.unmatched.push(token.clone());
        }
    }
    result
}

/// Outcome of category-first resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySelection {
    /// `None` when no category was given.
    pub category: Option<Category>,
    pub matched: Vec<usize>,
}

/// Resolve `CATEGORY [CHECK]`, with the check looked up only inside the category.
pub fn filter_by_category(
    checks: &[CheckIdentity],
    category: Option<&str>,
    check: Option<&str>,
) -> Result<CategorySelection, CategoryFilterError> {
    let Some(category_input) = category.filter(|input| !input.trim().is_empty()) else {
        return Ok(CategorySelection {
            category: None,
            matched: (0..checks.len()).collect(),
        });
    };
    let canonical =
        Category::resolve(category_input).ok_or_else(|| CategoryFilterError::UnknownCategory {
            input: category_input.to_string(),
        })?;

    let in_category = checks_in_category(checks, canonical);
    let Some(check_input) = check.filter(|input| !input.trim().is_empty()) else {
        return Ok(CategorySelection {
            category: Some(canonical),
            matched: in_category,
        });
    };

    let normalized = normalize_name(check_input);
    in_category
        .into_iter()
        .find(|&idx| normalize_name(checks[idx].name) == normalized)
        .map(|idx| CategorySelection {
            category: Some(canonical),
            matched: vec![idx],
        })
        .ok_or_else(|| CategoryFilterError::UnknownCheck {
            input: check_input.to_string(),
            category: canonical.to_string(),
        })
}

pub fn checks_in_category(checks: &[CheckIdentity], category: Category) -> Vec<usize> {
    checks
        .iter()
        .enumerate()
        .filter(|(_, check)| check.category == category)
        .map(|(idx, _)| idx)
        .collect()
}

/// Closest check names within edit distance 2, nearest first, at most three.
pub fn suggest_check(checks: &[CheckIdentity], input: &str) -> Vec<&'static str> {
    closest(&normalize_name(input), checks.iter().map(|check| check.name))
}

/// Same as [`suggest_check`] over category names.
pub fn suggest_category(input: &str) -> Vec<Category> {
    let names = closest(
        &normalize_name(input),
        Category::ALL.iter().map(|category| category.as_str()),
    );
    names.into_iter().filter_map(Category::resolve).collect()
}

fn closest<'a>(normalized: &str, candidates: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut scored: Vec<(usize, &'a str)> = candidates
        .map(|name| (levenshtein(normalized, &normalize_name(name)), name))
        .filter(|(dist, _)| (1..=MAX_SUGGESTION_DISTANCE).contains(dist))
        .collect();
    scored.sort_unstable();
    scored.dedup();
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, name)| name)
        .collect()
}

/// Byte-wise edit distance with a single DP row.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, &ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diag
            } else {
                1 + above.min(row[j]).min(diag)
            };
            diag = above;
        }
    }
    row[b.len()]
}
