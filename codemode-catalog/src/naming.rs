//! Operation id derivation.

/// Derive the camelCase operation id for a tool name.
///
/// `query-datasource` becomes `queryDatasource`. `-`, `_`, `.` and
/// whitespace all separate words; the first word keeps its spelling apart
/// from a lowercased first letter, later words are capitalized. Ids never
/// start with a digit.
#[must_use]
pub fn operation_id(tool_name: &str) -> String {
    let mut id = String::with_capacity(tool_name.len());
    let words = tool_name
        .split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|word| !word.is_empty());
    for (index, word) in words.enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        if index == 0 {
            id.extend(first.to_lowercase());
        } else {
            id.extend(first.to_uppercase());
        }
        id.push_str(chars.as_str());
    }
    match id.chars().next() {
        None => "operation".to_string(),
        Some(c) if c.is_ascii_digit() => format!("op{id}"),
        Some(_) => id,
    }
}

/// Lowercased id with separators removed, for fuzzy comparison.
pub(crate) fn fold(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
