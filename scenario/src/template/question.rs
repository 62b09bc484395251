/// Turn a question key into something presentable to a person:
/// first character capitalized, `.` and `-` separators become spaces.
/// Underscores are kept (`age_of_president` → `Age_of_president`).
pub fn question_for(key: &str) -> String {
    let replaced: String = key
        .chars()
        .map(|c| if c == '.' || c == '-' { ' ' } else { c })
        .collect();
    let mut chars = replaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
