/// Section drafted when an outline carries no markdown headings.
pub const DEFAULT_SECTION_TITLE: &str = "Executive Summary";

/// Markdown heading texts of `outline`, in order.
pub fn section_titles(outline: &str) -> Vec<String> {
    let titles: Vec<String> = outline
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
        .collect();

    if titles.is_empty() {
        vec![DEFAULT_SECTION_TITLE.to_string()]
    } else {
        titles
    }
}
