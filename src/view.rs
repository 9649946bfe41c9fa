//! Human-readable rendering of a record
//!
//! Used by `updatesnap show` and by the `/updates/{id}` page.

use crate::data::UpdateRecord;

/// Renders `record` as plain text
pub fn render_text(record: &UpdateRecord) -> String {
    let title = record.title();
    let mut out = format!("{}\n{}\n\n", title, "=".repeat(title.chars().count().max(1)));

    out.push_str(&format!("ID:        {}\n", record.id()));
    if let Some(date) = record.disclosure_date() {
        out.push_str(&format!("Disclosed: {}\n", date.format("%Y-%m-%d")));
    }
    if !record.tags().is_empty() {
        out.push_str(&format!("Tags:      {}\n", record.tags().join(", ")));
    }
    out.push('\n');

    out.push_str(record.description().trim());
    out.push('\n');
    if let Some(impact) = record.impact_description() {
        out.push_str(&format!("\nImpact: {}\n", impact.trim()));
    }
    out.push_str(&format!("\nMore: {}", record.details_url()));
    out
}
