//! Client-side contact filter used by the list view.

use crate::models::ContactRecord;

/// Keep records whose name or company contains `query`, ignoring case.
///
/// A blank query keeps everything. Input order (newest first, as returned
/// by the store) is preserved.
pub fn filter_contacts<'a>(records: &'a [ContactRecord], query: &str) -> Vec<&'a ContactRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }

    records
        .iter()
        .filter(|r| {
            r.name.to_lowercase().contains(&needle) || r.company.to_lowercase().contains(&needle)
        })
        .collect()
}
