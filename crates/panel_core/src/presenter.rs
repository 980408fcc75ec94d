//! Maps fetched records to display rows and derives the surrounding render
//! state (loading indicator, empty-state text, scope banner).

use shared::{domain::RecordId, protocol::HsCodeRecord};

pub const NO_RECORDS_TEXT: &str = "No Harmonized System Codes found";
pub const SCOPE_BANNER_TITLE: &str = "Customer Codes";
pub const SCOPE_BANNER_LINES: [&str; 2] = [
    "Displaying harmonized system codes associated only with this customer.",
    "These values will override any global codes for this customer.",
];

/// Placeholder shown when a category or customer reference is absent.
pub const DETAIL_PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Edit,
    Delete,
}

pub const ROW_ACTIONS: [RowAction; 2] = [RowAction::Edit, RowAction::Delete];

#[derive(Debug, Clone, PartialEq)]
pub struct CodeRow {
    pub pk: RecordId,
    pub code: String,
    pub description: String,
    pub category: String,
    pub customer: String,
    pub notes: String,
    pub actions: &'static [RowAction],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeBanner {
    pub title: &'static str,
    pub lines: &'static [&'static str],
}

/// Renderable snapshot of the panel: everything the table widget and its
/// surrounding chrome need, with no live references into panel state.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub banner: Option<ScopeBanner>,
    pub fetching: bool,
    pub rows: Vec<CodeRow>,
    pub empty_text: Option<&'static str>,
}

pub fn present(records: &[HsCodeRecord], fetching: bool, scoped: bool) -> PanelView {
    let rows: Vec<CodeRow> = records.iter().map(present_row).collect();
    let empty_text = (!fetching && rows.is_empty()).then_some(NO_RECORDS_TEXT);
    let banner = scoped.then_some(ScopeBanner {
        title: SCOPE_BANNER_TITLE,
        lines: &SCOPE_BANNER_LINES,
    });
    PanelView {
        banner,
        fetching,
        rows,
        empty_text,
    }
}

pub fn present_row(record: &HsCodeRecord) -> CodeRow {
    CodeRow {
        pk: record.pk,
        code: record.code.clone(),
        description: record.description.clone(),
        category: record
            .category_detail
            .as_ref()
            .map(|detail| detail.name.clone())
            .unwrap_or_else(|| DETAIL_PLACEHOLDER.to_string()),
        customer: record
            .customer_detail
            .as_ref()
            .map(|detail| detail.name.clone())
            .unwrap_or_else(|| DETAIL_PLACEHOLDER.to_string()),
        notes: record.notes.clone(),
        actions: &ROW_ACTIONS,
    }
}

#[cfg(test)]
#[path = "tests/presenter_tests.rs"]
mod tests;
