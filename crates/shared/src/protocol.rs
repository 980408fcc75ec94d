use serde::{Deserialize, Serialize};

use crate::domain::{CategoryId, CompanyId, RecordId};

/// Resolved display data for a part category reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDetail {
    pub pk: CategoryId,
    pub name: String,
}

/// Resolved display data for a business-partner (customer) reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDetail {
    pub pk: CompanyId,
    pub name: String,
}

/// A harmonized-system-code record as served by the list endpoint.
///
/// `category_detail` / `customer_detail` are read-only expansions of the
/// corresponding reference fields; either may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HsCodeRecord {
    pub pk: RecordId,
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_detail: Option<CategoryDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CompanyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_detail: Option<CompanyDetail>,
    #[serde(default)]
    pub notes: String,
}

/// Query parameters for the list endpoint. Absent filters are omitted from
/// the query string entirely rather than sent empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// Writable fields submitted by the create/edit forms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HsCodeData {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CompanyId>,
    #[serde(default)]
    pub notes: String,
}
