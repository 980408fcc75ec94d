use shared::domain::{CompanyId, COMPANY_MODEL};

/// Derive the optional business-partner scope from the host's entity target.
///
/// A scope is produced only when the host targets the business-partner model
/// and carries an id; any other entity type yields the global view. Pure and
/// infallible; the panel evaluates this once at construction because the
/// host context never changes for the life of a panel instance.
pub fn resolve_scope(model: &str, id: Option<i64>) -> Option<CompanyId> {
    if model == COMPANY_MODEL {
        id.map(CompanyId)
    } else {
        None
    }
}
