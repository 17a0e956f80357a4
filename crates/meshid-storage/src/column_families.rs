//! RocksDB column family definitions.

/// Account records: client_id → ClientRecord
pub const CF_CLIENTS: &str = "clients";

/// Identity uniqueness index: identity → client_id
pub const CF_CLIENTS_BY_IDENTITY: &str = "clients_by_identity";

/// Policy rows: (subject, object) → PolicyRow
pub const CF_POLICIES: &str = "policies";

/// Reverse policy index: (object, subject) → ()
pub const CF_POLICIES_BY_OBJECT: &str = "policies_by_object";

/// Get all column family names
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        CF_CLIENTS,
        CF_CLIENTS_BY_IDENTITY,
        CF_POLICIES,
        CF_POLICIES_BY_OBJECT,
    ]
}
