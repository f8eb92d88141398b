/// Profile name constants to ensure consistency across the codebase
/// These constants define the mapping between export file names and source profiles

// Source profile names (used in CLI and config)
pub const EXPORTED_ORDERS_PROFILE: &str = "exported-orders";
pub const STAMP_ORDERS_PROFILE: &str = "stamp-orders";
pub const STAMP_ORDERS_LABELS_PROFILE: &str = "stamp-orders-labels";
pub const TX_REGISTER_PROFILE: &str = "tx-register";
pub const POSTAGE_COMPARISON_PROFILE: &str = "postage-comparison";

// File names the weekly batch drop is expected to contain
pub const EXPORTED_ORDERS_FILE: &str = "Exported Orders.csv";
pub const STAMP_ORDERS_FILE: &str = "Stamps Orders.csv";
pub const TX_REGISTER_FILE: &str = "ExtensivTxRegRpt.csv";

// Placeholder written into a categorical column whose values are all empty
pub const ALL_EMPTY_SENTINEL: &str = "#NUM!";

// Substitute for a header cell that sanitizes down to nothing
pub const EMPTY_NAME_PLACEHOLDER: &str = "_empty_";

// Prefix for names invented when a header is narrower than the widest row
pub const SYNTHETIC_NAME_PREFIX: &str = "Column_";

/// The fixed manifest a weekly batch run walks: file name paired with the
/// profile that knows how to clean it.
pub fn batch_manifest() -> Vec<(&'static str, &'static str)> {
    vec![
        (EXPORTED_ORDERS_FILE, EXPORTED_ORDERS_PROFILE),
        (STAMP_ORDERS_FILE, STAMP_ORDERS_PROFILE),
        (TX_REGISTER_FILE, TX_REGISTER_PROFILE),
    ]
}

/// Derive a warehouse table name from an artifact name: strip a trailing
/// `.csv` and replace spaces so the name is valid as a table identifier.
pub fn table_name_for(artifact_name: &str) -> String {
    let stem = artifact_name.strip_suffix(".csv").unwrap_or(artifact_name);
    stem.replace(' ', "_")
}

/// Get all built-in source profile names
pub fn builtin_profiles() -> Vec<&'static str> {
    vec![
        EXPORTED_ORDERS_PROFILE,
        STAMP_ORDERS_PROFILE,
        STAMP_ORDERS_LABELS_PROFILE,
        TX_REGISTER_PROFILE,
        POSTAGE_COMPARISON_PROFILE,
    ]
}
