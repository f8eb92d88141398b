use crate::coerce::{CoercionRule, DateRule};
use crate::config::{ColumnSpec, ProfileSpec};
use crate::constants::{
    EXPORTED_ORDERS_PROFILE, POSTAGE_COMPARISON_PROFILE, STAMP_ORDERS_LABELS_PROFILE,
    STAMP_ORDERS_PROFILE, TX_REGISTER_PROFILE,
};
use crate::error::{CleanerError, Result};
use crate::types::CleaningMode;
use std::collections::{BTreeMap, HashMap};

/// Everything the pipeline driver needs to clean one kind of export file:
/// the expected width, header renames applied before sanitizing, the
/// column-rule mapping, and the failure policy the profile defaults to.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub name: String,
    pub expected_columns: usize,
    pub mode: CleaningMode,
    pub renames: Vec<(String, String)>,
    pub rules: BTreeMap<String, CoercionRule>,
}

impl SourceProfile {
    pub fn new(name: &str, expected_columns: usize, mode: CleaningMode) -> Self {
        SourceProfile {
            name: name.to_string(),
            expected_columns,
            mode,
            renames: Vec::new(),
            rules: BTreeMap::new(),
        }
    }

    fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.push((from.to_string(), to.to_string()));
        self
    }

    fn rule(mut self, column: &str, rule: CoercionRule) -> Self {
        self.rules.insert(column.to_string(), rule);
        self
    }

    fn rules(mut self, columns: &[&str], rule: CoercionRule) -> Self {
        for column in columns {
            self.rules.insert(column.to_string(), rule.clone());
        }
        self
    }

    /// Build a profile from a `[[profiles]]` config table.
    pub fn from_spec(spec: &ProfileSpec, default_mode: CleaningMode) -> Result<Self> {
        if spec.name.is_empty() {
            return Err(CleanerError::Config("profile name must not be empty".into()));
        }
        if spec.expected_columns == 0 {
            return Err(CleanerError::Config(format!(
                "profile '{}' must expect at least one column",
                spec.name
            )));
        }
        let mut profile = SourceProfile::new(
            &spec.name,
            spec.expected_columns,
            spec.mode.unwrap_or(default_mode),
        );
        for rename in &spec.renames {
            profile.renames.push((rename.from.clone(), rename.to.clone()));
        }
        for column in &spec.columns {
            profile
                .rules
                .insert(column.name.clone(), parse_rule(column)?);
        }
        Ok(profile)
    }
}

/// Map a declarative rule name from config onto a coercion rule.
fn parse_rule(column: &ColumnSpec) -> Result<CoercionRule> {
    match column.rule.as_str() {
        "integer" => Ok(CoercionRule::Integer {
            zero_fill: column.zero_fill.unwrap_or(false),
        }),
        "float" => Ok(CoercionRule::Float),
        "float-or-placeholder" => Ok(CoercionRule::FloatOrPlaceholder),
        "date" => {
            let mut rule = DateRule::default();
            if let Some(formats) = &column.formats {
                if !formats.is_empty() {
                    rule.formats = formats.clone();
                }
            }
            rule.drop_on_invalid = column.drop_on_invalid.unwrap_or(false);
            Ok(CoercionRule::Date(rule))
        }
        "categorical-or-placeholder" => Ok(CoercionRule::Categorical),
        "fixed-prefix-string" => Ok(CoercionRule::FixedPrefix {
            prefix: column.prefix.clone().unwrap_or_else(|| "=\"".to_string()),
            suffix: column.suffix.clone().unwrap_or_else(|| "\"".to_string()),
        }),
        other => Err(CleanerError::Config(format!(
            "unknown coercion rule '{}' for column '{}'",
            other, column.name
        ))),
    }
}

fn int_zero() -> CoercionRule {
    CoercionRule::Integer { zero_fill: true }
}

fn int_blank() -> CoercionRule {
    CoercionRule::Integer { zero_fill: false }
}

fn date_default() -> CoercionRule {
    CoercionRule::Date(DateRule::default())
}

fn exported_orders() -> SourceProfile {
    SourceProfile::new(EXPORTED_ORDERS_PROFILE, 33, CleaningMode::Lenient)
        .rules(
            &[
                "RowNumber",
                "OrderId",
                "BatchOrderId",
                "TotPackages",
                "ParcelLabelType",
                "TotalItemQty",
            ],
            int_zero(),
        )
        .rules(&["CreationDate", "SmallParcelShipDate"], date_default())
        .rules(&["TotVolumeImperial", "TotWeightImperial"], CoercionRule::Float)
}

fn stamp_orders() -> SourceProfile {
    SourceProfile::new(STAMP_ORDERS_PROFILE, 44, CleaningMode::Lenient)
        .rename("State/Province", "State_Province")
        .rules(
            &["Postal_Code", "Origin_Zip", "Insured_For", "Duties_and_Taxes_Amount"],
            int_zero(),
        )
        .rules(&["Date_Printed", "Date_Delivered"], date_default())
        .rule("Quoted_Amount", CoercionRule::Float)
        .rule("Extra_Services", CoercionRule::FloatOrPlaceholder)
        .rules(
            &[
                "Cost_Code",
                "Refund_Request_Date",
                "Refund_Status",
                "Refund_Requested",
                "Reference_1",
                "Order_ID",
                "Store",
                "Order_Date",
                "Order_Total",
                "Item_SKUs",
                "Items",
                "Product_Total",
                "Shipping_Paid",
                "Tax_Paid",
                "Address_2",
                "Address_3",
            ],
            CoercionRule::Categorical,
        )
}

/// Same cleaning as `stamp-orders`, but tracking numbers are wrapped so a
/// spreadsheet re-import keeps them textual instead of collapsing them to
/// scientific notation.
fn stamp_orders_labels() -> SourceProfile {
    let mut profile = stamp_orders();
    profile.name = STAMP_ORDERS_LABELS_PROFILE.to_string();
    profile.rules.insert(
        "Tracking__".to_string(),
        CoercionRule::FixedPrefix {
            prefix: "=\"".to_string(),
            suffix: "\"".to_string(),
        },
    );
    profile
}

fn tx_register() -> SourceProfile {
    SourceProfile::new(TX_REGISTER_PROFILE, 22, CleaningMode::Strict)
        .rules(
            &[
                "TransactionID",
                "QtyIn",
                "QtyOut",
                "Textbox80",
                "textbox69",
                "Storage",
                "Freight3",
            ],
            int_blank(),
        )
        .rules(
            &["Handling", "Materials", "Special", "FreightPP", "Total"],
            CoercionRule::Float,
        )
        .rules(
            &["StartDate", "EndDate"],
            CoercionRule::Date(DateRule {
                formats: vec!["%m/%d/%Y %I:%M:%S %p".to_string()],
                drop_on_invalid: false,
            }),
        )
        .rule("Date", date_default())
}

fn postage_comparison() -> SourceProfile {
    SourceProfile::new(POSTAGE_COMPARISON_PROFILE, 10, CleaningMode::Lenient)
        .rule("OrderId", int_blank())
        .rules(&["TotVolumeImperial", "Postage_Cost"], CoercionRule::Float)
}

/// Registry of source profiles: the built-ins plus any declared in config
pub struct ProfileRegistry {
    profiles: HashMap<String, SourceProfile>,
}

impl ProfileRegistry {
    /// Create a new registry with the built-in profiles registered
    pub fn new() -> Self {
        let mut profiles = HashMap::new();
        for profile in [
            exported_orders(),
            stamp_orders(),
            stamp_orders_labels(),
            tx_register(),
            postage_comparison(),
        ] {
            profiles.insert(profile.name.clone(), profile);
        }
        Self { profiles }
    }

    /// Register a profile, replacing any existing one with the same name
    pub fn register(&mut self, profile: SourceProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    /// Add the `[[profiles]]` tables from config on top of the built-ins
    pub fn extend_from_config(
        &mut self,
        specs: &[ProfileSpec],
        default_mode: CleaningMode,
    ) -> Result<()> {
        for spec in specs {
            self.register(SourceProfile::from_spec(spec, default_mode)?);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&SourceProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| CleanerError::UnknownProfile(name.to_string()))
    }

    /// All registered profile names, sorted for stable listings
    pub fn list(&self) -> Vec<&SourceProfile> {
        let mut profiles: Vec<&SourceProfile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        profiles
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenameSpec;

    #[test]
    fn test_registry_has_built_in_profiles() {
        let registry = ProfileRegistry::new();
        let names: Vec<&str> = registry.list().iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"exported-orders"));
        assert!(names.contains(&"stamp-orders"));
        assert!(names.contains(&"stamp-orders-labels"));
        assert!(names.contains(&"tx-register"));
        assert!(names.contains(&"postage-comparison"));
    }

    #[test]
    fn test_unknown_profile_is_an_error() {
        let registry = ProfileRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(CleanerError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_tx_register_is_strict_by_default() {
        let registry = ProfileRegistry::new();
        assert_eq!(registry.get("tx-register").unwrap().mode, CleaningMode::Strict);
        assert_eq!(
            registry.get("exported-orders").unwrap().mode,
            CleaningMode::Lenient
        );
    }

    #[test]
    fn test_labels_profile_wraps_tracking_numbers() {
        let registry = ProfileRegistry::new();
        let plain = registry.get("stamp-orders").unwrap();
        let labels = registry.get("stamp-orders-labels").unwrap();
        assert!(!plain.rules.contains_key("Tracking__"));
        assert!(matches!(
            labels.rules.get("Tracking__"),
            Some(CoercionRule::FixedPrefix { .. })
        ));
        assert_eq!(plain.expected_columns, labels.expected_columns);
    }

    #[test]
    fn test_extra_services_gets_placeholder_rule() {
        let registry = ProfileRegistry::new();
        for name in ["stamp-orders", "stamp-orders-labels"] {
            let profile = registry.get(name).unwrap();
            assert_eq!(
                profile.rules.get("Extra_Services"),
                Some(&CoercionRule::FloatOrPlaceholder),
                "profile {}",
                name
            );
            assert_eq!(profile.rules.get("Quoted_Amount"), Some(&CoercionRule::Float));
        }
    }

    #[test]
    fn test_profile_from_spec() {
        let spec = ProfileSpec {
            name: "custom".to_string(),
            expected_columns: 3,
            mode: None,
            renames: vec![RenameSpec {
                from: "A B".to_string(),
                to: "AB".to_string(),
            }],
            columns: vec![
                ColumnSpec {
                    name: "n".to_string(),
                    rule: "integer".to_string(),
                    zero_fill: Some(true),
                    drop_on_invalid: None,
                    formats: None,
                    prefix: None,
                    suffix: None,
                },
                ColumnSpec {
                    name: "d".to_string(),
                    rule: "date".to_string(),
                    zero_fill: None,
                    drop_on_invalid: Some(true),
                    formats: Some(vec!["%Y-%m-%d".to_string()]),
                    prefix: None,
                    suffix: None,
                },
                ColumnSpec {
                    name: "e".to_string(),
                    rule: "float-or-placeholder".to_string(),
                    zero_fill: None,
                    drop_on_invalid: None,
                    formats: None,
                    prefix: None,
                    suffix: None,
                },
            ],
        };
        let profile = SourceProfile::from_spec(&spec, CleaningMode::Lenient).unwrap();
        assert_eq!(profile.expected_columns, 3);
        assert_eq!(profile.mode, CleaningMode::Lenient);
        assert_eq!(profile.renames.len(), 1);
        assert_eq!(
            profile.rules.get("n"),
            Some(&CoercionRule::Integer { zero_fill: true })
        );
        match profile.rules.get("d") {
            Some(CoercionRule::Date(rule)) => {
                assert!(rule.drop_on_invalid);
                assert_eq!(rule.formats, vec!["%Y-%m-%d"]);
            }
            other => panic!("unexpected rule: {:?}", other),
        }
        assert_eq!(
            profile.rules.get("e"),
            Some(&CoercionRule::FloatOrPlaceholder)
        );
    }

    #[test]
    fn test_unknown_rule_name_is_rejected() {
        let spec = ProfileSpec {
            name: "bad".to_string(),
            expected_columns: 1,
            mode: None,
            renames: vec![],
            columns: vec![ColumnSpec {
                name: "x".to_string(),
                rule: "money".to_string(),
                zero_fill: None,
                drop_on_invalid: None,
                formats: None,
                prefix: None,
                suffix: None,
            }],
        };
        assert!(SourceProfile::from_spec(&spec, CleaningMode::Lenient).is_err());
    }
}
