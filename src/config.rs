use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::EmissionsError;

/// What to do with a shift mark that lands outside the hourly series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    /// Drop the mark.
    #[default]
    Clip,
    /// Fail with a shape error.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanConfig {
    pub name: String,
    pub seasons: Vec<String>,
    /// Restrict the plan to these products; all indicator columns when absent.
    #[serde(default)]
    pub products: Option<Vec<String>>,
}

/// The one product that is reported both as a shift and as a shed strategy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DualProduct {
    pub plan: String,
    pub product: String,
}

impl DualProduct {
    pub fn shift_name(&self) -> String {
        format!("{}_shift", self.product)
    }

    pub fn shed_name(&self) -> String {
        format!("{}_shed", self.product)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selects the "<scenario> Emissions Rate Estimate" column.
    pub scenario: String,
    /// lbs CO2e/kWh -> metric tons CO2e/MWh
    pub conversion_factor: f64,
    /// Hours marked on each side of a shift block. `None` derives it from the block length.
    pub shift_half_width: Option<usize>,
    pub edge_policy: EdgePolicy,
    pub plans: Vec<PlanConfig>,
    pub dual_product: Option<DualProduct>,
    /// Old product name -> new product name, applied to product info.
    pub product_synonyms: BTreeMap<String, String>,
    /// Season -> season whose potential table is reused when its own is absent.
    pub potential_fallback: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let seasons = |names: &[&str]| -> Vec<String> { names.iter().map(|s| s.to_string()).collect() };
        Self {
            scenario: "Baseline".to_string(),
            conversion_factor: 0.4536,
            shift_half_width: Some(2),
            edge_policy: EdgePolicy::Clip,
            plans: vec![
                PlanConfig {
                    name: "oldbins".to_string(),
                    seasons: seasons(&["Winter", "Summer"]),
                    products: None,
                },
                PlanConfig {
                    name: "newbins".to_string(),
                    seasons: seasons(&["Winter", "Summer", "Fall"]),
                    products: Some(seasons(&["DVR", "ResTOU"])),
                },
            ],
            dual_product: Some(DualProduct {
                plan: "newbins".to_string(),
                product: "ResTOU".to_string(),
            }),
            product_synonyms: BTreeMap::new(),
            potential_fallback: BTreeMap::from([("Fall".to_string(), "Winter".to_string())]),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, EmissionsError> {
        let cfg: EngineConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EmissionsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn plan(&self, name: &str) -> Option<&PlanConfig> {
        self.plans.iter().find(|p| p.name == name)
    }

    /// The dual product, if it belongs to `plan`.
    pub fn dual_for(&self, plan: &str) -> Option<&DualProduct> {
        self.dual_product.as_ref().filter(|d| d.plan == plan)
    }

    fn validate(&self) -> Result<(), EmissionsError> {
        if !self.conversion_factor.is_finite() {
            return Err(EmissionsError::Domain(format!(
                "conversion_factor must be finite, got {}",
                self.conversion_factor
            )));
        }
        if self.shift_half_width == Some(0) {
            return Err(EmissionsError::Domain(
                "shift_half_width must be at least 1".to_string(),
            ));
        }
        if let Some(dual) = &self.dual_product {
            if self.plan(&dual.plan).is_none() {
                return Err(EmissionsError::Lookup(format!(
                    "dual product plan '{}' is not a configured plan",
                    dual.plan
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            scenario = "LimitedMarkets"
            edge_policy = "reject"

            [[plans]]
            name = "oldbins"
            seasons = ["Winter", "Summer"]

            [[plans]]
            name = "newbins"
            seasons = ["Summer"]

            [product_synonyms]
            "Res TOU" = "ResTOU"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.scenario, "LimitedMarkets");
        assert_eq!(cfg.edge_policy, EdgePolicy::Reject);
        assert_eq!(cfg.conversion_factor, 0.4536);
        assert_eq!(cfg.shift_half_width, Some(2));
        assert_eq!(cfg.plans.len(), 2);
        assert_eq!(cfg.plan("newbins").unwrap().products, None);
        assert_eq!(cfg.product_synonyms["Res TOU"], "ResTOU");
        assert!(cfg.dual_for("newbins").is_some());
    }

    #[test]
    fn dual_product_must_name_a_configured_plan() {
        let err = EngineConfig::from_toml_str(
            r#"
            dual_product = { plan = "otherbins", product = "ResTOU" }

            [[plans]]
            name = "newbins"
            seasons = ["Summer"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EmissionsError::Lookup(_)));
    }

    #[test]
    fn default_reproduces_two_plan_setup() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.plan("newbins").unwrap().seasons.len(), 3);
        let dual = cfg.dual_for("newbins").unwrap();
        assert_eq!(dual.shift_name(), "ResTOU_shift");
        assert_eq!(dual.shed_name(), "ResTOU_shed");
        assert!(cfg.dual_for("oldbins").is_none());
        assert_eq!(cfg.potential_fallback["Fall"], "Winter");
    }
}
