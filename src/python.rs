use std::collections::{BTreeMap, HashMap};

use polars::prelude::DataFrame;
use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;

use crate::aggregation::aggregate;
use crate::config::EngineConfig;
use crate::model::PlanSeason;
use crate::shift;
use crate::summary::{summarize, summarize_potential};

#[pyclass]
pub struct EmissionsModel {
    config: EngineConfig,
    indicators: BTreeMap<PlanSeason, DataFrame>,
    potential: BTreeMap<PlanSeason, DataFrame>,
    product_info: BTreeMap<String, DataFrame>,
}

impl EmissionsModel {
    fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            indicators: BTreeMap::new(),
            potential: BTreeMap::new(),
            product_info: BTreeMap::new(),
        }
    }
}

#[pymethods]
impl EmissionsModel {
    /// Build a model from TOML config text, or the built-in two-plan setup.
    #[new]
    #[pyo3(signature = (config_toml=None))]
    fn new(config_toml: Option<&str>) -> PyResult<Self> {
        let config = match config_toml {
            Some(text) => EngineConfig::from_toml_str(text)?,
            None => EngineConfig::default(),
        };
        Ok(Self::with_config(config))
    }

    #[staticmethod]
    fn from_config_file(path: &str) -> PyResult<Self> {
        Ok(Self::with_config(EngineConfig::load(path)?))
    }

    // ── Inputs ──────────────────────────────────────────────────────────────

    /// Register the 8760-row DR hours table of a (plan, season).
    fn add_indicators(&mut self, plan: &str, season: &str, hours: PyDataFrame) {
        self.indicators.insert(PlanSeason::new(plan, season), hours.0);
    }

    /// Register the yearly DR potential table of a (plan, season).
    fn add_potential(&mut self, plan: &str, season: &str, potential: PyDataFrame) {
        self.potential.insert(PlanSeason::new(plan, season), potential.0);
    }

    fn add_product_info(&mut self, plan: &str, info: PyDataFrame) {
        self.product_info.insert(plan.to_string(), info.0);
    }

    // ── Engine ──────────────────────────────────────────────────────────────

    /// Run the engine against an hourly rate table.
    ///
    /// Returns the yearly impact tables keyed "<plan>_<binslug>_<season>",
    /// the season-by-bin comparison table and the dual-bin detail table.
    #[allow(clippy::type_complexity)]
    fn calculate(
        &self,
        rates: PyDataFrame,
    ) -> PyResult<(HashMap<String, PyDataFrame>, PyDataFrame, PyDataFrame)> {
        let tables = aggregate(
            &rates.0,
            &self.indicators,
            &self.potential,
            &self.product_info,
            &self.config,
        )?;
        let summary = summarize(&tables, self.config.dual_product.as_ref())?;

        let by_name = tables
            .into_iter()
            .map(|t| (t.key.to_string(), PyDataFrame(t.frame)))
            .collect();
        Ok((
            by_name,
            PyDataFrame(summary.comparison),
            PyDataFrame(summary.detail),
        ))
    }

    /// Total potential per (plan, season, bin) in `year`.
    fn potential_summary(&self, year: i32) -> PyResult<PyDataFrame> {
        let df = summarize_potential(&self.potential, &self.product_info, &self.config, year)?;
        Ok(PyDataFrame(df))
    }

    /// Distinct "<start> - <end>" hour windows a product is implemented in.
    #[staticmethod]
    fn implementation_windows(hours: PyDataFrame, product: &str) -> PyResult<Vec<String>> {
        Ok(shift::implementation_windows(&hours.0, product)?)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    #[getter]
    fn scenario(&self) -> String {
        self.config.scenario.clone()
    }

    #[getter]
    fn plans(&self) -> Vec<String> {
        self.config.plans.iter().map(|p| p.name.clone()).collect()
    }
}
