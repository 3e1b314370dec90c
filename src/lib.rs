pub mod aggregation;
pub mod config;
pub mod error;
mod frames;
pub mod model;
pub mod observability;
pub mod product_info;
pub mod schema;
pub mod shift;
pub mod summary;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{aggregate, ImpactTables, RateCalendar, YearlyImpactTable};
pub use config::{DualProduct, EdgePolicy, EngineConfig, PlanConfig};
pub use error::EmissionsError;
pub use model::{ImpactKey, PlanSeason, Strategy};
pub use product_info::{classify, BinMap, ProductCatalog, ProductEntry};
pub use shift::{implementation_blocks, implementation_windows, shift, Block};
pub use summary::{summarize, summarize_potential, ImpactSummary};

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Rates
    let rates = PyModule::new(m.py(), "rates")?;
    rates.add("REPORT_YEAR", schema::rates::REPORT_YEAR)?;
    rates.add("REPORT_MONTH", schema::rates::REPORT_MONTH)?;
    rates.add("REPORT_DAY", schema::rates::REPORT_DAY)?;
    rates.add("REPORT_HOUR", schema::rates::REPORT_HOUR)?;
    rates.add("RATE_SUFFIX", schema::rates::RATE_SUFFIX)?;
    m.add_submodule(&rates)?;

    // Indicators
    let indicators = PyModule::new(m.py(), "indicators")?;
    indicators.add("HOUR_ID", schema::indicators::HOUR_ID)?;
    indicators.add("MONTH", schema::indicators::MONTH)?;
    indicators.add("DAY", schema::indicators::DAY)?;
    m.add_submodule(&indicators)?;

    // Potential
    let potential = PyModule::new(m.py(), "potential")?;
    potential.add("YEAR", schema::potential::YEAR)?;
    m.add_submodule(&potential)?;

    // Product info
    let product_info = PyModule::new(m.py(), "product_info")?;
    product_info.add("PRODUCT", schema::product_info::PRODUCT)?;
    product_info.add("BIN", schema::product_info::BIN)?;
    product_info.add("SEASONALITY", schema::product_info::SEASONALITY)?;
    product_info.add("STRATEGY", schema::product_info::STRATEGY)?;
    m.add_submodule(&product_info)?;

    // Strategy
    let strategy = PyModule::new(m.py(), "strategy")?;
    strategy.add("SHIFT", schema::strategy::SHIFT)?;
    strategy.add("SHED", schema::strategy::SHED)?;
    m.add_submodule(&strategy)?;

    // Summary
    let summary = PyModule::new(m.py(), "summary")?;
    summary.add("SEASON", schema::summary::SEASON)?;
    summary.add("PLAN_SEASON_BIN", schema::summary::PLAN_SEASON_BIN)?;
    summary.add("SHED_SUFFIX", schema::summary::SHED_SUFFIX)?;
    summary.add("SHIFT_SUFFIX", schema::summary::SHIFT_SUFFIX)?;
    m.add_submodule(&summary)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    observability::init_tracing();
    m.add_class::<python::EmissionsModel>()?;
    add_schema_exports(m)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn extension_module_name_matches_pymodule() {
        let pyproject: toml::Table = include_str!("../pyproject.toml").parse().unwrap();
        let module_name = pyproject["tool"]["maturin"]["module-name"].as_str().unwrap();
        // The shared object is loaded through PyInit_<last path segment>.
        assert_eq!(module_name.rsplit('.').next(), Some("_core"));
        assert_eq!(module_name.split('.').next(), Some(env!("CARGO_CRATE_NAME")));
    }
}
