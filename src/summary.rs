//! Season-by-bin summaries of the yearly impact tables, for comparison reporting.

use std::collections::{BTreeMap, HashMap};

use polars::prelude::*;
use tracing::debug;

use crate::aggregation::{resolve_potential, yearly_potential, ImpactTables};
use crate::config::{DualProduct, EngineConfig};
use crate::error::EmissionsError;
use crate::frames;
use crate::model::{bin_slug, ImpactKey, PlanSeason};
use crate::product_info::{classify, ProductCatalog};
use crate::schema::{impact, potential, summary};

/// `comparison`: one row per season, one column per (plan, bin); the dual
/// product's bin is split into a shed and a shift column.
/// `detail`: one row per season, one column per product of the dual bin.
#[derive(Debug, Clone)]
pub struct ImpactSummary {
    pub comparison: DataFrame,
    pub detail: DataFrame,
}

/// Season-indexed float columns, filled cell by cell in first-seen order.
#[derive(Debug, Default)]
struct SeasonColumns {
    columns: Vec<(String, HashMap<String, f64>)>,
}

impl SeasonColumns {
    fn set(&mut self, column: &str, season: &str, value: f64) {
        let i = match self.columns.iter().position(|(name, _)| name == column) {
            Some(i) => i,
            None => {
                self.columns.push((column.to_string(), HashMap::new()));
                self.columns.len() - 1
            }
        };
        self.columns[i].1.insert(season.to_string(), value);
    }

    fn into_frame(self, seasons: &[String]) -> Result<DataFrame, EmissionsError> {
        let mut columns = vec![Column::new(summary::SEASON.into(), seasons.to_vec())];
        for (name, cells) in self.columns {
            let values: Vec<Option<f64>> = seasons.iter().map(|s| cells.get(s).copied()).collect();
            columns.push(Column::new(name.into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

fn product_totals(frame: &DataFrame) -> Result<Vec<(String, f64)>, EmissionsError> {
    frames::value_columns(frame, &[impact::YEAR])
        .into_iter()
        .map(|product| {
            let total = frames::column_sum(frame, &product)?;
            Ok((product, total))
        })
        .collect()
}

fn is_dual_table(dual: &DualProduct, key: &ImpactKey, totals: &[(String, f64)]) -> bool {
    let has = |name: String| totals.iter().any(|(p, _)| *p == name);
    key.plan == dual.plan && has(dual.shift_name()) && has(dual.shed_name())
}

/// Collapse per-year impact tables into season-by-bin totals.
///
/// Missing (plan, season, bin) combinations stay null rather than zero.
pub fn summarize(
    tables: &ImpactTables,
    dual: Option<&DualProduct>,
) -> Result<ImpactSummary, EmissionsError> {
    let mut seasons: Vec<String> = Vec::new();
    let mut comparison = SeasonColumns::default();
    let mut detail = SeasonColumns::default();
    let mut dual_bin: Option<&str> = None;

    for table in tables.iter() {
        let key = &table.key;
        if !seasons.contains(&key.season) {
            seasons.push(key.season.clone());
        }

        let totals = product_totals(&table.frame)?;
        let column = format!("{}_{}", key.plan, bin_slug(&key.bin));

        match dual.filter(|d| is_dual_table(d, key, &totals)) {
            Some(d) => {
                if let Some(bin) = dual_bin.filter(|b| *b != key.bin) {
                    return Err(EmissionsError::Lookup(format!(
                        "Dual product '{}' appears in both '{}' and '{}'",
                        d.product, bin, key.bin
                    )));
                }
                dual_bin = Some(key.bin.as_str());

                let (shift_name, shed_name) = (d.shift_name(), d.shed_name());
                let sum_without = |skip: &str| -> f64 {
                    totals
                        .iter()
                        .filter(|(p, _)| p != skip)
                        .map(|(_, v)| v)
                        .sum()
                };
                comparison.set(
                    &format!("{column}{}", summary::SHED_SUFFIX),
                    &key.season,
                    sum_without(&shift_name),
                );
                comparison.set(
                    &format!("{column}{}", summary::SHIFT_SUFFIX),
                    &key.season,
                    sum_without(&shed_name),
                );
                for (product, total) in &totals {
                    detail.set(product, &key.season, *total);
                }
            }
            None => {
                let total = totals.iter().map(|(_, v)| v).sum();
                comparison.set(&column, &key.season, total);
            }
        }
    }

    debug!(
        seasons = seasons.len(),
        columns = comparison.columns.len(),
        "summarized impact tables"
    );

    Ok(ImpactSummary {
        comparison: comparison.into_frame(&seasons)?,
        detail: detail.into_frame(&seasons)?,
    })
}

/// Total DR potential of each (plan, season, bin) in `year`.
///
/// A product read by two catalog entries (the dual product) is counted once.
pub fn summarize_potential(
    potential_tables: &BTreeMap<PlanSeason, DataFrame>,
    product_info: &BTreeMap<String, DataFrame>,
    config: &EngineConfig,
    year: i32,
) -> Result<DataFrame, EmissionsError> {
    let mut labels: Vec<String> = Vec::new();
    let mut totals: Vec<f64> = Vec::new();

    for plan in &config.plans {
        let info = product_info.get(&plan.name).ok_or_else(|| {
            EmissionsError::MissingData(format!("No product info for plan '{}'", plan.name))
        })?;
        let catalog = ProductCatalog::from_frame(&plan.name, info, config)?;

        for season in &plan.seasons {
            let key = PlanSeason::new(plan.name.as_str(), season.as_str());
            let pot = resolve_potential(potential_tables, &key, config)?;

            let columns: Vec<String> = frames::value_columns(pot, &[potential::YEAR])
                .into_iter()
                .filter(|c| plan.products.as_ref().map_or(true, |keep| keep.contains(c)))
                .collect();
            let products = catalog.participants(&columns)?;

            for (bin, bin_products) in classify(&catalog, &products)?.iter() {
                let mut sources: Vec<&str> = Vec::new();
                for product in bin_products {
                    let source = catalog.entry(product)?.source_column.as_str();
                    if !sources.contains(&source) {
                        sources.push(source);
                    }
                }

                let mut total = 0.0;
                for source in sources {
                    total += yearly_potential(pot, source, &[year])?[0];
                }
                labels.push(format!("{}_{}_{}", key.plan, key.season, bin_slug(bin)));
                totals.push(total);
            }
        }
    }

    Ok(DataFrame::new(vec![
        Column::new(summary::PLAN_SEASON_BIN.into(), labels),
        Column::new(summary::potential_column(year).into(), totals),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::YearlyImpactTable;

    fn flat_table(key: ImpactKey, products: &[&str], value: f64) -> YearlyImpactTable {
        let mut columns = vec![Column::new("Year".into(), vec![2022i32])];
        for product in products {
            columns.push(Column::new((*product).into(), vec![value]));
        }
        YearlyImpactTable {
            key,
            frame: DataFrame::new(columns).unwrap(),
        }
    }

    fn cell(df: &DataFrame, column: &str, row: usize) -> Option<f64> {
        df.column(column).unwrap().f64().unwrap().get(row)
    }

    #[test]
    fn bin_totals_scale_with_product_count() {
        let v = 2.5;
        let products = ["A", "B", "C"];
        let tables = ImpactTables::from_tables(
            (1..=4)
                .map(|b| flat_table(ImpactKey::new("oldbins", "Summer", format!("Bin {b}")), &products, v))
                .collect(),
        );

        let mut sum = 0.0;
        for key in tables.keys() {
            let total = tables.bin_total(key).unwrap().unwrap();
            assert!((total - v * products.len() as f64).abs() < 1e-12);
            sum += total;
        }
        assert!((sum - 4.0 * v * products.len() as f64).abs() < 1e-12);

        let summary = summarize(&tables, None).unwrap();
        assert_eq!(summary.comparison.height(), 1);
        assert_eq!(summary.comparison.width(), 5);
        assert_eq!(cell(&summary.comparison, "oldbins_bin3", 0), Some(7.5));
        assert_eq!(summary.detail.width(), 1);
    }

    #[test]
    fn dual_bin_splits_into_shed_and_shift_columns() {
        let dual = EngineConfig::default().dual_product.unwrap();
        let key = ImpactKey::new("newbins", "Summer", "Bin 1");
        let frame = df!(
            "Year" => [2022i32, 2023],
            "DVR" => [1.0, 1.0],
            "ResTOU_shift" => [-4.0, -4.0],
            "ResTOU_shed" => [10.0, 10.0]
        )
        .unwrap();
        let tables = ImpactTables::from_tables(vec![
            flat_table(ImpactKey::new("oldbins", "Summer", "Bin 1"), &["DVR"], 3.0),
            YearlyImpactTable { key, frame },
        ]);

        let summary = summarize(&tables, Some(&dual)).unwrap();
        let names: Vec<&str> = summary.comparison.get_column_names_str();
        assert_eq!(
            names,
            vec!["Season", "oldbins_bin1", "newbins_bin1_shed", "newbins_bin1_shift"]
        );
        assert_eq!(cell(&summary.comparison, "newbins_bin1_shed", 0), Some(22.0));
        assert_eq!(cell(&summary.comparison, "newbins_bin1_shift", 0), Some(-6.0));

        let detail: Vec<&str> = summary.detail.get_column_names_str();
        assert_eq!(detail, vec!["Season", "DVR", "ResTOU_shift", "ResTOU_shed"]);
        assert_eq!(cell(&summary.detail, "ResTOU_shed", 0), Some(20.0));
    }

    #[test]
    fn absent_seasons_stay_null() {
        let tables = ImpactTables::from_tables(vec![
            flat_table(ImpactKey::new("newbins", "Fall", "Bin 1"), &["DVR"], 1.0),
            flat_table(ImpactKey::new("oldbins", "Summer", "Bin 1"), &["DVR"], 1.0),
        ]);

        let missing = ImpactKey::new("oldbins", "Fall", "Bin 1");
        assert_eq!(tables.bin_total(&missing).unwrap(), None);

        let summary = summarize(&tables, None).unwrap();
        // Row 0 is Fall, which oldbins never reports.
        assert_eq!(cell(&summary.comparison, "oldbins_bin1", 0), None);
        assert_eq!(cell(&summary.comparison, "oldbins_bin1", 1), Some(1.0));
    }

    #[test]
    fn potential_summary_counts_dual_product_once() {
        let config = EngineConfig::default();
        let info = df!(
            "Product" => ["DVR", "ResTOU"],
            "Bin" => ["Bin 1", "Bin 1"],
            "Seasonality" => ["Summer", "Summer"],
            "Shift or Shed?" => ["Shed", "Shift"]
        )
        .unwrap();
        let winter = df!(
            "Year" => [2040i32, 2041],
            "DVR" => [1.0, 2.0],
            "ResTOU" => [10.0, 20.0],
            "NRCurtailCom" => [5.0, 5.0]
        )
        .unwrap();

        let mut config_one_plan = config.clone();
        config_one_plan.plans.retain(|p| p.name == "newbins");
        config_one_plan.plans[0].seasons = vec!["Winter".to_string(), "Fall".to_string()];

        let out = summarize_potential(
            &BTreeMap::from([(PlanSeason::new("newbins", "Winter"), winter)]),
            &BTreeMap::from([("newbins".to_string(), info)]),
            &config_one_plan,
            2041,
        )
        .unwrap();

        let labels: Vec<&str> = out
            .column("DR Plan, Season, and Bin")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(labels, vec!["newbins_Winter_bin1", "newbins_Fall_bin1"]);
        assert_eq!(cell(&out, "2041 Potential", 0), Some(22.0));
        assert_eq!(cell(&out, "2041 Potential", 1), Some(22.0));
    }
}
