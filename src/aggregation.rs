use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::{EngineConfig, PlanConfig};
use crate::error::EmissionsError;
use crate::frames;
use crate::model::{ImpactKey, PlanSeason, Strategy};
use crate::product_info::{classify, ProductCatalog};
use crate::schema::calendar::{HOURS_PER_DAY, HOURS_PER_LEAP_YEAR, HOURS_PER_YEAR};
use crate::schema::{impact, indicators, potential, rates};
use crate::shift::shift;

/// Any non-leap year; DR hours tables follow its 365-day calendar.
const INDICATOR_YEAR: i32 = 2001;

/// Gregorian leap year.
pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// (month, day) of every hour of `year`, in calendar order.
fn hour_dates(year: i32) -> Result<Vec<(i64, i64)>, EmissionsError> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| EmissionsError::Domain(format!("Year {year} is out of range")))?;
    Ok(first
        .iter_days()
        .take_while(|d| d.year() == year)
        .flat_map(|d| {
            std::iter::repeat((i64::from(d.month()), i64::from(d.day()))).take(HOURS_PER_DAY)
        })
        .collect())
}

/// Sorted rate rows must walk the calendar of `year` one hour at a time,
/// with hours numbered 0-23 or 1-24.
fn check_hour_keys(year: i32, rows: &[(i64, i64, i64, f64)]) -> Result<(), EmissionsError> {
    let first_hour = rows.first().map_or(0, |&(_, _, hour, _)| hour);
    if first_hour != 0 && first_hour != 1 {
        return Err(EmissionsError::Shape(format!(
            "Hours of {year} start at {first_hour}, expected 0 or 1"
        )));
    }

    let expected = hour_dates(year)?;
    if expected.len() != rows.len() {
        return Err(EmissionsError::Shape(format!(
            "Rate series has {} hours for {}, expected {}",
            rows.len(),
            year,
            expected.len()
        )));
    }
    for (i, (&(month, day, hour, _), &(want_month, want_day))) in
        rows.iter().zip(&expected).enumerate()
    {
        let want_hour = first_hour + (i % HOURS_PER_DAY) as i64;
        if (month, day, hour) != (want_month, want_day, want_hour) {
            return Err(EmissionsError::Shape(format!(
                "Rate series for {year} has {month}/{day} hour {hour} where \
                 {want_month}/{want_day} hour {want_hour} belongs"
            )));
        }
    }
    Ok(())
}

/// The Month/Day columns of a DR hours table must follow a 365-day year.
fn check_indicator_calendar(hours: &DataFrame) -> Result<(), EmissionsError> {
    let months = frames::int_column(hours, indicators::MONTH)?;
    let days = frames::int_column(hours, indicators::DAY)?;
    let expected = hour_dates(INDICATOR_YEAR)?;
    if months.len() != expected.len() {
        return Err(EmissionsError::Shape(format!(
            "DR hours table has {} rows, expected {}",
            months.len(),
            expected.len()
        )));
    }

    for (row, ((&month, &day), &(want_month, want_day))) in
        months.iter().zip(&days).zip(&expected).enumerate()
    {
        if (month, day) != (want_month, want_day) {
            return Err(EmissionsError::Shape(format!(
                "DR hours row {row} is {month}/{day}, expected {want_month}/{want_day}"
            )));
        }
    }
    Ok(())
}

/// One scenario's hourly emissions rates, split by year and aligned to the
/// 8760-hour indicator calendar.
///
/// Rows are ordered by (month, day, hour). In leap years the 24 hours of
/// February 29 are removed so hour `i` of every year is the same calendar hour
/// as row `i` of a DR hours table.
#[derive(Debug, Clone)]
pub struct RateCalendar {
    years: Vec<i32>,
    hours: Vec<Vec<f64>>,
}

impl RateCalendar {
    pub fn from_frame(df: &DataFrame, scenario: &str) -> Result<Self, EmissionsError> {
        let rate_column = rates::rate_column(scenario);
        frames::require_columns(df, &rates::CALENDAR)?;
        frames::require_columns(df, &[rate_column.as_str()])?;

        let years = frames::int_column(df, rates::REPORT_YEAR)?;
        let months = frames::int_column(df, rates::REPORT_MONTH)?;
        let days = frames::int_column(df, rates::REPORT_DAY)?;
        let hours = frames::int_column(df, rates::REPORT_HOUR)?;
        let values = frames::float_column(df, &rate_column)?;

        let mut by_year: BTreeMap<i32, Vec<(i64, i64, i64, f64)>> = BTreeMap::new();
        for i in 0..df.height() {
            let year = i32::try_from(years[i]).map_err(|_| {
                EmissionsError::Domain(format!("Report year {} is out of range", years[i]))
            })?;
            by_year
                .entry(year)
                .or_default()
                .push((months[i], days[i], hours[i], values[i]));
        }

        let (Some(&first), Some(&last)) = (by_year.keys().next(), by_year.keys().next_back())
        else {
            return Err(EmissionsError::Shape("Rate series has no rows".to_string()));
        };
        if let Some(gap) = (first..=last).find(|y| !by_year.contains_key(y)) {
            return Err(EmissionsError::Shape(format!(
                "Rate series covers {first}-{last} but has no rows for {gap}"
            )));
        }

        let mut calendar_years = Vec::with_capacity(by_year.len());
        let mut calendar_hours = Vec::with_capacity(by_year.len());

        for (year, mut rows) in by_year {
            let leap = is_leap_year(year);
            let expected = if leap {
                HOURS_PER_LEAP_YEAR
            } else {
                HOURS_PER_YEAR
            };
            if rows.len() != expected {
                return Err(EmissionsError::Shape(format!(
                    "Rate series has {} hours for {}, expected {}",
                    rows.len(),
                    year,
                    expected
                )));
            }

            rows.sort_by_key(|&(month, day, hour, _)| (month, day, hour));
            check_hour_keys(year, &rows)?;
            if leap {
                rows.retain(|&(month, day, _, _)| !(month == 2 && day == 29));
            }

            calendar_years.push(year);
            calendar_hours.push(rows.into_iter().map(|(_, _, _, rate)| rate).collect());
        }

        Ok(Self {
            years: calendar_years,
            hours: calendar_hours,
        })
    }

    /// Horizon years, ascending.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn hours(&self, year: i32) -> Option<&[f64]> {
        self.years
            .iter()
            .position(|&y| y == year)
            .map(|i| self.hours[i].as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &[f64])> {
        self.years
            .iter()
            .copied()
            .zip(self.hours.iter().map(|h| h.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Avoided emissions for one product-year: rate x signed hours x potential,
/// summed over hours and converted to metric tons CO2e.
pub fn yearly_impact(
    rates: &[f64],
    signed_hours: &[i8],
    potential: f64,
    conversion_factor: f64,
) -> Result<f64, EmissionsError> {
    if rates.len() != signed_hours.len() {
        return Err(EmissionsError::Shape(format!(
            "{} hourly rates paired with {} DR hours",
            rates.len(),
            signed_hours.len()
        )));
    }
    let total: f64 = rates
        .iter()
        .zip(signed_hours)
        .map(|(rate, &sign)| rate * f64::from(sign) * potential)
        .sum();
    Ok(total * conversion_factor)
}

/// Yearly avoided emissions for one (plan, season, bin): a `Year` column and
/// one column per product.
#[derive(Debug, Clone)]
pub struct YearlyImpactTable {
    pub key: ImpactKey,
    pub frame: DataFrame,
}

/// Every computed impact table, in plan / season / bin order.
#[derive(Debug, Clone, Default)]
pub struct ImpactTables {
    tables: Vec<YearlyImpactTable>,
}

impl ImpactTables {
    pub fn from_tables(tables: Vec<YearlyImpactTable>) -> Self {
        Self { tables }
    }

    pub fn get(&self, key: &ImpactKey) -> Option<&DataFrame> {
        self.tables.iter().find(|t| &t.key == key).map(|t| &t.frame)
    }

    pub fn iter(&self) -> impl Iterator<Item = &YearlyImpactTable> {
        self.tables.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ImpactKey> {
        self.tables.iter().map(|t| &t.key)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Sum of every product column over all years, or `None` when the key has
    /// no table.
    pub fn bin_total(&self, key: &ImpactKey) -> Result<Option<f64>, EmissionsError> {
        let Some(frame) = self.get(key) else {
            return Ok(None);
        };
        let mut total = 0.0;
        for product in frames::value_columns(frame, &[impact::YEAR]) {
            total += frames::column_sum(frame, &product)?;
        }
        Ok(Some(total))
    }
}

impl IntoIterator for ImpactTables {
    type Item = YearlyImpactTable;
    type IntoIter = std::vec::IntoIter<YearlyImpactTable>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}

/// Compute yearly avoided emissions for every configured (plan, season, bin).
///
/// Plans and seasons run in configured order. Any failure aborts the whole run
/// and carries the plan / season / bin / product / year being computed.
pub fn aggregate(
    rates: &DataFrame,
    indicators: &BTreeMap<PlanSeason, DataFrame>,
    potential: &BTreeMap<PlanSeason, DataFrame>,
    product_info: &BTreeMap<String, DataFrame>,
    config: &EngineConfig,
) -> Result<ImpactTables, EmissionsError> {
    let calendar = RateCalendar::from_frame(rates, &config.scenario)
        .map_err(|e| e.context(format!("scenario '{}'", config.scenario)))?;

    let mut tables = Vec::new();
    for plan in &config.plans {
        let info = product_info.get(&plan.name).ok_or_else(|| {
            EmissionsError::MissingData(format!("No product info for plan '{}'", plan.name))
        })?;
        let catalog = ProductCatalog::from_frame(&plan.name, info, config)
            .map_err(|e| e.context(format!("plan '{}'", plan.name)))?;

        for season in &plan.seasons {
            let key = PlanSeason::new(plan.name.as_str(), season.as_str());
            let season_tables =
                aggregate_season(&calendar, &key, plan, &catalog, indicators, potential, config)
                    .map_err(|e| {
                        e.context(format!("plan '{}', season '{}'", key.plan, key.season))
                    })?;
            tables.extend(season_tables);
        }
    }

    info!(
        tables = tables.len(),
        years = calendar.len(),
        scenario = %config.scenario,
        "computed yearly emissions impacts"
    );
    Ok(ImpactTables::from_tables(tables))
}

/// The potential table for a (plan, season), honouring the season fallback.
pub fn resolve_potential<'a>(
    potential: &'a BTreeMap<PlanSeason, DataFrame>,
    key: &PlanSeason,
    config: &EngineConfig,
) -> Result<&'a DataFrame, EmissionsError> {
    if let Some(df) = potential.get(key) {
        return Ok(df);
    }
    if let Some(fallback) = config.potential_fallback.get(&key.season) {
        let fallback_key = PlanSeason::new(key.plan.as_str(), fallback.as_str());
        if let Some(df) = potential.get(&fallback_key) {
            debug!(season = %key.season, fallback = %fallback, plan = %key.plan, "using fallback potential");
            return Ok(df);
        }
    }
    Err(EmissionsError::MissingData(format!(
        "No DR potential for plan '{}', season '{}'",
        key.plan, key.season
    )))
}

/// A product's potential in each horizon year.
pub(crate) fn yearly_potential(
    df: &DataFrame,
    column: &str,
    years: &[i32],
) -> Result<Vec<f64>, EmissionsError> {
    if df.column(column).is_err() {
        return Err(EmissionsError::Lookup(format!(
            "Product '{column}' has DR hours but no potential column"
        )));
    }
    let table_years = frames::int_column(df, potential::YEAR)?;
    let values = frames::float_column(df, column)?;

    years
        .iter()
        .map(|&year| {
            let mut rows = table_years
                .iter()
                .enumerate()
                .filter(|&(_, &y)| y == i64::from(year));
            match (rows.next(), rows.next()) {
                (Some((i, _)), None) => Ok(values[i]),
                (None, _) => Err(EmissionsError::Shape(format!(
                    "Potential table has no row for {year}"
                ))),
                (Some(_), Some(_)) => Err(EmissionsError::Shape(format!(
                    "Potential table has more than one row for {year}"
                ))),
            }
        })
        .collect()
}

fn participating_columns(hours: &DataFrame, plan: &PlanConfig) -> Vec<String> {
    frames::value_columns(hours, &indicators::CALENDAR)
        .into_iter()
        .filter(|c| plan.products.as_ref().map_or(true, |keep| keep.contains(c)))
        .collect()
}

fn aggregate_season(
    calendar: &RateCalendar,
    key: &PlanSeason,
    plan: &PlanConfig,
    catalog: &ProductCatalog,
    indicators: &BTreeMap<PlanSeason, DataFrame>,
    potential: &BTreeMap<PlanSeason, DataFrame>,
    config: &EngineConfig,
) -> Result<Vec<YearlyImpactTable>, EmissionsError> {
    let hours = indicators.get(key).ok_or_else(|| {
        EmissionsError::MissingData(format!(
            "No DR hours for plan '{}', season '{}'",
            key.plan, key.season
        ))
    })?;
    let pot = resolve_potential(potential, key, config)?;

    if hours.height() != HOURS_PER_YEAR {
        return Err(EmissionsError::Shape(format!(
            "DR hours table has {} rows, expected {}",
            hours.height(),
            HOURS_PER_YEAR
        )));
    }
    check_indicator_calendar(hours)?;

    let products = catalog.participants(&participating_columns(hours, plan))?;
    let bins = classify(catalog, &products)?;

    // Per source column: raw indicator, shifted series and yearly potential.
    let mut raw: HashMap<String, Vec<i8>> = HashMap::new();
    let mut shifted: HashMap<String, Vec<i8>> = HashMap::new();
    let mut yearly: HashMap<String, Vec<f64>> = HashMap::new();

    for product in &products {
        let entry = catalog.entry(product)?;
        let source = entry.source_column.as_str();
        if !raw.contains_key(source) {
            let indicator = frames::indicator_column(hours, source)
                .map_err(|e| e.context(format!("product '{product}'")))?;
            raw.insert(source.to_string(), indicator);
            let potential = yearly_potential(pot, source, calendar.years())
                .map_err(|e| e.context(format!("product '{product}'")))?;
            yearly.insert(source.to_string(), potential);
        }
        if entry.strategy == Strategy::Shift && !shifted.contains_key(source) {
            let series = shift(&raw[source], config.shift_half_width, config.edge_policy)
                .map_err(|e| e.context(format!("product '{product}'")))?;
            shifted.insert(source.to_string(), series);
        }
    }

    let mut tables = Vec::with_capacity(bins.len());
    for (bin, bin_products) in bins.iter() {
        let mut columns = vec![Column::new(impact::YEAR.into(), calendar.years().to_vec())];

        for product in bin_products {
            let entry = catalog.entry(product)?;
            let source = entry.source_column.as_str();
            let series = match entry.strategy {
                Strategy::Shed => &raw[source],
                Strategy::Shift => &shifted[source],
            };

            let totals = calendar
                .iter()
                .zip(&yearly[source])
                .map(|((year, year_rates), &year_potential)| {
                    yearly_impact(year_rates, series, year_potential, config.conversion_factor)
                        .map_err(|e| e.context(format!("year {year}")))
                })
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| e.context(format!("bin '{bin}', product '{product}'")))?;

            columns.push(Column::new(product.as_str().into(), totals));
        }

        let impact_key = ImpactKey::new(key.plan.as_str(), key.season.as_str(), bin);
        debug!(table = %impact_key, products = bin_products.len(), "computed bin impacts");
        tables.push(YearlyImpactTable {
            key: impact_key,
            frame: DataFrame::new(columns)?,
        });
    }

    Ok(tables)
}
