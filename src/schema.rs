/// Column-name constants for the emissions engine's tabular contracts.
/// Single source of truth - exported to Python via PyO3.

// ── Hourly emissions rate columns ───────────────────────────────────────────
pub mod rates {
    pub const REPORT_YEAR: &str = "Report_Year";
    pub const REPORT_MONTH: &str = "Report_Month";
    pub const REPORT_DAY: &str = "Report_Day";
    pub const REPORT_HOUR: &str = "Report_Hour";
    pub const RATE_SUFFIX: &str = " Emissions Rate Estimate";

    pub const CALENDAR: [&str; 4] = [REPORT_YEAR, REPORT_MONTH, REPORT_DAY, REPORT_HOUR];

    /// Rate column for a scenario, e.g. "Baseline Emissions Rate Estimate".
    pub fn rate_column(scenario: &str) -> String {
        format!("{scenario}{RATE_SUFFIX}")
    }
}

// ── DR hours (indicator) columns ────────────────────────────────────────────
pub mod indicators {
    pub const HOUR_ID: &str = "hourID";
    pub const MONTH: &str = "Month";
    pub const DAY: &str = "Day";

    /// Calendar columns; every other column is a product.
    pub const CALENDAR: [&str; 3] = [HOUR_ID, MONTH, DAY];
}

// ── DR potential columns ────────────────────────────────────────────────────
pub mod potential {
    pub const YEAR: &str = "Year";
}

// ── Product info columns ────────────────────────────────────────────────────
pub mod product_info {
    pub const PRODUCT: &str = "Product";
    pub const BIN: &str = "Bin";
    pub const SEASONALITY: &str = "Seasonality";
    pub const STRATEGY: &str = "Shift or Shed?";

    pub const ALL: [&str; 4] = [PRODUCT, BIN, SEASONALITY, STRATEGY];
}

// ── Strategy values ─────────────────────────────────────────────────────────
pub mod strategy {
    pub const SHIFT: &str = "Shift";
    pub const SHED: &str = "Shed";
}

// ── Yearly impact table columns ─────────────────────────────────────────────
pub mod impact {
    pub const YEAR: &str = "Year";
}

// ── Summary table columns ───────────────────────────────────────────────────
pub mod summary {
    pub const SEASON: &str = "Season";
    pub const PLAN_SEASON_BIN: &str = "DR Plan, Season, and Bin";
    pub const SHED_SUFFIX: &str = "_shed";
    pub const SHIFT_SUFFIX: &str = "_shift";

    pub fn potential_column(year: i32) -> String {
        format!("{year} Potential")
    }
}

// ── Calendar constants ──────────────────────────────────────────────────────
pub mod calendar {
    pub const HOURS_PER_DAY: usize = 24;
    pub const HOURS_PER_YEAR: usize = 8760;
    pub const HOURS_PER_LEAP_YEAR: usize = 8784;
}
