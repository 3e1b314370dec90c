//! Per-plan product metadata and bin classification.

use polars::prelude::*;

use crate::config::EngineConfig;
use crate::error::EmissionsError;
use crate::frames;
use crate::model::Strategy;
use crate::schema::product_info;

/// One product-info row after synonym rewriting and dual expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductEntry {
    pub product: String,
    pub bin: String,
    pub seasonality: String,
    pub strategy: Strategy,
    /// Indicator / potential column this entry reads.
    pub source_column: String,
}

/// Product metadata for a single plan, in declared order.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    pub plan: String,
    entries: Vec<ProductEntry>,
}

impl ProductCatalog {
    pub fn new(plan: impl Into<String>, entries: Vec<ProductEntry>) -> Self {
        Self {
            plan: plan.into(),
            entries,
        }
    }

    /// Build a plan's catalog from its product-info table.
    ///
    /// Required columns: Product, Bin, Seasonality, "Shift or Shed?".
    /// Rows without a product are skipped. The plan's dual product, if any, is
    /// replaced by `<product>_shift` (Shift) and `<product>_shed` (Shed), both
    /// reading the source product's data.
    pub fn from_frame(
        plan: &str,
        df: &DataFrame,
        config: &EngineConfig,
    ) -> Result<Self, EmissionsError> {
        frames::require_columns(df, &product_info::ALL)?;

        let trimmed = df
            .clone()
            .lazy()
            .select(
                product_info::ALL
                    .iter()
                    .map(|&c| {
                        col(c)
                            .cast(DataType::String)
                            .str()
                            .strip_chars(lit(" \t\r\n"))
                    })
                    .collect::<Vec<_>>(),
            )
            .collect()?;

        let products = trimmed.column(product_info::PRODUCT)?.str()?;
        let bins = trimmed.column(product_info::BIN)?.str()?;
        let seasonalities = trimmed.column(product_info::SEASONALITY)?.str()?;
        let strategies = trimmed.column(product_info::STRATEGY)?.str()?;

        let dual = config.dual_for(plan);
        let mut entries: Vec<ProductEntry> = Vec::new();
        let mut dual_seen = false;

        for i in 0..trimmed.height() {
            let Some(raw_name) = products.get(i).filter(|p| !p.is_empty()) else {
                continue;
            };
            let name = config
                .product_synonyms
                .get(raw_name)
                .cloned()
                .unwrap_or_else(|| raw_name.to_string());

            if entries.iter().any(|e| e.source_column == name) {
                return Err(EmissionsError::Lookup(format!(
                    "Product '{name}' appears more than once in plan '{plan}'"
                )));
            }

            let bin = bins.get(i).ok_or_else(|| {
                EmissionsError::Lookup(format!("Product '{name}' in plan '{plan}' has no bin"))
            })?;
            let strategy: Strategy = strategies.get(i).unwrap_or_default().parse()?;
            let seasonality = seasonalities.get(i).unwrap_or_default().to_string();

            match dual.filter(|d| d.product == name) {
                Some(d) => {
                    dual_seen = true;
                    for (product, strategy) in
                        [(d.shift_name(), Strategy::Shift), (d.shed_name(), Strategy::Shed)]
                    {
                        entries.push(ProductEntry {
                            product,
                            bin: bin.to_string(),
                            seasonality: seasonality.clone(),
                            strategy,
                            source_column: name.clone(),
                        });
                    }
                }
                None => entries.push(ProductEntry {
                    product: name.clone(),
                    bin: bin.to_string(),
                    seasonality,
                    strategy,
                    source_column: name,
                }),
            }
        }

        if let Some(d) = dual {
            if !dual_seen {
                return Err(EmissionsError::Lookup(format!(
                    "Dual product '{}' has no product info in plan '{}'",
                    d.product, plan
                )));
            }
        }

        Ok(Self::new(plan, entries))
    }

    pub fn entries(&self) -> &[ProductEntry] {
        &self.entries
    }

    /// The single entry named `product`.
    pub fn entry(&self, product: &str) -> Result<&ProductEntry, EmissionsError> {
        let mut matches = self.entries.iter().filter(|e| e.product == product);
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Ok(entry),
            (None, _) => Err(EmissionsError::Lookup(format!(
                "Product '{}' has no product info in plan '{}'",
                product, self.plan
            ))),
            (Some(_), Some(_)) => Err(EmissionsError::Lookup(format!(
                "Product '{}' has more than one product-info row in plan '{}'",
                product, self.plan
            ))),
        }
    }

    /// Expand data columns into participating product names, in column order.
    /// A dual source column expands to its shift entry, then its shed entry.
    pub fn participants(&self, columns: &[String]) -> Result<Vec<String>, EmissionsError> {
        let mut names = Vec::new();
        for column in columns {
            let before = names.len();
            names.extend(
                self.entries
                    .iter()
                    .filter(|e| &e.source_column == column)
                    .map(|e| e.product.clone()),
            );
            if names.len() == before {
                return Err(EmissionsError::Lookup(format!(
                    "Product '{}' has no product info in plan '{}'",
                    column, self.plan
                )));
            }
        }
        Ok(names)
    }
}

/// Bin label -> products, both in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinMap(Vec<(String, Vec<String>)>);

impl BinMap {
    pub fn get(&self, bin: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(b, _)| b == bin)
            .map(|(_, products)| products.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(b, p)| (b.as_str(), p.as_slice()))
    }

    pub fn bins(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(b, _)| b.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, bin: &str, product: &str) {
        match self.0.iter_mut().find(|(b, _)| b == bin) {
            Some((_, products)) => products.push(product.to_string()),
            None => self.0.push((bin.to_string(), vec![product.to_string()])),
        }
    }
}

/// Group products by bin label. Every product needs exactly one catalog entry.
pub fn classify(catalog: &ProductCatalog, products: &[String]) -> Result<BinMap, EmissionsError> {
    let mut bins = BinMap::default();
    for product in products {
        let entry = catalog.entry(product)?;
        bins.push(&entry.bin, product);
    }
    Ok(bins)
}
