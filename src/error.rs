#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmissionsError {
    /// Wrong series length, wrong per-year hour count or mismatched paired inputs.
    #[error("Shape: {0}")]
    Shape(String),

    /// A product has no (or more than one) matching product-info row.
    #[error("Lookup: {0}")]
    Lookup(String),

    /// A value outside its valid domain.
    #[error("Domain: {0}")]
    Domain(String),

    /// A requested (plan, season) is absent from the input mappings.
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{context}: {source}")]
    InContext {
        context: String,
        #[source]
        source: Box<EmissionsError>,
    },
}

impl EmissionsError {
    /// Wrap the error with the computation it interrupted.
    pub fn context(self, context: impl Into<String>) -> Self {
        EmissionsError::InContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The underlying error with every context layer stripped.
    pub fn root(&self) -> &EmissionsError {
        match self {
            EmissionsError::InContext { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(feature = "python")]
impl From<EmissionsError> for PyErr {
    fn from(err: EmissionsError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_strips_nested_context() {
        let err = EmissionsError::Domain("odd block".into())
            .context("product 'ResTOU_shift'")
            .context("plan 'newbins', season 'Summer'");

        assert!(matches!(err.root(), EmissionsError::Domain(_)));
        assert_eq!(
            err.to_string(),
            "plan 'newbins', season 'Summer': product 'ResTOU_shift': Domain: odd block"
        );
    }
}
