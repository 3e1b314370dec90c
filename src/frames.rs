//! Column extraction helpers shared by the engine stages.

use polars::prelude::*;

use crate::error::EmissionsError;

pub(crate) fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), EmissionsError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(EmissionsError::Shape(format!("Missing column: {col_name}")));
        }
    }
    Ok(())
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, EmissionsError> {
    df.column(name)
        .map_err(|_| EmissionsError::Shape(format!("Missing column: {name}")))
}

/// Integer column without nulls. Fractional values are rejected, never truncated.
pub(crate) fn int_column(df: &DataFrame, name: &str) -> Result<Vec<i64>, EmissionsError> {
    let source = column(df, name)?;
    if source.dtype().is_integer() {
        let cast = source.cast(&DataType::Int64)?;
        let values = cast.i64()?;
        if values.null_count() > 0 {
            return Err(EmissionsError::Shape(format!(
                "Column '{}' has {} missing values",
                name,
                values.null_count()
            )));
        }
        return Ok(values.into_no_null_iter().collect());
    }

    float_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i64)
            } else {
                Err(EmissionsError::Domain(format!(
                    "Column '{name}' has non-integer value {v} at row {row}"
                )))
            }
        })
        .collect()
}

/// Float column without nulls.
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, EmissionsError> {
    let cast = column(df, name)?.cast(&DataType::Float64)?;
    let values = cast.f64()?;
    if values.null_count() > 0 {
        return Err(EmissionsError::Shape(format!(
            "Column '{}' has {} missing or non-numeric values",
            name,
            values.null_count()
        )));
    }
    Ok(values.into_no_null_iter().collect())
}

/// A {0,1} indicator column as a signed hourly series.
pub(crate) fn indicator_column(df: &DataFrame, name: &str) -> Result<Vec<i8>, EmissionsError> {
    int_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(hour, v)| match v {
            0 => Ok(0),
            1 => Ok(1),
            other => Err(EmissionsError::Domain(format!(
                "Indicator '{name}' has value {other} at hour {hour}; must be 0 or 1"
            ))),
        })
        .collect()
}

/// Sum of a float column, treating nulls as absent.
pub(crate) fn column_sum(df: &DataFrame, name: &str) -> Result<f64, EmissionsError> {
    let cast = column(df, name)?.cast(&DataType::Float64)?;
    Ok(cast.f64()?.sum().unwrap_or(0.0))
}

/// Column names that are not in `exclude`, in frame order.
pub(crate) fn value_columns(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    df.get_column_names_str()
        .into_iter()
        .filter(|c| !exclude.contains(c))
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_rejects_values_outside_zero_one() {
        let df = df!("DVR" => [0i64, 1, 2]).unwrap();
        let err = indicator_column(&df, "DVR").unwrap_err();
        assert!(matches!(err, EmissionsError::Domain(_)));
    }

    #[test]
    fn indicator_rejects_fractional_values() {
        let df = df!("DVR" => [0.0, 1.7]).unwrap();
        let err = indicator_column(&df, "DVR").unwrap_err();
        assert!(matches!(err, EmissionsError::Domain(_)));

        let df = df!("DVR" => [0.4, 0.0]).unwrap();
        assert!(matches!(
            indicator_column(&df, "DVR").unwrap_err(),
            EmissionsError::Domain(_)
        ));

        let whole = df!("DVR" => [0.0, 1.0, 1.0]).unwrap();
        assert_eq!(indicator_column(&whole, "DVR").unwrap(), vec![0, 1, 1]);
    }

    #[test]
    fn int_column_reads_integer_and_string_columns() {
        let df = df!("Year" => [2022i32, 2023], "Hour" => ["1", "24"]).unwrap();
        assert_eq!(int_column(&df, "Year").unwrap(), vec![2022, 2023]);
        assert_eq!(int_column(&df, "Hour").unwrap(), vec![1, 24]);

        let bad = df!("Hour" => ["1", "x"]).unwrap();
        assert!(matches!(
            int_column(&bad, "Hour").unwrap_err(),
            EmissionsError::Shape(_)
        ));
    }

    #[test]
    fn float_column_rejects_nulls() {
        let df = df!("Year" => [Some(1.0), None]).unwrap();
        let err = float_column(&df, "Year").unwrap_err();
        assert!(matches!(err, EmissionsError::Shape(_)));
    }

    #[test]
    fn missing_column_is_shape_error() {
        let df = df!("Year" => [2022i32]).unwrap();
        assert!(matches!(
            require_columns(&df, &["Year", "DVR"]).unwrap_err(),
            EmissionsError::Shape(_)
        ));
        assert_eq!(value_columns(&df, &["Year"]), Vec::<String>::new());
    }
}
