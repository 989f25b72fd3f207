use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;

use super::arima::Arima111;
use crate::error::ForecastError;

/// Calendar month as (year, month 1-12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn of(dt: &NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Document counts per month (rows) and category (columns). There is one row
/// per month holding at least one document; months with no documents at all
/// get no row. A category absent from an observed month counts 0 there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyMatrix {
    pub months: Vec<Month>,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl MonthlyMatrix {
    pub fn build(entries: &[(NaiveDateTime, &str)]) -> Self {
        let months: Vec<Month> = entries
            .iter()
            .map(|(ts, _)| Month::of(ts))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: BTreeMap<Month, usize> = months.iter().enumerate().map(|(i, m)| (*m, i)).collect();

        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (ts, category) in entries {
            let column = columns
                .entry(category.to_string())
                .or_insert_with(|| vec![0.0; months.len()]);
            column[row_of[&Month::of(ts)]] += 1.0;
        }

        Self { months, columns }
    }

    pub fn month_keys(&self) -> Vec<String> {
        self.months.iter().map(Month::key).collect()
    }

    /// Keys of the `horizon` months following the last row.
    pub fn future_keys(&self, horizon: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(horizon);
        if let Some(&last) = self.months.last() {
            let mut m = last;
            for _ in 0..horizon {
                m = m.next();
                out.push(m.key());
            }
        }
        out
    }
}

/// Forecast for one category, or the reason it is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryForecast {
    pub values: Vec<f64>,
    pub phi: f64,
    pub theta: f64,
}

/// Fit a model per configured category present in the matrix. A failing
/// category is logged and reported as an error for that category alone;
/// categories missing from the matrix are not reported at all.
pub fn forecast_categories(
    matrix: &MonthlyMatrix,
    categories: &[String],
    horizon: usize,
) -> BTreeMap<String, Result<CategoryForecast, ForecastError>> {
    categories
        .iter()
        .filter_map(|category| {
            let series = matrix.columns.get(category)?;
            let result = Arima111::fit(series).and_then(|model| {
                Ok(CategoryForecast {
                    values: model.forecast(horizon)?,
                    phi: model.phi,
                    theta: model.theta,
                })
            });
            if let Err(e) = &result {
                tracing::warn!(category = %category, error = %e, "forecast unavailable");
            }
            Some((category.clone(), result))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, 15).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn cats(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matrix_rows_are_observed_months_only() {
        let entries = [(at(2023, 11), "toys"), (at(2024, 2), "toys"), (at(2024, 2), "storage")];
        let m = MonthlyMatrix::build(&entries);
        assert_eq!(m.month_keys(), vec!["2023-11", "2024-02"]);
        assert_eq!(m.columns["toys"], vec![1.0, 1.0]);
        assert_eq!(m.columns["storage"], vec![0.0, 1.0]);
    }

    #[test]
    fn gap_months_do_not_lengthen_series() {
        let entries = [
            (at(2023, 1), "toys"),
            (at(2023, 6), "toys"),
            (at(2023, 12), "toys"),
        ];
        let matrix = MonthlyMatrix::build(&entries);
        assert_eq!(matrix.months.len(), 3);
        let out = forecast_categories(&matrix, &cats(&["toys"]), 3);
        assert!(matches!(out["toys"], Err(ForecastError::TooShort { len: 3, .. })));
    }

    #[test]
    fn empty_matrix() {
        let m = MonthlyMatrix::build(&[]);
        assert!(m.months.is_empty());
        assert!(m.future_keys(3).is_empty());
    }

    #[test]
    fn future_keys_roll_over_year() {
        let m = MonthlyMatrix::build(&[(at(2024, 11), "toys")]);
        assert_eq!(m.future_keys(3), vec!["2024-12", "2025-01", "2025-02"]);
    }

    #[test]
    fn absent_category_not_reported() {
        let entries: Vec<(NaiveDateTime, &str)> = (1..=6).map(|m| (at(2024, m), "toys")).collect();
        let matrix = MonthlyMatrix::build(&entries);
        let out = forecast_categories(&matrix, &cats(&["toys", "skincare"]), 3);
        assert!(out.contains_key("toys"));
        assert!(!out.contains_key("skincare"));
        assert_eq!(out["toys"].as_ref().unwrap().values.len(), 3);
    }

    #[test]
    fn short_series_yields_error() {
        let entries = [(at(2024, 1), "toys"), (at(2024, 2), "toys")];
        let matrix = MonthlyMatrix::build(&entries);
        let out = forecast_categories(&matrix, &cats(&["toys"]), 3);
        assert!(matches!(out["toys"], Err(ForecastError::TooShort { len: 2, .. })));
    }

    #[test]
    fn one_failure_does_not_abort_others() {
        let entries: Vec<(NaiveDateTime, &str)> = (1..=5).map(|m| (at(2024, m), "storage")).collect();
        let mut matrix = MonthlyMatrix::build(&entries);
        matrix
            .columns
            .insert("toys".into(), vec![1.0, f64::NAN, 2.0, 3.0, 4.0]);
        let out = forecast_categories(&matrix, &cats(&["toys", "storage"]), 3);
        assert_eq!(out["toys"], Err(ForecastError::NonFinite));
        assert!(out["storage"].is_ok());
    }

    #[test]
    fn unconfigured_column_ignored() {
        let entries: Vec<(NaiveDateTime, &str)> = (1..=6).map(|m| (at(2024, m), "general")).collect();
        let matrix = MonthlyMatrix::build(&entries);
        let out = forecast_categories(&matrix, &cats(&["toys"]), 3);
        assert!(out.is_empty());
    }
}
