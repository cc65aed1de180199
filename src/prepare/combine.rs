//! Outer-join of the three yearly aggregates into the combined series.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use crate::prepare::types::{GdpRecord, PopulationRecord};
use crate::table::YearTable;

pub const PASSENGERS: &str = "Passengers";
pub const GDP: &str = "GDP";
pub const POPULATION: &str = "Population";

/// Aligns total passengers, unified GDP, and population on year. Years
/// present in one source but not another yield missing entries.
pub fn combine(
    passengers_by_year: &BTreeMap<i32, f64>,
    gdp: &[GdpRecord],
    population: &[PopulationRecord],
) -> Result<YearTable> {
    let mut years: BTreeSet<i32> = passengers_by_year.keys().copied().collect();
    years.extend(gdp.iter().map(|r| r.year));
    years.extend(population.iter().map(|r| r.year));
    let years: Vec<i32> = years.into_iter().collect();

    let gdp_by_year: BTreeMap<i32, Option<f64>> =
        gdp.iter().map(|r| (r.year, r.unified)).collect();
    let population_by_year: BTreeMap<i32, Option<f64>> = population
        .iter()
        .map(|r| (r.year, r.population))
        .collect();

    let mut table = YearTable::new(years.clone());
    table.push_column(
        PASSENGERS,
        years
            .iter()
            .map(|y| passengers_by_year.get(y).copied())
            .collect(),
    )?;
    table.push_column(
        GDP,
        years
            .iter()
            .map(|y| gdp_by_year.get(y).copied().flatten())
            .collect(),
    )?;
    table.push_column(
        POPULATION,
        years
            .iter()
            .map(|y| population_by_year.get(y).copied().flatten())
            .collect(),
    )?;

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::gdp::unify;

    fn gdp_record(year: i32, unified: Option<f64>) -> GdpRecord {
        GdpRecord {
            year,
            revised: None,
            retropolated: None,
            closed: unified,
            unified: unify(None, None, unified),
        }
    }

    #[test]
    fn test_combine_outer_joins_years() {
        let passengers: BTreeMap<i32, f64> = [(2000, 10.0), (2001, 20.0)].into();
        let gdp = vec![gdp_record(2001, Some(5.0)), gdp_record(2002, Some(6.0))];
        let population = vec![PopulationRecord {
            year: 2000,
            population: Some(100.0),
        }];

        let combined = combine(&passengers, &gdp, &population).unwrap();

        assert_eq!(combined.years(), &[2000, 2001, 2002]);
        assert_eq!(
            combined.column(PASSENGERS).unwrap(),
            &[Some(10.0), Some(20.0), None]
        );
        assert_eq!(combined.column(GDP).unwrap(), &[None, Some(5.0), Some(6.0)]);
        assert_eq!(
            combined.column(POPULATION).unwrap(),
            &[Some(100.0), None, None]
        );
    }

    #[test]
    fn test_combine_empty_sources() {
        let combined = combine(&BTreeMap::new(), &[], &[]).unwrap();
        assert!(combined.is_empty());
    }
}
