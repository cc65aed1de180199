//! Dataset loading and repair.
//!
//! Each submodule owns one input CSV: monthly subway ridership, yearly
//! population, and the GDP indicator table. Loaders recover from malformed
//! numeric cells by treating them as missing; structural problems (absent
//! columns or indicator rows) are fatal.

pub mod combine;
pub mod gdp;
pub mod population;
pub mod ridership;
pub mod types;
