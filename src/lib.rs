pub mod charts;
pub mod config;
pub mod forecast;
pub mod prepare;
pub mod report;
pub mod stats;
pub mod table;
