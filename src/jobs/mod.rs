pub mod backfill;
pub mod collector;
pub mod forecaster;
