pub mod asset;
pub mod forecast;
pub mod price_observation;
