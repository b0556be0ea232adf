pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod input;
pub mod model;
pub mod reference;
pub mod report;
pub mod risk;
