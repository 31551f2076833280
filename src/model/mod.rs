pub mod equity;
pub mod portfolio;
pub mod price;
