pub mod audit;
pub mod files;
pub mod health;
