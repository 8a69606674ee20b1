pub mod calendar;
pub mod codes;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod session;
pub mod storefront;
