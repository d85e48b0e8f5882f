pub mod build;
pub mod process;
pub mod runtime;
pub mod scrape;
