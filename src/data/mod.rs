pub mod area_crawler;
pub mod fetcher;
pub mod parsers;
pub mod portal;
pub mod types;
