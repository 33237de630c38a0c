pub mod aggregator;
pub mod catalog;
pub mod m3u_parser;
pub mod metrics;
pub mod normalizer;
pub mod remap;
pub mod resolver;
pub mod source_fetcher;
