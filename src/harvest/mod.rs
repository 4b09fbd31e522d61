//! Harvest runtime: fetching, pacing and the resumable loop

pub mod engine;
pub mod fetcher;
pub mod pacer;

pub use engine::Harvester;
pub use fetcher::FeedFetcher;
pub use pacer::Pacer;
