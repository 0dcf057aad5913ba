//! RIR delegation feeds
//!
//! - `models`: Range / RangeSet / per-source statistics
//! - `parser`: one line of the extended delegation format → Range
//! - `fetcher`: HTTP retrieval with bounded retries and streaming parse

pub mod fetcher;
pub mod models;
pub mod parser;

pub use fetcher::{FeedFetcher, HttpFeedFetcher, parse_feed, parse_feed_file};
pub use models::{
    AddressFamily, FeedBatch, FeedStats, Range, RangeSet, SourceReport, UNKNOWN_COUNTRY,
};
pub use parser::{LineOutcome, RangeParseError, SkipReason, parse_line};
