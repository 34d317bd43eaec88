//! 수집 모듈.

mod feed_refresh;

pub use feed_refresh::{parse_feed_filter, refresh_feeds};
