//! Match aggregator: pulls the sportsbook event list, fans out per-event
//! statistics calls, merges everything into one record per match and hands the
//! result to the HTTP layer.

pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod merge;
pub mod pipeline;
pub mod response;
pub mod token;
pub mod types;
pub mod upstream;

pub use config::{HubConfig, ServerConfig};
pub use error::{AggregateError, FetchError};
pub use filter::{EventQuery, SortMode, StatusFilter};
pub use pipeline::{Aggregator, AggregatorState};
pub use response::AggregatedResponse;
pub use token::{StaticTokenSource, TokenSource};
