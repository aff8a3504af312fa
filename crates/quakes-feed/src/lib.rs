//! Earthquake feed access: provider parsers, the cancellable network
//! operation, and the fetch kinds that tie URL building to decoding.

pub mod activity;
pub mod cancel;
pub mod client;
pub mod detail;
pub mod device;
pub mod emsc;
pub mod error;
pub mod fetch;
pub mod geocode;
pub(crate) mod parse_helpers;
pub(crate) mod retry;
pub mod types;
pub mod usgs;
pub mod window;

pub use activity::{ActivityGuard, NetworkActivity};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use client::{parse_base_url, FeedClient, OperationResult, Request};
pub use detail::{parse_detail, parse_nearby_cities, QuakeDetail};
pub use device::{format_significant, register_device, registration_request};
pub use emsc::parse_emsc_quakes;
pub use error::FeedError;
pub use fetch::{Endpoints, FetchContext, FetchKind, FetchOutput};
pub use geocode::{parse_count, parse_country_code};
pub use usgs::parse_usgs_quakes;
pub use window::{major_window, DateWindow};
