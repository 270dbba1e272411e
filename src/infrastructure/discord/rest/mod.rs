//! Rate-limited REST command execution.

mod error;
mod executor;
mod rate_limit;
mod routes;
mod transport;

pub use error::{RestError, RestResult};
pub use executor::{RestConfig, RestExecutor};
pub use rate_limit::{RateBucket, RateLimiter, RatePermit};
pub use routes::{GATEWAY_BUCKET, HttpMethod, Route};
pub use transport::{
    DISCORD_API_BASE, HttpRequest, HttpResponse, HttpTransport, QuotaMetadata, ReqwestTransport,
    ResponseClass,
};

#[cfg(test)]
pub use transport::mock;
