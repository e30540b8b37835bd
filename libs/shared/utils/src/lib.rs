pub mod clock;
pub mod extractor;
pub mod jwt;
pub mod request;
pub mod test_utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use request::{ApiJson, ApiPath, ApiQuery};
