//! Networking primitives: the UDP endpoint wrapper, the generic listener
//! loop, and the periodic advertiser.

pub mod advertiser;
pub mod endpoint;
pub mod listener;

pub use advertiser::{Advertiser, AdvertiserState};
pub use endpoint::{EndpointError, UdpEndpoint};
