//! Static-asset and API request handling on top of [`crate::fs`] and [`crate::http`].

pub mod resolver;
pub mod router;

pub use resolver::{AssetResolver, FsAssetResolver, asset_path};
pub use router::{
    ApiHandler, ApiRequest, Classification, Outcome, RequestClass, RequestRecord, ResponseStatus, RouteTable,
    Served, WwwServer, WwwServerBuilder,
};
