//! CLI commands implementation

pub mod feed;
pub mod init;
pub mod prefetch;
pub mod refresh;
pub mod status;

pub use feed::*;
pub use init::*;
pub use prefetch::*;
pub use refresh::*;
pub use status::*;
