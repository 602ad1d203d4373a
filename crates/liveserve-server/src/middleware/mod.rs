//! Response middleware.

pub(crate) mod logging;
pub(crate) mod no_cache;
