//! Command handlers grouped by concern.

pub(crate) mod servers;
pub(crate) mod session;
pub(crate) mod torrents;
pub(crate) mod watch;

#[cfg(test)]
pub(crate) mod test_support;
