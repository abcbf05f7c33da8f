pub mod cli;
pub mod config;
pub mod error;
pub mod guides;
pub mod logging;
pub mod permissions;
pub mod proxy;
pub mod session;
pub mod ui;
pub mod walkthrough;

#[cfg(test)]
pub(crate) mod test_support;
