//! Interceptor lifecycle and request tools.

pub mod activate;
pub mod fetch;
pub mod install;

pub use activate::{ShellActivateOutput, activate_impl};
pub use fetch::{ShellFetchOutput, ShellFetchParams, fetch_impl};
pub use install::{ShellInstallOutput, ShellResumeOutput, install_impl, resume_impl};
