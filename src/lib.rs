pub mod backend;
pub mod browser;
pub mod classifier;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod driver;
pub mod error;
pub mod listing;
pub mod navigator;
pub mod session;

pub use browser::{Action, Browser, Change, Command, Notice, Reply};
pub use driver::Driver;
pub use error::{BackendError, BrowserError, Result};
