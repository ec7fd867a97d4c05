//! Driver error handling.

pub use serde_json::Error as JsonError;

pub use crate::{
    driver::connection::error::{Error as ConnectionError, Result as ConnectionResult},
    driver::tasks::error::Error as TaskError,
};
