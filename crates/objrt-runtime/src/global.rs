//! Process-wide runtime
//!
//! A thin layer over [`Runtime`] for embedders that want one shared instance.
//! The instance is created on first use and can be torn down and recreated.

use crate::options::{OptionsError, RuntimeOptions};
use crate::runtime::{Runtime, ShutdownReport};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

static RUNTIME: Lazy<Mutex<Option<Arc<Runtime>>>> = Lazy::new(|| Mutex::new(None));

/// Errors from creating the process-wide runtime
#[derive(Debug, Error)]
pub enum GlobalRuntimeError {
    /// The process-wide runtime was already created
    #[error("The process-wide runtime is already initialized")]
    AlreadyInitialized,

    /// The options failed validation
    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// The process-wide runtime, created with default options on first use
pub fn runtime() -> Arc<Runtime> {
    RUNTIME
        .lock()
        .get_or_insert_with(|| Arc::new(Runtime::new()))
        .clone()
}

/// Create the process-wide runtime with `options`
pub fn init_runtime(options: RuntimeOptions) -> Result<Arc<Runtime>, GlobalRuntimeError> {
    let mut slot = RUNTIME.lock();
    if slot.is_some() {
        return Err(GlobalRuntimeError::AlreadyInitialized);
    }
    let runtime = Arc::new(Runtime::with_options(options)?);
    *slot = Some(runtime.clone());
    Ok(runtime)
}

/// Shut down and drop the process-wide runtime. Handles obtained earlier
/// stay usable but see an empty runtime. Returns None if there was none.
pub fn shutdown_runtime() -> Option<ShutdownReport> {
    let runtime = RUNTIME.lock().take()?;
    Some(runtime.shutdown())
}
