//! Standard APIs we use everywhere.

pub use std::path::{Path, PathBuf};

pub use anyhow::{Context as _, Result};
#[allow(unused_imports)]
pub use tracing::{debug, error, info, instrument, warn};
