mod bootstrap;
mod fixpoint;
mod package;

pub use bootstrap::cmd_bootstrap;
pub use fixpoint::cmd_fixpoint;
pub use package::cmd_package;
pub use self_test::cmd_self_test;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

/// Stages run one after another, so a single-threaded runtime is enough.
fn runtime() -> Result<Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}
