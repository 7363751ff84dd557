//! Terminal output for trellis itself
//!
//! Status lines go to stderr so a command package keeps stdout to itself.
//! Interactive terminals get `cliclack` spinners; CI and pipes get plain
//! prefixed lines.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{remark, step_warn_hint};
pub use progress::TaskSpinner;
