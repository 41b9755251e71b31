//! Version command implementation

use crate::error::Result;
use crate::values::LINKERD_VERSION;

/// Run version command
pub fn run() -> Result<()> {
    println!("linkerd-install {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Build info:");
    println!("  Linkerd version: {}", LINKERD_VERSION);
    println!("  Rust version: {}", rustc_version());
    println!("  Profile: {}", build_profile());

    Ok(())
}

fn rustc_version() -> &'static str {
    env!("CARGO_PKG_RUST_VERSION")
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}
