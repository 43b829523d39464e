use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber for the agent's own diagnostics, filtered by
/// `RUST_LOG`. Does nothing if a subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::debug!("still logging");
    }
}
