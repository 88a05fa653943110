use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Installs a stderr subscriber when `--verbose` is given; otherwise the
/// binary stays silent apart from its report.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}
