//! Boot wiring: configuration to running capture.

use std::{fs, io, path::PathBuf, sync::Arc};

use shine_capture::CaptureDriver;
use shine_flow::{FlowFactory, FlowRegistry, TraceSink};
use shine_proto::PacketCodec;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;

/// Scratch directory collaborators write into; recreated empty at boot.
const OUTPUT_DIR: &str = "output";

/// Run a capture session until interrupted.
///
/// Builds every artifact from the validated config, starts the capture
/// loop on a dedicated blocking thread, and tears all flows down through
/// the root cancellation token on Ctrl-C. Fatal init errors (bad keystream
/// config, unreadable schema, missing interface) surface as `Err` and end
/// up as a non-zero exit.
pub async fn capture(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let output = reset_output_dir()?;
    debug!(path = %output.display(), "output directory ready");

    let cipher = Arc::new(config.xor_table()?);
    let codec = Arc::new(PacketCodec::new(config.command_schema()?));
    let services = config.service_map();
    let registry = Arc::new(FlowRegistry::new());
    let root = CancellationToken::new();

    info!(services = services.len(), xor_limit = cipher.limit(), "decoder stack ready");

    let factory = FlowFactory::new(
        Arc::clone(&registry),
        codec,
        cipher,
        services,
        Arc::new(TraceSink),
        tokio::runtime::Handle::current(),
        root.clone(),
        config.flow_config(),
    );

    let capture_config = config.capture_config();
    let capture_cancel = root.clone();
    let mut capture_task = tokio::task::spawn_blocking(move || {
        CaptureDriver::run(&capture_config, factory, &capture_cancel)
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupt received, stopping capture");
            root.cancel();
            capture_task.await??;
        },
        result = &mut capture_task => {
            // Capture loop ended on its own: propagate its init error, or
            // exit cleanly if it was cancelled elsewhere.
            root.cancel();
            result??;
        },
    }

    let (to_client, from_client) = registry.flow_counts();
    debug!(to_client, from_client, "flows remaining at shutdown");
    info!("capture finished");
    Ok(())
}

/// Create the collaborator scratch directory, clearing any previous run.
fn reset_output_dir() -> io::Result<PathBuf> {
    let dir = PathBuf::from(OUTPUT_DIR);
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
