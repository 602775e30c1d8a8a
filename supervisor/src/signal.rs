//! Process termination signals.

/// Resolve once SIGINT or SIGTERM arrives.
///
/// Falls back to SIGINT alone when the SIGTERM handler cannot be installed.
pub async fn termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;
        use tokio::signal::unix::signal;

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received"),
                    _ = sigterm.recv() => tracing::info!("SIGTERM received"),
                }
                return;
            }
            Err(err) => tracing::warn!("cannot listen for SIGTERM: {err}"),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("SIGINT received");
}
