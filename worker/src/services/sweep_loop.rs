use crate::usecases::cleanup_expired_documents::{
    CleanupExpiredDocumentsParams, CleanupExpiredDocumentsUseCase,
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

pub async fn run_sweep_loop(
    usecase: Arc<CleanupExpiredDocumentsUseCase>,
    interval: Duration,
) -> Result<()> {
    info!(interval_seconds = interval.as_secs(), "sweep_loop: started");

    loop {
        if let Err(e) = usecase.run(CleanupExpiredDocumentsParams::default()).await {
            error!(error = ?e, "sweep_loop: cleanup run failed");
        }

        tokio::time::sleep(interval).await;
    }
}
