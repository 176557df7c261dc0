use super::AttendanceClient;
use crate::error::Result;
use crate::media::PreviewTarget;
use crate::presenter::Surface;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const CHANNEL_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl<S: Surface> AttendanceClient<S> {
    /// Stop background tasks, release both cameras and close the channel
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel acquisitions, guard timers and the status forwarder
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        for target in [PreviewTarget::Recognition, PreviewTarget::Enrollment] {
            let media = self.media.clone();
            let slot = self.session_slot(target);
            if slot.is_some() {
                media.release(slot);
                self.presenter.preview_detached(target);
                info!("Released {} camera", target);
            }
        }

        match timeout(CHANNEL_STOP_TIMEOUT, self.channel.shutdown()).await {
            Ok(()) => info!("Channel closed"),
            Err(_) => {
                error!("Channel stop timeout");
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
