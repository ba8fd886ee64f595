//! Bounded tracking-server health poll.

use std::time::Duration;
use tracing::{info, warn};

use crate::error::TrackingError;

/// Poll `{base_url}/health` once per second until the server answers 200,
/// up to `ceiling_secs` attempts. Returns `HealthTimeout` when the ceiling
/// is reached without a healthy response.
pub async fn wait_for_server(base_url: &str, ceiling_secs: u64) -> Result<(), TrackingError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| TrackingError::Connection {
            message: format!("failed to build HTTP client: {}", e),
        })?;
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    info!(url = %url, "checking tracking server availability");
    for attempt in 0..ceiling_secs {
        match http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("tracking server is ready");
                return Ok(());
            }
            Ok(resp) => {
                if attempt % 10 == 0 {
                    warn!(
                        status = resp.status().as_u16(),
                        "waiting for server ({}/{})",
                        attempt + 1,
                        ceiling_secs
                    );
                }
            }
            Err(_) => {
                if attempt % 10 == 0 {
                    warn!("waiting for server ({}/{})", attempt + 1, ceiling_secs);
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    Err(TrackingError::HealthTimeout {
        waited_secs: ceiling_secs,
    })
}
