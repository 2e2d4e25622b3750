//! Home Assistant camera access.
//!
//! [`SnapshotSource`] is the seam the checker depends on; [`HaCamera`] is the
//! production implementation talking to the Supervisor-proxied Core API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Core API root as seen from inside a Supervisor add-on.
pub const DEFAULT_HA_URL: &str = "http://supervisor/core/api";

const STATES_TIMEOUT: Duration = Duration::from_secs(10);
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(15);

/// A camera entity known to Home Assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEntity {
    pub entity_id: String,
    pub name: String,
    pub state: String,
}

/// Anything that can enumerate cameras and capture JPEG snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Available camera entities.  Empty when the source is unreachable.
    async fn cameras(&self) -> Vec<CameraEntity>;

    /// One JPEG snapshot, or `None` when the camera cannot be read.
    async fn snapshot(&self, entity_id: &str) -> Option<Vec<u8>>;

    /// `true` when a snapshot can currently be fetched.
    async fn test_camera(&self, entity_id: &str) -> bool {
        self.snapshot(entity_id).await.is_some()
    }
}

#[derive(Error, Debug)]
enum CameraError {
    #[error("Supervisor token not configured")]
    NoToken,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Home Assistant returned status {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
struct EntityState {
    entity_id: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    attributes: EntityAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct EntityAttributes {
    #[serde(default)]
    friendly_name: Option<String>,
}

fn camera_entities(states: Vec<EntityState>) -> Vec<CameraEntity> {
    states
        .into_iter()
        .filter(|s| s.entity_id.starts_with("camera."))
        .map(|s| CameraEntity {
            name: s
                .attributes
                .friendly_name
                .unwrap_or_else(|| s.entity_id.clone()),
            state: s.state.unwrap_or_else(|| "unknown".to_string()),
            entity_id: s.entity_id,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// HaCamera
// ─────────────────────────────────────────────────────────────────────────────

/// Home Assistant REST client authenticated with a Supervisor token.
pub struct HaCamera {
    token: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl HaCamera {
    /// A missing or empty `token` disables the adapter: no cameras, no
    /// snapshots.
    pub fn new(token: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn fetch_states(&self) -> Result<Vec<EntityState>, CameraError> {
        let token = self.token.as_deref().ok_or(CameraError::NoToken)?;
        let response = self
            .client
            .get(format!("{}/states", self.base_url))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(STATES_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CameraError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    async fn fetch_snapshot(&self, entity_id: &str) -> Result<Vec<u8>, CameraError> {
        let token = self.token.as_deref().ok_or(CameraError::NoToken)?;
        let response = self
            .client
            .get(format!("{}/camera_proxy/{entity_id}", self.base_url))
            .bearer_auth(token)
            .timeout(SNAPSHOT_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CameraError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SnapshotSource for HaCamera {
    #[instrument(skip(self))]
    async fn cameras(&self) -> Vec<CameraEntity> {
        match self.fetch_states().await {
            Ok(states) => camera_entities(states),
            Err(e) => {
                warn!(error = %e, "could not list cameras");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self))]
    async fn snapshot(&self, entity_id: &str) -> Option<Vec<u8>> {
        match self.fetch_snapshot(entity_id).await {
            Ok(bytes) => {
                debug!(bytes = bytes.len(), "snapshot captured");
                Some(bytes)
            }
            Err(e) => {
                warn!(error = %e, "snapshot unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    #[test]
    fn only_camera_entities_are_listed() {
        let states: Vec<EntityState> = serde_json::from_value(serde_json::json!([
            {"entity_id": "camera.kitchen", "state": "idle",
             "attributes": {"friendly_name": "Kitchen Cam", "brand": "x"}},
            {"entity_id": "light.kitchen", "state": "on", "attributes": {}},
            {"entity_id": "camera.garage"}
        ]))
        .unwrap();

        let cameras = camera_entities(states);
        assert_eq!(
            cameras,
            vec![
                CameraEntity {
                    entity_id: "camera.kitchen".into(),
                    name: "Kitchen Cam".into(),
                    state: "idle".into(),
                },
                CameraEntity {
                    entity_id: "camera.garage".into(),
                    name: "camera.garage".into(),
                    state: "unknown".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn no_token_means_no_cameras_or_snapshots() {
        let camera = HaCamera::new(None, DEFAULT_HA_URL);
        assert!(!camera.is_configured());
        assert!(camera.cameras().await.is_empty());
        assert!(camera.snapshot("camera.kitchen").await.is_none());
        assert!(!camera.test_camera("camera.kitchen").await);
    }

    #[tokio::test]
    async fn cameras_are_fetched_with_bearer_token() {
        let body = r#"[{"entity_id": "camera.desk", "state": "streaming", "attributes": {"friendly_name": "Desk"}}]"#;
        let (base, server) = serve_once(200, "application/json", body).await;
        let camera = HaCamera::new(Some("tok".into()), format!("{base}/"));

        let cameras = camera.cameras().await;
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].name, "Desk");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /states "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn snapshot_returns_raw_bytes() {
        let (base, server) = serve_once(200, "image/jpeg", vec![0xFF, 0xD8, 0xFF]).await;
        let camera = HaCamera::new(Some("tok".into()), base);

        assert_eq!(camera.snapshot("camera.desk").await, Some(vec![0xFF, 0xD8, 0xFF]));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /camera_proxy/camera.desk "));
    }

    #[tokio::test]
    async fn non_success_status_means_no_snapshot() {
        let (base, server) = serve_once(404, "text/plain", "not found").await;
        let camera = HaCamera::new(Some("tok".into()), base);
        assert!(camera.snapshot("camera.gone").await.is_none());
        server.await.unwrap();
    }
}
