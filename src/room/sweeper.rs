use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::service::RoomSessionService;

/// Configuration for the presence and idle-room sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often the sweep runs
    pub sweep_interval: Duration,
    /// How long a participant may go unseen before being dropped
    pub presence_timeout: Duration,
    /// How long a room may go without activity before deletion
    pub idle_threshold: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            presence_timeout: Duration::from_secs(90),
            idle_threshold: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Starts the background task that expires stale participants and reaps
/// idle rooms
#[instrument(skip(rooms))]
pub async fn start_sweeper(rooms: Arc<RoomSessionService>, config: SweeperConfig) {
    info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        presence_timeout_secs = config.presence_timeout.as_secs(),
        idle_threshold_secs = config.idle_threshold.as_secs(),
        "starting room sweeper"
    );

    let presence_timeout = chrono::Duration::from_std(config.presence_timeout)
        .unwrap_or_else(|_| chrono::Duration::seconds(90));
    let idle_threshold = chrono::Duration::from_std(config.idle_threshold)
        .unwrap_or_else(|_| chrono::Duration::hours(24));

    let mut ticker = interval(config.sweep_interval);
    loop {
        ticker.tick().await;

        match rooms.expire_stale(presence_timeout).await {
            Ok((expired, destroyed)) if expired > 0 => {
                info!(expired, destroyed, "presence sweep completed");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "presence sweep failed"),
        }

        match rooms.reap_idle(idle_threshold).await {
            Ok(reaped) if reaped > 0 => {
                info!(reaped, "idle room sweep completed");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "idle room sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::event::EventBus;
    use crate::room::repository::InMemoryRoomRepository;
    use crate::room::types::RoomCreateRequest;
    use crate::shared::AppError;
    use uuid::Uuid;

    fn service() -> Arc<RoomSessionService> {
        Arc::new(RoomSessionService::new(
            Arc::new(InMemoryRoomRepository::new()),
            Arc::new(InMemoryCatalog::new()),
            EventBus::new(),
        ))
    }

    fn create_request(name: &str) -> RoomCreateRequest {
        serde_json::from_str(&format!(r#"{{"name": "{name}"}}"#)).unwrap()
    }

    #[tokio::test]
    async fn test_sweeper_loop_expires_and_reaps() {
        let rooms = service();
        let creator = Uuid::new_v4();
        let detail = rooms
            .create_room(creator, "a", create_request("r"))
            .await
            .unwrap();
        let room_id = detail.summary.id;

        let sweeper = tokio::spawn(start_sweeper(
            rooms.clone(),
            SweeperConfig {
                sweep_interval: Duration::from_millis(10),
                presence_timeout: Duration::from_millis(0),
                idle_threshold: Duration::from_millis(0),
            },
        ));

        // The first few ticks must expire the lone participant and destroy
        // the now-empty room
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();

        let err = rooms.room_detail(creator, room_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sweeper_leaves_active_rooms_alone() {
        let rooms = service();
        let creator = Uuid::new_v4();
        let detail = rooms
            .create_room(creator, "a", create_request("r"))
            .await
            .unwrap();

        let sweeper = tokio::spawn(start_sweeper(
            rooms.clone(),
            SweeperConfig {
                sweep_interval: Duration::from_millis(10),
                presence_timeout: Duration::from_secs(3600),
                idle_threshold: Duration::from_secs(3600),
            },
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.abort();

        let detail = rooms.room_detail(creator, detail.summary.id).await.unwrap();
        assert_eq!(detail.summary.participants_count, 1);
    }
}
