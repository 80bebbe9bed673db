use std::sync::Arc;

use uuid::Uuid;

use praiseroom::{
    event::EventBus,
    room::{
        models::AccessMode,
        repository::InMemoryRoomRepository,
        service::RoomSessionService,
        types::{RoomCreateRequest, RoomDetail},
    },
    InMemoryCatalog,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

#[derive(Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub name: String,
}

impl TestUser {
    pub fn named(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }
}

pub struct TestSetup {
    pub rooms: Arc<RoomSessionService>,
    pub catalog: Arc<InMemoryCatalog>,
    pub creator: TestUser,
    pub guests: Vec<TestUser>,
    pub room_id: Uuid,
    pub code: String,
    pub songs: Vec<Uuid>,
}

impl TestSetup {
    pub fn guest(&self, name: &str) -> &TestUser {
        self.guests
            .iter()
            .find(|u| u.name == name)
            .unwrap_or_else(|| panic!("no guest named {name}"))
    }

    /// Subscribes to the room's live channel, before whatever the test is
    /// about to do
    pub async fn subscribe(&self) -> super::assertions::EventAssertion {
        super::assertions::EventAssertion::new(self.rooms.event_bus().subscribe(self.room_id).await)
    }
}

pub struct TestSetupBuilder {
    access_mode: AccessMode,
    password: Option<String>,
    auto_destroy_on_empty: bool,
    guests: Vec<String>,
    songs: usize,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            access_mode: AccessMode::Public,
            password: None,
            auto_destroy_on_empty: true,
            guests: vec![],
            songs: 0,
        }
    }

    pub fn with_approval_mode(mut self) -> Self {
        self.access_mode = AccessMode::Approval;
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.access_mode = AccessMode::Password;
        self.password = Some(password.to_string());
        self
    }

    pub fn without_auto_destroy(mut self) -> Self {
        self.auto_destroy_on_empty = false;
        self
    }

    /// Guests are joined during build; only valid for public rooms
    pub fn with_guests(mut self, guests: Vec<&str>) -> Self {
        self.guests = guests.into_iter().map(|s| s.to_string()).collect();
        self
    }

    /// Registers this many catalog songs and adds them all to the setlist
    pub fn with_songs(mut self, songs: usize) -> Self {
        self.songs = songs;
        self
    }

    pub async fn build(self) -> TestSetup {
        let catalog = Arc::new(InMemoryCatalog::new());
        let rooms = Arc::new(RoomSessionService::new(
            Arc::new(InMemoryRoomRepository::new()),
            catalog.clone(),
            EventBus::new(),
        ));

        let creator = TestUser::named("alice");
        let detail: RoomDetail = rooms
            .create_room(
                creator.id,
                &creator.name,
                RoomCreateRequest {
                    name: "band practice".to_string(),
                    description: None,
                    access_mode: self.access_mode,
                    password: self.password,
                    open_for_requests: true,
                    auto_destroy_on_empty: self.auto_destroy_on_empty,
                },
            )
            .await
            .expect("room creation failed");
        let room_id = detail.summary.id;
        let code = detail.summary.code;

        let mut songs = Vec::new();
        for _ in 0..self.songs {
            let song_id = Uuid::new_v4();
            catalog.register_song(song_id).await;
            rooms
                .add_song(creator.id, room_id, song_id)
                .await
                .expect("song add failed");
            songs.push(song_id);
        }

        let mut guests = Vec::new();
        for name in &self.guests {
            let guest = TestUser::named(name);
            rooms
                .join_room(guest.id, &guest.name, room_id, None)
                .await
                .expect("guest join failed");
            guests.push(guest);
        }

        TestSetup {
            rooms,
            catalog,
            creator,
            guests,
            room_id,
            code,
            songs,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
