//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::homes::{Location, PlayerId};
use crate::messages::{MessageKey, MessageParams};
use crate::world::{Notifier, World};

#[derive(Default)]
pub struct TestWorld {
    players: Mutex<HashMap<PlayerId, (String, Location)>>,
}

impl TestWorld {
    pub fn join(&self, name: &str, at: Location) -> PlayerId {
        let id = PlayerId::new_v4();
        self.players.lock().unwrap().insert(id, (name.to_string(), at));
        id
    }

    pub fn leave(&self, player: PlayerId) {
        self.players.lock().unwrap().remove(&player);
    }

    pub fn walk(&self, player: PlayerId, to: Location) {
        if let Some(entry) = self.players.lock().unwrap().get_mut(&player) {
            entry.1 = to;
        }
    }
}

impl World for TestWorld {
    fn is_online(&self, player: PlayerId) -> bool {
        self.players.lock().unwrap().contains_key(&player)
    }

    fn position(&self, player: PlayerId) -> Option<Location> {
        self.players.lock().unwrap().get(&player).map(|p| p.1.clone())
    }

    fn display_name(&self, player: PlayerId) -> Option<String> {
        self.players.lock().unwrap().get(&player).map(|p| p.0.clone())
    }

    fn find_online(&self, name: &str) -> Option<PlayerId> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .find(|(_, p)| p.0.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    fn online_players(&self) -> Vec<PlayerId> {
        self.players.lock().unwrap().keys().copied().collect()
    }

    fn relocate(&self, player: PlayerId, to: &Location) -> bool {
        self.walk(player, to.clone());
        true
    }
}

#[derive(Default)]
pub struct TestNotifier {
    sent: Mutex<Vec<(PlayerId, MessageKey, MessageParams)>>,
}

impl TestNotifier {
    pub fn keys_for(&self, player: PlayerId) -> Vec<MessageKey> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _, _)| *p == player)
            .map(|(_, k, _)| *k)
            .collect()
    }

    pub fn count(&self, player: PlayerId, key: MessageKey) -> usize {
        self.keys_for(player).into_iter().filter(|k| *k == key).count()
    }
}

impl Notifier for TestNotifier {
    fn notify(&self, player: PlayerId, key: MessageKey, params: &MessageParams) {
        self.sent.lock().unwrap().push((player, key, params.clone()));
    }
}

pub fn spawn_point() -> Location {
    Location::new("overworld", 0.0, 64.0, 0.0)
}
