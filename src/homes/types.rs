use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable, unique player identity.
pub type PlayerId = Uuid;

/// A position in the world: world identifier, coordinates and facing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    /// Straight-line distance, or `None` when the two points are in different worlds.
    pub fn distance(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    /// True when `other` is in another world or further away than `tolerance`.
    pub fn moved_beyond(&self, other: &Location, tolerance: f64) -> bool {
        match self.distance(other) {
            Some(d) => d > tolerance,
            None => true,
        }
    }

    pub fn block_x(&self) -> i64 {
        self.x.floor() as i64
    }

    pub fn block_y(&self) -> i64 {
        self.y.floor() as i64
    }

    pub fn block_z(&self) -> i64 {
        self.z.floor() as i64
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}, {}, {}",
            self.world,
            self.block_x(),
            self.block_y(),
            self.block_z()
        )
    }
}

/// A named, owned location with a visibility flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    pub owner: PlayerId,
    pub name: String,
    pub location: Location,
    pub is_public: bool,
}

impl Home {
    pub fn new(owner: PlayerId, name: impl Into<String>, location: Location) -> Self {
        Self {
            owner,
            name: name.into(),
            location,
            is_public: false,
        }
    }
}
