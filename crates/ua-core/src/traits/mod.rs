//! Core trait definitions

mod control_plane;

pub use control_plane::{Connector, ControlPlane, UpdateStream};
