//! Scene Relay Server
//!
//! The core of a multiplayer relay server for a shared-world action game.
//! Clients authenticate, occupy named scenes, and exchange player and entity
//! state; the server filters every broadcast by scene membership and keeps
//! exactly one authoritative "scene host" per occupied scene.
//!
//! The UDP transport, persistent access lists, command dispatch, and the
//! addon system are external collaborators consumed through the capability
//! traits in [`net::transport`], [`access`], [`server::chat`], and [`addon`].

pub mod access;
pub mod addon;
pub mod config;
pub mod entity;
pub mod net;
pub mod server;
pub mod session;
pub mod util;
