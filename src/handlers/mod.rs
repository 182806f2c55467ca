/// HTTP handlers module
/// Provides REST and WebSocket endpoints

pub mod rest;
pub mod websocket;

pub use rest::{
    accept_invitation, create_group, create_invitation, get_group, get_group_invitations,
    get_group_members, get_user_groups, get_user_invitations, health, list_groups, register_user,
    reject_invitation, remove_group_member,
};
pub use websocket::{ws_connect, WsServer};
