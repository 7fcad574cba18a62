//! Slack interface for raidbook.
//!
//! - **Socket Mode** (`socket`, `socket_mode`) - websocket session with Slack, acks and ephemeral replies
//! - **Slash Commands** (`commands`) - `/raid create`, `/raid signup`, `/sr add`, ...
//! - **Events** (`events`) - button and menu interactions, shared import files
//! - **Views** (`views`) - Block Kit renderings of raids, finalize pages and signup panels
//! - **Web API** (`web`) - `chat.*`, `conversations.open` and file upload/download calls
//!
//! # Architecture
//!
//! ```text
//! Slack → SocketModeRunner → EventDispatcher → Handlers → RaidService (server) → raidbook-core
//!                ↑                                              ↓
//!          ephemeral reply  ←───────────  Block Kit views / SlackWebApi
//! ```

pub mod blocks;
pub mod commands;
pub mod events;
pub mod socket;
pub mod socket_mode;
pub mod views;
pub mod web;
