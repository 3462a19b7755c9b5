pub mod channel;
pub mod clipboard;
pub mod control;
pub mod core;
pub mod focus;
pub mod http;
pub mod mpvplayer;
pub mod player;
pub mod pool;
