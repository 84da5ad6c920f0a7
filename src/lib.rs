pub mod api;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod notes;
pub mod server;
pub mod storage;
pub mod store;

pub use client::NotesClient;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use notes::{Note, NoteService, Notes};
pub use server::{Server, ServerHandle, ServerOptions};
