use std::fmt::Write as _;
use std::path::PathBuf;

use crate::api::{NoteBody, NoteResponse};
use crate::app;
use crate::client::NotesClient;
use crate::config::Config;
use crate::error::Result;
use crate::logging;
use crate::server::Server;

/// Load config, wire the service and serve until shutdown.
pub async fn handle_serve(config: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config.as_deref())?;
    logging::init(&config.log);

    let notes = app::build_service(&config)?;
    let server = Server::new(notes, app::server_options(&config.server));
    server.start().await?;
    Ok(())
}

pub async fn handle_create(host: &str, category: String, note: String, json: bool) -> Result<()> {
    let response = NotesClient::new(host).create_note(&category, &note).await?;
    print_response(&response, json)
}

pub async fn handle_update(
    host: &str,
    category: String,
    id: String,
    note: String,
    json: bool,
) -> Result<()> {
    let response = NotesClient::new(host)
        .update_note(&category, &id, &note)
        .await?;
    print_response(&response, json)
}

pub async fn handle_delete(host: &str, category: String, id: String, json: bool) -> Result<()> {
    let response = NotesClient::new(host).delete_note(&category, &id).await?;
    print_response(&response, json)
}

pub async fn handle_get(host: &str, category: String, id: String, json: bool) -> Result<()> {
    let response = NotesClient::new(host).get_note(&category, &id).await?;
    print_response(&response, json)
}

pub async fn handle_list(host: &str, category: String, json: bool) -> Result<()> {
    let response = NotesClient::new(host).list_notes(&category).await?;
    print_response(&response, json)
}

fn print_response(response: &NoteResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        print!("{}", render(response));
    }
    Ok(())
}

fn render(response: &NoteResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}.", response.message);

    if let Some(note) = &response.note {
        let _ = writeln!(out, "Note Details:");
        render_note(&mut out, note);
    }

    if let Some(notes) = &response.notes {
        if notes.is_empty() {
            let _ = writeln!(out, "No notes found.");
        }
        for note in notes {
            let _ = writeln!(out);
            render_note(&mut out, note);
        }
    }
    out
}

fn render_note(out: &mut String, note: &NoteBody) {
    let _ = writeln!(out, "  ID: {}", note.id);
    let _ = writeln!(out, "  Category: {}", note.category);
    let _ = writeln!(out, "  Note: {}", note.note);
}
