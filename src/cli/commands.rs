use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "notes-service")]
#[command(version, about = "A category-partitioned notes service and its command line client")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Address of the notes service
    #[arg(
        long,
        short = 'H',
        global = true,
        env = "NOTES_SERVICE_HOST",
        default_value = "http://localhost:3000"
    )]
    pub host: String,

    /// YAML configuration file for `serve`
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server until interrupted
    Serve,

    /// Create a new note
    #[command(visible_alias = "create-note")]
    Create {
        /// Category of the note
        #[arg(long, short = 'c')]
        category: String,

        /// Text of the note
        #[arg(long, short = 'n')]
        note: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace the text of an existing note
    #[command(visible_alias = "update-note")]
    Update {
        /// Category of the note
        #[arg(long, short = 'c')]
        category: String,

        /// ID of the note
        #[arg(long, short = 'i')]
        id: String,

        /// New text of the note
        #[arg(long, short = 'n')]
        note: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a note
    #[command(visible_alias = "delete-note")]
    Delete {
        /// Category of the note
        #[arg(long, short = 'c')]
        category: String,

        /// ID of the note
        #[arg(long, short = 'i')]
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a note by category and ID
    #[command(visible_alias = "get-note-by-id")]
    Get {
        /// Category of the note
        #[arg(long, short = 'c')]
        category: String,

        /// ID of the note
        #[arg(long, short = 'i')]
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every note in a category
    #[command(visible_alias = "list-notes-by-category")]
    List {
        /// Category to list
        #[arg(long, short = 'c')]
        category: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
