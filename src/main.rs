use clap::Parser;
use notes_service::cli::{
    handle_create, handle_delete, handle_get, handle_list, handle_serve, handle_update, Cli,
    Commands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let host = cli.host.as_str();

    let result = match cli.command {
        Commands::Serve => handle_serve(cli.config).await,
        Commands::Create {
            category,
            note,
            json,
        } => handle_create(host, category, note, json).await,
        Commands::Update {
            category,
            id,
            note,
            json,
        } => handle_update(host, category, id, note, json).await,
        Commands::Delete { category, id, json } => handle_delete(host, category, id, json).await,
        Commands::Get { category, id, json } => handle_get(host, category, id, json).await,
        Commands::List { category, json } => handle_list(host, category, json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
