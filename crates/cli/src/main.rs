//! Command-line client for Stash.

mod api_client;

use anyhow::{Context, Result};
use api_client::{ApiClient, BookmarkResponse, CreateBookmarkRequest, CreateUserRequest};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Format, Toml};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Parser)]
#[command(name = "stashctl")]
#[command(about = "Command-line client for Stash")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    api: ApiArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug, Default)]
struct ApiArgs {
    /// Server API URL (overrides client config)
    #[arg(long, global = true, env = "STASH_SERVER")]
    server: Option<String>,

    /// API key (overrides client config)
    #[arg(long, global = true, env = "STASH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Client config file path
    #[arg(long, global = true, env = "STASH_CLIENT_CONFIG")]
    client_config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and print its API key
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Save a bookmark
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
    },
    /// List your bookmarks, or another account's with --user-id
    List {
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Delete your bookmarks with an exact title
    Delete {
        #[arg(long)]
        title: String,
    },
    /// Delete your account and all of its bookmarks
    DeleteAccount {
        /// Skip the confirmation prompts
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Replace your API key
    RotateKey,
    /// Show the account that owns the API key
    Whoami,
    /// Check server health
    Health,
}

/// Optional client config file (`server`, `api_key`).
#[derive(Debug, Default, serde::Deserialize)]
struct ClientConfig {
    server: Option<String>,
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Cli { api, command } = Cli::parse();
    let client = get_api_client(&api)?;

    match command {
        Commands::Register { name, email } => {
            let account = client.register(&CreateUserRequest { name, email }).await?;
            println!("✓ Account created");
            println!("  ID: {}", account.id);
            println!("  Name: {}", account.name);
            println!("  Email: {}", account.email);
            if let Some(key) = account.api_key {
                println!("  API key: {key}");
                println!("\nStore this key now; it cannot be shown again.");
            }
        }
        Commands::Add { title, url } => {
            let bookmark = client
                .add_bookmark(&CreateBookmarkRequest { title, url })
                .await?;
            println!("✓ Bookmark saved (id {})", bookmark.id);
        }
        Commands::List { user_id } => {
            let bookmarks = match user_id {
                Some(id) => client.list_user_bookmarks(id).await?,
                None => client.list_bookmarks().await?,
            };
            print_bookmarks(&bookmarks);
        }
        Commands::Delete { title } => {
            let response = client.delete_bookmarks(&title).await?;
            if response.deleted == 0 {
                println!("No bookmark found with title '{title}'");
            } else {
                println!("✓ Deleted {} bookmark(s) titled '{title}'", response.deleted);
            }
        }
        Commands::DeleteAccount { force } => {
            handle_delete_account(&client, force).await?;
        }
        Commands::RotateKey => {
            let response = client.rotate_key().await?;
            println!("✓ {}", response.message);
            println!("  API key: {}", response.api_key);
            println!("\nThe previous key no longer works.");
        }
        Commands::Whoami => {
            let account = client.whoami().await?;
            println!("ID: {}", account.id);
            println!("Name: {}", account.name);
            println!("Email: {}", account.email);
            println!("Created: {}", account.created_at);
        }
        Commands::Health => {
            let health = client.health().await?;
            println!("Status: {}", health.status);
            println!("Server version: {}", health.version);
            println!("Client version: {}", env!("CARGO_PKG_VERSION"));

            if health.version != env!("CARGO_PKG_VERSION") {
                eprintln!(
                    "Warning: version mismatch (server: {}, client: {})",
                    health.version,
                    env!("CARGO_PKG_VERSION")
                );
            }
        }
    }
    Ok(())
}

async fn handle_delete_account(client: &ApiClient, force: bool) -> Result<()> {
    let account = client.whoami().await?;

    if !force {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        if !confirm_deletion(&mut input, &mut output, &account.email)? {
            println!("Account deletion cancelled.");
            return Ok(());
        }
    }

    let response = client.delete_account(&account.email).await?;
    println!(
        "✓ Account {} deleted ({} bookmark(s) removed)",
        account.email, response.bookmarks_deleted
    );
    Ok(())
}

/// Ask "are you sure", then ask for the email to be typed back.
///
/// Returns false if the user declines. A mistyped email is an error.
fn confirm_deletion<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    email: &str,
) -> Result<bool> {
    write!(
        output,
        "\nThis will permanently delete account {email} and all of its bookmarks.\n\nAre you sure? [y/N]: "
    )?;
    output.flush()?;

    if !read_answer(input)?.eq_ignore_ascii_case("y") {
        return Ok(false);
    }

    write!(output, "Type your email to confirm: ")?;
    output.flush()?;

    let typed = read_answer(input)?;
    if !typed.eq_ignore_ascii_case(email) {
        anyhow::bail!("email does not match; account not deleted");
    }
    Ok(true)
}

fn read_answer<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).context("failed to read input")?;
    Ok(line.trim().to_string())
}

fn print_bookmarks(bookmarks: &[BookmarkResponse]) {
    if bookmarks.is_empty() {
        println!("No bookmarks.");
        return;
    }
    for bookmark in bookmarks {
        println!(
            "{:>6}  {}  {}  ({})",
            bookmark.id, bookmark.title, bookmark.url, bookmark.created_at
        );
    }
}

fn get_api_client(api: &ApiArgs) -> Result<ApiClient> {
    let config_path = client_config_path(api.client_config.as_deref())?;
    let config = load_client_config(&config_path)?;

    let server = api
        .server
        .clone()
        .or(config.server)
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let api_key = api.api_key.clone().or(config.api_key);

    let base_url = normalize_base_url(&server)?;
    tracing::debug!(server = %base_url, "Using server");
    ApiClient::new(&base_url, api_key.as_deref())
}

fn client_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(path) => PathBuf::from(path),
        None => {
            let home = std::env::var_os("HOME")
                .ok_or_else(|| anyhow::anyhow!("HOME not set; set STASH_CLIENT_CONFIG"))?;
            PathBuf::from(home).join(".config")
        }
    };

    Ok(base.join("stash").join("client.toml"))
}

fn load_client_config(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    Figment::new()
        .merge(Toml::file(path))
        .extract()
        .with_context(|| format!("failed to load client configuration from {}", path.display()))
}

fn normalize_base_url(url: &str) -> Result<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("server URL must start with http:// or https://");
    }
    Ok(url.trim_end_matches('/').to_string())
}
