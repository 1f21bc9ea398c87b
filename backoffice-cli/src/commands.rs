use anyhow::{Context, Result};
use backoffice_client::{
    BackofficeClient, ClientConfig, FileCredentialStore, HeaderName, HeaderValue, Method,
    MultipartForm, RequestOptions, SessionListener,
};
use colored::Colorize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::{BodyArgs, Cli, Commands};

const DATA_DIR: &str = ".backoffice";

/// Tells the user to log in again once the refresh token stops working.
struct CliSessionListener;

impl SessionListener for CliSessionListener {
    fn session_expired(&self) {
        eprintln!(
            "{} session expired, run `backoffice login` to sign in again",
            "warning:".yellow().bold()
        );
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir)?;
    let config = match cli.api_url {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::from_env(),
    };
    tracing::debug!("Using API at {}", config.base_url);
    let store = Arc::new(FileCredentialStore::open(&data_dir));
    tracing::debug!("Credentials file: {}", store.path().display());
    let client = BackofficeClient::with_listener(config, store, Arc::new(CliSessionListener))?;

    match cli.command {
        Commands::Login { username, password } => {
            client.login(&username, &password).await?;
            println!("{} Logged in as {}", "✓".green(), username.bold());
            Ok(())
        },
        Commands::Logout => {
            client.logout();
            println!("{} Logged out", "✓".green());
            Ok(())
        },
        Commands::Status => {
            print_status(&client, &data_dir);
            Ok(())
        },
        Commands::Get {
            endpoint,
            items,
            page,
            all,
            headers,
        } => handle_get(&client, &endpoint, items, page, all, &headers).await,
        Commands::Post { endpoint, body } => send_with_body(&client, Method::POST, &endpoint, body).await,
        Commands::Put { endpoint, body } => send_with_body(&client, Method::PUT, &endpoint, body).await,
        Commands::Patch { endpoint, body } => {
            send_with_body(&client, Method::PATCH, &endpoint, body).await
        },
        Commands::Delete { endpoint, headers } => {
            let options = with_headers(RequestOptions::delete(), &headers)?;
            let body = client.send(&endpoint, options).await?;
            print_body(body)
        },
    }
}

fn resolve_data_dir(custom: Option<PathBuf>) -> Result<PathBuf> {
    let data_dir = match custom {
        Some(dir) => dir,
        None => dirs::home_dir().context("Cannot get home directory")?.join(DATA_DIR),
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    }

    Ok(data_dir)
}

fn print_status(client: &BackofficeClient, data_dir: &Path) {
    println!("{}", "Backoffice Client Status".cyan().bold());
    println!("  API:         {}", client.config().base_url);
    println!("  Credentials: {}", data_dir.display());
    let session = if client.is_authenticated() {
        "logged in".green()
    } else {
        "logged out".red()
    };
    println!("  Session:     {}", session);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
}

async fn handle_get(
    client: &BackofficeClient,
    endpoint: &str,
    items: bool,
    page: bool,
    all: bool,
    headers: &[String],
) -> Result<()> {
    if all {
        let everything: Vec<Value> = client.list_all(endpoint).await?;
        return print_body(Some(Value::Array(everything)));
    }

    let options = with_headers(RequestOptions::get(), headers)?;
    let body = client.send(endpoint, options).await?;
    let body = if items {
        body.map(backoffice_client::pagination::items)
    } else if page {
        body.map(backoffice_client::pagination::envelope)
    } else {
        body
    };
    print_body(body)
}

async fn send_with_body(
    client: &BackofficeClient,
    method: Method,
    endpoint: &str,
    args: BodyArgs,
) -> Result<()> {
    let mut options = with_headers(RequestOptions::new(method), &args.headers)?;

    if let Some(data) = args.data {
        let json: Value = serde_json::from_str(&data).context("--data is not valid JSON")?;
        options = options.json(json);
    } else if !args.form.is_empty() {
        options = options.multipart(build_form(&args.form)?);
    }

    let body = client.send(endpoint, options).await?;
    print_body(body)
}

fn build_form(fields: &[String]) -> Result<MultipartForm> {
    let mut form = MultipartForm::new();
    for field in fields {
        let (name, value) = field
            .split_once('=')
            .with_context(|| format!("form field '{}' must look like name=value", field))?;

        form = match value.strip_prefix('@') {
            Some(path) => {
                let path = Path::new(path);
                let content =
                    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string());
                form.file(name, file_name, None, content)
            },
            None => form.text(name, value),
        };
    }
    Ok(form)
}

fn with_headers(mut options: RequestOptions, headers: &[String]) -> Result<RequestOptions> {
    for raw in headers {
        let (name, value) = raw
            .split_once(':')
            .with_context(|| format!("header '{}' must look like 'Name: value'", raw))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("invalid header name '{}'", name.trim()))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("invalid value for header '{}'", name))?;
        options = options.header(name, value);
    }
    Ok(options)
}

fn print_body(body: Option<Value>) -> Result<()> {
    match body {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{}", "(no content)".dimmed()),
    }
    Ok(())
}
