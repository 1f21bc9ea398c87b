use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "backoffice",
    about = "Backoffice API client",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, env = "BACKOFFICE_API_URL", help = "Base URL of the API")]
    pub api_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "BACKOFFICE_DATA_DIR",
        help = "Directory holding credentials.json (default: ~/.backoffice)"
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, global = true, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Log in and store the issued tokens")]
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "BACKOFFICE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    #[command(about = "Forget the stored tokens")]
    Logout,

    #[command(about = "Show connection and session state")]
    Status,

    #[command(about = "GET an endpoint")]
    Get {
        endpoint: String,

        #[arg(long, conflicts_with_all = ["page", "all"], help = "Print only the list items")]
        items: bool,

        #[arg(long, conflicts_with = "all", help = "Print the full paginated envelope")]
        page: bool,

        #[arg(long, help = "Follow `next` links and print every item")]
        all: bool,

        #[arg(
            short = 'H',
            long = "header",
            conflicts_with = "all",
            help = "Extra header, 'Name: value'"
        )]
        headers: Vec<String>,
    },

    #[command(about = "POST to an endpoint")]
    Post {
        endpoint: String,

        #[command(flatten)]
        body: BodyArgs,
    },

    #[command(about = "PUT to an endpoint")]
    Put {
        endpoint: String,

        #[command(flatten)]
        body: BodyArgs,
    },

    #[command(about = "PATCH an endpoint")]
    Patch {
        endpoint: String,

        #[command(flatten)]
        body: BodyArgs,
    },

    #[command(about = "DELETE an endpoint")]
    Delete {
        endpoint: String,

        #[arg(short = 'H', long = "header", help = "Extra header, 'Name: value'")]
        headers: Vec<String>,
    },
}

#[derive(Args)]
pub struct BodyArgs {
    #[arg(short, long, conflicts_with = "form", help = "JSON request body")]
    pub data: Option<String>,

    #[arg(
        short = 'F',
        long = "form",
        help = "Multipart field, 'name=value' or 'name=@path' for a file"
    )]
    pub form: Vec<String>,

    #[arg(short = 'H', long = "header", help = "Extra header, 'Name: value'")]
    pub headers: Vec<String>,
}
