//! Clap derive structures for the `hearth` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

use hearth_core::Section;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hearth -- order, favorite and toggle the rooms and devices of a hub
#[derive(Debug, Parser)]
#[command(
    name = "hearth",
    version,
    about = "Arrange and control smart-home rooms and devices from the command line",
    long_about = "Keeps a personal order for rooms and devices, favorites and hidden\n\
        devices, stored locally and optionally mirrored onto hub labels so\n\
        every client sees the same arrangement.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub profile to use
    #[arg(long, short = 'p', env = "HEARTH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub URL or socket endpoint (overrides profile)
    #[arg(long, short = 'u', env = "HEARTH_URL", global = true)]
    pub url: Option<String>,

    /// Long-lived access token (overrides profile)
    #[arg(long, env = "HEARTH_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HEARTH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "HEARTH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "HEARTH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List rooms in display order
    #[command(alias = "r")]
    Rooms,

    /// List a room's devices in display order
    #[command(alias = "e")]
    Entities(EntitiesArgs),

    /// Show, set, move and clear ranks
    Order(OrderArgs),

    /// Manage favorites
    #[command(alias = "fav")]
    Favorites(FavoritesArgs),

    /// Hide or show a device in room views
    Hide(HideArgs),

    /// Control label mirroring
    Sync(SyncArgs),

    /// Toggle a device and report the confirmed state
    #[command(alias = "t")]
    Toggle(ToggleArgs),

    /// Stream state changes until interrupted
    Watch(WatchArgs),

    /// Print the cached layout without connecting
    Layout,

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ENTITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    /// Area id of the room
    pub area: String,

    /// Only this domain (e.g. light); all domains when omitted
    #[arg(long, short = 'd')]
    pub domain: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ORDER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct OrderArgs {
    #[command(subcommand)]
    pub command: OrderCommand,
}

/// Selects which ordered collection a command works on.
///
/// Without flags the room order is used; `--room` with `--domain`
/// selects the device order inside one room.
#[derive(Debug, Clone, Args)]
pub struct ScopeOpts {
    /// Area id whose device order to use
    #[arg(long, requires = "domain")]
    pub room: Option<String>,

    /// Domain within the room (e.g. light)
    #[arg(long, requires = "room")]
    pub domain: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    /// Show items with their ranks
    Show {
        #[command(flatten)]
        scope: ScopeOpts,
    },

    /// Set one item's rank directly
    Set {
        /// Item id (area id or entity id)
        id: String,

        /// Positive rank; lower sorts first
        rank: i64,

        #[command(flatten)]
        scope: ScopeOpts,
    },

    /// Move items as a block before or after another item
    Move {
        /// Items to move, kept in the given order
        #[arg(required = true)]
        ids: Vec<String>,

        /// Place the block directly before this item
        #[arg(long, conflicts_with_all = ["after", "first", "last"])]
        before: Option<String>,

        /// Place the block directly after this item
        #[arg(long, conflicts_with_all = ["first", "last"])]
        after: Option<String>,

        /// Place the block at the start
        #[arg(long, conflicts_with = "last")]
        first: bool,

        /// Place the block at the end
        #[arg(long)]
        last: bool,

        #[command(flatten)]
        scope: ScopeOpts,
    },

    /// Remove an item's rank
    Clear {
        /// Item id
        id: String,

        #[command(flatten)]
        scope: ScopeOpts,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  FAVORITES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct FavoritesArgs {
    #[command(subcommand)]
    pub command: FavoritesCommand,
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    /// List favorites of a section in order
    #[command(alias = "ls")]
    List {
        /// scenes, rooms or entities
        section: Section,
    },

    /// Append an item to a section
    Add {
        /// scenes, rooms or entities
        section: Section,
        /// Item id (area id for rooms, entity id otherwise)
        id: String,
    },

    /// Remove an item from a section
    #[command(alias = "rm")]
    Remove {
        /// scenes, rooms or entities
        section: Section,
        /// Item id
        id: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HIDE / SYNC / TOGGLE / WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct HideArgs {
    /// Entity id
    pub entity_id: String,

    /// Show the device again instead of hiding it
    #[arg(long)]
    pub undo: bool,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommand,
}

#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Show whether mirroring is on and what is stored locally
    Status,

    /// Turn mirroring on and push all local data to labels
    Enable,

    /// Turn mirroring off and remove this client's labels from the hub
    Disable,

    /// Rebuild local data from labels on the hub
    Pull,
}

#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Entity id (e.g. light.desk)
    pub entity_id: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only report these entities
    #[arg(long, short = 'e')]
    pub entity: Vec<String>,

    /// Only report entities of this domain
    #[arg(long, short = 'd')]
    pub domain: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG / COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles (default marked with *)
    Profiles,

    /// Add or replace a profile
    Add {
        /// Profile name
        name: String,

        /// Hub base URL or socket endpoint
        #[arg(long)]
        url: String,

        /// Environment variable holding the access token
        #[arg(long)]
        token_env: Option<String>,

        /// OAuth client id; switches the profile to refresh-token auth
        #[arg(long)]
        client_id: Option<String>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store a token in the system keyring
    SetToken {
        /// Store as the OAuth refresh token instead of the access token
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
