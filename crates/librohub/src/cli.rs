//! Clap derive structures for the `librohub` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// librohub -- manage a library catalog, its members, and their loans
#[derive(Debug, Parser)]
#[command(
    name = "librohub",
    version,
    about = "Manage a library catalog, members, and loans from the command line",
    long_about = "Lends and returns books, maintains the catalog and member list, and\n\
        reports on loans against a hosted LibroHub database.\n\n\
        Use --demo to try every command against a seeded in-memory library.",
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
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "LIBROHUB_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Service URL (overrides profile)
    #[arg(long, short = 'u', env = "LIBROHUB_URL", global = true)]
    pub url: Option<String>,

    /// Project API key
    #[arg(long, env = "LIBROHUB_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LIBROHUB_OUTPUT",
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
    #[arg(long, short = 'k', env = "LIBROHUB_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "LIBROHUB_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,

    /// Run against a seeded in-memory library instead of a service
    #[arg(long, env = "LIBROHUB_DEMO", global = true)]
    pub demo: bool,
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
    /// YAML
    Yaml,
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
    /// Browse and manage the catalog; lend and take back books
    #[command(alias = "b")]
    Books(BooksArgs),

    /// Browse and register members
    #[command(alias = "m")]
    Members(MembersArgs),

    /// List borrow records
    #[command(alias = "l")]
    Loans(LoansArgs),

    /// List book categories
    Categories(CategoriesArgs),

    /// Show headline library statistics
    Stats,

    /// Keep the mirror live and report changes until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  BOOKS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct BooksArgs {
    #[command(subcommand)]
    pub command: BooksCommand,
}

#[derive(Debug, Subcommand)]
pub enum BooksCommand {
    /// List catalog entries
    #[command(alias = "ls")]
    List {
        /// Free-text search over title, author, and category
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Only books in this category (by name)
        #[arg(long, short = 'c')]
        category: Option<String>,

        /// Availability facet
        #[arg(long, short = 'a', default_value = "all")]
        availability: AvailabilityArg,
    },

    /// Show one book (by ID or exact title)
    Show {
        book: String,
    },

    /// Add a book to the catalog
    Add {
        /// Title
        #[arg(long)]
        title: String,

        /// Author
        #[arg(long)]
        author: String,

        /// Category name (or raw category id)
        #[arg(long)]
        category: String,

        /// ISBN
        #[arg(long)]
        isbn: Option<String>,

        /// Year of publication
        #[arg(long)]
        year: Option<i32>,

        /// Short description
        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a book (refused while it is on loan)
    #[command(alias = "rm")]
    Delete {
        /// Book ID or exact title
        book: String,
    },

    /// Lend a book to a member
    Borrow {
        /// Book ID or exact title
        book: String,

        /// Member ID, email, or exact name
        #[arg(long, short = 'm')]
        member: String,
    },

    /// Take a book back
    Return {
        /// Book ID or exact title
        book: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AvailabilityArg {
    /// Every book
    All,
    /// On the shelf
    Available,
    /// Out on loan
    Borrowed,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  MEMBERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct MembersArgs {
    #[command(subcommand)]
    pub command: MembersCommand,
}

#[derive(Debug, Subcommand)]
pub enum MembersCommand {
    /// List members
    #[command(alias = "ls")]
    List {
        /// Case-insensitive match on name or email
        #[arg(long, short = 's')]
        search: Option<String>,
    },

    /// Register a member
    Add {
        /// Full name
        #[arg(long)]
        name: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,
    },

    /// Show a member's loans and due dates
    Show {
        /// Member ID, email, or exact name
        member: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LOANS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoansArgs {
    #[command(subcommand)]
    pub command: LoansCommand,
}

#[derive(Debug, Subcommand)]
pub enum LoansCommand {
    /// List borrow records, newest first
    #[command(alias = "ls")]
    List {
        /// Only loans in this state
        #[arg(long)]
        status: Option<LoanStatusArg>,

        /// Only loans by this member (ID, email, or exact name)
        #[arg(long, short = 'm')]
        member: Option<String>,

        /// Only loans of this book (ID or exact title)
        #[arg(long, short = 'b')]
        book: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LoanStatusArg {
    /// Open and not yet due
    Active,
    /// Open and past due
    Overdue,
    /// Closed
    Returned,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CATEGORIES / WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CategoriesArgs {
    #[command(subcommand)]
    pub command: CategoriesCommand,
}

#[derive(Debug, Subcommand)]
pub enum CategoriesCommand {
    /// List categories with their catalog counts
    #[command(alias = "ls")]
    List,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(long)]
    pub duration: Option<u64>,
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
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
