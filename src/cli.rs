use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(author, version, about = "WAF detection and bypass testing", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// JSON scan configuration file (camelCase keys)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

/// Overrides applied on top of the config file
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ScanOpts {
    /// HTTP methods to test (comma-separated)
    #[arg(short = 'm', long, value_delimiter = ',')]
    pub methods: Vec<String>,

    /// Payload categories to test (comma-separated, default: all)
    #[arg(short = 'c', long, value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Target a known WAF vendor (e.g. Cloudflare)
    #[arg(long)]
    pub waf_type: Option<String>,

    /// Detect the WAF first and target its bypass variants
    #[arg(long, default_value_t = false)]
    pub auto_detect: bool,

    /// Send benign look-alike payloads instead of attacks
    #[arg(long, default_value_t = false)]
    pub false_positive: bool,

    /// Randomize host and payload letter casing
    #[arg(long, default_value_t = false)]
    pub case_sensitive: bool,

    /// Seed for casing randomization
    #[arg(long)]
    pub seed: Option<u64>,

    /// Add URL/double-URL/unicode encoded payload sets
    #[arg(long, default_value_t = false)]
    pub enhanced: bool,

    /// Add vendor bypass payload sets
    #[arg(long, default_value_t = false)]
    pub advanced: bool,

    /// Generic encoding variations when no vendor is known
    #[arg(long, default_value_t = false)]
    pub encoding_variations: bool,

    /// Add parameter pollution and null-byte variants
    #[arg(long, default_value_t = false)]
    pub http_manipulation: bool,

    /// Follow redirects
    #[arg(long, default_value_t = false)]
    pub follow_redirect: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Detect the WAF in front of a URL
    Detect {
        url: String,
    },

    /// Run one page of the test matrix and print outcomes as JSON
    Scan {
        url: String,

        /// Page index (0-based)
        #[arg(short = 'p', long, default_value_t = 0_usize)]
        page: usize,

        /// Outcomes per page
        #[arg(short = 'l', long, default_value_t = 50_usize)]
        limit: usize,

        #[command(flatten)]
        opts: ScanOpts,
    },

    /// Run the full matrix, printing one JSON event per line
    Stream {
        url: String,

        /// Hide the progress bar
        #[arg(long, default_value_t = false)]
        quiet: bool,

        #[command(flatten)]
        opts: ScanOpts,
    },

    /// Scan many URLs as a background job and poll it to completion
    Batch {
        /// URLs, or a file with newline-delimited URLs
        targets: Vec<String>,

        /// Concurrent URL scans (max 5)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Status polling interval in milliseconds
        #[arg(long, default_value_t = 1000_u64)]
        poll_ms: u64,

        #[command(flatten)]
        opts: ScanOpts,
    },

    /// Send HTTP manipulation variants of a payload
    Manipulate {
        url: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        #[arg(long, default_value = "' OR '1'='1")]
        payload: String,

        /// Swap the payload for this vendor's first bypass variant
        #[arg(long)]
        waf_type: Option<String>,

        #[arg(long, default_value_t = false)]
        parameter_pollution: bool,

        #[arg(long, default_value_t = false)]
        verb_tampering: bool,

        #[arg(long, default_value_t = false)]
        content_type_confusion: bool,

        #[arg(long, default_value_t = false)]
        header_injection: bool,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
