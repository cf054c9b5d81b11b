use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pathprobe",
    version,
    about = "concurrent web content discovery scanner",
    long_about = "Pathprobe probes a target URL with every entry of a wordlist and records the paths that respond with interesting status codes.\n\nExamples:\n  pathprobe http://target.tld/\n  pathprobe http://target.tld/ -w big.txt -t 50 --timeout 10\n  pathprobe http://target.tld/ --recursive --max-depth 2\n\nTip: Use --config to persist scan settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        value_name = "URL",
        help_heading = "Input",
        help = "Base URL to scan (http or https)."
    )]
    pub url: String,

    #[arg(
        short = 'w',
        long = "wordlist",
        value_name = "FILE",
        help_heading = "Input",
        help = "Wordlist file, one path candidate per line [default: common.txt]."
    )]
    pub wordlist: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.pathprobe/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Append discovered URLs to this file [default: discovered_urls.txt]."
    )]
    pub output: Option<String>,

    #[arg(
        long = "dedup-output",
        help_heading = "Output",
        help = "Skip URLs already present in the output file from earlier runs."
    )]
    pub dedup_output: bool,

    #[arg(
        short = 'n',
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 't',
        long = "threads",
        value_name = "N",
        help_heading = "Performance",
        help = "Number of concurrent workers [default: 1]."
    )]
    pub threads: Option<usize>,

    #[arg(
        short = 'r',
        long = "rate",
        value_name = "RPS",
        help_heading = "Performance",
        help = "Seeding rate limit in requests per second (0 = unlimited)."
    )]
    pub rate: Option<u32>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Per-request timeout in seconds [default: 5]."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "retries",
        value_name = "N",
        help_heading = "Performance",
        help = "Retry transport failures this many times [default: 0]."
    )]
    pub retries: Option<u32>,

    #[arg(
        short = 's',
        long = "status-codes",
        value_name = "CODES",
        help_heading = "Scan",
        help = "Status codes recorded as discoveries (comma-separated) [default: 200,301,302,403]."
    )]
    pub status_codes: Option<String>,

    #[arg(
        long = "recursive",
        help_heading = "Recursion",
        help = "Re-scan the wordlist under directory-like discoveries."
    )]
    pub recursive: bool,

    #[arg(
        long = "max-depth",
        value_name = "N",
        help_heading = "Recursion",
        help = "Maximum recursion depth; a positive value implies --recursive, 0 disables recursion [default: 1]."
    )]
    pub max_depth: Option<usize>,

    #[arg(
        short = 'a',
        long = "user-agent",
        value_name = "UA",
        help_heading = "HTTP",
        help = "User-Agent header value [default: pathprobe]."
    )]
    pub user_agent: Option<String>,

    #[arg(
        long = "no-verify-ssl",
        help_heading = "HTTP",
        help = "Accept invalid TLS certificates and hostnames."
    )]
    pub no_verify_ssl: bool,

    #[arg(
        short = 'p',
        long = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Route requests through this proxy (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'H',
        long = "header",
        value_name = "KEY: VALUE",
        help_heading = "HTTP",
        help = "Extra request header sent with every probe."
    )]
    pub header: Option<String>,
}
