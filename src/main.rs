//! WP oEmbed Enum CLI - Enumerate WordPress usernames through oEmbed

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wp_oembed_enum::{
    CrawlObserver, Crawler, Fetcher, OutputFormat, SitemapResolver, UsernameSet,
    fetch::{DEFAULT_CONCURRENCY, DEFAULT_SITEMAP_PATH, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT},
    print_summary, save_usernames,
};

/// WordPress username enumerator - discovers author slugs via sitemaps and oEmbed
#[derive(Parser, Debug)]
#[command(name = "wp-oembed-enum")]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the WordPress site (e.g. https://example.com)
    #[arg(short = 'u', long = "url")]
    url: String,

    /// Number of concurrent lookups
    #[arg(short = 't', long = "threads", default_value_t = DEFAULT_CONCURRENCY)]
    threads: usize,

    /// Proxy to use (e.g. http://127.0.0.1:8080 or socks5://127.0.0.1:9050)
    #[arg(short = 'x', long = "proxy")]
    proxy: Option<String>,

    /// Output format
    #[arg(short = 'o', long = "output", default_value = "txt", value_enum)]
    output_format: OutputFormatArg,

    /// Seconds to wait before each request
    #[arg(long = "delay", default_value = "0", value_parser = parse_seconds)]
    delay: Duration,

    /// User-Agent header sent on all requests
    #[arg(long = "user-agent", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Request timeout in seconds
    #[arg(long = "timeout", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Extra request header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Sitemap index path relative to the site, or an absolute URL
    #[arg(long = "sitemap", default_value = DEFAULT_SITEMAP_PATH)]
    sitemap: String,

    /// Accept invalid TLS certificates (self-signed or staging targets)
    #[arg(long = "insecure")]
    insecure: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors and the results file path
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Output format argument
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormatArg {
    Txt,
    Json,
    Csv,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Txt => OutputFormat::Txt,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Csv => OutputFormat::Csv,
        }
    }
}

/// Parse a non-negative number of seconds, fractions allowed
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())
}

/// Progress bar fed by the crawler
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new(total: usize, hidden: bool) -> Self {
        if hidden {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("Enumerating users [{bar:40.cyan/dim}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl CrawlObserver for ProgressObserver {
    fn on_new_username(&self, username: &str) {
        let line = format!("[+] New username found: {}", username);
        if self.bar.is_hidden() {
            println!("{}", line);
        } else {
            self.bar.println(line);
        }
    }

    fn on_progress(&self, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(args.verbose, args.quiet);

    if !args.quiet {
        print_banner();
    }

    match run(&args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> wp_oembed_enum::Result<()> {
    let builder = Fetcher::builder(&args.url)
        .sitemap(args.sitemap.as_str())
        .proxy(args.proxy.clone())
        .user_agent(args.user_agent.as_str())
        .timeout(Duration::from_secs(args.timeout))
        .delay(args.delay)
        .concurrency(args.threads)
        .accept_invalid_certs(args.insecure);
    let fetcher = args
        .headers
        .iter()
        .fold(builder, |builder, header| builder.header(header.as_str()))
        .build()?;

    let config = fetcher.config();
    let index_url = config.sitemap_index_url();
    info!("Target: {}", config.base_url);
    info!("Checking sitemap at: {}", index_url);
    info!("User-Agent: {}", config.user_agent);
    if !config.delay.is_zero() {
        info!("Delay between requests: {:.2} seconds", config.delay.as_secs_f64());
    }
    if let Some(proxy) = &config.proxy {
        info!("Using proxy: {}", proxy);
    }
    if config.accept_invalid_certs {
        info!("TLS certificate verification disabled");
    }

    let post_urls = SitemapResolver::new(&fetcher)
        .resolve_index(&index_url)
        .await
        .inspect_err(|_| {
            eprintln!("No valid sitemap found (WordPress 5.5+ is required)");
        })?;

    let observer = ProgressObserver::new(post_urls.len(), args.quiet);
    let usernames = Crawler::from_fetcher(fetcher)
        .crawl_with_observer(post_urls, &observer)
        .await;
    observer.bar.finish_and_clear();

    if !args.quiet {
        print_results(&usernames)?;
    }

    let path = save_usernames(&usernames, args.output_format.into(), ".")?;
    println!("[+] Usernames saved to: {}", path.display());

    Ok(())
}

fn print_results(usernames: &UsernameSet) -> wp_oembed_enum::Result<()> {
    println!();
    println!("[+] Found {} unique usernames", usernames.len());

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    print_summary(usernames, &mut writer)
}

/// Logs go to stderr; `RUST_LOG` overrides the verbosity flags
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("wp_oembed_enum=info,warn"),
                1 => EnvFilter::new("wp_oembed_enum=debug,info"),
                _ => EnvFilter::new("wp_oembed_enum=trace,debug"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_banner() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    println!("WP oEmbed Enum v{}", VERSION);
    println!("WordPress username enumeration via sitemaps and oEmbed");
    println!();
}
