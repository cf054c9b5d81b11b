use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::runner::{Options, Runner, WordlistSource};

fn print_banner() {
    const BANNER: &str = r#"
                 __  __                     __
    ____  ____ _/ /_/ /_  ____  _________  / /_  ___
   / __ \/ __ `/ __/ __ \/ __ \/ ___/ __ \/ __ \/ _ \
  / /_/ / /_/ / /_/ / / / /_/ / /  / /_/ / /_/ /  __/
 / .___/\__,_/\__/_/ /_/ .___/_/   \____/_.___/\___/
/_/                   /_/
       v0.2.1 - web content discovery scanner
    "#;
    print!("{}", BANNER);
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn build_run_options(args: CliArgs, cfg: ConfigFile) -> Result<(Options, bool), String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    let wordlist_path = config::expand_tilde_string(
        args.wordlist
            .or(cfg.wordlist)
            .unwrap_or_else(|| "common.txt".to_string())
            .as_str(),
    );
    let output = config::expand_tilde_string(
        args.output
            .or(cfg.output)
            .unwrap_or_else(|| "discovered_urls.txt".to_string())
            .as_str(),
    );

    let threads = args.threads.or(cfg.threads).unwrap_or(1);
    let status_codes = args
        .status_codes
        .or(cfg.status_codes)
        .unwrap_or_else(|| "200,301,302,403".to_string());
    crate::utils::parse_u16_set_csv(&status_codes)
        .map_err(|e| format!("invalid --status-codes '{status_codes}': {e}"))?;
    let timeout_seconds = args.timeout.or(cfg.timeout).unwrap_or(5);

    // a positive depth turns recursion on by itself; an explicit 0 turns it
    // off even when --recursive is given
    let max_depth_opt = args.max_depth.or(cfg.max_depth);
    let recursive = match max_depth_opt {
        Some(0) => false,
        Some(_) => true,
        None => args.recursive || cfg.recursive.unwrap_or(false),
    };
    let max_depth = max_depth_opt.unwrap_or(1);

    let user_agent = args
        .user_agent
        .or(cfg.user_agent)
        .unwrap_or_else(|| "pathprobe".to_string());
    let verify_ssl = !(args.no_verify_ssl || cfg.no_verify_ssl.unwrap_or(false));
    let retries = args.retries.or(cfg.retries).unwrap_or(0);
    let rate = args.rate.or(cfg.rate).unwrap_or(0);
    let proxy = args
        .proxy
        .or(cfg.proxy)
        .filter(|p| !p.trim().is_empty());
    let header = args.header.or(cfg.header);
    let dedup_output = args.dedup_output || cfg.dedup_output.unwrap_or(false);

    let options = Options {
        url: args.url.trim().to_string(),
        wordlist: WordlistSource::FilePath(wordlist_path),
        output,
        threads,
        status_codes,
        timeout_seconds,
        recursive,
        max_depth,
        user_agent,
        verify_ssl,
        retries,
        rate,
        proxy,
        header,
        dedup_output,
    };
    Ok((options, no_color))
}

async fn run_async(options: Options, no_color: bool) -> Result<(), String> {
    if no_color {
        colored::control::set_override(false);
    }
    print_banner();

    format_kv_line("Target", &options.url);
    if let WordlistSource::FilePath(path) = &options.wordlist {
        format_kv_line("Wordlist", path);
    }
    format_kv_line("Output", &options.output);
    format_kv_line("Threads", &options.threads.to_string());
    format_kv_line("Status", &options.status_codes);
    format_kv_line("Timeout", &format!("{}s", options.timeout_seconds));
    if options.recursive {
        format_kv_line("Recursion", &format!("depth {}", options.max_depth.max(1)));
    } else {
        format_kv_line("Recursion", "off");
    }
    if let Some(proxy) = options.proxy.as_deref() {
        format_kv_line("Proxy", proxy);
    }
    if let Some(header) = options.header.as_deref() {
        format_kv_line("Header", header);
    }
    println!();

    let runner = Runner::new(options).map_err(|e| e.to_string())?;

    let pb = ProgressBar::new(0);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?
        .progress_chars(r#"#>-"#),
    );

    let summary = runner
        .run_with_progress(pb.clone())
        .await
        .map_err(|e| e.to_string())?;
    pb.finish_and_clear();

    println!();
    println!(
        ":: Completed :: {} probed :: {} found :: {} written to {} :: scan took {}s ::",
        summary.stats.probed,
        summary.stats.discovered,
        summary.written,
        summary.output_path,
        summary.elapsed.as_secs()
    );

    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let (options, no_color) = build_run_options(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(options.threads.clamp(1, 64))
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(options, no_color))?;
    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::parse_from(argv)
    }

    #[test]
    fn defaults_match_documented_values() {
        let args = parse(&["pathprobe", "http://example.com/"]);
        let (options, no_color) = build_run_options(args, ConfigFile::default()).unwrap();
        assert!(matches!(
            &options.wordlist,
            WordlistSource::FilePath(p) if p == "common.txt"
        ));
        assert_eq!(options.output, "discovered_urls.txt");
        assert_eq!(options.threads, 1);
        assert_eq!(options.status_codes, "200,301,302,403");
        assert_eq!(options.timeout_seconds, 5);
        assert!(!options.recursive);
        assert_eq!(options.user_agent, "pathprobe");
        assert!(options.verify_ssl);
        assert_eq!(options.retries, 0);
        assert!(!options.dedup_output);
        assert!(!no_color);
    }

    #[test]
    fn max_depth_implies_recursive() {
        let args = parse(&["pathprobe", "http://example.com/", "--max-depth", "3"]);
        let (options, _) = build_run_options(args, ConfigFile::default()).unwrap();
        assert!(options.recursive);
        assert_eq!(options.max_depth, 3);
    }

    #[test]
    fn max_depth_zero_disables_recursion() {
        let args = parse(&["pathprobe", "http://example.com/", "--max-depth", "0"]);
        let (options, _) = build_run_options(args, ConfigFile::default()).unwrap();
        assert!(!options.recursive);

        let args = parse(&[
            "pathprobe",
            "http://example.com/",
            "--recursive",
            "--max-depth",
            "0",
        ]);
        let (options, _) = build_run_options(args, ConfigFile::default()).unwrap();
        assert!(!options.recursive);
    }

    #[test]
    fn recursive_without_depth_defaults_to_one() {
        let args = parse(&["pathprobe", "http://example.com/", "--recursive"]);
        let (options, _) = build_run_options(args, ConfigFile::default()).unwrap();
        assert!(options.recursive);
        assert_eq!(options.max_depth, 1);
    }

    #[test]
    fn cli_values_override_config_values() {
        let args = parse(&["pathprobe", "http://example.com/", "-t", "50"]);
        let cfg = ConfigFile {
            threads: Some(10),
            timeout: Some(30),
            ..ConfigFile::default()
        };
        let (options, _) = build_run_options(args, cfg).unwrap();
        assert_eq!(options.threads, 50);
        assert_eq!(options.timeout_seconds, 30);
    }

    #[test]
    fn no_verify_ssl_flag_disables_verification() {
        let args = parse(&["pathprobe", "https://example.com/", "--no-verify-ssl"]);
        let (options, _) = build_run_options(args, ConfigFile::default()).unwrap();
        assert!(!options.verify_ssl);
    }

    #[test]
    fn garbage_status_codes_are_rejected() {
        let args = parse(&["pathprobe", "http://example.com/", "-s", "200,abc"]);
        assert!(build_run_options(args, ConfigFile::default()).is_err());
    }

    #[test]
    fn zero_threads_is_rejected() {
        let args = parse(&["pathprobe", "http://example.com/", "-t", "0"]);
        assert!(build_run_options(args, ConfigFile::default()).is_err());
    }
}
