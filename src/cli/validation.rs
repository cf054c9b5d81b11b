use crate::cli::args::CliArgs;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if args.url.trim().is_empty() {
        return Err("target URL must not be empty".to_string());
    }
    if let Some(raw) = args.status_codes.as_deref() {
        crate::utils::parse_u16_set_csv(raw)
            .map_err(|e| format!("invalid --status-codes '{raw}': {e}"))?;
    }
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err("invalid --threads, expected positive integer".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.header.as_deref() {
        crate::utils::parse_header_kv(raw).map_err(|e| format!("invalid --header '{raw}': {e}"))?;
    }
    Ok(())
}
