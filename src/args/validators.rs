use home::home_dir;
use std::fs;
use std::path::PathBuf;

use super::types::{Args, Command};

/// Validate the parsed arguments as a whole.
///
/// # Errors
///
/// Returns an error message describing the first invalid argument.
pub fn validate(args: &Args) -> Result<(), String> {
    if let Some(bin) = &args.podman_bin
        && bin.components().count() > 1
        && !bin.is_file()
    {
        return Err(format!(
            "The podman binary '{}' does not exist.",
            bin.display()
        ));
    }

    if let Command::Check(check) = &args.command {
        let mut seen = std::collections::HashSet::new();
        for (host, _) in &check.registry_endpoints {
            if !seen.insert(host) {
                return Err(format!("Registry endpoint for '{host}' given more than once."));
            }
        }
        if check.width == Some(0) {
            return Err("Table width must be greater than zero.".to_string());
        }
    }

    Ok(())
}

/// Checks if a file is readable
///
/// # Arguments
///
/// * `file` - Path to check, `~` is expanded to the home directory
///
/// # Returns
///
/// * `Result<PathBuf, String>` - The validated PathBuf or an error message
pub fn check_readable_file(file: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(file);

    let xpath = if path.starts_with("~") {
        if let Some(home) = home_dir() {
            home.join(path.strip_prefix("~").unwrap_or(path.as_path()))
        } else {
            return Err("Home directory could not be determined.".to_string());
        }
    } else {
        path
    };

    if xpath.is_file() && fs::metadata(&xpath).is_ok() {
        Ok(xpath)
    } else {
        Err(format!("The file '{file}' is not readable."))
    }
}

/// Parse a number of seconds that must be greater than zero.
///
/// # Errors
///
/// Returns an error if the value is not a positive integer.
pub fn parse_positive_secs(raw: &str) -> Result<u64, String> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(secs) => Ok(secs),
        Err(e) => Err(format!("invalid number of seconds '{raw}': {e}")),
    }
}

/// Parse a `HOST=URL` registry endpoint override.
///
/// # Errors
///
/// Returns an error if either side is missing or the URL has no http(s)
/// scheme.
pub fn parse_endpoint(raw: &str) -> Result<(String, String), String> {
    let (host, url) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected HOST=URL, got '{raw}'"))?;
    let (host, url) = (host.trim(), url.trim());
    if host.is_empty() || url.is_empty() {
        return Err(format!("expected HOST=URL, got '{raw}'"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(format!("registry URL '{url}' must start with http:// or https://"));
    }
    Ok((host.to_string(), url.to_string()))
}
