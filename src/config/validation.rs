use crate::config::types::{IdSource, RunOptions, SiteConfig, SiteEndpoints, TimingConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the site configuration
pub fn validate_site(site: &SiteConfig) -> Result<(), ConfigError> {
    validate_endpoints(&site.site)?;
    validate_headers(site)?;
    validate_timing(&site.timing)?;
    Ok(())
}

/// Validates options given on the command line
pub fn validate_run(options: &RunOptions) -> Result<(), ConfigError> {
    if options.workers < 1 {
        return Err(ConfigError::Validation(
            "worker count must be at least 1".to_string(),
        ));
    }

    if let IdSource::Range { start, end } = options.ids {
        if start > end {
            return Err(ConfigError::Validation(format!(
                "id range start {} is after end {}",
                start, end
            )));
        }
    }

    if let Some(login) = &options.login {
        if login.username.is_empty() {
            return Err(ConfigError::Validation(
                "explicit username cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates login and item endpoints and the page selectors
fn validate_endpoints(site: &SiteEndpoints) -> Result<(), ConfigError> {
    validate_http_url("login-url", &site.login_url)?;

    if !site.item_url.contains("{id}") {
        return Err(ConfigError::Validation(format!(
            "item-url must contain an {{id}} placeholder, got '{}'",
            site.item_url
        )));
    }
    validate_http_url("item-url", &site.item_url_for(0))?;

    for (name, value) in [
        ("username-field", &site.username_field),
        ("password-field", &site.password_field),
        ("session-cookie", &site.session_cookie),
        ("logged-out-marker", &site.logged_out_marker),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    validate_selector("hash-selector", &site.hash_selector)?;
    validate_selector("title-selector", &site.title_selector)?;

    if site.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_headers(site: &SiteConfig) -> Result<(), ConfigError> {
    for name in site.headers.keys() {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigError::Validation(format!(
                "invalid header name '{}'",
                name
            )));
        }
    }

    if site.user_agents.iter().any(|agent| agent.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agents cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_timing(timing: &TimingConfig) -> Result<(), ConfigError> {
    if timing.report_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "report-interval-secs must be at least 1".to_string(),
        ));
    }

    if timing.result_wait_ms == 0 {
        return Err(ConfigError::Validation(
            "result-wait-ms must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    Ok(())
}

fn validate_selector(name: &str, value: &str) -> Result<(), ConfigError> {
    Selector::parse(value)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidSelector(format!("{}: '{}'", name, value)))
}
