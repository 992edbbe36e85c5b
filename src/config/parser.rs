use crate::config::types::SiteConfig;
use crate::config::validation::validate_site;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a site configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML site configuration file
///
/// # Returns
///
/// * `Ok(SiteConfig)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use catalog_harvest::config::load_site_config;
///
/// let site = load_site_config(Path::new("harvest.toml")).unwrap();
/// println!("Item pages: {}", site.site.item_url);
/// ```
pub fn load_site_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_site_config(&content)
}

/// Parses and validates site configuration from TOML text
pub fn parse_site_config(content: &str) -> Result<SiteConfig, ConfigError> {
    let site: SiteConfig = toml::from_str(content)?;
    validate_site(&site)?;
    Ok(site)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs can be matched to the site description they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a site configuration and returns both the config and its hash
pub fn load_site_config_with_hash(path: &Path) -> Result<(SiteConfig, String), ConfigError> {
    let site = load_site_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((site, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = r#"
user-agents = ["Mozilla/5.0 (X11; Linux x86_64)"]

[site]
login-url = "https://catalog.example.com/login"
item-url = "https://catalog.example.com/item/{id}"
session-cookie = "sid"
hash-selector = "span.hash"
logged-out-marker = "Please sign in"

[headers]
Accept-Language = "en-US"

[account]
username = "reader"
password = "hunter2"

[timing]
fetch-delay-ms = 500
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID);
        let site = load_site_config(file.path()).unwrap();

        assert_eq!(site.site.session_cookie, "sid");
        assert_eq!(site.site.username_field, "username");
        assert_eq!(site.site.title_selector, "title");
        assert_eq!(site.site.request_timeout_secs, 30);
        assert_eq!(site.user_agents.len(), 1);
        assert_eq!(site.headers.get("Accept-Language").unwrap(), "en-US");
        assert_eq!(site.account.unwrap().username, "reader");
        assert_eq!(site.timing.fetch_delay_ms, 500);
        assert_eq!(site.timing.idle_limit, 5);
    }

    #[test]
    fn test_item_url_for() {
        let site = parse_site_config(VALID).unwrap();
        assert_eq!(
            site.site.item_url_for(42),
            "https://catalog.example.com/item/42"
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_site_config(Path::new("/nonexistent/harvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let result = parse_site_config("this is not valid TOML {{{");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID.replace("/item/{id}", "/item/");
        let result = parse_site_config(&content);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_load_with_hash() {
        let file = create_temp_config(VALID);
        let (site, hash) = load_site_config_with_hash(file.path()).unwrap();

        assert_eq!(site.site.hash_selector, "span.hash");
        assert_eq!(hash.len(), 64);
    }
}
