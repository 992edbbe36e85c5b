//! Proxy and login list loading

use crate::config::{AccountConfig, RunOptions};
use crate::pool::{Credential, Proxy};
use crate::{InputError, InputResult};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// How the proxy list was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxySource {
    /// Proxying disabled
    Direct,

    /// Proxies read from a file, shuffled
    File(Vec<Proxy>),

    /// Single local proxy on the default port
    Local(Proxy),
}

/// Reads `ip port` lines; blank lines and repeated proxies are skipped
pub fn read_proxy_file(path: &Path) -> InputResult<Vec<Proxy>> {
    let mut seen = HashSet::new();
    let mut proxies = Vec::new();

    for (line, value, ip, port) in read_pairs(path, invalid_proxy)? {
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid_proxy(path, line, value))?;
        let proxy = Proxy::new(ip, port);

        if seen.insert(proxy.clone()) {
            proxies.push(proxy);
        } else {
            tracing::warn!("{}:{}: duplicate proxy {} skipped", path.display(), line, proxy);
        }
    }

    Ok(proxies)
}

/// Reads `username password` lines; blank lines and repeated usernames are
/// skipped, the first password wins
pub fn read_login_file(path: &Path) -> InputResult<Vec<Credential>> {
    let mut seen = HashSet::new();
    let mut credentials = Vec::new();

    for (line, _, username, password) in read_pairs(path, invalid_login)? {
        if seen.insert(username.clone()) {
            credentials.push(Credential::new(username, password));
        } else {
            tracing::warn!("{}:{}: duplicate login {} skipped", path.display(), line, username);
        }
    }

    Ok(credentials)
}

/// Selects the proxies for a run
///
/// Direct mode wins; otherwise the proxy file is used if it exists, and a
/// single local proxy on the default port is the fallback.
pub fn load_proxies(options: &RunOptions) -> InputResult<ProxySource> {
    if options.no_proxy {
        tracing::info!("Not using proxy");
        return Ok(ProxySource::Direct);
    }

    if options.proxy_file.is_file() {
        let mut proxies = read_proxy_file(&options.proxy_file)?;
        proxies.shuffle(&mut rand::thread_rng());
        tracing::info!("Loaded {} proxies from file", proxies.len());
        return Ok(ProxySource::File(proxies));
    }

    let proxy = Proxy::new("127.0.0.1", options.default_proxy_port);
    tracing::info!("Loaded single proxy - {}", proxy);
    Ok(ProxySource::Local(proxy))
}

/// Selects the credentials for a run
///
/// An explicit account wins, then the login file if it exists, then the
/// fallback account from the site configuration.
pub fn load_credentials(
    options: &RunOptions,
    fallback: Option<&AccountConfig>,
) -> InputResult<Vec<Credential>> {
    if let Some(account) = &options.login {
        return Ok(vec![Credential::new(
            account.username.clone(),
            account.password.clone(),
        )]);
    }

    if options.login_file.is_file() {
        let credentials = read_login_file(&options.login_file)?;
        if !credentials.is_empty() {
            tracing::info!("Loaded {} logins from file", credentials.len());
            return Ok(credentials);
        }
    }

    fallback
        .map(|account| vec![Credential::new(account.username.clone(), account.password.clone())])
        .ok_or(InputError::NoCredentials)
}

/// Splits each non-blank line into exactly two whitespace-separated fields
fn read_pairs(
    path: &Path,
    malformed: fn(&Path, usize, String) -> InputError,
) -> InputResult<Vec<(usize, String, String, String)>> {
    let content = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut pairs = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let value = line.trim();
        if value.is_empty() {
            continue;
        }

        let fields: Vec<&str> = value.split_whitespace().collect();
        let [first, second] = fields.as_slice() else {
            return Err(malformed(path, index + 1, value.to_string()));
        };

        pairs.push((
            index + 1,
            value.to_string(),
            first.to_string(),
            second.to_string(),
        ));
    }

    Ok(pairs)
}

fn invalid_proxy(path: &Path, line: usize, value: String) -> InputError {
    InputError::InvalidProxy {
        path: path.to_path_buf(),
        line,
        value,
    }
}

fn invalid_login(path: &Path, line: usize, value: String) -> InputError {
    InputError::InvalidLogin {
        path: path.to_path_buf(),
        line,
        value,
    }
}
