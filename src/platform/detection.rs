//! Repository detection from git remotes

use crate::error::{Error, Result};
use crate::types::{GitRemote, PlatformConfig};
use url::Url;

/// Pick the configured remote from the repository's remotes
pub fn select_remote<'a>(remotes: &'a [GitRemote], name: &str) -> Result<&'a GitRemote> {
    remotes
        .iter()
        .find(|r| r.name == name)
        .ok_or_else(|| Error::RemoteNotFound(name.to_string()))
}

/// Parse owner/repo/host from a GitHub remote URL
///
/// Accepts `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo.git`
/// and scp-like `git@host:owner/repo.git`. Hosts other than github.com are
/// accepted when `GH_HOST` names them (GitHub Enterprise).
pub fn parse_repo_info(remote_url: &str) -> Result<PlatformConfig> {
    let (host, path) = split_remote(remote_url).ok_or(Error::NoSupportedRemotes)?;

    let enterprise_host = std::env::var("GH_HOST").ok();
    let host_opt = if host == "github.com" {
        None
    } else if enterprise_host.as_deref() == Some(host.as_str()) || host.contains("github") {
        Some(host)
    } else {
        return Err(Error::NoSupportedRemotes);
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.splitn(2, '/');
    let (Some(owner), Some(repo)) = (parts.next(), parts.next()) else {
        return Err(Error::NoSupportedRemotes);
    };
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(Error::NoSupportedRemotes);
    }

    Ok(PlatformConfig {
        owner: owner.to_string(),
        repo: repo.to_string(),
        host: host_opt,
    })
}

fn split_remote(remote_url: &str) -> Option<(String, String)> {
    if let Ok(url) = Url::parse(remote_url)
        && let Some(host) = url.host_str()
    {
        return Some((host.to_string(), url.path().to_string()));
    }
    // scp-like: user@host:path
    let (user_host, path) = remote_url.split_once(':')?;
    let host = user_host.rsplit('@').next()?;
    if host.is_empty() || path.starts_with("//") {
        return None;
    }
    Some((host.to_string(), path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_remote() {
        let config = parse_repo_info("https://github.com/acme/widgets.git").unwrap();
        assert_eq!(config.owner, "acme");
        assert_eq!(config.repo, "widgets");
        assert_eq!(config.host, None);
    }

    #[test]
    fn test_scp_remote() {
        let config = parse_repo_info("git@github.com:acme/widgets.git").unwrap();
        assert_eq!(config.owner, "acme");
        assert_eq!(config.repo, "widgets");
    }

    #[test]
    fn test_ssh_url_remote() {
        let config = parse_repo_info("ssh://git@github.com/acme/widgets").unwrap();
        assert_eq!(config.repo, "widgets");
    }

    #[test]
    fn test_enterprise_host() {
        let config = parse_repo_info("https://github.acme.dev/team/tool.git").unwrap();
        assert_eq!(config.host.as_deref(), Some("github.acme.dev"));
    }

    #[test]
    fn test_unsupported_host() {
        assert!(matches!(
            parse_repo_info("https://gitlab.com/acme/widgets.git"),
            Err(Error::NoSupportedRemotes)
        ));
        assert!(parse_repo_info("/local/path/repo.git").is_err());
    }

    #[test]
    fn test_select_remote() {
        let remotes = vec![GitRemote {
            name: "origin".to_string(),
            url: "git@github.com:a/b.git".to_string(),
        }];
        assert!(select_remote(&remotes, "origin").is_ok());
        assert!(matches!(
            select_remote(&remotes, "upstream"),
            Err(Error::RemoteNotFound(_))
        ));
    }
}
