//! OS account lookup and derived scope names
//!
//! Lock and channel names embed the OS domain/host, the OS user and the scope
//! identity, so instances of different users never collide and an administrator
//! can tell them apart by name.

use crate::identity::ScopeIdentity;
use crate::{CHANNEL_NAME_PREFIX, LOCK_NAME_PREFIX};

/// The OS user and domain/host a process runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsAccount {
    pub user: String,
    pub domain: String,
}

impl OsAccount {
    pub fn new(user: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            domain: domain.into(),
        }
    }

    /// Look up the account of the current process
    pub fn current() -> Self {
        Self {
            user: current_user(),
            domain: current_domain(),
        }
    }
}

/// Names derived from one (account, identity) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeNames {
    /// Name of the arbitration lock, e.g. `Mutex_host_alice_app-X`
    pub lock_name: String,
    /// Name of the leader's channel, e.g. `Pipe_host_alice_app-X`
    pub channel_name: String,
}

impl ScopeNames {
    pub fn new(account: &OsAccount, identity: &ScopeIdentity) -> Self {
        Self {
            lock_name: format!(
                "{}_{}_{}_{}",
                LOCK_NAME_PREFIX, account.domain, account.user, identity
            ),
            channel_name: format!(
                "{}_{}_{}_{}",
                CHANNEL_NAME_PREFIX, account.domain, account.user, identity
            ),
        }
    }

    /// Names for the current process account
    pub fn for_current_account(identity: &ScopeIdentity) -> Self {
        Self::new(&OsAccount::current(), identity)
    }

    /// File name of the lock file inside the runtime directory
    pub fn lock_file_name(&self) -> String {
        format!("{}.lock", sanitize_component(&self.lock_name))
    }

    /// File-system safe form of the channel name
    pub fn channel_file_stem(&self) -> String {
        sanitize_component(&self.channel_name)
    }
}

/// Escape a name into a single path component.
///
/// `[A-Za-z0-9._-]` pass through; every other byte of the UTF-8 form becomes
/// `%XX`. `%` itself is escaped, so distinct names never share a component.
pub fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn current_user() -> String {
    non_empty_env("USER")
        .or_else(|| non_empty_env("USERNAME"))
        .or_else(|| non_empty_env("LOGNAME"))
        .unwrap_or_else(fallback_user)
}

#[cfg(unix)]
fn fallback_user() -> String {
    crate::paths::current_uid().to_string()
}

#[cfg(not(unix))]
fn fallback_user() -> String {
    "user".to_string()
}

fn current_domain() -> String {
    non_empty_env("USERDOMAIN")
        .or_else(|| non_empty_env("HOSTNAME"))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(user: &str, domain: &str, id: &str) -> ScopeNames {
        ScopeNames::new(
            &OsAccount::new(user, domain),
            &ScopeIdentity::explicit(id).unwrap(),
        )
    }

    #[test]
    fn test_name_templates() {
        let n = names("alice", "WORKGROUP", "app-X");
        assert_eq!(n.lock_name, "Mutex_WORKGROUP_alice_app-X");
        assert_eq!(n.channel_name, "Pipe_WORKGROUP_alice_app-X");
    }

    #[test]
    fn test_lock_and_channel_names_distinct() {
        let n = names("alice", "host", "app-X");
        assert_ne!(n.lock_name, n.channel_name);
    }

    #[test]
    fn test_users_do_not_collide() {
        let a = names("alice", "host", "app-X");
        let b = names("bob", "host", "app-X");
        assert_ne!(a.lock_name, b.lock_name);
        assert_ne!(a.channel_name, b.channel_name);
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("a/b\\c d"), "a%2Fb%5Cc%20d");
        assert_eq!(sanitize_component("app-X_1.2"), "app-X_1.2");
        assert_eq!(sanitize_component("é"), "%C3%A9");
        assert_eq!(sanitize_component("100%"), "100%25");
    }

    #[test]
    fn test_sanitize_component_keeps_names_apart() {
        let pairs = [
            ("café", "cafè"),
            ("org/app", "org_app"),
            ("a b", "a_b"),
            ("%2F", "/"),
            ("ünï", "___"),
        ];
        for (a, b) in pairs {
            assert_ne!(sanitize_component(a), sanitize_component(b), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_lock_file_name() {
        let n = names("alice", "host", "org/app");
        assert_eq!(n.lock_file_name(), "Mutex_host_alice_org%2Fapp.lock");
        assert_eq!(n.channel_file_stem(), "Pipe_host_alice_org%2Fapp");
    }

    #[test]
    fn test_non_ascii_accounts_do_not_collide() {
        let a = names("jürgen", "host", "app-X");
        let b = names("jürgën", "host", "app-X");
        assert_ne!(a.lock_file_name(), b.lock_file_name());
        assert_ne!(a.channel_file_stem(), b.channel_file_stem());
    }

    #[test]
    fn test_current_account_is_populated() {
        let account = OsAccount::current();
        assert!(!account.user.is_empty());
        assert!(!account.domain.is_empty());
    }
}
