//! ldap3-backed directory connector.
//!
//! Enabled with the `ldap` feature. Maps ldap3 results onto
//! [`DirectoryError`]: result code 49 is a credential rejection (Active
//! Directory's `data 533` sub-code marks a disabled account), other result
//! codes are protocol errors, and everything else is a connection failure.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};

use super::directory::{DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession};
use crate::config::DirectorySettings;

const RC_INVALID_CREDENTIALS: u32 = 49;
const AD_ACCOUNT_DISABLED: &str = "data 533";

/// Connector that dials a real LDAP / Active Directory server.
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapConnector;

impl LdapConnector {
    /// Connection URL for the settings.
    ///
    /// A bare `host:port` gets `ldaps://` or `ldap://` depending on the TLS
    /// flag; an explicit scheme is kept as given.
    pub fn url(settings: &DirectorySettings) -> String {
        if settings.address.contains("://") {
            settings.address.clone()
        } else if settings.use_tls {
            format!("ldaps://{}", settings.address)
        } else {
            format!("ldap://{}", settings.address)
        }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self, settings: &DirectorySettings) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let url = Self::url(settings);
        let starttls = settings.starttls && !url.starts_with("ldaps://");

        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(settings.timeout)
            .set_starttls(starttls);

        tracing::debug!(url = %url, starttls, "Connecting to directory");
        let (conn, ldap) = LdapConnAsync::with_settings(conn_settings, &url)
            .await
            .map_err(|e| DirectoryError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "Directory connection driver stopped");
            }
        });

        Ok(Box::new(LdapSession { ldap }))
    }
}

struct LdapSession {
    ldap: Ldap,
}

fn classify(error: LdapError) -> DirectoryError {
    match error {
        LdapError::LdapResult { result } if result.rc == RC_INVALID_CREDENTIALS => {
            if result.text.contains(AD_ACCOUNT_DISABLED) {
                DirectoryError::AccountDisabled
            } else {
                DirectoryError::InvalidCredentials
            }
        }
        LdapError::LdapResult { result } => {
            DirectoryError::Protocol(format!("rc={} {}", result.rc, result.text))
        }
        other => DirectoryError::Connection(other.to_string()),
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.ldap
            .simple_bind(dn, password)
            .await
            .and_then(|res| res.success())
            .map(|_| ())
            .map_err(classify)
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let (entries, _) = self
            .ldap
            .search(base, Scope::Subtree, filter, attributes.to_vec())
            .await
            .and_then(|res| res.success())
            .map_err(classify)?;

        Ok(entries.into_iter().map(to_entry).collect())
    }

    async fn read(&mut self, dn: &str, attributes: &[&str]) -> Result<Option<DirectoryEntry>, DirectoryError> {
        const NO_SUCH_OBJECT: u32 = 32;

        match self
            .ldap
            .search(dn, Scope::Base, "(objectClass=*)", attributes.to_vec())
            .await
            .and_then(|res| res.success())
        {
            Ok((entries, _)) => Ok(entries.into_iter().next().map(to_entry)),
            Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            tracing::debug!(error = %e, "Directory unbind failed");
        }
    }
}

fn to_entry(entry: ldap3::ResultEntry) -> DirectoryEntry {
    let entry = SearchEntry::construct(entry);
    DirectoryEntry {
        dn: entry.dn,
        attributes: entry.attrs,
    }
}
