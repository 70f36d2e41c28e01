use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{generate_token, Session, SessionError, CSRF_TOKEN};

#[derive(Debug)]
struct Record {
    data: HashMap<String, Value>,
    expires_at: DateTime<Utc>,
    /// Set when the record is destroyed or its token rotated. A task that
    /// fetched the record before that point must not see it as live.
    revoked: bool,
}

/// Owner of every session record.
///
/// The map is sharded (`DashMap`) and each record sits behind its own async
/// mutex: operations on different tokens never wait on each other, while
/// operations on one token are linearized.
#[derive(Debug)]
pub struct SessionManager {
    records: DashMap<String, Arc<Mutex<Record>>>,
    idle_timeout: chrono::Duration,
}

impl SessionManager {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            records: DashMap::new(),
            idle_timeout: chrono::Duration::from_std(idle_timeout)
                .unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    /// Resolve a client-supplied token into a request-scoped session.
    ///
    /// Missing, unknown and expired tokens all yield a fresh anonymous
    /// session under a new token. This never fails.
    pub async fn load(self: &Arc<Self>, token: Option<&str>) -> Session {
        if let Some(token) = token {
            if self.with_record(token, |_| Ok(())).await.is_ok() {
                return Session::existing(Arc::clone(self), token.to_string());
            }
            tracing::debug!("discarding unknown or expired session token");
        }
        let fresh = self.create();
        Session::issued(Arc::clone(self), fresh)
    }

    /// Start an empty session and return its token.
    pub fn create(&self) -> String {
        self.insert_record(HashMap::new())
    }

    /// Start a session that already carries a CSRF token, for handles that
    /// must continue a request on a new token mid-flight.
    pub(super) fn create_with_csrf(&self) -> String {
        let data = HashMap::from([(CSRF_TOKEN.to_string(), Value::String(generate_token()))]);
        self.insert_record(data)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        token: &str,
        key: &str,
    ) -> Result<Option<T>, SessionError> {
        let value = self
            .with_record(token, |record| Ok(record.data.get(key).cloned()))
            .await?;
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    pub async fn put<T: Serialize>(
        &self,
        token: &str,
        key: &str,
        value: T,
    ) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.with_record(token, |record| {
            record.data.insert(key.to_string(), value);
            Ok(())
        })
        .await
    }

    pub async fn remove(&self, token: &str, key: &str) -> Result<(), SessionError> {
        self.with_record(token, |record| {
            record.data.remove(key);
            Ok(())
        })
        .await
    }

    /// Get and remove in one step (flash messages).
    pub async fn pop<T: DeserializeOwned>(
        &self,
        token: &str,
        key: &str,
    ) -> Result<Option<T>, SessionError> {
        let value = self
            .with_record(token, |record| Ok(record.data.remove(key)))
            .await?;
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    /// Read-modify-write a single key under the record lock.
    pub async fn update<T, F>(&self, token: &str, key: &str, f: F) -> Result<T, SessionError>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce(Option<T>) -> T,
    {
        self.with_record(token, |record| {
            let current = record
                .data
                .get(key)
                .cloned()
                .map(serde_json::from_value)
                .transpose()?;
            let next = f(current);
            record
                .data
                .insert(key.to_string(), serde_json::to_value(next.clone())?);
            Ok(next)
        })
        .await
    }

    /// Move the session's data to a new token and invalidate the old one.
    pub async fn renew_token(&self, old: &str) -> Result<String, SessionError> {
        let record = self.lookup(old)?;
        let mut guard = record.lock().await;
        self.check_live(old, &mut guard)?;

        let data = std::mem::take(&mut guard.data);
        guard.revoked = true;
        let new = self.insert_record(data);
        self.records.remove(old);
        Ok(new)
    }

    /// Drop the session. Unknown tokens are ignored.
    pub async fn destroy(&self, token: &str) {
        if let Some((_, record)) = self.records.remove(token) {
            let mut guard = record.lock().await;
            guard.revoked = true;
            guard.data.clear();
        }
    }

    /// Remove every expired record. Records currently locked are in use and
    /// therefore skipped.
    pub fn reap_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .records
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .map(|record| record.revoked || record.expires_at <= now)
                    .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        for token in &expired {
            self.records.remove(token);
        }
        expired.len()
    }

    /// Periodically run [`SessionManager::reap_expired`].
    pub fn spawn_reaper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = self.reap_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = self.len(), "reaped expired sessions");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    async fn with_record<R>(
        &self,
        token: &str,
        f: impl FnOnce(&mut Record) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let record = self.lookup(token)?;
        let mut guard = record.lock().await;
        self.check_live(token, &mut guard)?;
        guard.expires_at = Utc::now() + self.idle_timeout;
        f(&mut guard)
    }

    fn lookup(&self, token: &str) -> Result<Arc<Mutex<Record>>, SessionError> {
        // Clone the Arc so no shard guard is held across the await that follows.
        self.records
            .get(token)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SessionError::Unknown)
    }

    fn check_live(&self, token: &str, record: &mut Record) -> Result<(), SessionError> {
        if record.revoked {
            return Err(SessionError::Unknown);
        }
        if record.expires_at <= Utc::now() {
            record.revoked = true;
            record.data.clear();
            self.records.remove(token);
            return Err(SessionError::Unknown);
        }
        Ok(())
    }

    fn insert_record(&self, data: HashMap<String, Value>) -> String {
        let mut data = Some(data);
        loop {
            let token = generate_token();
            if let Entry::Vacant(slot) = self.records.entry(token.clone()) {
                slot.insert(Arc::new(Mutex::new(Record {
                    data: data.take().unwrap_or_default(),
                    expires_at: Utc::now() + self.idle_timeout,
                    revoked: false,
                })));
                return token;
            }
        }
    }
}
