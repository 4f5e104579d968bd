//! Registry reference values (groups, filters, instruments, ...)
//!
//! The registry publishes its option lists from one values endpoint, each
//! category either as a list (id = position) or a mapping (id = key). Both
//! shapes are normalised into ordered `(id, label)` pairs here, together with
//! a label → id reverse index, and cached for one hour.
//!
//! A refresh builds a complete new snapshot before swapping it in, so readers
//! never observe a half-built cache. Concurrent refreshes may both hit the
//! registry; the last one to finish wins.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::SubmissionResult;
use crate::models::{ValueCategory, ValueId};

/// How long fetched values stay valid
pub const VALUES_TTL: Duration = Duration::from_secs(3600);

/// Source of the raw `data` object from the registry values endpoint
#[async_trait]
pub trait ValuesSource: Send + Sync {
    async fn fetch_values(&self) -> SubmissionResult<Map<String, Value>>;
}

/// One registry option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceValue {
    pub id: ValueId,
    pub label: String,
}

/// Normalise one category into ordered `(id, label)` pairs
///
/// Lists are keyed by position, mappings by key. Any other shape yields no
/// values.
pub fn normalize_values(values: &Value) -> Vec<ReferenceValue> {
    match values {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| ReferenceValue {
                id: ValueId::from(index),
                label: label_text(item),
            })
            .collect(),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, item)| ReferenceValue {
                id: ValueId::from(key.as_str()),
                label: label_text(item),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Immutable view of one successful fetch
#[derive(Debug)]
pub struct ValueSnapshot {
    forward: HashMap<String, Vec<ReferenceValue>>,
    reverse: HashMap<String, HashMap<String, ValueId>>,
    fetched_at: Instant,
}

impl ValueSnapshot {
    pub fn empty() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            fetched_at: Instant::now(),
        }
    }

    /// Build forward and reverse indexes from the registry `data` object
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut forward = HashMap::new();
        let mut reverse = HashMap::new();

        for (category, values) in raw {
            let normalized = normalize_values(values);
            let mut by_label: HashMap<String, ValueId> = HashMap::new();
            for value in &normalized {
                // Duplicate labels resolve to the first id listed
                by_label
                    .entry(value.label.clone())
                    .or_insert_with(|| value.id.clone());
            }
            forward.insert(category.clone(), normalized);
            reverse.insert(category.clone(), by_label);
        }

        Self {
            forward,
            reverse,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn values(&self, category: ValueCategory) -> &[ReferenceValue] {
        self.forward
            .get(category.key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Registry id for a human-readable label
    pub fn reverse(&self, category: ValueCategory, label: &str) -> Option<&ValueId> {
        self.reverse.get(category.key())?.get(label)
    }

    /// Human-readable label for a registry id
    pub fn label(&self, category: ValueCategory, id: &ValueId) -> Option<&str> {
        self.values(category)
            .iter()
            .find(|v| &v.id == id)
            .map(|v| v.label.as_str())
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Process-wide cache of registry reference values
pub struct ReferenceValueCache {
    source: Arc<dyn ValuesSource>,
    ttl: Duration,
    entry: RwLock<Option<Arc<ValueSnapshot>>>,
}

impl ReferenceValueCache {
    pub fn new(source: Arc<dyn ValuesSource>) -> Self {
        Self::with_ttl(source, VALUES_TTL)
    }

    pub fn with_ttl(source: Arc<dyn ValuesSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Current snapshot, fetching from the registry on a miss or expiry
    ///
    /// Never fails: a failed fetch yields an empty snapshot that is not
    /// cached, so the next access tries again.
    pub async fn snapshot(&self) -> Arc<ValueSnapshot> {
        if let Some(snapshot) = self.entry.read().await.as_ref() {
            if snapshot.is_fresh(self.ttl) {
                return Arc::clone(snapshot);
            }
        }
        self.refresh().await
    }

    /// Fetch values now and replace the cached snapshot on success
    pub async fn refresh(&self) -> Arc<ValueSnapshot> {
        match self.source.fetch_values().await {
            Ok(raw) => {
                let snapshot = Arc::new(ValueSnapshot::from_raw(&raw));
                if snapshot.is_empty() {
                    tracing::warn!("Registry returned no reference values");
                    return snapshot;
                }
                tracing::info!(categories = raw.len(), "Cached registry reference values");
                *self.entry.write().await = Some(Arc::clone(&snapshot));
                snapshot
            }
            Err(e) => {
                tracing::warn!("Failed to retrieve registry values: {}", e);
                Arc::new(ValueSnapshot::empty())
            }
        }
    }

    pub async fn get_values(&self, category: ValueCategory) -> Vec<ReferenceValue> {
        self.snapshot().await.values(category).to_vec()
    }

    pub async fn get_reverse(&self, category: ValueCategory, label: &str) -> Option<ValueId> {
        self.snapshot().await.reverse(category, label).cloned()
    }

    pub async fn get_label(&self, category: ValueCategory, id: &ValueId) -> Option<String> {
        self.snapshot()
            .await
            .label(category, id)
            .map(str::to_string)
    }

    /// Reporting groups, restricted to `allowed` labels when any are configured
    pub async fn reporting_group_choices(&self, allowed: &[String]) -> Vec<ReferenceValue> {
        let groups = self.get_values(ValueCategory::Groups).await;
        if allowed.is_empty() {
            return groups;
        }
        groups
            .into_iter()
            .filter(|g| allowed.iter().any(|name| name == &g.label))
            .collect()
    }
}
