//! The fetch/cache/fallback orchestration shared by every feed endpoint.

use cache::DiskCache;
use chrono::{DateTime, Utc};
use sources::{CachePolicy, FeedSource, NormalizedItem, SourceError};
use upstream::Fetcher;

/// Where the records of a served feed came from. Sent as `X-Feed-Origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Live,
    Cache,
    Stale,
    Degraded,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cache => "cache",
            Self::Stale => "stale",
            Self::Degraded => "degraded",
        }
    }
}

#[derive(Debug)]
pub enum Outcome<R> {
    /// Upstream data, fetched now or read from the disk cache.
    Ok {
        records: Vec<NormalizedItem<R>>,
        origin: Origin,
    },
    /// Generated stand-in records after the upstream failed.
    Degraded(Vec<NormalizedItem<R>>),
    Failed(SourceError),
}

impl<R> Outcome<R> {
    pub fn origin(&self) -> Option<Origin> {
        match self {
            Self::Ok { origin, .. } => Some(*origin),
            Self::Degraded(_) => Some(Origin::Degraded),
            Self::Failed(_) => None,
        }
    }
}

/// Produce the records for one request.
///
/// Order of attempts: a fresh cache entry, the live upstream, any cache
/// entry regardless of age, then the source's generated fallback. Only a
/// body that normalizes cleanly is written to the cache. No step is
/// retried.
pub async fn run_pipeline<S: FeedSource>(
    source: &S,
    query: &S::Query,
    fetcher: &dyn Fetcher,
    cache: &DiskCache,
    now: DateTime<Utc>,
) -> Outcome<S::Record> {
    let policy = source.cache_policy();
    let key = source.cache_key(query);
    let cached = matches!(policy, CachePolicy::Disk { .. });

    if let CachePolicy::Disk { freshness } = policy {
        if let Some(entry) = cache.read(&key).await {
            if entry.is_fresher_than(freshness) {
                match source.normalize(&entry.body, query, now) {
                    Ok(records) => {
                        return Outcome::Ok {
                            records,
                            origin: Origin::Cache,
                        }
                    }
                    Err(e) => tracing::warn!("Ignoring unreadable cache entry {}: {}", key, e),
                }
            }
        }
    }

    let failure = match source.fetch(fetcher, query).await {
        Ok(body) => match source.normalize(&body, query, now) {
            Ok(records) => {
                if cached {
                    if let Err(e) = cache.write(&key, &body).await {
                        tracing::warn!("Failed to cache {}: {}", key, e);
                    }
                }
                return Outcome::Ok {
                    records,
                    origin: Origin::Live,
                };
            }
            Err(e) => e,
        },
        Err(e) => SourceError::from(e),
    };
    tracing::warn!("Upstream for {} failed: {}", source.name(), failure);

    if cached {
        if let Some(body) = cache.read_stale_allowed(&key).await {
            match source.normalize(&body, query, now) {
                Ok(records) => {
                    tracing::warn!("Serving stale cache entry {}", key);
                    return Outcome::Ok {
                        records,
                        origin: Origin::Stale,
                    };
                }
                Err(e) => tracing::warn!("Stale cache entry {} is unreadable: {}", key, e),
            }
        }
    }

    match source.fallback(query, now) {
        Some(records) => {
            tracing::warn!("Serving generated data for {}", source.name());
            Outcome::Degraded(records)
        }
        None => Outcome::Failed(failure),
    }
}
