//! Media field classification and internal reference resolution
//!
//! Media fields on catalog records come in several shapes: a plain URL, an
//! internal media reference (`wix:image://v1/...`), or a list/object wrapping
//! one of those. [`classify`] reduces any shape to a [`MediaValue`]; internal
//! references are turned into downloadable URLs through a [`MediaResolver`],
//! many at a time with [`resolve_all`].

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::platform_client::PlatformError;

/// Scheme prefix of internal media references
pub const INTERNAL_MEDIA_SCHEME: &str = "wix:";

/// Default number of resolutions in flight
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Classified media field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaValue {
    /// Already fetchable, passed through unchanged
    PlainUrl(String),
    /// Needs a resolution call
    InternalRef(String),
    /// Nothing usable in the field
    UnknownShape,
}

/// Resolves one internal media reference to a downloadable URL
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<String, PlatformError>;
}

pub fn is_internal_ref(value: &str) -> bool {
    value.starts_with(INTERNAL_MEDIA_SCHEME)
}

/// Pull a representative URL-like string out of a raw media field
///
/// Lists yield their first element that is a string or carries a `url`/`src`
/// string; objects yield `url`, else `src`.
pub fn pick_media_url(raw: &Value) -> Option<&str> {
    match raw {
        Value::String(s) => Some(s.as_str()),
        Value::Array(values) => values.iter().find_map(|v| match v {
            Value::String(s) => Some(s.as_str()),
            Value::Object(_) => url_or_src(v),
            _ => None,
        }),
        Value::Object(_) => url_or_src(raw),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}

fn url_or_src(value: &Value) -> Option<&str> {
    ["url", "src"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// Classify a raw media field value
///
/// # Examples
/// ```
/// use serde_json::json;
/// use shelf_api::services::media_resolver::{classify, MediaValue};
///
/// assert_eq!(
///     classify(&json!("https://cdn/a.jpg")),
///     MediaValue::PlainUrl("https://cdn/a.jpg".to_string())
/// );
/// assert_eq!(
///     classify(&json!([{"src": "wix:image://v1/abc"}])),
///     MediaValue::InternalRef("wix:image://v1/abc".to_string())
/// );
/// assert_eq!(classify(&json!(null)), MediaValue::UnknownShape);
/// ```
pub fn classify(raw: &Value) -> MediaValue {
    match pick_media_url(raw) {
        Some(s) if s.is_empty() => MediaValue::UnknownShape,
        Some(s) if is_internal_ref(s) => MediaValue::InternalRef(s.to_string()),
        Some(s) => MediaValue::PlainUrl(s.to_string()),
        None => MediaValue::UnknownShape,
    }
}

/// Resolve many references with at most `concurrency` calls in flight
///
/// References are deduplicated first, so each distinct reference is resolved
/// once. A new call starts whenever any outstanding call finishes. Failures,
/// timeouts and empty URLs are logged and map to `None`; the batch itself never
/// fails. The result lists references in first-seen order.
pub async fn resolve_all<I>(
    resolver: &dyn MediaResolver,
    references: I,
    concurrency: usize,
    timeout: Option<Duration>,
) -> IndexMap<String, Option<String>>
where
    I: IntoIterator<Item = String>,
{
    let unique: IndexSet<String> = references.into_iter().collect();
    let concurrency = concurrency.max(1);

    let mut outcomes: HashMap<String, Option<String>> = stream::iter(unique.iter().cloned())
        .map(|reference| async move {
            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, resolver.resolve(&reference))
                    .await
                    .unwrap_or_else(|_| Err(PlatformError::Timeout(limit))),
                None => resolver.resolve(&reference).await,
            };

            match outcome {
                Ok(url) if !url.is_empty() => (reference, Some(url)),
                Ok(_) => {
                    warn!(reference = %reference, "Media resolution returned an empty URL");
                    (reference, None)
                }
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Media resolution failed");
                    (reference, None)
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let resolved: IndexMap<String, Option<String>> = unique
        .into_iter()
        .map(|reference| {
            let url = outcomes.remove(&reference).flatten();
            (reference, url)
        })
        .collect();

    debug!(
        references = resolved.len(),
        resolved = resolved.values().filter(|v| v.is_some()).count(),
        concurrency,
        "Media batch resolution finished"
    );

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Resolves `wix:` refs to `https://cdn/<tail>`, fails refs containing "bad"
    #[derive(Default)]
    struct StubResolver {
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl MediaResolver for StubResolver {
        async fn resolve(&self, reference: &str) -> Result<String, PlatformError> {
            self.calls.lock().unwrap().push(reference.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if reference.contains("bad") {
                return Err(PlatformError::Api(404, "not found".to_string()));
            }
            if reference.contains("blank") {
                return Ok(String::new());
            }
            let tail = reference.rsplit('/').next().unwrap_or_default();
            Ok(format!("https://cdn/{}", tail))
        }
    }

    #[test]
    fn test_classify_shapes() {
        assert_eq!(
            classify(&json!("http://x/y.png")),
            MediaValue::PlainUrl("http://x/y.png".to_string())
        );
        assert_eq!(
            classify(&json!("wix:image://v1/abc")),
            MediaValue::InternalRef("wix:image://v1/abc".to_string())
        );
        assert_eq!(
            classify(&json!({"url": "wix:video://v1/v"})),
            MediaValue::InternalRef("wix:video://v1/v".to_string())
        );
        assert_eq!(
            classify(&json!({"src": "https://a/b"})),
            MediaValue::PlainUrl("https://a/b".to_string())
        );
        assert_eq!(
            classify(&json!([null, 3, {"url": ""}, {"src": "https://s"}])),
            MediaValue::PlainUrl("https://s".to_string())
        );
        assert_eq!(classify(&json!("")), MediaValue::UnknownShape);
        assert_eq!(classify(&json!([])), MediaValue::UnknownShape);
        assert_eq!(classify(&json!(42)), MediaValue::UnknownShape);
        assert_eq!(classify(&json!({"title": "no url"})), MediaValue::UnknownShape);
    }

    #[test]
    fn test_first_string_in_list_wins() {
        assert_eq!(
            pick_media_url(&json!(["wix:image://v1/first", "https://second"])),
            Some("wix:image://v1/first")
        );
    }

    #[tokio::test]
    async fn test_deduplicates_references() {
        let resolver = StubResolver::default();
        let refs = vec![
            "wix:image://v1/a".to_string(),
            "wix:image://v1/b".to_string(),
            "wix:image://v1/a".to_string(),
            "wix:image://v1/a".to_string(),
        ];

        let resolved = resolve_all(&resolver, refs, 4, None).await;

        assert_eq!(resolved.len(), 2);
        let mut calls = resolver.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec!["wix:image://v1/a", "wix:image://v1/b"]);
    }

    #[tokio::test]
    async fn test_failures_map_to_none() {
        let resolver = StubResolver::default();
        let refs = vec![
            "wix:image://v1/ok".to_string(),
            "wix:image://v1/bad".to_string(),
            "wix:image://v1/blank".to_string(),
        ];

        let resolved = resolve_all(&resolver, refs, 2, None).await;

        assert_eq!(resolved["wix:image://v1/ok"].as_deref(), Some("https://cdn/ok"));
        assert_eq!(resolved["wix:image://v1/bad"], None);
        assert_eq!(resolved["wix:image://v1/blank"], None);
        // First-seen order regardless of completion order
        assert_eq!(
            resolved.keys().collect::<Vec<_>>(),
            vec!["wix:image://v1/ok", "wix:image://v1/bad", "wix:image://v1/blank"]
        );
    }

    #[tokio::test]
    async fn test_in_flight_bounded_by_concurrency() {
        let resolver = StubResolver {
            delay: Some(Duration::from_millis(5)),
            ..Default::default()
        };
        let refs: Vec<String> = (0..20).map(|i| format!("wix:image://v1/{}", i)).collect();

        let resolved = resolve_all(&resolver, refs, 3, None).await;

        assert_eq!(resolved.len(), 20);
        assert!(resolved.values().all(Option::is_some));
        let max = resolver.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {}", max);
        assert!(max >= 2, "expected overlapping calls, max was {}", max);
    }

    #[tokio::test]
    async fn test_zero_concurrency_treated_as_one() {
        let resolver = StubResolver::default();
        let refs: Vec<String> = (0..5).map(|i| format!("wix:image://v1/{}", i)).collect();

        let resolved = resolve_all(&resolver, refs, 0, None).await;

        assert_eq!(resolved.len(), 5);
        assert_eq!(resolver.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_none() {
        let resolver = StubResolver {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let resolved = resolve_all(
            &resolver,
            vec!["wix:image://v1/slow".to_string()],
            1,
            Some(Duration::from_secs(1)),
        )
        .await;

        assert_eq!(resolved["wix:image://v1/slow"], None);
    }

    /// Records when each call starts; "slow" refs take 100s, the rest 1s
    struct StartLog {
        origin: tokio::time::Instant,
        starts: Mutex<Vec<(String, Duration)>>,
    }

    #[async_trait]
    impl MediaResolver for StartLog {
        async fn resolve(&self, reference: &str) -> Result<String, PlatformError> {
            self.starts
                .lock()
                .unwrap()
                .push((reference.to_string(), self.origin.elapsed()));
            let delay = if reference.contains("slow") { 100 } else { 1 };
            tokio::time::sleep(Duration::from_secs(delay)).await;
            Ok(reference.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_freed_by_any_finished_call() {
        let resolver = StartLog {
            origin: tokio::time::Instant::now(),
            starts: Mutex::new(Vec::new()),
        };
        let refs: Vec<String> = ["slow", "a", "b", "c"]
            .iter()
            .map(|name| format!("wix:image://v1/{}", name))
            .collect();

        let resolved = resolve_all(&resolver, refs, 2, None).await;

        assert_eq!(resolved.len(), 4);
        assert!(resolved.values().all(Option::is_some));
        let starts: HashMap<String, Duration> =
            resolver.starts.lock().unwrap().iter().cloned().collect();
        let slow_done = Duration::from_secs(100);
        // Fast refs cycle through the second slot while the slow one holds the first
        for name in ["a", "b", "c"] {
            let started = starts[&format!("wix:image://v1/{}", name)];
            assert!(started < slow_done, "{} started at {:?}", name, started);
        }
        assert!(starts["wix:image://v1/c"] >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let resolver = StubResolver::default();
        let resolved = resolve_all(&resolver, Vec::new(), 10, None).await;
        assert!(resolved.is_empty());
        assert!(resolver.calls.lock().unwrap().is_empty());
    }
}
