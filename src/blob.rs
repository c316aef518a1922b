//! Local object references for image bytes fetched by the fallback loader.
//!
//! A reference is a `blob:` URL that resolves to bytes held in memory. It
//! stays valid until revoked, either explicitly or by the release timer.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

pub const OBJECT_URL_PREFIX: &str = "blob:monster-forge/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    objects: Arc<DashMap<String, StoredObject>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, bytes: Vec<u8>, mime_type: impl Into<String>) -> String {
        let url = format!("{}{}", OBJECT_URL_PREFIX, Uuid::new_v4());
        let object = StoredObject {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        };
        debug!(%url, size = object.bytes.len(), "object url created");
        self.objects.insert(url.clone(), object);
        url
    }

    pub fn resolve(&self, url: &str) -> Option<StoredObject> {
        self.objects.get(url).map(|o| o.clone())
    }

    /// Inline `data:` form of a reference, for surfaces that cannot read the registry.
    pub fn data_uri(&self, url: &str) -> Option<String> {
        self.resolve(url)
            .map(|o| format!("data:{};base64,{}", o.mime_type, B64.encode(&o.bytes)))
    }

    /// Returns false when the reference was already gone.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.objects.remove(url).is_some();
        if removed {
            debug!(%url, "object url revoked");
        }
        removed
    }

    /// Revokes `url` once `delay` has passed.
    pub fn revoke_after(&self, url: String, delay: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.revoke(&url);
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

pub fn is_object_url(url: &str) -> bool {
    url.starts_with(OBJECT_URL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_reference_resolves_until_revoked() {
        let registry = ObjectUrlRegistry::new();
        let url = registry.create(vec![1, 2, 3], "image/png");
        assert!(is_object_url(&url));
        assert_eq!(&*registry.resolve(&url).unwrap().bytes, &[1, 2, 3]);
        assert_eq!(registry.data_uri(&url).unwrap(), "data:image/png;base64,AQID");

        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.resolve(&url).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_release_fires_after_delay() {
        let registry = ObjectUrlRegistry::new();
        let url = registry.create(vec![0xFF], "image/jpeg");
        let handle = registry.revoke_after(url.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(registry.resolve(&url).is_some());

        handle.await.unwrap();
        assert!(registry.resolve(&url).is_none());
    }
}
