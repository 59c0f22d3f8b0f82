//! Model-file provisioning for the face stage.

use crate::error::FetchError;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use harvest_core::write_atomic;
use std::path::Path;

/// Make sure the model file at `path` exists.
///
/// A present file is used as-is. A missing file is downloaded from
/// `{base_url}/{file_name}` through the retry policy when a base URL is
/// configured; otherwise this fails with [`FetchError::ModelMissing`].
pub async fn ensure_model(
    transport: &dyn Transport,
    retry: &RetryPolicy,
    base_url: Option<&str>,
    path: &Path,
) -> Result<(), FetchError> {
    if path.exists() {
        tracing::debug!(path = %path.display(), "model present");
        return Ok(());
    }

    let shown = path.display().to_string();
    let (Some(base_url), Some(file_name)) = (base_url, path.file_name().and_then(|n| n.to_str()))
    else {
        return Err(FetchError::ModelMissing(shown));
    };

    let url = format!("{}/{}", base_url.trim_end_matches('/'), file_name);
    tracing::info!(url = %url, path = %shown, "downloading model");

    let body = retry.run(|| transport.get(&url)).await?;
    write_atomic(path, &body).map_err(|source| FetchError::Io {
        path: shown.clone(),
        source,
    })?;

    tracing::info!(path = %shown, bytes = body.len(), "model saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StaticTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(url.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn test_present_model_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("det_500m.onnx");
        std::fs::write(&path, b"model").unwrap();
        let transport = StaticTransport { calls: AtomicUsize::new(0) };

        ensure_model(&transport, &RetryPolicy::default(), Some("https://models"), &path)
            .await
            .unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_model_without_url_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("det_10g.onnx");
        let transport = StaticTransport { calls: AtomicUsize::new(0) };

        let err = ensure_model(&transport, &RetryPolicy::default(), None, &path)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ModelMissing(_)));
    }

    #[tokio::test]
    async fn test_missing_model_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models/w600k_r50.onnx");
        let transport = StaticTransport { calls: AtomicUsize::new(0) };
        let retry = RetryPolicy::new(2, Duration::from_millis(1));

        ensure_model(&transport, &retry, Some("https://models/"), &path)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"https://models/w600k_r50.onnx"
        );
    }
}
