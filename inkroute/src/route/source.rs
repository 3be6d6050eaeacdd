//! Route-loading collaborator.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Route;
use crate::service::{BoxFuture, ServiceError};

/// Loads routes by path (GPX import, route calculation results, ...).
pub trait RouteSource: Send + Sync {
    /// Load the route stored at `path`.
    fn load_track(&self, path: &Path) -> BoxFuture<'_, Result<Route, ServiceError>>;
}

/// Loads routes stored as JSON documents.
///
/// Relative paths are resolved against the configured base directory.
#[derive(Debug, Clone, Default)]
pub struct JsonRouteSource {
    base_dir: Option<PathBuf>,
}

impl JsonRouteSource {
    /// Create a source resolving relative paths against the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source resolving relative paths against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl RouteSource for JsonRouteSource {
    fn load_track(&self, path: &Path) -> BoxFuture<'_, Result<Route, ServiceError>> {
        let full = self.resolve(path);
        Box::pin(async move {
            let bytes = tokio::fs::read(&full).await?;
            let route: Route = serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::failed(format!("{}: {}", full.display(), e)))?;
            route
                .validate()
                .map_err(|e| ServiceError::failed(format!("{}: {}", full.display(), e)))?;
            debug!(path = %full.display(), route_id = %route.id, "Route loaded");
            Ok(route)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::route::{Maneuver, Waypoint};

    fn sample_route() -> Route {
        let a = Coordinate::new(48.0, 11.0);
        let b = Coordinate::new(48.001, 11.0);
        Route::from_parts(
            "sample",
            vec![
                Waypoint::new(a, "Depart", Maneuver::Depart),
                Waypoint::new(b, "Arrive", Maneuver::Arrive),
            ],
            vec![a, b],
            10.0,
        )
    }

    #[tokio::test]
    async fn test_load_relative_to_base_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let json = serde_json::to_vec(&sample_route()).unwrap();
        std::fs::write(dir.path().join("sample.json"), json).unwrap();

        let source = JsonRouteSource::with_base_dir(dir.path());
        let route = source.load_track(Path::new("sample.json")).await.unwrap();
        assert_eq!(route.id, "sample");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = JsonRouteSource::new();
        let err = source
            .load_track(Path::new("/definitely/not/here.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));
    }

    #[tokio::test]
    async fn test_invalid_route_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut route = sample_route();
        route.geometry.truncate(1);
        let path = dir.path().join("bad.json");
        std::fs::write(&path, serde_json::to_vec(&route).unwrap()).unwrap();

        let err = JsonRouteSource::new().load_track(&path).await.unwrap_err();
        assert!(err.to_string().contains("geometry"));
    }
}
