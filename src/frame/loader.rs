//! Address → form document resolution.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::form::{is_valid_form_name, Document, FormCatalog};

use super::FrameError;

/// Fetches the document behind an address.
#[async_trait]
pub trait FormLoader: Send + Sync {
    async fn load(&self, url: &Url) -> Result<Document, FrameError>;
}

/// Serves `/forms/<name>` from a [`FormCatalog`] on one origin.
pub struct CatalogLoader {
    catalog: Arc<FormCatalog>,
    base: Url,
}

impl CatalogLoader {
    pub fn new(catalog: Arc<FormCatalog>, base: Url) -> Self {
        Self { catalog, base }
    }

    /// Form name addressed by `url`, if it is a catalog route.
    fn form_name<'a>(&self, url: &'a Url) -> Result<&'a str, FrameError> {
        if url.origin() != self.base.origin() {
            return Err(FrameError::InvalidAddress(format!(
                "{url} is not served by {}",
                self.base.origin().ascii_serialization()
            )));
        }
        let name = url
            .path()
            .strip_prefix("/forms/")
            .map(|rest| rest.trim_end_matches('/'))
            .ok_or_else(|| FrameError::NotFound(url.path().to_string()))?;

        if !is_valid_form_name(name) {
            return Err(FrameError::InvalidAddress(format!("invalid form name {name:?}")));
        }
        Ok(name)
    }
}

#[async_trait]
impl FormLoader for CatalogLoader {
    async fn load(&self, url: &Url) -> Result<Document, FrameError> {
        let name = self.form_name(url)?;
        self.catalog
            .load(name)
            .ok_or_else(|| FrameError::NotFound(url.path().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> CatalogLoader {
        CatalogLoader::new(
            Arc::new(FormCatalog::builtin()),
            Url::parse("http://localhost:5050/").unwrap(),
        )
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn loads_catalog_route() {
        let doc = loader()
            .load(&url("http://localhost:5050/forms/funds"))
            .await
            .unwrap();
        assert!(doc.has_field("scheme_name"));
    }

    #[tokio::test]
    async fn unknown_form_is_not_found() {
        let err = loader()
            .load(&url("http://localhost:5050/forms/scholarship"))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_bad_names_and_foreign_origins() {
        let l = loader();
        assert!(matches!(
            l.load(&url("http://localhost:5050/forms/a-b")).await,
            Err(FrameError::InvalidAddress(_))
        ));
        assert!(matches!(
            l.load(&url("https://elsewhere.example/forms/funds")).await,
            Err(FrameError::InvalidAddress(_))
        ));
        assert!(matches!(
            l.load(&url("http://localhost:5050/about")).await,
            Err(FrameError::NotFound(_))
        ));
    }
}
