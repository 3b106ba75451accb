//! Generic web page retriever

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use super::{DocumentRetriever, RetrieverError, content_hash, html_to_markdown, http_client};
use crate::service::capabilities::FetchedPage;

/// Retrieves HTML, Markdown, plain-text and JSON pages from any host
pub struct GenericWebRetriever {
    client: Client,
}

impl GenericWebRetriever {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Extract title from <title> or <meta property="og:title">
    fn extract_title(document: &Html) -> Option<String> {
        if let Ok(selector) = Selector::parse("title")
            && let Some(el) = document.select(&selector).next()
        {
            let title = el.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                return Some(title);
            }
        }

        Self::extract_meta_property(document, "og:title")
    }

    fn extract_description(document: &Html) -> Option<String> {
        Self::extract_meta_name(document, "description")
            .or_else(|| Self::extract_meta_property(document, "og:description"))
    }

    /// Primary language subtag from <html lang> or <meta http-equiv="content-language">
    fn extract_language(document: &Html) -> Option<String> {
        let from_html = Selector::parse("html[lang]").ok().and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("lang"))
                .map(str::to_string)
        });

        let from_meta = || {
            Selector::parse("meta[http-equiv=\"content-language\"]")
                .ok()
                .and_then(|selector| {
                    document
                        .select(&selector)
                        .next()
                        .and_then(|el| el.value().attr("content"))
                        .map(str::to_string)
                })
        };

        from_html.or_else(from_meta).and_then(|tag| primary_subtag(&tag))
    }

    fn extract_meta_name(document: &Html, name: &str) -> Option<String> {
        let selector = Selector::parse(&format!("meta[name=\"{}\"]", name)).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_meta_property(document: &Html, property: &str) -> Option<String> {
        let selector = Selector::parse(&format!("meta[property=\"{}\"]", property)).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Build a page from an HTML body
    fn parse_html(url: &Url, raw: &str) -> FetchedPage {
        let document = Html::parse_document(raw);
        let title = Self::extract_title(&document);
        let language = Self::extract_language(&document);

        let mut content = html_to_markdown(raw);
        if let Some(description) = Self::extract_description(&document)
            && !content.contains(&description)
        {
            content = format!("{}\n\n{}", description, content);
        }

        FetchedPage {
            url: url.clone(),
            title,
            content_hash: content_hash(&content),
            content,
            language,
        }
    }
}

/// "en-GB" -> "en"
fn primary_subtag(tag: &str) -> Option<String> {
    tag.split(['-', '_'])
        .next()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl DocumentRetriever for GenericWebRetriever {
    fn can_handle(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    async fn retrieve(&self, url: &Url) -> Result<FetchedPage, RetrieverError> {
        tracing::debug!(url = %url, "Fetching web page");

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RetrieverError::NotFound(url.to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(url = %url, "Web request rate limited");
            return Err(RetrieverError::RateLimited);
        }

        if status.is_server_error() {
            return Err(RetrieverError::ServerError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            return Err(RetrieverError::ParseError(format!("HTTP {}: {}", status, url)));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| "text/html".to_string());

        let header_language = response
            .headers()
            .get("content-language")
            .and_then(|v| v.to_str().ok())
            .and_then(primary_subtag);

        if !(content_type.contains("html")
            || content_type.contains("text/")
            || content_type.contains("json"))
        {
            return Err(RetrieverError::UnsupportedContent {
                content_type,
                url: url.to_string(),
            });
        }

        let raw = response.text().await?;

        let mut page = if content_type.contains("html") {
            Self::parse_html(url, &raw)
        } else {
            FetchedPage {
                url: url.clone(),
                title: None,
                content_hash: content_hash(&raw),
                content: raw,
                language: None,
            }
        };

        if page.language.is_none() {
            page.language = header_language;
        }

        if page.content.trim().is_empty() {
            return Err(RetrieverError::ParseError(format!("Empty page: {}", url)));
        }

        Ok(page)
    }
}

impl Default for GenericWebRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="de-AT">
<head>
  <title>Arbeitsmarktbericht 2023</title>
  <meta name="description" content="Jahresbericht zur Arbeitslosigkeit">
</head>
<body><h1>Bericht</h1><p>Die Arbeitslosigkeit sank um 2 Prozent.</p></body>
</html>"#;

    #[test]
    fn test_parse_html_extracts_metadata() {
        let url = Url::parse("https://stats.example.at/bericht").unwrap();
        let page = GenericWebRetriever::parse_html(&url, PAGE);

        assert_eq!(page.title.as_deref(), Some("Arbeitsmarktbericht 2023"));
        assert_eq!(page.language.as_deref(), Some("de"));
        assert!(page.content.contains("Die Arbeitslosigkeit sank um 2 Prozent."));
        assert!(page.content.starts_with("Jahresbericht zur Arbeitslosigkeit"));
        assert_eq!(page.content_hash.len(), 64);
    }

    #[test]
    fn test_og_title_fallback() {
        let html = r#"<html><head><meta property="og:title" content="Shared title"></head><body>x</body></html>"#;
        let document = Html::parse_document(html);
        assert_eq!(
            GenericWebRetriever::extract_title(&document).as_deref(),
            Some("Shared title")
        );
    }

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("en-GB").as_deref(), Some("en"));
        assert_eq!(primary_subtag("pt_BR").as_deref(), Some("pt"));
        assert_eq!(primary_subtag("").as_deref(), None);
    }

    #[test]
    fn test_only_web_schemes_are_handled() {
        let retriever = GenericWebRetriever::new();
        assert!(retriever.can_handle(&Url::parse("https://example.org").unwrap()));
        assert!(!retriever.can_handle(&Url::parse("ftp://example.org/file").unwrap()));
    }
}
