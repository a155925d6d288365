use crate::config::ProviderConfig;
use crate::services::ProviderError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_TITLE: &str = "Untitled Page";
const PROVIDER: &str = "reqwest";
const MAX_REPORTED_LINKS: usize = 10;
const MAX_REPORTED_IMAGES: usize = 5;

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static META_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s[^>]*name\s*=\s*["']description["'][^>]*>"#)
        .expect("valid meta regex")
});
static CONTENT_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)content\s*=\s*["']([^"']*)["']"#).expect("valid content regex")
});
static NON_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:script|style|noscript)\b[^>]*>.*?</(?:script|style|noscript)>")
        .expect("valid non-content regex")
});
static MAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<main\b[^>]*>(.*?)</main>").expect("valid main regex"));
static ARTICLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<article\b[^>]*>(.*?)</article>").expect("valid article regex")
});
static BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*?)</body>").expect("valid body regex"));
static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#).expect("valid link regex")
});
static IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<img\s[^>]*src\s*=\s*["']([^"']+)["']"#).expect("valid image regex")
});
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(amp|lt|gt|quot|#39|nbsp);").expect("valid entity regex")
});
static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid whitespace regex"));

/// What was extracted from a fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub description: Option<String>,
    /// Main content as markdown
    pub content: String,
    pub word_count: usize,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlMetadata {
    pub url: String,
    pub description: Option<String>,
    pub word_count: usize,
    pub links_count: usize,
    pub images_count: usize,
    pub provider: &'static str,
    pub status_code: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub success: bool,
    pub markdown: String,
    pub title: String,
    pub metadata: CrawlMetadata,
}

// Single pass, so decoded text is never decoded again
fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |captures: &regex::Captures| match &captures[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "#39" => "'",
            _ => " ",
        })
        .into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Absolute http(s) URLs without fragments, first occurrence order
fn absolute_urls(pattern: &Regex, html: &str, base: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for captures in pattern.captures_iter(html) {
        let raw = decode_entities(captures[1].trim());
        let Ok(mut absolute) = base.join(&raw) else {
            continue;
        };
        if !matches!(absolute.scheme(), "http" | "https") {
            continue;
        }
        absolute.set_fragment(None);
        let absolute = absolute.to_string();
        if seen.insert(absolute.clone()) {
            urls.push(absolute);
        }
    }

    urls
}

/// Pulls title, description, main content, links and images out of HTML
pub fn extract_page(html: &str, base: &Url) -> ExtractedPage {
    let title = TITLE
        .captures(html)
        .map(|c| collapse_whitespace(&decode_entities(&c[1])))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let description = META_DESCRIPTION
        .find(html)
        .and_then(|tag| CONTENT_ATTR.captures(tag.as_str()))
        .map(|c| collapse_whitespace(&decode_entities(&c[1])))
        .filter(|d| !d.is_empty());

    let stripped = NON_CONTENT.replace_all(html, "");
    let section = [&*MAIN, &*ARTICLE, &*BODY]
        .iter()
        .find_map(|pattern| pattern.captures(&stripped).map(|c| c[1].to_string()))
        .unwrap_or_else(|| stripped.to_string());

    let markdown = html2md::parse_html(&section);
    let content = BLANK_LINES
        .replace_all(markdown.trim(), "\n\n")
        .to_string();
    let word_count = content.split_whitespace().count();

    ExtractedPage {
        title,
        description,
        content,
        word_count,
        links: absolute_urls(&LINK, html, base),
        images: absolute_urls(&IMAGE, html, base),
    }
}

/// Markdown report for a crawled page
pub fn render_markdown(url: &Url, page: &ExtractedPage) -> String {
    let mut out = format!("# {}\n\n**URL:** {}\n", page.title, url);
    if let Some(description) = &page.description {
        out.push_str(&format!("**Description:** {}\n", description));
    }
    out.push_str(&format!("**Words:** {}\n\n", page.word_count));

    out.push_str("## Content\n\n");
    out.push_str(&page.content);
    out.push('\n');

    if !page.links.is_empty() {
        out.push_str(&format!("\n## Links ({})\n\n", page.links.len()));
        for link in page.links.iter().take(MAX_REPORTED_LINKS) {
            out.push_str(&format!("- {}\n", link));
        }
    }

    if !page.images.is_empty() {
        out.push_str(&format!("\n## Images ({})\n\n", page.images.len()));
        for image in page.images.iter().take(MAX_REPORTED_IMAGES) {
            out.push_str(&format!("- ![]({})\n", image));
        }
    }

    out
}

/// Outcome for one URL of a batch crawl
#[derive(Debug, Clone, Serialize)]
pub struct BatchCrawlItem {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<CrawlReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchCrawlItem {
    fn failed(url: &Url, error: String) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            report: None,
            error: Some(error),
        }
    }
}

/// Fetches pages and renders them as markdown
#[derive(Debug, Clone)]
pub struct CrawlerService {
    http: reqwest::Client,
}

impl CrawlerService {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http })
    }

    pub async fn crawl(&self, url: &Url) -> Result<CrawlReport, ProviderError> {
        tracing::info!(url = %url, "Crawling page");
        let response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        // Redirects resolve relative links against the final location
        let final_url = response.url().clone();
        let html = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: html.chars().take(500).collect(),
            });
        }

        let page = extract_page(&html, &final_url);
        tracing::debug!(
            url = %url,
            words = page.word_count,
            links = page.links.len(),
            "Page extracted"
        );

        Ok(CrawlReport {
            success: true,
            markdown: render_markdown(url, &page),
            title: page.title.clone(),
            metadata: CrawlMetadata {
                url: url.to_string(),
                description: page.description,
                word_count: page.word_count,
                links_count: page.links.len(),
                images_count: page.images.len(),
                provider: PROVIDER,
                status_code: status.as_u16(),
            },
        })
    }

    /// Crawls every URL concurrently. Results keep the request order and a
    /// failed page does not fail the batch.
    pub async fn crawl_many(&self, urls: Vec<Url>) -> Vec<BatchCrawlItem> {
        tracing::info!(count = urls.len(), "Starting batch crawl");
        let mut join_set = tokio::task::JoinSet::new();
        for (index, url) in urls.iter().cloned().enumerate() {
            let crawler = self.clone();
            join_set.spawn(async move { (index, crawler.crawl(&url).await) });
        }

        let mut slots: Vec<Option<BatchCrawlItem>> = vec![None; urls.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    let url = &urls[index];
                    slots[index] = Some(match result {
                        Ok(report) => BatchCrawlItem {
                            url: url.to_string(),
                            success: true,
                            report: Some(report),
                            error: None,
                        },
                        Err(e) => {
                            tracing::warn!(url = %url, error = %e, "Crawl failed");
                            BatchCrawlItem::failed(url, e.to_string())
                        }
                    });
                }
                Err(e) => tracing::error!(error = %e, "Crawl task panicked"),
            }
        }

        slots
            .into_iter()
            .zip(&urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| BatchCrawlItem::failed(url, "Crawl task failed".to_string()))
            })
            .collect()
    }
}
