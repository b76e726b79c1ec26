use crate::utils::error::{EtlError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

// EBI 禮貌性延遲，避免連續請求被限流
const REQUEST_DELAY: Duration = Duration::from_millis(200);

pub struct ProteinsClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ProteinEntry {
    #[serde(default)]
    keywords: Vec<Keyword>,
    #[serde(default)]
    protein: Option<ProteinSection>,
    #[serde(default, rename = "dbReferences")]
    db_references: Vec<DbReference>,
    #[serde(default)]
    comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
struct ProteinSection {
    #[serde(rename = "recommendedName")]
    recommended_name: Option<RecommendedName>,
}

#[derive(Debug, Deserialize)]
struct RecommendedName {
    #[serde(rename = "fullName")]
    full_name: Option<FullName>,
}

#[derive(Debug, Deserialize)]
struct FullName {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Comment {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: Vec<CommentText>,
}

#[derive(Debug, Deserialize)]
struct CommentText {
    value: Option<String>,
}

// 不同版本的 Proteins API 關鍵字欄位名稱不一（name / value）
#[derive(Debug, Deserialize)]
struct Keyword {
    name: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DbReference {
    #[serde(default, rename = "type")]
    kind: String,
    properties: Option<GoProperties>,
}

#[derive(Debug, Deserialize)]
struct GoProperties {
    term: Option<String>,
}

impl ProteinsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 抓取單一 accession 的關鍵字集合。
    /// 條目不存在（404）視為沒有任何註記，回空集合而不是錯誤。
    pub async fn fetch_keywords(&self, accession: &str) -> Result<BTreeSet<String>> {
        let url = format!("{}/{}", self.base_url, accession);
        tracing::debug!("Fetching keywords for {}", accession);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        tokio::time::sleep(REQUEST_DELAY).await;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!("No UniProt entry found for {}", accession);
            return Ok(BTreeSet::new());
        }

        let response = response.error_for_status()?;
        let body = response.text().await?;
        let entry: ProteinEntry =
            serde_json::from_str(&body).map_err(|e| EtlError::SchemaError {
                endpoint: "proteins".to_string(),
                message: e.to_string(),
            })?;

        let mut keywords = BTreeSet::new();

        for keyword in entry.keywords {
            if let Some(name) = keyword.name.or(keyword.value) {
                let name = name.trim();
                if !name.is_empty() {
                    keywords.insert(name.to_string());
                }
            }
        }

        // 從推薦名稱推斷的分類關鍵字（receptor / enzyme / channel / transporter）
        if let Some(name) = entry
            .protein
            .and_then(|p| p.recommended_name)
            .and_then(|r| r.full_name)
            .and_then(|f| f.value)
        {
            let lower = name.to_lowercase();
            for class in ["Receptor", "Enzyme", "Channel", "Transporter"] {
                if lower.contains(&class.to_lowercase()) {
                    keywords.insert(class.to_string());
                }
            }
        }

        // GO 分子功能條目（F: 前綴）也算描述性關鍵字
        for reference in entry.db_references {
            if reference.kind != "GO" {
                continue;
            }
            let Some(term) = reference.properties.and_then(|p| p.term) else {
                continue;
            };
            if let Some(function) = term.strip_prefix("F:") {
                let function = function.split(';').next().unwrap_or("").trim();
                if !function.is_empty() {
                    keywords.insert(function.to_string());
                }
            }
        }

        // similarity 註解裡的蛋白質家族描述，取第一個句號前的片段
        for comment in entry.comments {
            if comment.kind != "similarity" {
                continue;
            }
            let Some(text) = comment.text.into_iter().next().and_then(|t| t.value) else {
                continue;
            };
            let lower = text.to_lowercase();
            if lower.contains("belongs to the") || lower.contains("protein family") {
                let family = text.split('.').next().unwrap_or("").trim();
                if !family.is_empty() {
                    keywords.insert(family.to_string());
                }
            }
        }

        Ok(keywords)
    }
}
