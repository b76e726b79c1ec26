use crate::domain::model::DrugRecord;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;

/// ChEMBL 的 max_phase = 4 代表已完整核准
pub const MAX_PHASE_APPROVED: u8 = 4;

pub struct ChemblClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize, Default)]
struct PageMeta {
    #[serde(default)]
    total_count: usize,
}

#[derive(Debug, Deserialize)]
struct MoleculePage {
    #[serde(default)]
    page_meta: PageMeta,
    #[serde(default)]
    molecules: Vec<Molecule>,
}

#[derive(Debug, Deserialize)]
struct Molecule {
    molecule_chembl_id: Option<String>,
    pref_name: Option<String>,
    #[serde(default, deserialize_with = "phase_from_any")]
    max_phase: Option<u8>,
    first_approval: Option<i32>,
}

impl Molecule {
    fn into_record(self) -> Result<DrugRecord> {
        let chembl_id = self.molecule_chembl_id.ok_or_else(|| EtlError::SchemaError {
            endpoint: "molecule".to_string(),
            message: "molecule record without molecule_chembl_id".to_string(),
        })?;

        Ok(DrugRecord {
            chembl_id,
            name: self.pref_name.unwrap_or_else(|| "Unknown".to_string()),
            // 缺漏就留 None，讓過濾階段排除而不是假設伺服器過濾正確
            max_phase: self.max_phase,
            first_approval: self.first_approval,
        })
    }
}

// ChEMBL 的 max_phase 依版本可能是數字或 "4.0" 字串
fn phase_from_any<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|f| f as u8),
        Some(serde_json::Value::String(s)) => s.parse::<f64>().ok().map(|f| f as u8),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct MechanismPage {
    #[serde(default)]
    mechanisms: Vec<Mechanism>,
}

#[derive(Debug, Deserialize)]
struct Mechanism {
    target_chembl_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TargetPage {
    #[serde(default)]
    targets: Vec<Target>,
}

#[derive(Debug, Deserialize)]
struct Target {
    #[serde(default)]
    target_components: Vec<TargetComponent>,
}

#[derive(Debug, Deserialize)]
struct TargetComponent {
    accession: Option<String>,
}

impl ChemblClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 分頁抓取所有已核准藥物（max_phase=4），依 page_meta.total_count 讀到結尾
    pub async fn fetch_approved_drugs(&self, page_size: usize) -> Result<Vec<DrugRecord>> {
        let url = format!("{}/molecule.json", self.base_url);
        let mut drugs = Vec::new();
        let mut offset = 0usize;

        loop {
            tracing::debug!("Fetching molecules from {} at offset {}", url, offset);
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("max_phase", MAX_PHASE_APPROVED.to_string()),
                    ("order_by", "first_approval,pref_name".to_string()),
                    ("limit", page_size.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await?
                .error_for_status()?;

            let page: MoleculePage = decode(response, "molecule").await?;
            let batch = page.molecules.len();

            for molecule in page.molecules {
                drugs.push(molecule.into_record()?);
            }

            offset += batch;
            if batch == 0 || offset >= page.page_meta.total_count {
                break;
            }
        }

        tracing::debug!("Fetched {} approved molecules", drugs.len());
        Ok(drugs)
    }

    /// 解析一個藥物的所有 UniProt accession：mechanism → target → target_components。
    /// 沒有標靶或沒有 accession 的項目直接略過，ENSG 開頭的不是 UniProt accession 也略過。
    pub async fn fetch_target_accessions(&self, molecule_chembl_id: &str) -> Result<Vec<String>> {
        let url = format!("{}/mechanism.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("molecule_chembl_id", molecule_chembl_id)])
            .send()
            .await?
            .error_for_status()?;

        let page: MechanismPage = decode(response, "mechanism").await?;

        let mut accessions = BTreeSet::new();
        for mechanism in page.mechanisms {
            let Some(target_id) = mechanism.target_chembl_id else {
                continue;
            };
            for accession in self.fetch_target_components(&target_id).await? {
                if !accession.starts_with("ENSG") {
                    accessions.insert(accession);
                }
            }
        }

        Ok(accessions.into_iter().collect())
    }

    async fn fetch_target_components(&self, target_chembl_id: &str) -> Result<Vec<String>> {
        let url = format!("{}/target.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("target_chembl_id", target_chembl_id),
                ("only", "target_components"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let page: TargetPage = decode(response, "target").await?;

        Ok(page
            .targets
            .into_iter()
            .flat_map(|t| t.target_components)
            .filter_map(|c| c.accession)
            .collect())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| EtlError::SchemaError {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}
