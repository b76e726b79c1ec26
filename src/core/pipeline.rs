use crate::clients::chembl::{ChemblClient, MAX_PHASE_APPROVED};
use crate::clients::uniprot::ProteinsClient;
use crate::core::{ConfigProvider, DrugRecord, Pipeline, ReportSet, Storage, TargetKeywords, TargetLink};
use crate::utils::error::{EtlError, Result};
use std::collections::BTreeSet;

pub const DRUG_TARGETS_FILE: &str = "drug_targets.csv";
pub const TARGET_KEYWORDS_FILE: &str = "target_keywords.csv";

pub struct DrugTargetPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    chembl: ChemblClient,
    proteins: ProteinsClient,
}

impl<S: Storage, C: ConfigProvider> DrugTargetPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        let chembl = ChemblClient::new(config.chembl_api_endpoint());
        let proteins = ProteinsClient::new(config.proteins_api_endpoint());
        Self {
            storage,
            config,
            chembl,
            proteins,
        }
    }
}

/// 純過濾：只留核准階段為 4 且核准年份達門檻的藥物。
/// 沒有 first_approval 或沒有 max_phase 的紀錄視為不符合，不是錯誤。
pub fn filter_approved_since(drugs: Vec<DrugRecord>, min_year: i32) -> Vec<DrugRecord> {
    drugs
        .into_iter()
        .filter(|d| d.max_phase == Some(MAX_PHASE_APPROVED))
        .filter(|d| d.first_approval.is_some_and(|year| year >= min_year))
        .collect()
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for DrugTargetPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<DrugRecord>> {
        self.chembl
            .fetch_approved_drugs(self.config.page_size())
            .await
    }

    async fn transform(&self, drugs: Vec<DrugRecord>) -> Result<ReportSet> {
        let min_year = self.config.min_approval_year();
        let recent = filter_approved_since(drugs, min_year);
        tracing::info!("Found {} drugs approved since {}", recent.len(), min_year);

        // 逐藥解析標靶，同時收集去重後的 accession 集合
        let mut drug_targets = Vec::new();
        let mut all_accessions = BTreeSet::new();

        for drug in &recent {
            let accessions = match self.chembl.fetch_target_accessions(&drug.chembl_id).await {
                Ok(accessions) => accessions,
                Err(e) if self.config.skip_failed_lookups() => {
                    tracing::warn!("Skipping target lookup for {}: {}", drug.chembl_id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for accession in accessions {
                all_accessions.insert(accession.clone());
                drug_targets.push(TargetLink {
                    drug_chembl_id: drug.chembl_id.clone(),
                    drug_name: drug.name.clone(),
                    target_accession: accession,
                });
            }
        }
        drug_targets.sort();

        tracing::info!("Fetching keywords for {} unique targets", all_accessions.len());

        // 每個 accession 只查一次；BTreeSet 迭代順序即輸出順序
        let mut target_keywords = Vec::new();
        for accession in all_accessions {
            let keywords = match self.proteins.fetch_keywords(&accession).await {
                Ok(keywords) => keywords,
                Err(e) if self.config.skip_failed_lookups() => {
                    // 查詢失敗仍要保留該列，維持兩份報表的 accession 集合一致
                    tracing::warn!("Keyword lookup failed for {}: {}", accession, e);
                    BTreeSet::new()
                }
                Err(e) => return Err(e),
            };
            target_keywords.push(TargetKeywords {
                accession,
                keywords,
            });
        }

        Ok(ReportSet {
            drug_targets,
            target_keywords,
        })
    }

    async fn load(&self, reports: ReportSet) -> Result<String> {
        let drug_targets_csv = write_drug_targets_csv(&reports.drug_targets)?;
        self.storage
            .write_file(DRUG_TARGETS_FILE, &drug_targets_csv)
            .await?;

        let target_keywords_csv = write_target_keywords_csv(&reports.target_keywords)?;
        self.storage
            .write_file(TARGET_KEYWORDS_FILE, &target_keywords_csv)
            .await?;

        Ok(self.config.output_path().to_string())
    }
}

fn write_drug_targets_csv(links: &[TargetLink]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["drug_chembl_id", "drug_name", "target_accession"])?;
    for link in links {
        writer.write_record([
            &link.drug_chembl_id,
            &link.drug_name,
            &link.target_accession,
        ])?;
    }
    finish_csv(writer)
}

fn write_target_keywords_csv(targets: &[TargetKeywords]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["target_accession", "keywords"])?;
    for target in targets {
        let joined = target
            .keywords
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        writer.write_record([target.accession.as_str(), joined.as_str()])?;
    }
    finish_csv(writer)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("CSV buffer error: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        chembl_api_endpoint: String,
        proteins_api_endpoint: String,
        output_path: String,
        min_approval_year: i32,
        page_size: usize,
        skip_failed_lookups: bool,
    }

    impl MockConfig {
        fn new(chembl: String, proteins: String) -> Self {
            Self {
                chembl_api_endpoint: chembl,
                proteins_api_endpoint: proteins,
                output_path: "test_output".to_string(),
                min_approval_year: 2019,
                page_size: 20,
                skip_failed_lookups: false,
            }
        }

        fn with_skip_failed_lookups(mut self) -> Self {
            self.skip_failed_lookups = true;
            self
        }
    }

    impl ConfigProvider for MockConfig {
        fn chembl_api_endpoint(&self) -> &str {
            &self.chembl_api_endpoint
        }

        fn proteins_api_endpoint(&self) -> &str {
            &self.proteins_api_endpoint
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn min_approval_year(&self) -> i32 {
            self.min_approval_year
        }

        fn page_size(&self) -> usize {
            self.page_size
        }

        fn skip_failed_lookups(&self) -> bool {
            self.skip_failed_lookups
        }
    }

    fn drug(id: &str, name: &str, year: Option<i32>) -> DrugRecord {
        DrugRecord {
            chembl_id: id.to_string(),
            name: name.to_string(),
            max_phase: Some(4),
            first_approval: year,
        }
    }

    fn mock_mechanism(server: &MockServer, molecule_id: &str, target_ids: Vec<&str>) {
        let mechanisms: Vec<serde_json::Value> = target_ids
            .iter()
            .map(|t| serde_json::json!({"target_chembl_id": t}))
            .collect();
        let body = serde_json::json!({ "mechanisms": mechanisms });
        let molecule_id = molecule_id.to_string();
        server.mock(move |when, then| {
            when.method(GET)
                .path("/mechanism.json")
                .query_param("molecule_chembl_id", molecule_id.as_str());
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(body.clone());
        });
    }

    fn mock_target(server: &MockServer, target_id: &str, accessions: Vec<&str>) {
        let components: Vec<serde_json::Value> = accessions
            .iter()
            .map(|a| serde_json::json!({"accession": a}))
            .collect();
        let body = serde_json::json!({
            "targets": [{"target_components": components}]
        });
        let target_id = target_id.to_string();
        server.mock(move |when, then| {
            when.method(GET)
                .path("/target.json")
                .query_param("target_chembl_id", target_id.as_str());
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(body.clone());
        });
    }

    fn mock_keywords(server: &MockServer, accession: &str, keywords: Vec<&str>) {
        let entries: Vec<serde_json::Value> = keywords
            .iter()
            .map(|k| serde_json::json!({"value": k}))
            .collect();
        let body = serde_json::json!({ "keywords": entries });
        let path = format!("/{}", accession);
        server.mock(move |when, then| {
            when.method(GET).path(path.as_str());
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(body.clone());
        });
    }

    #[test]
    fn test_filter_keeps_threshold_year() {
        let drugs = vec![
            drug("CHEMBL1", "OLD", Some(2018)),
            drug("CHEMBL2", "BOUNDARY", Some(2019)),
            drug("CHEMBL3", "NEW", Some(2021)),
            drug("CHEMBL4", "UNDATED", None),
        ];

        let filtered = filter_approved_since(drugs, 2019);

        let ids: Vec<&str> = filtered.iter().map(|d| d.chembl_id.as_str()).collect();
        assert_eq!(ids, vec!["CHEMBL2", "CHEMBL3"]);
    }

    #[test]
    fn test_filter_drops_wrong_phase() {
        let mut trial_drug = drug("CHEMBL5", "TRIAL", Some(2020));
        trial_drug.max_phase = Some(3);

        let filtered = filter_approved_since(vec![trial_drug], 2019);

        assert!(filtered.is_empty());
    }

    #[test]
    fn test_filter_drops_missing_phase() {
        // 伺服器端 max_phase=4 過濾不可信時，本地過濾也要排除缺漏紀錄
        let mut unphased = drug("CHEMBL6", "UNPHASED", Some(2020));
        unphased.max_phase = None;

        let filtered = filter_approved_since(vec![unphased], 2019);

        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_transform_drug_with_two_targets_yields_two_links() {
        let server = MockServer::start();
        mock_mechanism(&server, "CHEMBL1", vec!["T1", "T2"]);
        mock_target(&server, "T1", vec!["P11111"]);
        mock_target(&server, "T2", vec!["P22222"]);
        mock_keywords(&server, "P11111", vec!["Receptor"]);
        mock_keywords(&server, "P22222", vec!["Enzyme"]);

        let config = MockConfig::new(server.url(""), server.url(""));
        let pipeline = DrugTargetPipeline::new(MockStorage::new(), config);

        let reports = pipeline
            .transform(vec![drug("CHEMBL1", "ALPHA", Some(2020))])
            .await
            .unwrap();

        assert_eq!(reports.drug_targets.len(), 2);
        assert!(reports
            .drug_targets
            .iter()
            .all(|l| l.drug_chembl_id == "CHEMBL1"));
        assert_eq!(reports.drug_targets[0].target_accession, "P11111");
        assert_eq!(reports.drug_targets[1].target_accession, "P22222");
        assert_eq!(reports.target_keywords.len(), 2);
    }

    #[tokio::test]
    async fn test_transform_shared_target_fetched_once() {
        let server = MockServer::start();
        mock_mechanism(&server, "CHEMBL1", vec!["T1"]);
        mock_mechanism(&server, "CHEMBL2", vec!["T1"]);
        mock_target(&server, "T1", vec!["P33333"]);

        let keyword_mock = server.mock(|when, then| {
            when.method(GET).path("/P33333");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"keywords": [{"value": "Channel"}]}));
        });

        let config = MockConfig::new(server.url(""), server.url(""));
        let pipeline = DrugTargetPipeline::new(MockStorage::new(), config);

        let reports = pipeline
            .transform(vec![
                drug("CHEMBL1", "ALPHA", Some(2019)),
                drug("CHEMBL2", "BETA", Some(2020)),
            ])
            .await
            .unwrap();

        // Two link rows, one keyword row, exactly one keyword fetch
        assert_eq!(reports.drug_targets.len(), 2);
        assert_eq!(reports.target_keywords.len(), 1);
        keyword_mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_transform_keyword_rows_match_link_accessions() {
        let server = MockServer::start();
        mock_mechanism(&server, "CHEMBL1", vec!["T1", "T2"]);
        mock_mechanism(&server, "CHEMBL2", vec!["T2"]);
        mock_target(&server, "T1", vec!["P11111"]);
        mock_target(&server, "T2", vec!["P22222"]);
        mock_keywords(&server, "P11111", vec!["Receptor"]);
        mock_keywords(&server, "P22222", vec![]);

        let config = MockConfig::new(server.url(""), server.url(""));
        let pipeline = DrugTargetPipeline::new(MockStorage::new(), config);

        let reports = pipeline
            .transform(vec![
                drug("CHEMBL1", "ALPHA", Some(2019)),
                drug("CHEMBL2", "BETA", Some(2022)),
            ])
            .await
            .unwrap();

        let link_accessions: BTreeSet<&str> = reports
            .drug_targets
            .iter()
            .map(|l| l.target_accession.as_str())
            .collect();
        let keyword_accessions: BTreeSet<&str> = reports
            .target_keywords
            .iter()
            .map(|t| t.accession.as_str())
            .collect();
        assert_eq!(link_accessions, keyword_accessions);
    }

    #[tokio::test]
    async fn test_transform_lookup_failure_aborts_by_default() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/mechanism.json");
            then.status(500);
        });

        let config = MockConfig::new(server.url(""), server.url(""));
        let pipeline = DrugTargetPipeline::new(MockStorage::new(), config);

        let result = pipeline
            .transform(vec![drug("CHEMBL1", "ALPHA", Some(2020))])
            .await;

        assert!(matches!(result, Err(EtlError::ApiError(_))));
    }

    #[tokio::test]
    async fn test_transform_lookup_failure_skipped_when_configured() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/mechanism.json")
                .query_param("molecule_chembl_id", "CHEMBL1");
            then.status(500);
        });
        mock_mechanism(&server, "CHEMBL2", vec!["T1"]);
        mock_target(&server, "T1", vec!["P44444"]);
        mock_keywords(&server, "P44444", vec!["Transporter"]);

        let config =
            MockConfig::new(server.url(""), server.url("")).with_skip_failed_lookups();
        let pipeline = DrugTargetPipeline::new(MockStorage::new(), config);

        let reports = pipeline
            .transform(vec![
                drug("CHEMBL1", "ALPHA", Some(2020)),
                drug("CHEMBL2", "BETA", Some(2021)),
            ])
            .await
            .unwrap();

        // Failed drug is dropped, the rest of the run survives
        assert_eq!(reports.drug_targets.len(), 1);
        assert_eq!(reports.drug_targets[0].drug_chembl_id, "CHEMBL2");
    }

    #[tokio::test]
    async fn test_transform_keyword_failure_keeps_empty_row_when_skipping() {
        let server = MockServer::start();
        mock_mechanism(&server, "CHEMBL1", vec!["T1"]);
        mock_target(&server, "T1", vec!["P55555"]);
        server.mock(|when, then| {
            when.method(GET).path("/P55555");
            then.status(503);
        });

        let config =
            MockConfig::new(server.url(""), server.url("")).with_skip_failed_lookups();
        let pipeline = DrugTargetPipeline::new(MockStorage::new(), config);

        let reports = pipeline
            .transform(vec![drug("CHEMBL1", "ALPHA", Some(2020))])
            .await
            .unwrap();

        // Row survives with an empty keyword set
        assert_eq!(reports.target_keywords.len(), 1);
        assert_eq!(reports.target_keywords[0].accession, "P55555");
        assert!(reports.target_keywords[0].keywords.is_empty());
    }

    #[tokio::test]
    async fn test_load_writes_both_reports() {
        let storage = MockStorage::new();
        let config = MockConfig::new(
            "http://test.com".to_string(),
            "http://test.com".to_string(),
        );
        let pipeline = DrugTargetPipeline::new(storage.clone(), config);

        let reports = ReportSet {
            drug_targets: vec![
                TargetLink {
                    drug_chembl_id: "CHEMBL1".to_string(),
                    drug_name: "ALPHA, COMBINED".to_string(),
                    target_accession: "P11111".to_string(),
                },
                TargetLink {
                    drug_chembl_id: "CHEMBL2".to_string(),
                    drug_name: "BETA".to_string(),
                    target_accession: "P11111".to_string(),
                },
            ],
            target_keywords: vec![
                TargetKeywords {
                    accession: "P11111".to_string(),
                    keywords: ["Receptor", "Membrane"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
                TargetKeywords {
                    accession: "P22222".to_string(),
                    keywords: BTreeSet::new(),
                },
            ],
        };

        let output_path = pipeline.load(reports).await.unwrap();
        assert_eq!(output_path, "test_output");

        let drug_targets = storage.get_file(DRUG_TARGETS_FILE).await.unwrap();
        let content = String::from_utf8(drug_targets).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "drug_chembl_id,drug_name,target_accession");
        // Embedded comma in drug name must be quoted
        assert_eq!(lines[1], "CHEMBL1,\"ALPHA, COMBINED\",P11111");
        assert_eq!(lines[2], "CHEMBL2,BETA,P11111");

        let target_keywords = storage.get_file(TARGET_KEYWORDS_FILE).await.unwrap();
        let content = String::from_utf8(target_keywords).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "target_accession,keywords");
        assert_eq!(lines[1], "P11111,\"Membrane, Receptor\"");
        // Zero keywords still yields a row with an empty field
        assert_eq!(lines[2], "P22222,");
    }
}
