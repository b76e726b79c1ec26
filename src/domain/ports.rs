use crate::domain::model::{DrugRecord, ReportSet};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn chembl_api_endpoint(&self) -> &str;
    fn proteins_api_endpoint(&self) -> &str;
    fn output_path(&self) -> &str;
    fn min_approval_year(&self) -> i32;
    fn page_size(&self) -> usize;
    fn skip_failed_lookups(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<DrugRecord>>;
    async fn transform(&self, drugs: Vec<DrugRecord>) -> Result<ReportSet>;
    async fn load(&self, reports: ReportSet) -> Result<String>;
}
