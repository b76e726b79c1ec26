pub mod cli;

use crate::core::ConfigProvider;
use crate::utils::validation::{validate_path, validate_range, validate_url, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "drug-target-etl")]
#[command(about = "Reports approved-drug protein targets and their UniProt keywords")]
pub struct CliConfig {
    #[arg(long, default_value = "https://www.ebi.ac.uk/chembl/api/data")]
    pub chembl_api_endpoint: String,

    #[arg(long, default_value = "https://www.ebi.ac.uk/proteins/api/proteins")]
    pub proteins_api_endpoint: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "2019")]
    pub min_approval_year: i32,

    #[arg(long, default_value = "100")]
    pub page_size: usize,

    #[arg(long, help = "Skip drugs or targets whose lookup fails instead of aborting")]
    pub skip_failed_lookups: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system monitoring")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
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

impl Validate for CliConfig {
    fn validate(&self) -> crate::utils::error::Result<()> {
        validate_url("chembl_api_endpoint", &self.chembl_api_endpoint)?;
        validate_url("proteins_api_endpoint", &self.proteins_api_endpoint)?;
        validate_path("output_path", &self.output_path)?;
        validate_range("min_approval_year", self.min_approval_year, 1900, 2100)?;
        // ChEMBL 單頁上限為 1000
        validate_range("page_size", self.page_size, 1, 1000)?;
        Ok(())
    }
}
