use std::collections::BTreeSet;

/// 從 ChEMBL 取回的已核准藥物紀錄，過濾後即丟棄。
/// max_phase 缺漏時保留為 None，由過濾階段排除，不信任伺服器端的查詢條件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugRecord {
    pub chembl_id: String,
    pub name: String,
    pub max_phase: Option<u8>,
    pub first_approval: Option<i32>,
}

/// 一組 (藥物, 標靶) 配對，對應第一份報表的一列
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetLink {
    pub drug_chembl_id: String,
    pub drug_name: String,
    pub target_accession: String,
}

/// 單一標靶的 UniProt 關鍵字集合（可為空）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetKeywords {
    pub accession: String,
    pub keywords: BTreeSet<String>,
}

/// Transform 階段的完整輸出，load 階段據此寫出兩份 CSV
#[derive(Debug, Clone, Default)]
pub struct ReportSet {
    pub drug_targets: Vec<TargetLink>,
    pub target_keywords: Vec<TargetKeywords>,
}
