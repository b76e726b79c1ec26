// API clients: ChEMBL (drugs, mechanisms, targets) and the EBI Proteins API (keywords).

pub mod chembl;
pub mod uniprot;

pub use chembl::ChemblClient;
pub use uniprot::ProteinsClient;
