//! Serializable listing of registered operations.

use serde::Serialize;

use repflow_core::signature::Requirement;

use crate::operation::Operation;

#[derive(Debug, Clone, Serialize)]
pub struct CatalogueEntry {
    pub name: String,
    pub implementations: Vec<CatalogueImplementation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogueImplementation {
    pub signature: String,
    pub operands: Vec<Requirement>,
    pub experimental: bool,
    pub source: String,
}

impl CatalogueImplementation {
    pub fn from_operation(op: &Operation) -> Self {
        Self {
            signature: op.signature.to_string(),
            operands: op.signature.requirements().to_vec(),
            experimental: op.experimental,
            source: op.source.clone(),
        }
    }
}
