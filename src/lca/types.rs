// SPDX-License-Identifier: MIT

//! Domain types for product life-cycle analysis

use crate::adk::reference::ReferenceSource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Workflow state field names
pub mod fields {
    pub const PRODUCT_NAME: &str = "productName";
    pub const SUPPLIER: &str = "supplier";
    pub const PRODUCT_BASIC_INFORMATION: &str = "productBasicInformation";
    pub const PRODUCT_COMPONENT: &str = "productComponent";
    pub const RELATED_SUPPLIER_LIST: &str = "relatedSupplierList";
    pub const TECHNOLOGY_INFORMATION: &str = "technologyInformation";
    pub const PROCESSES_LIST: &str = "processesList";
    pub const EMISSION_SOURCES: &str = "emissionSources";
    /// Index of the next process the emission step will analyse
    pub const EMISSION_CURSOR: &str = "emissionCursor";
    pub const REFERENCE_SOURCES: &str = "referenceSources";
    pub const SUMMARY: &str = "summary";
}

/// One step of a production process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitProcess {
    pub process_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_description: Option<String>,
    /// URLs cited for this process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmissionSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Process the source was identified for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub process_count: usize,
    pub emission_source_count: usize,
    pub reference_count: usize,
    /// Processes for which no emission source was found
    #[serde(default)]
    pub processes_without_emissions: Vec<String>,
}

/// Merged result of the combined product analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductAnalysis {
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    pub product_basic_information: String,
    pub product_component: String,
    pub related_supplier_list: Vec<String>,
    pub technology_information: String,
    pub processes_list: Vec<UnitProcess>,
    pub emission_sources: Vec<EmissionSource>,
    pub reference_sources: Vec<ReferenceSource>,
    pub summary: AnalysisSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessesListRequest {
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology_information: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessesListResponse {
    pub processes_list: Vec<UnitProcess>,
    pub reference_sources: Vec<ReferenceSource>,
}
