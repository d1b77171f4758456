use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ThothError;

/// Kinds of assets orchestrated across organizations.
///
/// The kind namespaces resource keys (`<kind>:<id>`) and is stored next to
/// every payload as its `doc_type`, which lets generic scans such as rich
/// queries filter by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetKind {
    #[serde(rename = "organization")]
    Organization,
    #[serde(rename = "datasample")]
    DataSample,
    #[serde(rename = "datamanager")]
    DataManager,
    #[serde(rename = "function")]
    Function,
    #[serde(rename = "computetask")]
    ComputeTask,
    #[serde(rename = "computeplan")]
    ComputePlan,
    #[serde(rename = "model")]
    Model,
    #[serde(rename = "performance")]
    Performance,
    #[serde(rename = "failure_report")]
    FailureReport,
    #[serde(rename = "computetask_output_asset")]
    ComputeTaskOutputAsset,
    #[serde(rename = "profiling_step")]
    ProfilingStep,
}

impl AssetKind {
    pub const ALL: [AssetKind; 11] = [
        AssetKind::Organization,
        AssetKind::DataSample,
        AssetKind::DataManager,
        AssetKind::Function,
        AssetKind::ComputeTask,
        AssetKind::ComputePlan,
        AssetKind::Model,
        AssetKind::Performance,
        AssetKind::FailureReport,
        AssetKind::ComputeTaskOutputAsset,
        AssetKind::ProfilingStep,
    ];

    /// The `doc_type` string of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Organization => "organization",
            AssetKind::DataSample => "datasample",
            AssetKind::DataManager => "datamanager",
            AssetKind::Function => "function",
            AssetKind::ComputeTask => "computetask",
            AssetKind::ComputePlan => "computeplan",
            AssetKind::Model => "model",
            AssetKind::Performance => "performance",
            AssetKind::FailureReport => "failure_report",
            AssetKind::ComputeTaskOutputAsset => "computetask_output_asset",
            AssetKind::ProfilingStep => "profiling_step",
        }
    }

    /// Ledger key of the asset `id` of this kind.
    ///
    /// ```
    /// use thoth::AssetKind;
    ///
    /// assert_eq!(AssetKind::ComputeTask.resource_key("t1"), "computetask:t1");
    /// ```
    pub fn resource_key(&self, id: &str) -> String {
        format!("{}:{}", self.as_str(), id)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = ThothError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ThothError::BadRequest(format!("unknown asset kind {:?}", s)))
    }
}
