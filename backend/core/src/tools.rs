use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::traits::Tool;

/// The closed set of tools a model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ValidateKoreanAddressFormat,
    LookupAddressComponents,
    ValidatePhoneNumberFormat,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::ValidateKoreanAddressFormat,
        ToolName::LookupAddressComponents,
        ToolName::ValidatePhoneNumberFormat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateKoreanAddressFormat => "validate_korean_address_format",
            Self::LookupAddressComponents => "lookup_address_components",
            Self::ValidatePhoneNumberFormat => "validate_phone_number_format",
        }
    }

    pub fn all() -> BTreeSet<ToolName> {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| ExtractError::UnknownTool(s.to_string()))
    }
}

/// Name → implementation map. Registration is keyed by `ToolName`, so the
/// model can never reach anything outside the closed set.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: ToolName, tool: Arc<dyn Tool>) {
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: ToolName) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name).cloned()
    }

    /// Registered tools restricted to `allowed`, in stable order.
    pub fn subset(&self, allowed: &BTreeSet<ToolName>) -> Vec<(ToolName, Arc<dyn Tool>)> {
        allowed
            .iter()
            .filter_map(|name| self.get(*name).map(|tool| (*name, tool)))
            .collect()
    }

    pub fn list(&self) -> Vec<ToolName> {
        let mut names: Vec<ToolName> = self.tools.keys().copied().collect();
        names.sort();
        names
    }
}
