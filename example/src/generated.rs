// Code generated by bsdl. DO NOT EDIT.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "fast")]
    Fast,
    #[serde(rename = "careful")]
    Careful,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub name: String,
    pub model: String,
    pub mode: Mode,
    pub temperature: Option<f64>,
    pub tools: Vec<CommonTool>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonTool {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<i64>,
}
