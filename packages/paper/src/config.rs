use crate::error::{PaperError, PaperResult};
use serde::{Deserialize, Serialize};

/// Which environment drives evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// A router notifies every navigation and re-renders the whole scene
    Browser,
    /// No router; callers evaluate entities against explicit paths
    Server,
}

impl Default for RenderMode {
    fn default() -> Self {
        if cfg!(target_arch = "wasm32") {
            RenderMode::Browser
        } else {
            RenderMode::Server
        }
    }
}

/// Where a page change assembles its nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assembly {
    /// Straight into the root container
    #[default]
    Direct,
    /// Into a detached fragment appended to the root once complete
    Fragment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub mode: RenderMode,
    /// Path prefix stripped from navigated urls
    pub anchor: Option<String>,
    pub assembly: Assembly,
    /// Kind used for descriptors that declare none
    pub default_kind: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            anchor: None,
            assembly: Assembly::default(),
            default_kind: "div".to_string(),
        }
    }
}

impl SceneConfig {
    pub fn server() -> Self {
        Self {
            mode: RenderMode::Server,
            ..Self::default()
        }
    }

    pub fn browser() -> Self {
        Self {
            mode: RenderMode::Browser,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> PaperResult<Self> {
        serde_json::from_str(json).map_err(PaperError::Config)
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn with_assembly(mut self, assembly: Assembly) -> Self {
        self.assembly = assembly;
        self
    }
}
