// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use projekt_render::{PresentPreference, RenderSettings, ViewportKind};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "projekt.toml";

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            width: 1280,
            height: 720,
            title: "projekt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    Fifo,
    #[default]
    Mailbox,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewportCfg {
    #[default]
    Dynamic,
    Baked,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub present_mode: PresentModeCfg,
    pub viewport: ViewportCfg,
    pub validation: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let base = RenderSettings::default();
        RenderCfg {
            clear_color: [0.02, 0.02, 0.04, 1.0],
            present_mode: PresentModeCfg::Mailbox,
            viewport: ViewportCfg::Dynamic,
            validation: true,
            vertex_shader: base.vertex_shader,
            fragment_shader: base.fragment_shader,
        }
    }
}

impl RenderCfg {
    pub fn to_settings(&self) -> RenderSettings {
        RenderSettings {
            clear_color: self.clear_color,
            present: match self.present_mode {
                PresentModeCfg::Fifo => PresentPreference::Fifo,
                PresentModeCfg::Mailbox => PresentPreference::Mailbox,
            },
            viewport: match self.viewport {
                ViewportCfg::Dynamic => ViewportKind::Dynamic,
                ViewportCfg::Baked => ViewportKind::Baked,
            },
            validation: self.validation,
            vertex_shader: self.vertex_shader.clone(),
            fragment_shader: self.fragment_shader.clone(),
        }
    }
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str::<AppCfg>(text)?)
    }

    /// A missing file yields defaults; anything else that goes wrong is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("config: {} not found, using defaults", path.display());
                Ok(AppCfg::default())
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}
