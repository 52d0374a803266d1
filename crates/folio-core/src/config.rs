use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::geometry::{validate_scale, SizeMode};
use crate::layout::{Direction, Extent, TileConfiguration};
use crate::page::RenderMode;
use crate::policy::Proximity;
use crate::tracker::{ResizeConfiguration, ResizeMode, ScrollConfiguration, UpsizePolicy};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub zones: ZoneConfig,
    #[serde(default)]
    pub resize: ResizeConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Grid fill order: "row" or "column"
    #[serde(default = "default_direction")]
    pub direction: Direction,
    /// Row count or "auto"
    #[serde(default = "default_rows")]
    pub rows: Extent,
    /// Column count or "auto"
    #[serde(default = "default_columns")]
    pub columns: Extent,
    /// "width", "height" or "scale"
    #[serde(default)]
    pub size_mode: SizeMode,
    /// Document scale used by the "scale" size mode
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: default_direction(),
            rows: default_rows(),
            columns: default_columns(),
            size_mode: SizeMode::default(),
            scale: default_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Pages on either side of the focal page kept HOT; "auto" makes every page HOT
    #[serde(default = "default_hot_radius")]
    pub hot_radius: Extent,
    /// Pages beyond the HOT band kept WARM; "auto" makes every other page WARM
    #[serde(default = "default_warm_radius")]
    pub warm_radius: Extent,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            hot_radius: default_hot_radius(),
            warm_radius: default_warm_radius(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeConfig {
    /// Tolerance in device pixels along the inline axis
    #[serde(default = "default_delta")]
    pub delta_inline: u32,
    /// Tolerance in device pixels along the block axis
    #[serde(default = "default_delta")]
    pub delta_block: u32,
    /// Debounce window in milliseconds
    #[serde(default = "default_trigger_time")]
    pub trigger_time_ms: u64,
    /// "strict" (grew both ways) or "lenient" (grew either way)
    #[serde(default)]
    pub upsize: UpsizePolicy,
    /// Update visible pages while a resize is still in progress
    #[serde(default)]
    pub dynamic: bool,
    /// Root margin for the visibility tracking used by dynamic resize
    #[serde(default)]
    pub root_margin: Option<String>,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            delta_inline: default_delta(),
            delta_block: default_delta(),
            trigger_time_ms: default_trigger_time(),
            upsize: UpsizePolicy::default(),
            dynamic: false,
            root_margin: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollConfig {
    #[serde(default)]
    pub root_margin: Option<String>,
    /// Debounce window in milliseconds
    #[serde(default = "default_trigger_time")]
    pub trigger_time_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            root_margin: None,
            trigger_time_ms: default_trigger_time(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// "surface" (rasterized) or "vector"
    #[serde(default)]
    pub mode: RenderMode,
    /// Device pixel ratio for off-screen rasterization
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f64,
    /// Frame loop interval in milliseconds
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            pixel_ratio: default_pixel_ratio(),
            frame_interval_ms: default_frame_interval(),
        }
    }
}

fn default_direction() -> Direction {
    Direction::Row
}

fn default_rows() -> Extent {
    Extent::Auto
}

fn default_columns() -> Extent {
    Extent::Fixed(1)
}

fn default_scale() -> f64 {
    1.0
}

fn default_hot_radius() -> Extent {
    Extent::Fixed(2)
}

fn default_warm_radius() -> Extent {
    Extent::Fixed(8)
}

fn default_delta() -> u32 {
    4
}

fn default_trigger_time() -> u64 {
    100
}

fn default_pixel_ratio() -> f64 {
    1.0
}

fn default_frame_interval() -> u64 {
    16 // ~60 fps
}

impl EngineConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/folio/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("folio")
            .join("config.toml")
    }

    /// Validated grid layout
    pub fn tile_configuration(&self) -> crate::Result<TileConfiguration> {
        TileConfiguration::new(self.layout.direction, self.layout.rows, self.layout.columns)
            .map_err(|e| crate::Error::Config(format!("layout: {}", e)))
    }

    /// Validated document scale
    pub fn document_scale(&self) -> crate::Result<f64> {
        validate_scale(Some(self.layout.scale))
            .map_err(|e| crate::Error::Config(format!("layout: {}", e)))
    }

    pub fn resize_configuration(&self) -> crate::Result<ResizeConfiguration> {
        let resize = &self.resize;
        let mode = if resize.dynamic {
            ResizeMode::Dynamic {
                root_margin: resize.root_margin.clone(),
            }
        } else {
            ResizeMode::Deferred
        };
        Ok(
            ResizeConfiguration::new(resize.delta_inline, resize.delta_block, resize.trigger_time_ms)
                .map_err(|e| crate::Error::Config(format!("resize: {}", e)))?
                .with_upsize(resize.upsize)
                .with_mode(mode),
        )
    }

    pub fn scroll_configuration(&self) -> crate::Result<ScrollConfiguration> {
        ScrollConfiguration::new(self.scroll.root_margin.clone(), self.scroll.trigger_time_ms)
            .map_err(|e| crate::Error::Config(format!("scroll: {}", e)))
    }

    /// Zone policy centered on `ref_index` (0-relative)
    pub fn proximity_policy(&self, ref_index: usize) -> Proximity {
        Proximity::new(
            ref_index,
            self.zones.hot_radius.fixed(),
            self.zones.warm_radius.fixed(),
        )
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.render.frame_interval_ms)
    }
}
