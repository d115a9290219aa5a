use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  info,
  warn
};

use crate::datetime::resolve_timezone;

pub const CONFIG_ENV_VAR: &str =
  "KOYOMI_CONFIG";
const CONFIG_FILE_NAME: &str =
  "koyomi.toml";

fn default_true() -> bool {
  true
}

fn default_week_start() -> String {
  "sunday".to_string()
}

fn default_prewarm_radius() -> u32 {
  1
}

fn default_cache_radius() -> u32 {
  2
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  pub timezone: Option<String>,
  pub data_dir: Option<String>,
  pub color:    bool,
  pub calendar: CalendarSection
}

impl Default for Config {
  fn default() -> Self {
    Self {
      timezone: None,
      data_dir: None,
      color:    default_true(),
      calendar:
        CalendarSection::default()
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
  pub week_start:     String,
  /// Months warmed on each side of
  /// the focus after navigation.
  pub prewarm_radius: u32,
  /// Months retained on each side of
  /// the focus; never below
  /// `prewarm_radius`.
  pub cache_radius:   u32
}

impl Default for CalendarSection {
  fn default() -> Self {
    Self {
      week_start:
        default_week_start(),
      prewarm_radius:
        default_prewarm_radius(),
      cache_radius:
        default_cache_radius()
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(
        override_path
      )?
    else {
      warn!(
        "no koyomi.toml found; using \
         defaults"
      );
      return Ok(Self::default());
    };

    let raw = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut config =
      toml::from_str::<Config>(&raw)
        .with_context(|| {
          format!(
            "failed to parse {}",
            path.display()
          )
        })?;
    sanitize_config(&mut config);

    info!(
      config = %path.display(),
      week_start = %config.calendar.week_start,
      timezone = ?config.timezone,
      "loaded config"
    );
    Ok(config)
  }

  #[must_use]
  pub fn week_start(&self) -> Weekday {
    if self
      .calendar
      .week_start
      .trim()
      .eq_ignore_ascii_case("monday")
    {
      Weekday::Mon
    } else {
      Weekday::Sun
    }
  }

  #[must_use]
  pub fn timezone(&self) -> Tz {
    resolve_timezone(
      self.timezone.as_deref()
    )
  }
}

pub fn sanitize_config(
  config: &mut Config
) {
  let week_start = config
    .calendar
    .week_start
    .trim()
    .to_ascii_lowercase();
  if week_start != "sunday"
    && week_start != "monday"
  {
    warn!(
      week_start = %config.calendar.week_start,
      "unrecognized week_start; using default"
    );
    config.calendar.week_start =
      default_week_start();
  }

  if config.calendar.prewarm_radius > 6
  {
    config.calendar.prewarm_radius = 6;
  }

  if config.calendar.cache_radius
    < config.calendar.prewarm_radius
  {
    config.calendar.cache_radius =
      config.calendar.prewarm_radius;
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Ok(Some(PathBuf::from(
        trimmed
      )));
    }
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    return Ok(None);
  };
  let candidate = config_dir
    .join("koyomi")
    .join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(configured) =
    cfg.data_dir.as_deref()
  {
    expand_tilde(Path::new(configured))
  } else if let Some(data_dir) =
    dirs::data_dir()
  {
    data_dir.join("koyomi")
  } else {
    dirs::home_dir()
      .ok_or_else(|| {
        anyhow!(
          "cannot determine home \
           directory"
        )
      })?
      .join(".koyomi")
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
