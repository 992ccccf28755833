use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use facelens_core::brightness::BrightnessSurface;
use facelens_core::{AnalyzerConfig, Delegate};

/// Load the analyzer configuration.
///
/// Starts from defaults, layers the TOML file on top (the explicit `path`,
/// or `$XDG_CONFIG_HOME/facelens/config.toml` when it exists), then applies
/// `FACELENS_*` environment overrides. The result is validated.
pub fn load(path: Option<&Path>) -> Result<AnalyzerConfig> {
    let file = match path {
        Some(p) => Some(p.to_path_buf()),
        None => Some(default_config_path()).filter(|p| p.exists()),
    };

    let mut config = match &file {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read config {}", p.display()))?;
            let config: AnalyzerConfig = toml::from_str(&text)
                .with_context(|| format!("failed to parse config {}", p.display()))?;
            tracing::debug!(path = %p.display(), "config file loaded");
            config
        }
        None => AnalyzerConfig::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn default_config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("facelens/config.toml")
}

/// Apply `FACELENS_*` overrides read through `var`.
///
/// Unparseable numbers are ignored with a warning, keeping the previous value.
pub fn apply_overrides<F>(config: &mut AnalyzerConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parsed(&var, "FACELENS_SAMPLING_FPS") {
        config.sampling_frame_rate = v;
    }
    if let Some(v) = parsed(&var, "FACELENS_DEFAULT_STREAM_FPS") {
        config.default_stream_frame_rate = v;
    }
    if let Some(v) = parsed(&var, "FACELENS_MAX_FACES") {
        config.engine.max_faces = v;
    }
    if let Some(v) = parsed(&var, "FACELENS_MIN_DETECTION_CONFIDENCE") {
        config.engine.min_face_detection_confidence = v;
    }
    if let Some(v) = parsed(&var, "FACELENS_MIN_PRESENCE_CONFIDENCE") {
        config.engine.min_face_presence_confidence = v;
    }
    if let Some(v) = parsed(&var, "FACELENS_MIN_TRACKING_CONFIDENCE") {
        config.engine.min_tracking_confidence = v;
    }
    if let Some(v) = var("FACELENS_DELEGATE") {
        config.engine.delegate = match v.to_ascii_lowercase().as_str() {
            "gpu" => Delegate::Gpu,
            "cpu" => Delegate::Cpu,
            other => bail!("FACELENS_DELEGATE must be \"gpu\" or \"cpu\", got {other:?}"),
        };
    }
    if let Some(v) = var("FACELENS_BLENDSHAPES") {
        config.reported_blendshape_keys = v
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(v) = var("FACELENS_BRIGHTNESS") {
        config.brightness = parse_surface(&v)?;
    }
    Ok(())
}

/// `"0"`/`"off"` disables brightness; `"WIDTHxHEIGHT"` sets the surface size.
fn parse_surface(value: &str) -> Result<Option<BrightnessSurface>> {
    let value = value.trim();
    if value == "0" || value.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let Some((w, h)) = value.split_once(|c: char| c == 'x' || c == 'X') else {
        bail!("FACELENS_BRIGHTNESS must be \"off\" or WIDTHxHEIGHT, got {value:?}");
    };
    let width = w.trim().parse().context("invalid brightness width")?;
    let height = h.trim().parse().context("invalid brightness height")?;
    Ok(Some(BrightnessSurface::new(width, height)))
}

fn parsed<T, F>(var: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let mut config = AnalyzerConfig::default();
        apply_overrides(&mut config, env(&[])).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }

    #[test]
    fn test_numeric_overrides() {
        let mut config = AnalyzerConfig::default();
        apply_overrides(
            &mut config,
            env(&[
                ("FACELENS_SAMPLING_FPS", "15"),
                ("FACELENS_MAX_FACES", "1"),
                ("FACELENS_MIN_TRACKING_CONFIDENCE", "0.7"),
                ("FACELENS_DEFAULT_STREAM_FPS", "not-a-number"),
            ]),
        )
        .unwrap();
        assert_eq!(config.sampling_frame_rate, 15.0);
        assert_eq!(config.engine.max_faces, 1);
        assert_eq!(config.engine.min_tracking_confidence, 0.7);
        assert_eq!(config.default_stream_frame_rate, 30.0);
    }

    #[test]
    fn test_delegate_and_blendshape_overrides() {
        let mut config = AnalyzerConfig::default();
        apply_overrides(
            &mut config,
            env(&[
                ("FACELENS_DELEGATE", "CPU"),
                ("FACELENS_BLENDSHAPES", "jawOpen, mouthFunnel,,"),
            ]),
        )
        .unwrap();
        assert_eq!(config.engine.delegate, Delegate::Cpu);
        assert_eq!(config.reported_blendshape_keys, vec!["jawOpen", "mouthFunnel"]);
    }

    #[test]
    fn test_bad_delegate_is_an_error() {
        let mut config = AnalyzerConfig::default();
        assert!(apply_overrides(&mut config, env(&[("FACELENS_DELEGATE", "tpu")])).is_err());
    }

    #[test]
    fn test_brightness_surface_override() {
        assert_eq!(parse_surface("off").unwrap(), None);
        assert_eq!(parse_surface("0").unwrap(), None);
        assert_eq!(
            parse_surface("320x240").unwrap(),
            Some(BrightnessSurface::new(320, 240))
        );
        assert!(parse_surface("wide").is_err());
    }

    #[test]
    fn test_toml_file_round_trip() {
        let text = r#"
            sampling_frame_rate = 12.5
            reported_blendshape_keys = ["eyeBlinkLeft"]
            max_faces = 2
            delegate = "cpu"

            [brightness]
            width = 320
            height = 240
        "#;
        let config: AnalyzerConfig = toml::from_str(text).unwrap();
        assert_eq!(config.sampling_frame_rate, 12.5);
        assert_eq!(config.engine.max_faces, 2);
        assert_eq!(config.engine.delegate, Delegate::Cpu);
        assert_eq!(config.brightness, Some(BrightnessSurface::new(320, 240)));
        assert_eq!(config.engine.min_face_presence_confidence, 0.5);

        let printed = toml::to_string(&config).unwrap();
        let reparsed: AnalyzerConfig = toml::from_str(&printed).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_disabled_brightness_survives_print_and_reload() {
        let mut config = AnalyzerConfig::default();
        apply_overrides(&mut config, env(&[("FACELENS_BRIGHTNESS", "off")])).unwrap();
        assert_eq!(config.brightness, None);

        let printed = toml::to_string_pretty(&config).unwrap();
        assert!(printed.contains("brightness = \"off\""));

        let reparsed: AnalyzerConfig = toml::from_str(&printed).unwrap();
        assert_eq!(reparsed.brightness, None);
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = std::env::temp_dir().join(format!(
            "facelens-config-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "sampling_frame_rate = -3\n").unwrap();

        assert!(load(Some(&path)).is_err());
        assert!(load(Some(&dir.join("missing.toml"))).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
