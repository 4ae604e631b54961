//! Configuration initialization and hierarchy management

use crate::adapters::toml_config::AppConfig;
use crate::cli::Cli;
use crate::error::EncodeResult;

/// Build the configuration following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration(cli: &Cli) -> EncodeResult<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env();
    apply_cli_overrides(&mut config, cli);
    Ok(config)
}

/// Apply CLI argument overrides to configuration
pub fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(dir) = &cli.formats_dir {
        config.formats_dir = Some(dir.clone());
    }
    if let Some(path) = &cli.ffmpeg {
        config.ffmpeg_path = Some(path.clone());
    }
    if let Some(path) = &cli.gifski {
        config.gifski_path = Some(path.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tracing_log::LogFormat;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_cli_overrides_win() {
        let cli = Cli::parse_from([
            "vidsink",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--ffmpeg",
            "/cli/ffmpeg",
            "formats",
        ]);
        let mut config = AppConfig::from_toml_str("ffmpeg_path = \"/file/ffmpeg\"\nformats_dir = \"/file/formats\"").unwrap();
        apply_cli_overrides(&mut config, &cli);

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/cli/ffmpeg")));
        assert_eq!(config.formats_dir(), PathBuf::from("/file/formats"));
    }
}
