use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - At least one staging directory
/// - Polling interval is not 0
/// - At least one header read attempt
/// - Archive host, user and path are not blank
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.directories.tmp.is_empty() {
        return Err(ConfigError::ValidationError(
            "directories.tmp must list at least one directory".to_string(),
        ));
    }

    if config.scheduling.polling_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scheduling.polling_interval_secs cannot be 0".to_string(),
        ));
    }

    if config.scheduling.log_read_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "scheduling.log_read_attempts cannot be 0".to_string(),
        ));
    }

    if let Some(archive) = &config.archive {
        for (name, value) in [
            ("rsyncd_host", &archive.rsyncd_host),
            ("rsyncd_user", &archive.rsyncd_user),
            ("rsyncd_path", &archive.rsyncd_path),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "archive.{} cannot be empty",
                    name
                )));
            }
        }
    }

    Ok(())
}
