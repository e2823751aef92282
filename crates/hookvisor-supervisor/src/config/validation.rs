use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &SupervisorConfig) -> Result<()> {
    validate_address(&config.address)?;
    validate_command(config)?;
    validate_trigger(config)?;
    validate_sinks(config)?;

    if config.shutdown_timeout.is_zero() {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    Ok(())
}

/// `host:port` with a non-empty host and a non-zero port.
fn validate_address(address: &str) -> Result<()> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Listen address must be host:port, got: {}", address))?;

    if host.is_empty() {
        return Err(anyhow!("Listen address is missing a host: {}", address));
    }

    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(anyhow!(
            "Listen port must be between 1 and 65535, got: {}",
            port
        )),
        Ok(_) => Ok(()),
    }
}

fn validate_command(config: &SupervisorConfig) -> Result<()> {
    if config.command.trim().is_empty() {
        return Err(anyhow!("No command configured (use --command or `command:`)"));
    }

    if let Some(dir) = &config.working_directory {
        if !dir.is_dir() {
            return Err(anyhow!(
                "Working directory does not exist: {}",
                dir.display()
            ));
        }
    }

    Ok(())
}

fn validate_trigger(config: &SupervisorConfig) -> Result<()> {
    if config.secret.is_empty() {
        return Err(anyhow!(
            "No webhook secret configured (use --secret or HOOKVISOR_SECRET)"
        ));
    }

    if config.event.trim().is_empty() {
        return Err(anyhow!("Expected event type cannot be empty"));
    }

    if config.git_ref.trim().is_empty() {
        return Err(anyhow!("Expected ref cannot be empty"));
    }

    Ok(())
}

fn validate_sinks(config: &SupervisorConfig) -> Result<()> {
    if config.stdout_file.as_os_str().is_empty() || config.stderr_file.as_os_str().is_empty() {
        return Err(anyhow!("Output sink paths cannot be empty"));
    }

    if config.stdout_file == config.stderr_file {
        return Err(anyhow!(
            "stdout and stderr must go to different files, both set to: {}",
            config.stdout_file.display()
        ));
    }

    Ok(())
}
