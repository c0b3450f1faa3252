//! Configuration validation functions.

use super::Config;
use std::path::Path;

/// Check that the configuration can produce a working TLS listener.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let tls = &config.tls;

    for (index, cert) in tls.certificates.iter().enumerate() {
        let cert_path = non_blank(&cert.certificate_path).ok_or_else(|| {
            anyhow::anyhow!("tls.certificates[{index}].certificate_path must not be empty")
        })?;
        if !Path::new(cert_path).exists() {
            anyhow::bail!("TLS certificate file not found at {cert_path}");
        }

        let key_path = non_blank(&cert.private_key_path).ok_or_else(|| {
            anyhow::anyhow!("tls.certificates[{index}].private_key_path must not be empty")
        })?;
        if !Path::new(key_path).exists() {
            anyhow::bail!("TLS private key file not found at {key_path}");
        }
    }

    if tls.acme.enabled {
        if tls.acme.hosts.iter().all(|host| non_blank(host).is_none()) {
            anyhow::bail!("tls.acme.hosts must list at least one host when ACME is enabled");
        }
        if let Some(dir) = &tls.acme.cache_dir {
            if non_blank(dir).is_none() {
                anyhow::bail!("tls.acme.cache_dir must not be empty when set");
            }
        }
        if tls.acme.refresh_interval_secs == 0 {
            anyhow::bail!("tls.acme.refresh_interval_secs must be at least 1");
        }
    }

    if tls.certificates.is_empty() && !tls.acme.enabled {
        anyhow::bail!(
            "\nNo certificate source configured!\n\
             ===================================================================\n\
             Provide a static key pair:\n\
             export TLS_ROTOR_CONFIG_JSON='{{\"tls\":{{\"certificates\":[{{\"certificate_path\":\"cert.pem\",\"private_key_path\":\"key.pem\"}}]}}}}'\n\
             \n\
             or enable ACME:\n\
             export TLS_ROTOR__TLS__ACME__ENABLED=true\n\
             export TLS_ROTOR__TLS__ACME__HOSTS=example.com\n\
             ===================================================================\n"
        );
    }

    let tickets = &tls.session_tickets;
    if tickets.enabled {
        if tickets.ring_size == 0 {
            anyhow::bail!("tls.session_tickets.ring_size must be at least 1");
        }
        if tickets.rotation_interval_secs == 0 {
            anyhow::bail!("tls.session_tickets.rotation_interval_secs must be at least 1");
        }
    }

    Ok(())
}

fn non_blank(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}
