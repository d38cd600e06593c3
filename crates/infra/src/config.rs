//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::aggregator::SupplierProfile;
use crate::render::{DEFAULT_RENDER_BUDGET, RenderSettings, RendererCommand};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive number of seconds, got `{value}`")]
    InvalidDuration { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// `None` selects the in-memory source.
    pub database_url: Option<String>,
    pub bulk_renderer: RendererCommand,
    pub pdf_renderer: RendererCommand,
    pub render_timeout: Duration,
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub supplier: SupplierProfile,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let render_timeout = match get("RENDER_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidDuration {
                        var: "RENDER_TIMEOUT_SECS",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_RENDER_BUDGET,
        };

        let renderer = |program_var: &'static str, args_var: &str, script: &str| {
            let program = get(program_var).unwrap_or_else(|| "python3".to_string());
            let args = get(args_var).unwrap_or_else(|| script.to_string());
            RendererCommand::new(program).args(args.split_whitespace())
        };

        let database_url = get("DATABASE_URL");
        if database_url.is_none() {
            warn!("DATABASE_URL not set; serving from an empty in-memory invoice source");
        }

        let supplier_gstin = get("SUPPLIER_GSTIN");
        if supplier_gstin.is_none() {
            warn!("SUPPLIER_GSTIN not set; single-invoice PDFs will be rejected");
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            database_url,
            bulk_renderer: renderer(
                "BULK_RENDERER_PROGRAM",
                "BULK_RENDERER_ARGS",
                "python-scripts/report_generation.py",
            ),
            pdf_renderer: renderer(
                "PDF_RENDERER_PROGRAM",
                "PDF_RENDERER_ARGS",
                "python-scripts/pdf_creation.py",
            ),
            render_timeout,
            output_dir: get("RENDER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("generated")),
            scratch_dir: get("RENDER_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            supplier: SupplierProfile {
                gstin: supplier_gstin,
                name: get("SUPPLIER_NAME"),
            },
        })
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings::new(&self.output_dir, &self.scratch_dir).with_budget(self.render_timeout)
    }

    /// Create the output and scratch directories if missing.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::create_dir_all(&self.scratch_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.render_timeout, Duration::from_secs(60));
        assert_eq!(cfg.output_dir, PathBuf::from("generated"));
        assert_eq!(cfg.pdf_renderer.program, PathBuf::from("python3"));
        assert_eq!(cfg.pdf_renderer.args, vec!["python-scripts/pdf_creation.py"]);
        assert_eq!(cfg.bulk_renderer.args, vec!["python-scripts/report_generation.py"]);
        assert_eq!(cfg.supplier, SupplierProfile::default());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("RENDER_TIMEOUT_SECS", "5"),
            ("PDF_RENDERER_PROGRAM", "/usr/local/bin/render-pdf"),
            ("PDF_RENDERER_ARGS", "--dpi 300"),
            ("SUPPLIER_GSTIN", " 24AAACG1234F1Z5 "),
            ("RENDER_SCRATCH_DIR", "/var/tmp/invoicedesk"),
        ])
        .unwrap();
        assert_eq!(cfg.render_timeout, Duration::from_secs(5));
        assert_eq!(cfg.pdf_renderer.args, vec!["--dpi", "300"]);
        assert_eq!(cfg.supplier.gstin.as_deref(), Some("24AAACG1234F1Z5"));
        let settings = cfg.render_settings();
        assert_eq!(settings.budget, Duration::from_secs(5));
        assert_eq!(settings.scratch_dir, PathBuf::from("/var/tmp/invoicedesk"));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        assert!(matches!(
            config(&[("RENDER_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(config(&[("RENDER_TIMEOUT_SECS", "0")]).is_err());
    }
}
