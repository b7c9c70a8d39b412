use clap::{Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use summit_core::ProcessingOptions;
use summit_core::pdf::{AnnotateOptions, CompressOptions, ImageOptions};
use summit_core::summarize::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use summit_http::HttpServerConfig;
use summit_model::defaults::{
    IMAGE_MAX_DIMENSION, JPEG_QUALITY, MARGIN_WIDTH, MAX_UPLOAD_BYTES, PDF_WORKERS,
    SUMMARY_CONCURRENCY,
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const MIN_MARGIN_WIDTH: f32 = 72.0;

#[derive(Parser, Debug)]
#[command(
    name = "summitd",
    version,
    about = "Compresses PDFs and writes AI summaries into their margins."
)]
struct CliArgs {
    #[arg(long, env = "SUMMIT_HOST", default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(
        long,
        env = "SUMMIT_DEBUG",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    debug: bool,

    /// Alias for `--debug`, read from `DJANGO_DEBUG`.
    #[arg(
        long,
        env = "DJANGO_DEBUG",
        hide = true,
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    django_debug: bool,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    openai_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    openai_model: String,

    #[arg(
        long,
        env = "OPENAI_TIMEOUT_SECS",
        default_value_t = DEFAULT_OPENAI_TIMEOUT_SECS
    )]
    openai_timeout_secs: u64,

    #[arg(
        long,
        env = "SUMMIT_MAX_UPLOAD_BYTES",
        default_value_t = MAX_UPLOAD_BYTES
    )]
    max_upload_bytes: usize,

    #[arg(
        long,
        env = "SUMMIT_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    #[arg(
        long,
        env = "SUMMIT_SUMMARY_CONCURRENCY",
        default_value_t = SUMMARY_CONCURRENCY
    )]
    summary_concurrency: usize,

    #[arg(long, env = "SUMMIT_PDF_WORKERS", default_value_t = PDF_WORKERS)]
    pdf_workers: usize,

    #[arg(
        long,
        env = "SUMMIT_IMAGE_MAX_DIMENSION",
        default_value_t = IMAGE_MAX_DIMENSION
    )]
    image_max_dimension: u32,

    #[arg(long, env = "SUMMIT_JPEG_QUALITY", default_value_t = JPEG_QUALITY)]
    jpeg_quality: u8,

    #[arg(long, env = "SUMMIT_MARGIN_WIDTH", default_value_t = MARGIN_WIDTH)]
    margin_width: f32,

    #[arg(long, env = "SUMMIT_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,
}

/// Settings for the chat-completions summarizer.
#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Clone, Debug)]
pub struct SummitConfig {
    pub addr: SocketAddr,
    pub debug: bool,
    pub openai: OpenAiSettings,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub summary_concurrency: usize,
    pub pdf_workers: usize,
    pub image_max_dimension: u32,
    pub jpeg_quality: u8,
    pub margin_width: f32,
    pub cors_origins: Vec<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl SummitConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }

    #[must_use]
    pub fn processing_options(&self) -> ProcessingOptions {
        let image = ImageOptions::default()
            .with_max_dimension(self.image_max_dimension)
            .with_jpeg_quality(self.jpeg_quality);
        ProcessingOptions::default()
            .with_compress(CompressOptions::default().with_image_options(image))
            .with_annotate(AnnotateOptions::default().with_margin_width(self.margin_width))
            .with_summary_concurrency(self.summary_concurrency)
            .with_pdf_workers(self.pdf_workers)
    }

    #[must_use]
    pub fn http_config(&self) -> HttpServerConfig {
        HttpServerConfig::new(self.addr)
            .with_max_upload_bytes(self.max_upload_bytes)
            .with_request_timeout(self.request_timeout)
            .with_debug(self.debug)
            .with_cors_origins(self.cors_origins.clone())
    }
}

impl TryFrom<CliArgs> for SummitConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let debug = args.debug || args.django_debug;
        let host = args.host.trim();
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::InvalidSetting {
            name: "SUMMIT_HOST",
            value: args.host.clone(),
        })?;

        let api_key = args
            .openai_api_key
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if api_key.is_none() && !debug {
            return Err(ConfigError::MissingSetting("OPENAI_API_KEY"));
        }

        let base_url = args.openai_base_url.trim().to_string();
        if base_url.is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "OPENAI_BASE_URL",
                value: args.openai_base_url,
            });
        }
        let model = args.openai_model.trim().to_string();
        if model.is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "OPENAI_MODEL",
                value: args.openai_model,
            });
        }

        if !(1..=100).contains(&args.jpeg_quality) {
            return Err(ConfigError::InvalidSetting {
                name: "SUMMIT_JPEG_QUALITY",
                value: args.jpeg_quality.to_string(),
            });
        }
        if args.summary_concurrency == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "SUMMIT_SUMMARY_CONCURRENCY",
                value: args.summary_concurrency.to_string(),
            });
        }
        if args.pdf_workers == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "SUMMIT_PDF_WORKERS",
                value: args.pdf_workers.to_string(),
            });
        }
        if args.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "SUMMIT_MAX_UPLOAD_BYTES",
                value: args.max_upload_bytes.to_string(),
            });
        }
        if !args.margin_width.is_finite() || args.margin_width < MIN_MARGIN_WIDTH {
            return Err(ConfigError::InvalidSetting {
                name: "SUMMIT_MARGIN_WIDTH",
                value: args.margin_width.to_string(),
            });
        }

        let cors_origins = args
            .cors_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            addr: SocketAddr::new(ip, args.port),
            debug,
            openai: OpenAiSettings {
                api_key,
                base_url,
                model,
                timeout: Duration::from_secs(args.openai_timeout_secs),
            },
            max_upload_bytes: args.max_upload_bytes,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            summary_concurrency: args.summary_concurrency,
            pdf_workers: args.pdf_workers,
            image_max_dimension: args.image_max_dimension,
            jpeg_quality: args.jpeg_quality,
            margin_width: args.margin_width,
            cors_origins,
        })
    }
}
