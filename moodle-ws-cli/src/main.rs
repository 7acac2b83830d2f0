//! CLI front end for the Moodle web-service call layer.

#![allow(clippy::print_stdout, reason = "CLI tool outputs to stdout")]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use moodle_ws_core::config::load_config;
use moodle_ws_core::logging::init_logging;
use moodle_ws_core::ws::ProgressFn;
use moodle_ws_core::WsClient;
use moodle_ws_types::{AjaxPreSets, FileUploadOptions, SplitRequest, TransferProgress, TypeExpected, WsPreSets};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Client configuration file (JSON). Defaults apply when it does not exist.
    #[arg(long, default_value = "moodle-ws.json")]
    config: PathBuf,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Calls a web-service function through the REST endpoint
    Call {
        /// Site URL (e.g., https://campus.example)
        #[arg(long)]
        site: String,
        /// Web-service token
        #[arg(long)]
        token: String,
        /// Function name (e.g., core_webservice_get_site_info)
        method: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,
        /// Expected result type: object, boolean, number, string or jsonstring
        #[arg(long = "type", default_value = "object")]
        type_expected: String,
        /// The call returns nothing
        #[arg(long)]
        no_response: bool,
        /// Strip unsupported Unicode from the arguments
        #[arg(long)]
        clean_unicode: bool,
        /// Array argument to split into several requests
        #[arg(long, requires = "split_max")]
        split_param: Option<String>,
        /// Maximum entries per split request
        #[arg(long)]
        split_max: Option<usize>,
    },
    /// Calls a function through the AJAX endpoint
    Ajax {
        /// Site URL (e.g., https://campus.example)
        #[arg(long)]
        site: String,
        /// Function name
        method: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        data: String,
        /// Use the endpoint that does not require a session
        #[arg(long)]
        nologin: bool,
        /// Send a GET request (only with --nologin)
        #[arg(long, requires = "nologin")]
        get: bool,
    },
    /// Downloads a file
    Download {
        /// File URL
        url: String,
        /// Local path where the file will be saved
        path: PathBuf,
        /// Append an extension derived from the mimetype
        #[arg(long)]
        add_extension: bool,
    },
    /// Uploads a file to the user's draft area
    Upload {
        /// Site URL (e.g., https://campus.example)
        #[arg(long)]
        site: String,
        /// Web-service token
        #[arg(long)]
        token: String,
        /// Local path to the file to upload
        path: PathBuf,
        /// File mimetype
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
        /// Target file area
        #[arg(long)]
        file_area: Option<String>,
        /// Target draft item
        #[arg(long)]
        item_id: Option<i64>,
    },
    /// Probes a URL with HEAD requests
    Probe {
        /// URL to probe
        url: String,
    },
}

/// Parse `--data`, accepting an object or null.
fn parse_data(data: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
    if !(value.is_object() || value.is_null()) {
        anyhow::bail!("--data must be a JSON object");
    }
    Ok(value)
}

fn parse_type(type_expected: &str) -> Result<TypeExpected> {
    serde_json::from_value(Value::String(type_expected.to_lowercase()))
        .with_context(|| format!("unknown result type {type_expected:?}"))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serializing result failed")?);
    Ok(())
}

fn log_progress(event: TransferProgress) {
    match event.total {
        Some(total) => tracing::debug!(loaded = event.loaded, total, "Transfer progress"),
        None => tracing::debug!(loaded = event.loaded, "Transfer progress"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = load_config(&cli.config).context("loading client configuration failed")?;
    let client = WsClient::new(config).context("building client failed")?;
    info!(transport = ?client.transport_kind(), "Client ready");

    match cli.command {
        Commands::Call {
            site,
            token,
            method,
            data,
            type_expected,
            no_response,
            clean_unicode,
            split_param,
            split_max,
        } => {
            let mut presets = WsPreSets::new(site, token)
                .with_type_expected(parse_type(&type_expected)?)
                .with_response_expected(!no_response)
                .with_clean_unicode(clean_unicode);
            if let (Some(param), Some(max)) = (split_param, split_max) {
                presets = presets.with_split_request(SplitRequest::new(param, max));
            }

            info!("Calling {method} on {}", presets.site_url);
            let result = client
                .call(&method, parse_data(&data)?, &presets)
                .await
                .with_context(|| format!("{method} failed"))?;
            print_json(&result)?;
        },
        Commands::Ajax { site, method, data, nologin, get } => {
            let mut presets = AjaxPreSets::new(site);
            if nologin {
                presets = presets.no_login(get);
            }

            info!("Calling {method} through AJAX on {}", presets.site_url);
            let result = client
                .call_ajax(&method, parse_data(&data)?, &presets)
                .await
                .with_context(|| format!("{method} failed"))?;
            print_json(&result)?;
        },
        Commands::Download { url, path, add_extension } => {
            info!("Downloading {url} to {path:?}");
            let entry = client
                .download_file(&url, &path, add_extension, Some(&log_progress as &ProgressFn))
                .await
                .with_context(|| format!("downloading {url} failed"))?;
            info!("File downloaded successfully to {:?} ({} bytes)", entry.path, entry.size);
            println!("{}", entry.path.display());
        },
        Commands::Upload { site, token, path, mime_type, file_area, item_id } => {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .context("upload path has no file name")?;
            let mut options = FileUploadOptions::new(file_name, mime_type);
            options.file_area = file_area;
            options.item_id = item_id;
            let presets = WsPreSets::new(site, token);

            info!("Uploading {path:?} to {}", presets.site_url);
            let result = client
                .upload_file(&path, &options, &presets, Some(&log_progress as &ProgressFn))
                .await
                .with_context(|| format!("uploading {path:?} failed"))?;
            info!("File uploaded successfully to item {}", result.itemid);
            print_json(&serde_json::to_value(&result).context("serializing result failed")?)?;
        },
        Commands::Probe { url } => {
            let works = client.url_works(&url).await;
            let mimetype = client.get_remote_file_mime_type(&url, true).await;
            let size = client.get_remote_file_size(&url).await;
            print_json(&serde_json::json!({ "url": url, "works": works, "mimetype": mimetype, "size": size }))?;
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data() {
        assert!(parse_data(r#"{"courseid": 2}"#).is_ok());
        assert!(parse_data("null").is_ok());
        assert!(parse_data("[1, 2]").is_err());
        assert!(parse_data("{oops").is_err());
    }

    #[test]
    fn test_parse_type() {
        assert_eq!(parse_type("Number").ok(), Some(TypeExpected::Number));
        assert_eq!(parse_type("jsonstring").ok(), Some(TypeExpected::JsonString));
        assert!(parse_type("float").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
