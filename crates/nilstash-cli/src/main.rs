//! nilstash CLI
//!
//! Generates a content record from a conversation transcript and stores it
//! secret-shared across a cluster of storage nodes.
//!
//! ## Commands
//!
//! - `run`: run the storage task against a transcript
//! - `split`: dry run; print the per-node share documents without uploading
//! - `check-config`: validate the cluster configuration

mod transcript;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nilstash_core::{
    init_tracing, AllotSplitter, ClusterConfig, CompletionConfig, ContentGenerator, ContentRecord,
    HttpCompletionClient, HttpNodeClient, LogFormat, NodeClientConfig, ShareSplitter, StorageTask,
    TaskIdentity, UploadCoordinator,
};
use secret_allot::{decrypt, unify, Ciphertext, ALLOT_KEY};
use serde::Serialize;
use tracing::{info, Level};

use crate::transcript::{load_transcript, write_transcript, TranscriptConversation};

#[derive(Parser)]
#[command(name = "nilstash")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Store conversation-derived content secret-shared across nodes",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate content from a transcript and upload it to every node
    Run {
        /// Transcript file (JSON array of {role, content}), or `-` for stdin
        #[arg(short, long)]
        transcript: String,

        /// Write the transcript with replies appended to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        cluster: ClusterArgs,

        /// Schema the nodes store records under
        #[arg(long, env = "NILSTASH_SCHEMA_ID")]
        schema_id: String,

        /// Team label stored in clear alongside the content
        #[arg(long, env = "NILSTASH_TEAM")]
        team: String,

        /// Corrective retries after the first generation attempt
        #[arg(long, default_value_t = nilstash_core::DEFAULT_MAX_RETRIES)]
        retries: u32,

        /// Per-request timeout for node uploads
        #[arg(long, default_value = "30")]
        node_timeout_secs: u64,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Print the share documents for a text without contacting any node
    Split {
        /// Content to split
        #[arg(long)]
        text: String,

        /// Team label stored in clear alongside the content
        #[arg(long, env = "NILSTASH_TEAM")]
        team: String,

        /// Recombine the shares and check they decrypt back to the text
        #[arg(long)]
        verify: bool,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Validate the cluster configuration
    CheckConfig {
        #[command(flatten)]
        cluster: ClusterArgs,
    },
}

#[derive(Args)]
struct ClusterArgs {
    /// Path to the cluster config JSON ({"hosts": [{"url", "bearer"}]})
    #[arg(long, env = "NILSTASH_CONFIG", conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Inline cluster config JSON
    #[arg(long, env = "NILSTASH_CONFIG_JSON")]
    config_json: Option<String>,
}

#[derive(Args)]
struct LlmArgs {
    /// OpenAI-compatible API base URL
    #[arg(long, env = "NILSTASH_LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// Model identifier
    #[arg(long, env = "NILSTASH_LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    /// API key, sent as a bearer token
    #[arg(long, env = "NILSTASH_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Per-call completion timeout
    #[arg(long, default_value = "60")]
    llm_timeout_secs: u64,
}

impl ClusterArgs {
    fn load(&self) -> Result<ClusterConfig> {
        match (&self.config, &self.config_json) {
            (Some(path), _) => ClusterConfig::from_path(path)
                .with_context(|| format!("Invalid cluster config: {}", path.display())),
            (None, Some(raw)) => {
                ClusterConfig::from_json_str(raw).context("Invalid inline cluster config")
            }
            (None, None) => bail!("No cluster config: pass --config or --config-json"),
        }
    }
}

impl LlmArgs {
    fn completion_config(&self) -> CompletionConfig {
        let mut config = CompletionConfig::new(&self.llm_base_url, &self.llm_model)
            .with_timeout(Duration::from_secs(self.llm_timeout_secs));
        if let Some(key) = &self.llm_api_key {
            config = config.with_api_key(key);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    match cli.command {
        Commands::Run {
            transcript,
            output,
            cluster,
            schema_id,
            team,
            retries,
            node_timeout_secs,
            llm,
        } => {
            let cluster = cluster.load()?;
            let identity = TaskIdentity::new(schema_id, team)?;
            cmd_run(
                &transcript,
                output.as_deref(),
                cluster,
                identity,
                retries,
                Duration::from_secs(node_timeout_secs),
                llm.completion_config(),
            )
            .await
        }
        Commands::Split {
            text,
            team,
            verify,
            cluster,
        } => cmd_split(&cluster.load()?, &team, &text, verify),
        Commands::CheckConfig { cluster } => cmd_check_config(&cluster.load()?),
    }
}

/// Run the storage task over a transcript
async fn cmd_run(
    transcript: &str,
    output: Option<&Path>,
    cluster: ClusterConfig,
    identity: TaskIdentity,
    retries: u32,
    node_timeout: Duration,
    completion: CompletionConfig,
) -> Result<()> {
    let history = load_transcript(transcript)?;
    info!(
        messages = history.len(),
        nodes = cluster.node_count(),
        schema_id = %identity.schema_id,
        "starting storage task"
    );

    let completion =
        HttpCompletionClient::new(completion).context("Failed to build completion client")?;
    let generator = ContentGenerator::new(Arc::new(completion)).with_max_retries(retries);

    let node_config = NodeClientConfig::default().with_request_timeout(node_timeout);
    let transport = HttpNodeClient::new(&node_config).context("Failed to build node client")?;
    let coordinator = UploadCoordinator::new(
        cluster,
        identity.schema_id.as_str(),
        AllotSplitter,
        Arc::new(transport),
    );
    let task = StorageTask::new(generator, coordinator, identity.team.as_str());

    let mut conversation = TranscriptConversation::new(history, std::io::stdout());
    let outcome = task.run(&mut conversation).await;

    if let Some(path) = output {
        write_transcript(path, &conversation.into_transcript())?;
        info!(path = %path.display(), "transcript written");
    }

    if outcome.is_failure() {
        bail!("Storage task failed: {outcome}");
    }
    Ok(())
}

/// Print the per-node share documents for `text`
fn cmd_split(cluster: &ClusterConfig, team: &str, text: &str, verify: bool) -> Result<()> {
    let splitter = AllotSplitter;
    let key = splitter.derive_key(cluster.node_count())?;
    let record = ContentRecord::new(team, text);
    let shares = splitter.split_record(&key, &record)?;

    let documents: Vec<ShareDocument<'_>> = cluster
        .nodes()
        .iter()
        .zip(&shares)
        .enumerate()
        .map(|(node_index, (node, share))| ShareDocument {
            node_index,
            address: &node.address,
            share,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&documents)?);

    if verify {
        let unified = unify(&shares).context("Shares failed to recombine")?;
        let ciphertext: Ciphertext = serde_json::from_value(unified["text"][ALLOT_KEY].clone())
            .context("Recombined record has no ciphertext")?;
        let recovered =
            decrypt(&key, &ciphertext).context("Recombined ciphertext failed to decrypt")?;
        if recovered != record.text {
            bail!("Recombined text does not match the input");
        }
        info!(shares = shares.len(), "shares verified");
    }
    Ok(())
}

/// Validate and summarise the cluster config
fn cmd_check_config(cluster: &ClusterConfig) -> Result<()> {
    println!("Cluster config OK: {} node(s)", cluster.node_count());
    for (i, node) in cluster.nodes().iter().enumerate() {
        println!("  [{i}] {} (bearer: <redacted>)", node.address);
    }
    Ok(())
}

#[derive(Serialize)]
struct ShareDocument<'a> {
    node_index: usize,
    address: &'a str,
    share: &'a serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_HOSTS: &str =
        r#"{"hosts":[{"url":"node-a.example.com","bearer":"a"},{"url":"node-b.example.com","bearer":"b"}]}"#;

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::try_parse_from([
            "nilstash",
            "--json",
            "run",
            "--transcript",
            "-",
            "--config-json",
            TWO_HOSTS,
            "--schema-id",
            "schema-1",
            "--team",
            "green",
            "--retries",
            "1",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Run {
                transcript,
                cluster,
                retries,
                node_timeout_secs,
                llm,
                ..
            } => {
                assert_eq!(transcript, "-");
                assert_eq!(retries, 1);
                assert_eq!(node_timeout_secs, 30);
                assert_eq!(llm.llm_timeout_secs, 60);
                assert_eq!(cluster.load().unwrap().node_count(), 2);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_config_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "nilstash",
            "check-config",
            "--config",
            "cluster.json",
            "--config-json",
            TWO_HOSTS,
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cluster_args_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");
        std::fs::write(&path, TWO_HOSTS).unwrap();

        let args = ClusterArgs {
            config: Some(path),
            config_json: None,
        };
        assert_eq!(args.load().unwrap().nodes()[1].address, "node-b.example.com");
    }

    #[test]
    fn test_cluster_args_require_a_source() {
        let args = ClusterArgs {
            config: None,
            config_json: None,
        };
        assert!(args.load().is_err());
    }

    #[test]
    fn test_split_verifies_round_trip() {
        let cluster = ClusterConfig::from_json_str(TWO_HOSTS).unwrap();
        cmd_split(&cluster, "green", "Call me Ishmael", true).unwrap();
    }

    #[test]
    fn test_llm_args_carry_api_key() {
        let llm = LlmArgs {
            llm_base_url: "http://localhost:8080/v1".to_string(),
            llm_model: "local".to_string(),
            llm_api_key: Some("sk-test".to_string()),
            llm_timeout_secs: 5,
        };
        let config = llm.completion_config();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
