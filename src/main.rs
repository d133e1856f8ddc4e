use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use toolcall_demo::{
    capabilities::{product_search_tool, wikipedia_tool},
    observability::langfuse::{self, LangfuseOptions},
    orchestrator::DEFAULT_MODEL,
    Capability, Catalog, ClientBuilder, ClientConfig, InferenceOptions, Orchestrator,
    OrchestratorConfig, Provider, WikipediaClient,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCapability {
    Products,
    Wikipedia,
}

impl From<CliCapability> for Capability {
    fn from(c: CliCapability) -> Self {
        match c {
            CliCapability::Products => Capability::ProductSearch,
            CliCapability::Wikipedia => Capability::Wikipedia,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProvider {
    /// LM Studio or any other `/v1/chat/completions` server
    Openai,
    Ollama,
}

impl From<CliProvider> for Provider {
    fn from(p: CliProvider) -> Self {
        match p {
            CliProvider::Openai => Provider::OpenAiCompatible,
            CliProvider::Ollama => Provider::Ollama,
        }
    }
}

/// Ask a local model a question, letting it call one tool before answering.
#[derive(Debug, Parser)]
#[command(name = "toolcall-demo", version, about)]
struct Args {
    /// The question to ask
    #[arg(short, long, default_value = "What Dell products do you have under $30?")]
    query: String,

    /// Which tool the model is offered
    #[arg(short, long, value_enum, default_value_t = CliCapability::Products)]
    capability: CliCapability,

    #[arg(long, value_enum, default_value_t = CliProvider::Openai, env = "TOOLCALL_PROVIDER")]
    provider: CliProvider,

    /// Model service base URL (defaults to the provider's local address)
    #[arg(long, env = "TOOLCALL_BASE_URL")]
    base_url: Option<String>,

    #[arg(short, long, default_value = DEFAULT_MODEL, env = "TOOLCALL_MODEL")]
    model: String,

    /// Bearer token, for servers that want one
    #[arg(long, env = "TOOLCALL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(short, long)]
    temperature: Option<f32>,

    /// Nucleus sampling cutoff
    #[arg(long)]
    top_p: Option<f32>,

    /// Upper bound on generated tokens per reply
    #[arg(long)]
    max_tokens: Option<i32>,

    #[arg(long)]
    seed: Option<i32>,

    /// Debug level logs on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Export spans to Langfuse at this host (keys from LANGFUSE_PUBLIC_KEY / LANGFUSE_SECRET_KEY)
    #[arg(long, env = "LANGFUSE_HOST")]
    langfuse_host: Option<String>,
}

impl Args {
    fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            seed: self.seed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let tracer_provider = match &args.langfuse_host {
        Some(host) => Some(
            langfuse::init(LangfuseOptions {
                public_key: std::env::var("LANGFUSE_PUBLIC_KEY").ok(),
                secret_key: std::env::var("LANGFUSE_SECRET_KEY").ok(),
                host: Some(host.clone()),
                verbose: args.verbose,
            })
            .context("initializing Langfuse tracing")?,
        ),
        None => {
            toolcall_demo::init_default_tracing(args.verbose);
            None
        }
    };

    let client = ClientConfig::default()
        .provider(Some(args.provider.into()))
        .base_url(args.base_url.clone())
        .api_key(args.api_key.clone())
        .build()
        .context("building model client")?;

    let capability = Capability::from(args.capability);
    let tool = match capability {
        Capability::ProductSearch => product_search_tool(Arc::new(Catalog::demo())),
        Capability::Wikipedia => {
            wikipedia_tool(WikipediaClient::new().context("building Wikipedia client")?)
        }
    }
    .context("building tool descriptor")?;

    let config = OrchestratorConfig::new(&args.model).with_options(args.inference_options());

    let orchestrator = Orchestrator::new(client, config).with_tool(tool);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let outcome = orchestrator
        .process_query(&args.query, capability, &mut stdout)
        .await;

    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("failed to flush traces: {e}");
        }
    }

    outcome?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_flags_reach_inference_options() {
        let args = Args::try_parse_from([
            "toolcall-demo",
            "--temperature",
            "0.7",
            "--top-p",
            "0.9",
            "--max-tokens",
            "2048",
            "--seed",
            "7",
        ])
        .unwrap();

        let config = OrchestratorConfig::new(&args.model).with_options(args.inference_options());
        assert_eq!(
            config.options,
            Some(InferenceOptions {
                temperature: Some(0.7),
                top_p: Some(0.9),
                max_tokens: Some(2048),
                seed: Some(7),
            })
        );
    }

    #[test]
    fn no_sampling_flags_leave_server_defaults() {
        let args = Args::try_parse_from(["toolcall-demo"]).unwrap();
        let config = OrchestratorConfig::new(&args.model).with_options(args.inference_options());
        assert!(config.options.is_none());
    }
}
