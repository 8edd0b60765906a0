/// The statefulstring-runner executable
///
/// Launches a resource provider and drives a single operation through its
/// protocol, printing the result as JSON. This stands in for a deployment
/// host when testing providers by hand.
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use statefulstring_resource::{logging, schema::v0};
use statefulstring_runner::{
    collect_input_properties, ResourceProviderClient, ResourceProviderConfig,
};

const DEFAULT_TYPE: &str = "statefulString:index:StatefulString";

fn main() -> Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    logging::set_up(&logging::Options {
        level: if args.verbose {
            tracing::Level::TRACE
        } else {
            tracing::Level::WARN
        },
        verbose: args.verbose,
        color: false,
    })?;

    match &args.command {
        Commands::Capabilities { provider } => {
            let client = provider.launch()?;
            let r = client.capabilities().await;
            finish(client, r).await
        }
        Commands::Check { provider, inputs } => {
            let inputs = inputs.collect()?;
            let client = provider.launch()?;
            let r = client.check(&provider.resource_type, &inputs).await;
            finish(client, r).await
        }
        Commands::Create {
            provider,
            name,
            inputs,
        } => {
            let inputs = inputs.collect()?;
            let client = provider.launch()?;
            let r = client.create(&provider.resource_type, name, &inputs).await;
            finish(client, r).await
        }
        Commands::Diff {
            provider,
            state,
            inputs,
        } => {
            let resource = state.extant_resource(provider)?;
            let inputs = inputs.collect()?;
            let client = provider.launch()?;
            let r = client.diff(&resource, &inputs).await;
            finish(client, r).await
        }
        Commands::Update {
            provider,
            state,
            inputs,
        } => {
            let resource = state.extant_resource(provider)?;
            let inputs = inputs.collect()?;
            let client = provider.launch()?;
            let r = client.update(&resource, &inputs).await;
            finish(client, r).await
        }
        Commands::Destroy { provider, state } => {
            let resource = state.extant_resource(provider)?;
            let client = provider.launch()?;
            let r = client.destroy(&resource).await;
            finish(client, r).await
        }
        Commands::GenerateMan => {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        }
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(
                *shell,
                &mut cmd,
                "statefulstring-runner",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

/// Print the result of an operation, then wait for the provider to exit,
/// also when the operation failed.
async fn finish<T: Serialize>(client: ResourceProviderClient, result: Result<T>) -> Result<()> {
    let printed = result.and_then(|r| print_json(&r));
    let shutdown = client.shutdown().await;
    if let (Err(_), Err(e)) = (&printed, &shutdown) {
        tracing::warn!("{:#}", e);
    }
    printed.and(shutdown)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Simple program to run resource provider operations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log the protocol exchange to stderr
    #[arg(long, short('v'), global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct ProviderArgs {
    /// The executable that implements the resource operations
    #[arg(long)]
    provider_exe: String,

    /// The type of resource: an identifier recognized by the resource provider
    #[arg(long("type"), default_value = DEFAULT_TYPE)]
    resource_type: String,
}

impl ProviderArgs {
    fn launch(&self) -> Result<ResourceProviderClient> {
        ResourceProviderClient::launch(ResourceProviderConfig {
            provider_executable: self.provider_exe.clone(),
            provider_args: Vec::new(),
        })
    }
}

#[derive(ClapArgs, Debug)]
struct InputArgs {
    /// The (whole) JSON input properties for the resource
    ///
    /// This is a JSON object with the desired state of the resource.
    /// The structure of this object is defined by the resource provider behavior.
    #[arg(long("inputs-json"))]
    input_properties_json: Option<String>,

    /// An individual input property for the resource, in JSON format
    #[arg(long("input-json"),short('j'),number_of_values = 2, value_names = &["NAME", "JSON"])]
    input_property_json: Vec<String>,

    /// An individual input property for the resource, as a raw string.
    ///
    /// This is equivalent to `--input-json NAME JSON` if JSON is the JSON string formatting of STR.
    #[arg(long("input-str"),short('s'),number_of_values = 2, value_names = &["NAME", "STR"])]
    input_property_str: Vec<String>,
}

impl InputArgs {
    fn collect(&self) -> Result<Map<String, Value>> {
        // NOTE (loss of ordering):
        //
        // clap_derive appears incapable of preserving the order of flags, so
        // we can't tell which input property was specified last, and can't
        // let later inputs override earlier ones. Duplicates are rejected
        // instead, which keeps overriding open as a compatible change.
        collect_input_properties(
            self.input_properties_json.as_deref(),
            &self.input_property_json,
            &self.input_property_str,
        )
    }
}

#[derive(ClapArgs, Debug)]
struct StateArgs {
    /// The output properties the provider last reported for the resource, as JSON
    #[arg(long("state-json"))]
    state_json: String,

    /// The input properties the resource was last applied with, as JSON
    #[arg(long("previous-inputs-json"))]
    previous_inputs_json: Option<String>,
}

impl StateArgs {
    fn extant_resource(&self, provider: &ProviderArgs) -> Result<v0::ExtantResource> {
        let output_properties: Map<String, Value> = serde_json::from_str(&self.state_json)
            .with_context(|| "failed to parse value of --state-json")?;
        let input_properties: Map<String, Value> = match &self.previous_inputs_json {
            Some(json) => serde_json::from_str(json)
                .with_context(|| "failed to parse value of --previous-inputs-json")?,
            None => output_properties.clone(),
        };
        Ok(v0::ExtantResource {
            type_: v0::ResourceType(provider.resource_type.clone()),
            input_properties: v0::InputProperties(input_properties),
            output_properties: Some(v0::OutputProperties(output_properties)),
        })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show what a provider serves
    Capabilities {
        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Validate input properties
    Check {
        #[command(flatten)]
        provider: ProviderArgs,
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Create a resource
    Create {
        #[command(flatten)]
        provider: ProviderArgs,

        /// The logical name of the resource; providers may use it as the id
        #[arg(long)]
        name: String,

        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Compare an existing resource with new input properties
    Diff {
        #[command(flatten)]
        provider: ProviderArgs,
        #[command(flatten)]
        state: StateArgs,
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Update an existing resource to new input properties
    Update {
        #[command(flatten)]
        provider: ProviderArgs,
        #[command(flatten)]
        state: StateArgs,
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Destroy an existing resource
    Destroy {
        #[command(flatten)]
        provider: ProviderArgs,
        #[command(flatten)]
        state: StateArgs,
    },

    /// Generate markdown documentation for statefulstring-runner
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for statefulstring-runner
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
