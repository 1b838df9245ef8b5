mod args;
mod output;
mod serve;

use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use tokio_util::sync::CancellationToken;

use snowform::backend;
use snowform::diagnostics::Diagnostics;
use snowform::mux::MuxServer;
use snowform::protocol::{ProviderServer, Request, Response};
use snowform::remote::memory::{MemoryFactory, MemoryRemote};
use snowform::remote::sql_api::SqlApiFactory;
use snowform::remote::{CallContext, ClientFactory};
use snowform::state::InstanceState;
use snowform::value::Config;

pub use args::{Cli, Command, ConnectionArgs, ImportArgs, PlanArgs, SchemaArgs, ServeArgs};

fn factory(connection: &ConnectionArgs) -> Arc<dyn ClientFactory> {
    if connection.offline {
        tracing::info!("using the in-memory sandbox");
        Arc::new(MemoryFactory::new(Arc::new(MemoryRemote::new())))
    } else {
        Arc::new(SqlApiFactory::new())
    }
}

/// Log every diagnostic and fail on the first error.
fn report(diagnostics: &Diagnostics) -> Result<()> {
    for d in diagnostics.iter() {
        let detail = d.detail.as_deref().unwrap_or_default();
        if d.is_error() {
            tracing::error!(detail, "{}", d.summary);
        } else {
            tracing::warn!(detail, "{}", d.summary);
        }
    }
    match diagnostics.errors().next() {
        Some(first) => bail!("{}", first.summary),
        None => Ok(()),
    }
}

async fn configured(connection: &ConnectionArgs, ctx: &CallContext) -> Result<MuxServer> {
    let server = backend::provider_server(factory(connection)).await?;
    let response = server
        .call(
            Request::Configure {
                config: connection.provider_config(),
            },
            ctx,
        )
        .await;
    report(response.diagnostics()).wrap_err("provider configuration failed")?;
    Ok(server)
}

pub async fn serve(args: ServeArgs) -> Result<()> {
    let server = backend::provider_server(factory(&args.connection)).await?;

    // Flags given on the command line seed the session; the host's own
    // configure call replaces it.
    let seed = args.connection.provider_config();
    if seed.names().next().is_some() {
        let response = server
            .call(Request::Configure { config: seed }, &CallContext::default())
            .await;
        if let Err(e) = report(response.diagnostics()) {
            tracing::warn!(error = %e, "command-line configuration ignored");
        }
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            interrupt.cancel();
        }
    });

    tracing::info!("serving on stdio");
    serve::serve(
        Arc::new(server),
        tokio::io::stdin(),
        tokio::io::stdout(),
        cancel,
    )
    .await
}

pub async fn schema(args: SchemaArgs) -> Result<()> {
    let offline = Arc::new(MemoryFactory::new(Arc::new(MemoryRemote::new())));
    let server = backend::provider_server(offline).await?;
    let schema = server.schema();

    match args.type_name {
        None => print!("{}", output::render_schema(schema)),
        Some(type_name) => {
            let found = schema
                .resources
                .get(&type_name)
                .or_else(|| schema.data_sources.get(&type_name))
                .ok_or_else(|| eyre!("unknown type {type_name}"))?;
            print!("{}", output::render_type(&type_name, found));
        }
    }
    Ok(())
}

pub async fn plan(args: PlanArgs) -> Result<()> {
    let ctx = CallContext::default();
    let raw = std::fs::read_to_string(&args.config)
        .wrap_err_with(|| format!("reading {}", args.config.display()))?;
    let config: Config = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("parsing {}", args.config.display()))?;
    let prior = match &args.state {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            Some(InstanceState::from_json(&raw)?)
        }
        None => None,
    };

    let server = configured(&args.connection, &ctx).await?;
    let request = Request::PlanResourceChange {
        type_name: args.type_name,
        config: Some(config),
        prior_state: prior,
    };
    match server.call(request, &ctx).await {
        Response::PlanResourceChange {
            plan: Some(plan), ..
        } => {
            print!("{}", output::render_plan(&plan));
            Ok(())
        }
        other => {
            report(other.diagnostics())?;
            bail!("no plan was produced")
        }
    }
}

pub async fn import(args: ImportArgs) -> Result<()> {
    let ctx = CallContext::default();
    let server = configured(&args.connection, &ctx).await?;
    let request = Request::ImportResourceState {
        type_name: args.type_name,
        id: args.id,
    };
    match server.call(request, &ctx).await {
        Response::ImportResourceState {
            state: Some(state),
            ..
        } => {
            println!("{}", state.to_json()?);
            Ok(())
        }
        other => {
            report(other.diagnostics())?;
            bail!("nothing was imported")
        }
    }
}
