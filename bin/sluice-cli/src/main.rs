// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

mod session;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sluice::builder::FlowBuilderServices;
use sluice::engine::FnAction;
use sluice::{Event, FlowDefinitionLocator, FlowDefinitionRegistry, FlowModel, SluiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sluice-cli", about = "Assemble and drive conversational flows")]
struct Cli {
    /// Flow model files (.json, .yaml, .toml). Ids come from the model or the file stem.
    #[arg(long = "flow", short = 'f', required = true)]
    flows: Vec<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble every flow and list its states.
    Check,
    /// Launch a flow and resume it with events read from stdin.
    Run {
        flow_id: String,
        #[arg(long = "input", value_name = "KEY=VALUE", value_parser = session::parse_pair)]
        input: Vec<(String, String)>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = SluiceConfig::load_or_default(cli.config.as_ref());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_target(false)
        .init();
    let registry = Arc::new(build_registry(&cli.flows, &config)?);
    match cli.cmd {
        Command::Check => check(&registry),
        Command::Run { flow_id, input } => session::run(registry, &config, &flow_id, input),
    }
}

fn build_registry(paths: &[PathBuf], config: &SluiceConfig) -> Result<FlowDefinitionRegistry> {
    let services = FlowBuilderServices::default();
    services.actions().register(
        "log",
        Arc::new(FnAction::new("log", |context| {
            info!(
                state = context.current_state_id().unwrap_or("<none>"),
                event = context.current_event().map(|e| e.id.as_str()).unwrap_or("<none>"),
                "log action"
            );
            Ok(Event::success())
        })),
    );
    let registry = FlowDefinitionRegistry::new();
    for path in paths {
        let model = FlowModel::from_file(path)
            .with_context(|| format!("reading flow model {}", path.display()))?;
        let flow_id = model
            .id_or_file_stem(path)
            .with_context(|| format!("no flow id for {}", path.display()))?;
        registry.register_model_file(
            flow_id,
            path,
            services.clone(),
            config.registry.refresh_on_change,
        );
    }
    Ok(registry)
}

fn check(registry: &FlowDefinitionRegistry) -> Result<()> {
    for flow_id in registry.flow_definition_ids() {
        let flow = registry.get_flow_definition(&flow_id)?;
        println!("{} (start: {})", flow.id(), flow.start_state());
        for state in flow.states() {
            let targets: Vec<String> = state
                .transitions()
                .iter()
                .map(|t| {
                    let target = t
                        .target()
                        .map(|target| target.static_target().unwrap_or("<dynamic>"))
                        .unwrap_or("<none>");
                    format!("{} -> {}", t.criteria(), target)
                })
                .collect();
            println!("  {:<16} {:<9} {}", state.id(), state.kind().as_str(), targets.join(", "));
        }
    }
    Ok(())
}
