use std::{io, process::ExitCode};

use clap::Parser;
use ksrc::{
    cli::{
        args::{CliArgs, Command},
        command_handlers::SearchOptions,
    },
    config::KsrcConfig,
    model::selector::SourceFilter,
    process::CancellationToken,
    resolver::ResolveConfiguration,
    Ksrc,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse();
    let level = if cli_args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();
    let mut work = tokio::task::spawn_blocking(move || run(cli_args, worker_cancel));

    let result = tokio::select! {
        joined = &mut work => joined,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, stopping running tools");
            cancel.cancel();
            work.await
        }
    };

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("Worker failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli_args: CliArgs, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut builder = Ksrc::builder()
        .config(KsrcConfig::load()?)
        .cancel_token(cancel);
    if let Some(cache_directory) = cli_args.cache_directory {
        builder = builder.cache_directory(cache_directory);
    }
    let ksrc = builder.try_build()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli_args.cmd {
        Command::Resolve { selector, project } => {
            ksrc.resolve(project.to_configuration(selector.to_filter()), &mut out)
        }
        Command::Deps { project } => {
            ksrc.deps(project.to_configuration(SourceFilter::default()), &mut out)
        }
        Command::Search {
            module_arg,
            query,
            all,
            context,
            rg_args,
            show_extracted_path,
            mut selector,
            project,
            rg_extra,
        } => {
            if let Some(module) = module_arg.filter(|module| !module.trim().is_empty()) {
                selector.module = Some(module);
            }
            let config = ResolveConfiguration {
                search_all: all,
                ..project.to_configuration(selector.to_filter())
            };
            let options = SearchOptions {
                query,
                context,
                rg_args,
                rg_extra,
                show_extracted_path,
                file_glob: String::new(),
            };
            ksrc.search(config, options, &mut out)
        }
        Command::Cat {
            target,
            lines,
            selector,
            project,
        } => ksrc.cat(
            project.to_configuration(selector.to_filter()),
            &target,
            lines.as_deref(),
            &mut out,
        ),
        Command::Where {
            target,
            selector,
            project,
        } => ksrc.locate(
            project.to_configuration(selector.to_filter()),
            &target,
            &mut out,
        ),
        Command::Fetch {
            coordinate,
            project,
        } => ksrc.fetch(
            project.to_configuration(SourceFilter::default()),
            &coordinate,
            &mut out,
        ),
        Command::Doctor { project } => ksrc.doctor(
            ResolveConfiguration {
                project_dir: project,
                ..Default::default()
            },
            &mut out,
        ),
    }
}
