// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

use crate::cli_shared::cli::CliOpts;

/// Keeps the file logger flushing until dropped.
#[derive(Default)]
pub struct Guards {
    _file: Option<WorkerGuard>,
}

pub fn setup_logger(opts: &CliOpts) -> Guards {
    let mut guards = Guards::default();
    let mut layers: Vec<Box<dyn tracing_subscriber::layer::Layer<Registry> + Send + Sync>> =
        // console logger, keeping stdout for command output
        vec![Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(opts.color.coloring_enabled())
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(default_env_filter())),
        )];

    // file logger
    if let Some(log_dir) = &opts.log_dir {
        let file_appender = tracing_appender::rolling::hourly(log_dir, "archiver.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        guards._file = Some(guard);
        layers.push(Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(get_env_filter(default_env_filter())),
        ));
    }

    tracing_subscriber::registry().with(layers).init();
    guards
}

/// Returns an [`EnvFilter`] according to the `RUST_LOG` environment variable, or `def`.
///
/// Note that [`tracing_subscriber::filter::Builder`] only allows a single default directive,
/// whereas we want to provide multiple.
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

fn default_env_filter() -> EnvFilter {
    let default_directives = [
        "info",
        "axum=warn",
        "hyper=warn",
        "jsonrpsee=warn",
        "sqlx=warn",
    ];
    EnvFilter::new(default_directives.join(","))
}

#[test]
fn test_default_env_filter() {
    let _did_not_panic = default_env_filter();
}
