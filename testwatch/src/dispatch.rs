// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts},
    render::{RenderOpts, RenderStyles, render_json, render_text},
};
use std::{
    io::{self, Write},
    pin::pin,
    time::Duration,
};
use testwatch_metadata::TestwatchExitCode;
use testwatch_runner::{
    reconciler::{Reconciler, ReconcilerStats, ReconnectPolicy, SseTransport},
    store::{ActiveSelection, StateHandle, StateStore},
    user_config::{CONFIG_ENV, ConfigLocation, WatchConfig},
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// How often the connection status is logged.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// Watches a running test suite through its live event stream.
///
/// Prints the state of every test file each time it changes.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct TestwatchApp {
    /// Event stream URL [default: from config]
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Config file to use, or `none` to skip loading one
    #[arg(long, value_name = "PATH", env = CONFIG_ENV)]
    config: Option<String>,

    /// Only show files whose names fuzzy-match this pattern, best matches first
    #[arg(long, short = 'E', value_name = "PATTERN")]
    filter: Option<String>,

    /// Print the state once the first snapshot arrives, then exit
    #[arg(long)]
    once: bool,

    /// Print the state as JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    output: OutputOpts,
}

impl TestwatchApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let location = ConfigLocation::from_cli_or_env(self.config.as_deref());
        let mut config =
            WatchConfig::load(location).map_err(|error| ExpectedError::ConfigLoad { error })?;
        if let Some(url) = self.url {
            config
                .set_url(url)
                .map_err(|error| ExpectedError::ConfigLoad { error })?;
        }

        let transport = SseTransport::new(config.stream.url.clone(), config.stream.connect_timeout)
            .map_err(|error| ExpectedError::TransportSetup { error })?;

        let mut styles = RenderStyles::default();
        if !self.json && output.color.should_colorize(supports_color::Stream::Stdout) {
            styles.colorize();
        }
        let watch = Watch {
            render: RenderOpts {
                filter: self.filter,
                show_infos: config.display.show_infos,
                styles,
            },
            json: self.json,
            once: self.once,
            verbose: output.verbose,
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|error| ExpectedError::RuntimeBuild { error })?;
        runtime.block_on(watch.run(transport, config.reconnect_policy()))
    }
}

struct Watch {
    render: RenderOpts,
    json: bool,
    once: bool,
    verbose: bool,
}

impl Watch {
    async fn run(self, transport: SseTransport, policy: ReconnectPolicy) -> Result<i32> {
        info!(url = transport.url(), "watching event stream");

        let state = StateHandle::new();
        let mut revisions = state.subscribe();
        let mut reconciler = Reconciler::new(transport, state.clone(), policy);
        reconciler.start().await;

        let mut selection = ActiveSelection::new();
        let mut status_tick = tokio::time::interval(STATUS_INTERVAL);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ctrl_c = pin!(tokio::signal::ctrl_c());

        let result = loop {
            tokio::select! {
                biased;
                signal = &mut ctrl_c => {
                    break match signal {
                        Ok(()) => {
                            info!("interrupted, stopping");
                            Ok(TestwatchExitCode::OK)
                        }
                        Err(error) => Err(ExpectedError::SignalHandlerSetup { error }),
                    };
                }
                changed = revisions.changed() => {
                    if changed.is_err() {
                        // The state outlives this loop, so this is unreachable in practice.
                        break Ok(TestwatchExitCode::OK);
                    }
                    if let Err(error) = self.print(&state, &mut selection) {
                        break Err(error);
                    }
                    if self.once && !state.read(StateStore::is_empty) {
                        let errored = state.read(|store| store.summary().errored);
                        break Ok(if errored > 0 {
                            TestwatchExitCode::TEST_RUN_FAILED
                        } else {
                            TestwatchExitCode::OK
                        });
                    }
                }
                _ = status_tick.tick() => {
                    self.log_status(&reconciler.stats(), &state);
                }
            }
        };

        reconciler.stop().await;
        debug!(stats = ?reconciler.stats(), "reconciler stopped");
        result
    }

    fn print(&self, state: &StateHandle, selection: &mut ActiveSelection) -> Result<()> {
        let rendered = if self.json {
            state
                .read(|store| render_json(store, &self.render))
                .map_err(|error| ExpectedError::JsonSerialize { error })?
        } else {
            state.read(|store| render_text(store, &self.render, selection))
        };

        let mut stdout = io::stdout().lock();
        if !self.json {
            // Separate successive renders.
            writeln!(stdout).map_err(|error| ExpectedError::WriteOutput { error })?;
        }
        stdout
            .write_all(rendered.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|error| ExpectedError::WriteOutput { error })
    }

    fn log_status(&self, stats: &ReconcilerStats, state: &StateHandle) {
        let summary = state.read(StateStore::summary);
        if stats.subscriptions == 0 && stats.transport_failures > 0 {
            warn!(
                attempts = stats.transport_failures,
                "still waiting for the event stream to become available"
            );
        } else if self.verbose {
            info!(
                subscriptions = stats.subscriptions,
                events = stats.events_applied,
                dropped = stats.decode_failures,
                files = summary.files,
                running = summary.running,
                errored = summary.errored,
                "status"
            );
        }
    }
}
