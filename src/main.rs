// SPDX-License-Identifier: GPL-3.0-only

use calloop::{
    timer::{TimeoutAction, Timer},
    EventLoop,
};
use clap_lex::{ArgCursor, RawArgs};
use cosmic_frame_sync::{
    config::Config,
    logger,
    state::{Options, State},
};
use std::{error::Error, process};
use tracing::{error, info};

fn main() {
    if let Err(err) = main_inner() {
        error!("Error occured in main(): {}", err);
        eprintln!("cosmic-frame-sync: {}", err);
        process::exit(1);
    }
}

fn main_inner() -> Result<(), Box<dyn Error>> {
    let raw_args = RawArgs::from_args();
    let mut cursor = raw_args.cursor();
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let mut options = Options::default();

    // Parse the arguments
    while let Some(arg) = raw_args.next_os(&mut cursor) {
        match arg.to_str() {
            Some("--help") | Some("-h") => {
                print_help(env!("CARGO_PKG_VERSION"), git_hash);
                return Ok(());
            }
            Some("--version") | Some("-V") => {
                println!(
                    "cosmic-frame-sync {} (git commit {})",
                    env!("CARGO_PKG_VERSION"),
                    git_hash
                );
                return Ok(());
            }
            Some("--frames") => options.frames = value(&raw_args, &mut cursor, "--frames")?,
            Some("--fullscreen-every") => {
                options.fullscreen_every = value(&raw_args, &mut cursor, "--fullscreen-every")?
            }
            Some("--fixed") => options.fixed = true,
            _ => return Err(format!("unexpected argument {:?}, see --help", arg).into()),
        }
    }

    // setup logger
    logger::init_logger()?;
    info!(?options, "Starting frame sync simulation");

    let config = Config::load();
    let mut event_loop = EventLoop::<State>::try_new()?;
    let mut state = State::new(config, options, Some(event_loop.get_signal()));

    for idx in 0..state.outputs.len() {
        event_loop
            .handle()
            .insert_source(Timer::immediate(), move |_, _, state| {
                match state.render_output(idx) {
                    Ok(Some(next)) => TimeoutAction::ToDuration(next),
                    Ok(None) => TimeoutAction::Drop,
                    Err(err) => {
                        error!(?err, "Failed to render frame");
                        state.stop();
                        TimeoutAction::Drop
                    }
                }
            })
            .map_err(|err| format!("Failed to insert frame timer: {}", err.error))?;
    }

    event_loop.run(None, &mut state, |_| {})?;
    Ok(())
}

fn value<T>(raw_args: &RawArgs, cursor: &mut ArgCursor, flag: &str) -> Result<T, Box<dyn Error>>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
{
    let value = raw_args
        .next_os(cursor)
        .and_then(|value| value.to_str())
        .ok_or_else(|| format!("{} expects a value", flag))?;
    Ok(value.parse::<T>()?)
}

fn print_help(version: &str, git_rev: &str) {
    println!(
        r#"cosmic-frame-sync {version} (git commit {git_rev})
System76 <info@system76.com>

Drives simulated outputs through the variable refresh rate handling
of the cosmic KMS backend.

Options:
  -h, --help                  Show this message
  -V, --version               Show the version of cosmic-frame-sync
      --frames <N>            Number of frames to render (default: 600)
      --fullscreen-every <N>  Toggle fullscreen every N frames, 0 disables (default: 120)
      --fixed                 Simulate a fixed refresh rate external output"#
    );
}
