#![warn(clippy::pedantic)]

pub mod preferences;
mod report;

use anyhow::Result as AnyResult;

fn main() -> AnyResult<()> {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        let _ = simple_logging::log_to_file("log.out", log::LevelFilter::Debug);
    }

    let preferences = preferences::Preferences::get();
    if preferences.did_fail_to_load() {
        log::info!("Using default preferences.");
    }
    if let Err(e) = preferences.save() {
        log::warn!("Failed to save preferences:\n{e:?}");
    };

    let loaded = {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
        // Args are a simple list of bookmark documents to check.
        // Paths are OSStrings, let the system handle character encoding restrictions.
        let paths: Vec<std::path::PathBuf> = std::env::args_os().skip(1).map(Into::into).collect();
        paths
            .into_par_iter()
            .map(|path| {
                let result = viewmark_core::io::load(&path);
                (path, result)
            })
            .collect::<Vec<_>>()
    };

    // Did we have at least one success? No paths is a success.
    let mut had_success = loaded.is_empty();
    for (path, result) in loaded {
        match result {
            Err(e) => {
                log::error!("failed to open file {path:?}: {e:#}");
            }
            Ok(store) => {
                had_success = true;
                print!("{}", report::Report::new(&path, &store, &preferences.config));
            }
        }
    }
    if !had_success {
        anyhow::bail!("Failed to load any provided document.");
    }
    Ok(())
}
