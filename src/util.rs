use std::env;
use std::process::Command as ProcessCommand;
use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Install the stderr subscriber. Levels come from `OLDEST_LOG`
/// (e.g. `OLDEST_LOG=oldest_watch=debug`), defaulting to `oldest_watch=info`.
pub(crate) fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        let fallback = if verbose {
            "oldest_watch=debug"
        } else {
            "oldest_watch=info"
        };
        let filter =
            EnvFilter::try_from_env("OLDEST_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .init();
    });
}

/// Unset and whitespace-only variables are both `None`.
pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn build_external_command(program: &str, args: &[String]) -> ProcessCommand {
    let mut cmd = ProcessCommand::new(program);
    cmd.args(args);

    // Own process group, so a hung mail command can be killed without the parent.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_optional_unset() {
        assert_eq!(env_optional("OLDEST_WATCH_TEST_SURELY_UNSET_VAR"), None);
    }

    #[test]
    fn test_build_external_command() {
        let cmd = build_external_command("himalaya", &["template".into(), "send".into()]);
        assert_eq!(cmd.get_program(), "himalaya");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, vec!["template", "send"]);
    }
}
