//! Builds the console sinks and host executor for a run

use fansh_core::{CoreError, RunConfig};
use fansh_exec::{CommandTemplate, Console, ConsoleSink, SshExecutor, StreamClass};

/// Everything a run needs besides the host source
pub struct RunParts {
    /// Sink for host stdout, colored with the ok color
    pub out: ConsoleSink,
    /// Sink for host stderr and failures, colored with the failed color
    pub err: ConsoleSink,
    pub executor: SshExecutor,
}

/// Wire the config onto a console
///
/// # Errors
/// Returns error if the command is empty or a color does not parse
pub fn build(
    config: &RunConfig,
    command: Vec<String>,
    console: &Console,
) -> Result<RunParts, CoreError> {
    let command = CommandTemplate::new(command);
    if command.is_empty() {
        return Err(CoreError::EmptyCommand);
    }

    let out = console.sink(StreamClass::Normal, config.ok_color()?);
    let err = console.sink(StreamClass::Error, config.failed_color()?);

    let executor = SshExecutor::new(config.ssh_options(), command, out.clone(), err.clone())
        .with_program(config.program.clone());

    Ok(RunParts { out, err, executor })
}

#[cfg(test)]
mod tests {
    use super::*;

    use fansh_exec::MemoryWriter;

    fn console() -> Console {
        Console::new(MemoryWriter::new(), MemoryWriter::new(), false)
    }

    #[test]
    fn test_build_uses_configured_program() {
        let mut config = RunConfig::default();
        config.program = "/usr/bin/ssh".into();

        let parts = build(&config, vec!["uptime".into()], &console()).unwrap();
        assert_eq!(parts.executor.program(), "/usr/bin/ssh");
        assert_eq!(parts.out.class(), StreamClass::Normal);
        assert_eq!(parts.err.class(), StreamClass::Error);
    }

    #[test]
    fn test_build_rejects_empty_command() {
        let result = build(&RunConfig::default(), vec![], &console());
        assert!(matches!(result, Err(CoreError::EmptyCommand)));
    }
}
