use reproducible_common::config::NotifyConfig;
use reproducible_common::errors::*;
use std::process::Command;

/// Relays human readable status messages to the operators.
pub trait Notify {
    fn notify(&self, message: &str) -> Result<()>;
}

/// Used when no notification command is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notify for LogNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        info!("Notification: {}", message);
        Ok(())
    }
}

/// Runs a command with the message appended as last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNotifier {
    argv: Vec<String>,
}

impl CommandNotifier {
    pub fn new(argv: Vec<String>) -> Result<CommandNotifier> {
        if argv.is_empty() {
            bail!("Notification command must not be empty");
        }
        Ok(CommandNotifier { argv })
    }
}

impl Notify for CommandNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        let (bin, args) = self
            .argv
            .split_first()
            .ok_or_else(|| anyhow!("Notification command is empty"))?;
        debug!("Running notification command: {:?}", self.argv);
        let status = Command::new(bin)
            .args(args)
            .arg(message)
            .status()
            .with_context(|| anyhow!("Failed to run notification command {:?}", bin))?;
        if !status.success() {
            bail!("Notification command {:?} failed: {}", bin, status);
        }
        Ok(())
    }
}

pub fn from_config(config: &NotifyConfig) -> Result<Box<dyn Notify>> {
    match &config.command {
        Some(argv) => Ok(Box::new(CommandNotifier::new(argv.clone())?)),
        None => Ok(Box::new(LogNotifier)),
    }
}

/// Send a message, failures are logged since the database is already updated at this point.
pub fn send(notifier: &dyn Notify, message: &str) {
    if let Err(err) = notifier.notify(message) {
        error!("Failed to send notification: {:#}", err);
    }
}
