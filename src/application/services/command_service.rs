use std::sync::RwLock;

use crate::application::errors::CommandError;
use crate::domain::entities::{Command, CommandRegistry};

/// Service for managing and executing commands
pub struct CommandService {
    registry: RwLock<CommandRegistry>,
    prefix: String,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: RwLock::new(CommandRegistry::new()),
            prefix: prefix.into(),
        }
    }

    pub fn register(&self, command: Command) -> Result<(), CommandError> {
        let mut registry = self.registry.write()
            .map_err(|_| CommandError::Internal("Lock poisoned".to_string()))?;
        registry.register(command)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.registry.write()
            .map(|mut r| r.unregister(name).is_some())
            .unwrap_or(false)
    }

    /// Remove all commands registered by a module
    pub fn unregister_owner(&self, owner: &str) -> usize {
        self.registry.write()
            .map(|mut r| r.unregister_owner(owner))
            .unwrap_or(0)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.read()
            .map(|r| r.find(name).is_some())
            .unwrap_or(false)
    }

    /// Handle one input line. Returns `Ok(None)` when the line is not a command.
    pub fn handle(&self, line: &str) -> Result<Option<String>, CommandError> {
        let Some(rest) = line.trim().strip_prefix(&self.prefix) else {
            return Ok(None);
        };

        let mut parts = rest.split_whitespace();
        let Some(name) = parts.next() else {
            return Ok(None);
        };
        let args: Vec<String> = parts.map(str::to_string).collect();

        // Clone the handler out so it runs without holding the lock
        let (cmd_name, handler) = {
            let registry = self.registry.read()
                .map_err(|_| CommandError::Internal("Lock poisoned".to_string()))?;
            let cmd = registry.find(name)
                .ok_or_else(|| CommandError::NotFound(name.to_string()))?;
            (cmd.name.clone(), cmd.handler.clone())
        };

        match handler {
            Some(handler) => Ok(Some(handler(&args)?)),
            None => Ok(Some(format!("Command {} not implemented", cmd_name))),
        }
    }

    pub fn get_help(&self, command: Option<&str>) -> String {
        let Ok(registry) = self.registry.read() else {
            return String::new();
        };

        if let Some(name) = command {
            if let Some(cmd) = registry.find(name) {
                let mut help = format!("{}{} - {}", self.prefix, cmd.name, cmd.description.as_deref().unwrap_or("No description"));
                if let Some(usage) = &cmd.usage {
                    help.push_str(&format!("\nUsage: {}", usage));
                }
                return help;
            }
            return format!("Command {}{} not found", self.prefix, name);
        }

        let mut commands: Vec<&Command> = registry.all().collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));

        let mut help = "Available commands:\n".to_string();
        for cmd in commands {
            help.push_str(&format!("  {}{} - {}\n", self.prefix, cmd.name, cmd.description.as_deref().unwrap_or("")));
        }
        help
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
