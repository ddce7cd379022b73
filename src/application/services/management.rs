//! Management commands - inspect and control modules from the console

use crate::application::errors::CommandError;
use crate::plugins::{LifecycleState, ModuleContainer, PluginManager};

/// Commands the host handles itself, before module commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementCommand {
    /// `plugins` - every module with its state
    List,
    /// `plugin <id>` - details of one module
    Info(String),
    /// `enable <id>`
    Enable(String),
    /// `disable <id>`
    Disable(String),
    /// `help [command]`
    Help(Option<String>),
    /// `stop` - shut the host down
    Stop,
}

/// What the console should do after a line was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Stop,
    /// Blank line or nothing matched
    Nothing,
}

impl ManagementCommand {
    /// Parse a console line. The command prefix is optional on the console.
    ///
    /// Returns `Ok(None)` for lines that are not management commands.
    pub fn parse(line: &str, prefix: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        let line = if prefix.is_empty() {
            line
        } else {
            line.strip_prefix(prefix).unwrap_or(line)
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((name, args)) = parts.split_first() else {
            return Ok(None);
        };
        let arg = args.first().map(|s| s.to_string());

        let command = match name.to_lowercase().as_str() {
            "plugins" | "pl" => ManagementCommand::List,
            "plugin" => ManagementCommand::Info(require(arg, "plugin <id>")?),
            "enable" => ManagementCommand::Enable(require(arg, "enable <id>")?),
            "disable" => ManagementCommand::Disable(require(arg, "disable <id>")?),
            "help" | "?" => ManagementCommand::Help(arg),
            "stop" | "exit" | "quit" => ManagementCommand::Stop,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn require(arg: Option<String>, usage: &str) -> Result<String, CommandError> {
    arg.ok_or_else(|| CommandError::InvalidArgs(format!("usage: {}", usage)))
}

/// Run a management command against the manager
pub fn execute(manager: &mut PluginManager, command: ManagementCommand) -> Reply {
    match command {
        ManagementCommand::List => Reply::Text(list_modules(manager)),
        ManagementCommand::Info(id) => match manager.get(&id) {
            Some(container) => Reply::Text(describe(container)),
            None => Reply::Text(format!("Unknown module: {}", id)),
        },
        ManagementCommand::Enable(id) => match manager.enable(&id) {
            Ok(()) => Reply::Text(format!("Enabled {}", id)),
            Err(e) => Reply::Text(format!("Error: {}", e)),
        },
        ManagementCommand::Disable(id) => match manager.disable(&id) {
            Ok(()) => Reply::Text(format!("Disabled {}", id)),
            Err(e) => Reply::Text(format!("Error: {}", e)),
        },
        ManagementCommand::Help(Some(name)) => Reply::Text(manager.host().commands().get_help(Some(&name))),
        ManagementCommand::Help(None) => {
            let mut help = String::from("Host commands:\n");
            help.push_str("  plugins - List modules and their state\n");
            help.push_str("  plugin <id> - Show module details\n");
            help.push_str("  enable <id> - Enable a module\n");
            help.push_str("  disable <id> - Disable a module\n");
            help.push_str("  stop - Shut down\n");
            help.push_str(&manager.host().commands().get_help(None));
            Reply::Text(help)
        }
        ManagementCommand::Stop => Reply::Stop,
    }
}

/// Handle one console line: management commands first, then module commands
pub fn dispatch(manager: &mut PluginManager, line: &str) -> Reply {
    let prefix = manager.host().commands().prefix().to_string();

    match ManagementCommand::parse(line, &prefix) {
        Ok(Some(command)) => return execute(manager, command),
        Ok(None) => {}
        Err(e) => return Reply::Text(format!("Error: {}", e)),
    }

    let line = line.trim();
    if line.is_empty() {
        return Reply::Nothing;
    }
    let command_line = if line.starts_with(&prefix) {
        line.to_string()
    } else {
        format!("{}{}", prefix, line)
    };

    match manager.host().commands().handle(&command_line) {
        Ok(Some(output)) => Reply::Text(output),
        Ok(None) => Reply::Nothing,
        Err(CommandError::NotFound(name)) => Reply::Text(format!("Unknown command: {} (try 'help')", name)),
        Err(e) => Reply::Text(format!("Error: {}", e)),
    }
}

fn list_modules(manager: &PluginManager) -> String {
    let modules = manager.list();
    if modules.is_empty() {
        return "No modules".to_string();
    }

    let enabled = modules.iter().filter(|c| c.state() == LifecycleState::Enabled).count();
    let mut out = format!("Modules ({} enabled of {}):\n", enabled, modules.len());
    for container in modules {
        let desc = container.descriptor();
        out.push_str(&format!("  {} v{} [{}]", desc.id, desc.version, container.state()));
        if let Some(error) = container.last_error() {
            out.push_str(&format!(" - {}", error));
        }
        out.push('\n');
    }
    out
}

fn describe(container: &ModuleContainer) -> String {
    let desc = container.descriptor();
    let mut out = format!("{} ({}) v{}\n", desc.display_name, desc.id, desc.version);
    out.push_str(&format!("  State: {}\n", container.state()));
    if !desc.authors.is_empty() {
        out.push_str(&format!("  Authors: {}\n", desc.authors.join(", ")));
    }
    if !desc.description.is_empty() {
        out.push_str(&format!("  Description: {}\n", desc.description));
    }
    if !desc.website.is_empty() {
        out.push_str(&format!("  Website: {}\n", desc.website));
    }
    if !desc.dependencies.is_empty() {
        let deps: Vec<String> = desc
            .dependencies
            .iter()
            .map(|d| {
                let mut s = d.id.clone();
                if !d.version.is_any() {
                    s.push_str(&format!(" {}", d.version));
                }
                if d.optional {
                    s.push_str(" (optional)");
                }
                s
            })
            .collect();
        out.push_str(&format!("  Depends: {}\n", deps.join(", ")));
    }
    if let Some(since) = container.enabled_at() {
        out.push_str(&format!("  Enabled since: {}\n", since.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    out.push_str(&format!("  Artifact: {}\n", container.artifact().path.display()));
    if let Some(error) = container.last_error() {
        out.push_str(&format!("  Last error: {}\n", error));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::ModuleError;
    use crate::application::host::HostContext;
    use crate::domain::entities::Command;
    use crate::domain::traits::Module;
    use crate::infrastructure::plugins::BuiltinLoader;
    use crate::plugins::ModuleContext;

    struct Greeter;

    impl Module for Greeter {
        fn enable(&mut self, ctx: &mut ModuleContext) -> Result<(), ModuleError> {
            ctx.register_command(
                Command::new("hello")
                    .with_description("Say hello")
                    .with_handler(|args| Ok(format!("hello {}", args.join(" ")))),
            )
        }
    }

    fn manager() -> (tempfile::TempDir, PluginManager) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("greeter.yml"),
            "id: greeter\ndisplay-name: Greeter\nversion: 2\nauthors: [sam]\n",
        )
        .unwrap();

        let mut manager = PluginManager::new(HostContext::in_memory())
            .with_loader(BuiltinLoader::new().with("greeter", || Box::new(Greeter)));
        manager.scan(dir.path());
        manager.load_all().unwrap();
        (dir, manager)
    }

    #[test]
    fn test_parse() {
        assert_eq!(ManagementCommand::parse("plugins", "!").unwrap(), Some(ManagementCommand::List));
        assert_eq!(
            ManagementCommand::parse("!enable music", "!").unwrap(),
            Some(ManagementCommand::Enable("music".to_string()))
        );
        assert_eq!(ManagementCommand::parse("help", "!").unwrap(), Some(ManagementCommand::Help(None)));
        assert_eq!(ManagementCommand::parse("  ", "!").unwrap(), None);
        assert_eq!(ManagementCommand::parse("hello world", "!").unwrap(), None);
        assert!(matches!(ManagementCommand::parse("disable", "!"), Err(CommandError::InvalidArgs(_))));
    }

    #[test]
    fn test_enable_and_list() {
        let (_dir, mut manager) = manager();

        assert_eq!(dispatch(&mut manager, "enable greeter"), Reply::Text("Enabled greeter".to_string()));
        let Reply::Text(list) = dispatch(&mut manager, "plugins") else {
            panic!("expected text");
        };
        assert!(list.contains("greeter v2 [enabled]"));

        let Reply::Text(info) = dispatch(&mut manager, "plugin greeter") else {
            panic!("expected text");
        };
        assert!(info.starts_with("Greeter (greeter) v2"));
        assert!(info.contains("Authors: sam"));
    }

    #[test]
    fn test_module_commands_follow_module_state() {
        let (_dir, mut manager) = manager();
        manager.enable("greeter").unwrap();

        assert_eq!(dispatch(&mut manager, "!hello there"), Reply::Text("hello there".to_string()));
        assert_eq!(dispatch(&mut manager, "hello you"), Reply::Text("hello you".to_string()));

        dispatch(&mut manager, "disable greeter");
        assert!(matches!(dispatch(&mut manager, "hello"), Reply::Text(t) if t.starts_with("Unknown command")));
    }

    #[test]
    fn test_stop_and_unknown_module() {
        let (_dir, mut manager) = manager();
        assert_eq!(dispatch(&mut manager, "stop"), Reply::Stop);
        assert_eq!(dispatch(&mut manager, ""), Reply::Nothing);
        assert_eq!(dispatch(&mut manager, "plugin ghost"), Reply::Text("Unknown module: ghost".to_string()));
        assert!(matches!(dispatch(&mut manager, "enable ghost"), Reply::Text(t) if t.starts_with("Error")));
    }
}
