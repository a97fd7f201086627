use clap::{Arg, ArgMatches, Command};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::comm::enhanced_config::SettingsOverrides;

pub type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// 命令注册器 trait，各模块实现此 trait 来注册命令
pub trait CommandModule {
    fn module_name(&self) -> &'static str;

    /// 模块提供的子命令
    fn register_commands(&self) -> Vec<Command>;

    fn handle_command(&self, command_name: &str, matches: &ArgMatches) -> CommandResult;
}

/// 命令注册器，进程内单例
#[derive(Default)]
pub struct CommandRegistry {
    modules: BTreeMap<String, Box<dyn CommandModule + Send + Sync>>,
}

impl CommandRegistry {
    pub fn instance() -> &'static Mutex<CommandRegistry> {
        static INSTANCE: OnceLock<Mutex<CommandRegistry>> = OnceLock::new();
        INSTANCE.get_or_init(|| Mutex::new(CommandRegistry::default()))
    }

    pub fn register_module(&mut self, module: Box<dyn CommandModule + Send + Sync>) {
        self.modules.insert(module.module_name().to_string(), module);
    }

    /// 内置 `server`、`version`，再加上各模块的命令
    pub fn build_app(&self) -> Command {
        let mut app = Command::new("gac-admin")
            .version(env!("CARGO_PKG_VERSION"))
            .about("GAC 后台管理服务")
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommand(server_command())
            .subcommand(Command::new("version").about("显示版本信息"));

        for module in self.modules.values() {
            for command in module.register_commands() {
                app = app.subcommand(command);
            }
        }
        app
    }

    pub fn handle_command(&self, command_name: &str, matches: &ArgMatches) -> CommandResult {
        for module in self.modules.values() {
            if module
                .register_commands()
                .iter()
                .any(|command| command.get_name() == command_name)
            {
                return module.handle_command(command_name, matches);
            }
        }
        Err(format!("未找到处理命令 '{}' 的模块", command_name).into())
    }
}

/// 未指定的参数不覆盖配置文件中的值
fn server_command() -> Command {
    Command::new("server")
        .about("启动 Web 服务器")
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("监听地址"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("监听端口")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("WORKERS")
                .help("工作线程数")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("启用调试模式")
                .action(clap::ArgAction::SetTrue),
        )
}

/// `server` 子命令的参数
pub fn server_overrides(matches: &ArgMatches) -> SettingsOverrides {
    SettingsOverrides {
        host: matches.get_one::<String>("host").cloned(),
        port: matches.get_one::<u16>("port").copied(),
        workers: matches.get_one::<usize>("workers").copied(),
        debug: matches.get_flag("debug"),
    }
}

pub fn register_module(module: Box<dyn CommandModule + Send + Sync>) {
    CommandRegistry::instance().lock().register_module(module);
}

pub fn build_app() -> Command {
    CommandRegistry::instance().lock().build_app()
}

pub fn handle_command(command_name: &str, matches: &ArgMatches) -> CommandResult {
    CommandRegistry::instance()
        .lock()
        .handle_command(command_name, matches)
}
