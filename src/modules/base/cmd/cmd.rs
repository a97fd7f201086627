use clap::{Arg, ArgMatches, Command};

use crate::command_registry::{CommandModule, CommandResult};
use crate::comm::enhanced_config::EnhancedConfigManager;
use crate::comm::env_config;

const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Base 模块的命令：生成密码哈希、查看配置
pub struct BaseCommands;

impl CommandModule for BaseCommands {
    fn module_name(&self) -> &'static str {
        "base"
    }

    fn register_commands(&self) -> Vec<Command> {
        vec![
            Command::new("hash-password")
                .about("生成 bcrypt 密码哈希，用于初始化用户")
                .arg(Arg::new("password").required(true).value_name("PASSWORD"))
                .arg(
                    Arg::new("cost")
                        .long("cost")
                        .value_name("COST")
                        .help("bcrypt 计算成本 (4-31)")
                        .value_parser(clap::value_parser!(u32).range(4..=31)),
                ),
            Command::new("config")
                .about("显示当前配置（密钥已屏蔽）")
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("FORMAT")
                        .help("输出格式 (json|text)")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        ]
    }

    fn handle_command(&self, command_name: &str, matches: &ArgMatches) -> CommandResult {
        match command_name {
            "hash-password" => {
                let password = matches
                    .get_one::<String>("password")
                    .ok_or("缺少密码参数")?;
                let cost = matches
                    .get_one::<u32>("cost")
                    .copied()
                    .unwrap_or(DEFAULT_BCRYPT_COST);
                println!("{}", bcrypt::hash(password, cost)?);
            }
            "config" => {
                let gac = env_config::load();
                let manager = EnhancedConfigManager::new(&gac)?;
                let report = manager.report(&gac);
                match matches.get_one::<String>("format").map(String::as_str) {
                    Some("json") => println!("{}", serde_json::to_string_pretty(&report)?),
                    _ => print_text_report(&report),
                }
            }
            _ => return Err(format!("未知命令: {}", command_name).into()),
        }
        Ok(())
    }
}

/// 每行一个 `路径 = 值`
fn print_text_report(report: &serde_json::Value) {
    let mut lines = Vec::new();
    flatten("", report, &mut lines);
    for (key, value) in lines {
        println!("{} = {}", key, value);
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

pub fn register_base_commands() {
    crate::command_registry::register_module(Box::new(BaseCommands));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_password_command_parses() {
        let commands = BaseCommands.register_commands();
        let hash = commands
            .iter()
            .find(|c| c.get_name() == "hash-password")
            .unwrap()
            .clone();
        let matches = hash
            .clone()
            .try_get_matches_from(["hash-password", "secreto", "--cost", "4"])
            .unwrap();
        assert_eq!(matches.get_one::<u32>("cost"), Some(&4));
        assert!(hash.try_get_matches_from(["hash-password", "x", "--cost", "2"]).is_err());
    }

    #[test]
    fn test_flatten_report() {
        let mut lines = Vec::new();
        flatten(
            "",
            &json!({"server": {"host": "0.0.0.0", "port": 8080}, "warnings": []}),
            &mut lines,
        );
        assert_eq!(
            lines,
            vec![
                ("server.host".to_string(), "0.0.0.0".to_string()),
                ("server.port".to_string(), "8080".to_string()),
                ("warnings".to_string(), "[]".to_string()),
            ]
        );
    }
}
