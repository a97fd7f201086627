use clap::ArgMatches;
use std::error::Error;

use gac_admin::{build_app, handle_command, init_commands, server_overrides, AppBootstrap};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 环境变量优先于 .env
    dotenvy::dotenv().ok();

    init_commands();
    let matches: ArgMatches = build_app().get_matches();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            AppBootstrap::new()
                .with_overrides(server_overrides(sub_matches))
                .run()
                .await?;
        }
        Some(("version", _)) => {
            println!("gac-admin v{}", env!("CARGO_PKG_VERSION"));
        }
        Some((command_name, sub_matches)) => {
            if let Err(e) = handle_command(command_name, sub_matches) {
                eprintln!("处理命令 '{}' 时出错: {}", command_name, e);
                std::process::exit(1);
            }
        }
        None => {
            eprintln!("未知命令，请使用 --help 查看可用命令");
            std::process::exit(1);
        }
    }

    Ok(())
}
