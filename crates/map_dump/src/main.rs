use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use map_dump::{run, CommandKind, DumpOptions};
use tile_engine::world::BlockCoord;

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = DumpOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--root" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --root".to_string())?;
                options.root = Some(PathBuf::from(value));
                index += 2;
            }
            "--light" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --light".to_string())?;
                let radius = value
                    .parse::<u8>()
                    .map_err(|_| format!("invalid --light value '{value}' (expected u8)"))?;
                options.light = Some(radius);
                index += 2;
            }
            "--under-cover" => {
                options.under_cover = true;
                index += 1;
            }
            "--terrain" => {
                options.terrain_only = true;
                index += 1;
            }
            "--bridge" => {
                options.flags.bridge_built = true;
                index += 1;
            }
            "--secret-passage" => {
                options.flags.secret_passage_found = true;
                index += 1;
            }
            "--princess-rescued" => {
                options.flags.princess_rescued = true;
                index += 1;
            }
            "--final-battle" => {
                options.flags.final_battle_active = true;
                index += 1;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "list" => {
            if !command_args.is_empty() {
                return Err("list takes no arguments".to_string());
            }
            CommandKind::List
        }
        "render" => {
            let (map, rest) = command_args
                .split_first()
                .ok_or_else(|| "render requires a map id or name".to_string())?;
            let at = match rest {
                [] => None,
                [flag, value] if flag == "--at" => Some(parse_coord(value)?),
                _ => return Err("render accepts only '--at <x>,<y>' after the map".to_string()),
            };
            CommandKind::Render {
                map: map.clone(),
                at,
            }
        }
        "probe" => {
            let [map, x, y] = command_args else {
                return Err("probe requires <map> <x> <y>".to_string());
            };
            CommandKind::Probe {
                map: map.clone(),
                x: x.parse::<i32>()
                    .map_err(|_| format!("invalid x '{x}' (expected i32)"))?,
                y: y.parse::<i32>()
                    .map_err(|_| format!("invalid y '{y}' (expected i32)"))?,
            }
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, options, &mut io::stdout())
}

fn parse_coord(raw: &str) -> Result<BlockCoord, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("invalid coordinate '{raw}' (expected <x>,<y>)"))?;
    let x = x
        .trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid coordinate '{raw}' (expected <x>,<y>)"))?;
    let y = y
        .trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid coordinate '{raw}' (expected <x>,<y>)"))?;
    Ok(BlockCoord::new(x, y))
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "map_dump - offline tile world inspection",
        "",
        "Usage:",
        "  map_dump [options] list",
        "  map_dump [options] render <map> [--at <x>,<y>]",
        "  map_dump [options] probe <map> <x> <y>",
        "",
        "Options:",
        "  --root <dir>          project root (default: TILEWORLD_ROOT or discovery)",
        "  --light <u8>          dungeon light radius (default 1)",
        "  --under-cover         view from under a roof",
        "  --terrain             render collision terrain instead of the display",
        "  --bridge --secret-passage --princess-rescued --final-battle",
        "                        quest flags applied while resolving",
    ]
    .join("\n")
}
