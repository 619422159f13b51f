//! Offline inspection of persisted warden state.
//!
//! Loads an [`EngineState`] JSON file into a fresh engine and answers the
//! same questions a platform adapter would ask.

use std::path::{Path, PathBuf};

use eyre::{WrapErr, bail, eyre};
use serde_json::{Value, json};
use tracing::info;
use warden_engine::{Engine, EngineConfig, EngineState};
use warden_geom::Point;
use warden_region::{FlagKey, FlagRegistry, RegionId, RegionRecord};

pub const USAGE: &str = "\
usage: warden-inspect [--config CONFIG.json] STATE.json COMMAND

commands:
  summary                           region count and global flags
  resolve WORLD X Y Z FLAG          decide FLAG at a point
  regions-at WORLD X Y Z            regions containing a point
  region ID                         one region with its ancestors";

/// What to do once the state is loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Summary,
    Resolve { point: Point, flag: FlagKey },
    RegionsAt { point: Point },
    Region { id: RegionId },
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config: Option<PathBuf>,
    pub state: PathBuf,
    pub command: Command,
}

fn coord(raw: Option<String>, axis: &str) -> eyre::Result<f64> {
    let raw = raw.ok_or_else(|| eyre!("missing {axis} coordinate"))?;
    raw.parse()
        .wrap_err_with(|| format!("bad {axis} coordinate {raw:?}"))
}

fn point(args: &mut impl Iterator<Item = String>) -> eyre::Result<Point> {
    let world = args.next().ok_or_else(|| eyre!("missing world"))?;
    let x = coord(args.next(), "x")?;
    let y = coord(args.next(), "y")?;
    let z = coord(args.next(), "z")?;
    Ok(Point::new(world.as_str(), x, y, z))
}

/// Parse arguments, not including the program name.
pub fn parse_args(args: impl IntoIterator<Item = String>) -> eyre::Result<Invocation> {
    let mut args = args.into_iter().peekable();

    let mut config = None;
    if args.peek().is_some_and(|a| a == "--config") {
        args.next();
        let path = args.next().ok_or_else(|| eyre!("--config needs a path"))?;
        config = Some(PathBuf::from(path));
    }

    let state = PathBuf::from(args.next().ok_or_else(|| eyre!("missing state file"))?);
    let command = match args.next().as_deref() {
        None | Some("summary") => Command::Summary,
        Some("resolve") => {
            let point = point(&mut args)?;
            let flag = args.next().ok_or_else(|| eyre!("missing flag"))?;
            Command::Resolve {
                point,
                flag: FlagKey::new(flag),
            }
        }
        Some("regions-at") => Command::RegionsAt {
            point: point(&mut args)?,
        },
        Some("region") => Command::Region {
            id: RegionId::new(args.next().ok_or_else(|| eyre!("missing region id"))?),
        },
        Some(other) => bail!("unknown command {other:?}"),
    };

    if let Some(extra) = args.next() {
        bail!("unexpected argument {extra:?}");
    }

    Ok(Invocation {
        config,
        state,
        command,
    })
}

/// Read an [`EngineState`] from a JSON file.
pub fn load_state(path: &Path) -> eyre::Result<EngineState> {
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    let state = EngineState::from_json(&json)
        .wrap_err_with(|| format!("parsing {}", path.display()))?;
    info!(
        path = %path.display(),
        regions = state.regions.len(),
        "loaded state"
    );
    Ok(state)
}

/// Read an [`EngineConfig`], or use the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> eyre::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).wrap_err_with(|| format!("parsing {}", path.display()))
}

/// Build an engine from files on disk, with the standard flag registry.
pub fn open(state: &Path, config: Option<&Path>) -> eyre::Result<Engine> {
    let config = load_config(config)?;
    let state = load_state(state)?;
    Ok(Engine::from_state(config, FlagRegistry::standard(), state)?)
}

/// Run a command, producing the JSON to print.
pub fn run(engine: &Engine, command: &Command) -> eyre::Result<Value> {
    let out = match command {
        Command::Summary => {
            let state = engine.export_state();
            json!({
                "regions": state.regions.len(),
                "global": state.global,
            })
        }
        Command::Resolve { point, flag } => {
            let decision = engine.resolve(point, flag);
            json!({
                "point": [point.world().as_str(), point.x(), point.y(), point.z()],
                "flag": flag,
                "decision": decision,
            })
        }
        Command::RegionsAt { point } => json!(engine.regions_at_point(point)),
        Command::Region { id } => {
            let region = engine
                .region(id)
                .ok_or_else(|| eyre!("no region {id}"))?;
            json!({
                "region": RegionRecord::from(region.as_ref()),
                "ancestors": engine.ancestors(id),
                "descendants": engine.descendants(id),
            })
        }
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    const STATE: &str = r#"{
        "global": { "can_break": { "state": "allow" } },
        "regions": [
            {
                "id": "spawn",
                "world": "overworld",
                "shape": { "kind": "cuboid", "min": [-10.0, 0.0, -10.0], "max": [10.0, 255.0, 10.0] },
                "priority": 2,
                "flags": { "can_break": { "state": "deny" } }
            },
            {
                "id": "shop",
                "world": "overworld",
                "shape": { "kind": "sphere", "center": [0.0, 64.0, 0.0], "radius": 4.0 },
                "parents": ["spawn"]
            }
        ]
    }"#;

    #[test]
    fn test_parse_resolve() {
        let inv = parse_args(args("--config c.json s.json resolve overworld 1 64 -2.5 can_break"))
            .unwrap();
        assert_eq!(inv.config, Some(PathBuf::from("c.json")));
        assert_eq!(inv.state, PathBuf::from("s.json"));
        assert_eq!(
            inv.command,
            Command::Resolve {
                point: Point::new("overworld", 1.0, 64.0, -2.5),
                flag: FlagKey::new("can_break"),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(args("")).is_err());
        assert!(parse_args(args("s.json resolve overworld 1 two 3 f")).is_err());
        assert!(parse_args(args("s.json fly")).is_err());
        assert!(parse_args(args("s.json summary extra")).is_err());
        assert_eq!(parse_args(args("s.json")).unwrap().command, Command::Summary);
    }

    #[test]
    fn test_load_and_query() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(STATE.as_bytes()).unwrap();

        let engine = open(file.path(), None).unwrap();
        assert_eq!(engine.region_count(), 2);

        let out = run(
            &engine,
            &Command::Resolve {
                point: Point::new("overworld", 0.0, 64.0, 0.0),
                flag: FlagKey::new("can_break"),
            },
        )
        .unwrap();
        assert_eq!(out["decision"]["verdict"], "deny");
        assert_eq!(out["decision"]["source"]["id"], "spawn");

        let out = run(
            &engine,
            &Command::RegionsAt {
                point: Point::new("overworld", 0.0, 64.0, 0.0),
            },
        )
        .unwrap();
        assert_eq!(out, json!(["spawn", "shop"]));

        let out = run(
            &engine,
            &Command::Region {
                id: RegionId::new("shop"),
            },
        )
        .unwrap();
        assert_eq!(out["ancestors"], json!(["spawn"]));

        // Outside spawn the persisted global value applies.
        let out = run(
            &engine,
            &Command::Resolve {
                point: Point::new("overworld", 100.0, 64.0, 0.0),
                flag: FlagKey::new("can_break"),
            },
        )
        .unwrap();
        assert_eq!(out["decision"]["verdict"], "allow");
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "cell_size": 8.0, "tie_break": "allow_wins" }"#).unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert!((config.cell_size - 8.0).abs() < f64::EPSILON);
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        let err = load_state(&path).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
