use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use gapfold::config::Config;
use gapfold::gap::{
    reveal_annotation_targets, AnnotationTarget, DiffSet, Direction, ExpansionEngine, Gap,
    GapPosition, Row,
};
use gapfold::github::{ContentSource, GitContentSource, GithubContentSource};
use gapfold::loader;

#[derive(Parser, Debug)]
#[command(name = "gapfold")]
#[command(about = "Diff gap expansion and position tracking for PR review")]
#[command(version)]
struct Args {
    /// Repository name (e.g., "owner/repo"); requires --pr
    #[arg(short, long, requires = "pr")]
    repo: Option<String>,

    /// Pull request number
    #[arg(short, long, requires = "repo")]
    pr: Option<u32>,

    /// Parse a unified diff from a file instead of a PR
    #[arg(long, conflicts_with = "pr")]
    diff_file: Option<PathBuf>,

    /// Git revision holding the original (old-side) content
    #[arg(long, default_value = "HEAD")]
    git_rev: String,

    /// JSON file with annotation targets to auto-reveal
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Expand the gap containing this old-side line by one step
    #[arg(long, value_name = "FILE:LINE")]
    expand: Option<String>,

    /// Direction for --expand: "down" (from the top of the gap) or "up"
    #[arg(long, default_value = "down")]
    direction: String,

    /// Emit the row stream as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct DumpReport {
    generated_at: String,
    files: Vec<FileDump>,
}

#[derive(Serialize)]
struct FileDump {
    filename: String,
    dropped_hunks: usize,
    rows: Vec<RowDump>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RowDump {
    HunkHeader {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<u32>,
    },
    Line {
        #[serde(skip_serializing_if = "Option::is_none")]
        old: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        new: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<u32>,
        content: String,
    },
    Gap {
        old_start: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        old_end: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        hidden: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load()?;

    let (mut set, source): (DiffSet, Arc<dyn ContentSource>) = match (&args.repo, args.pr) {
        (Some(repo), Some(pr_number)) => {
            eprintln!("[gapfold] Fetching PR #{} from {}...", pr_number, repo);
            let (pr, set) = loader::load_pr(repo, pr_number).await?;
            eprintln!(
                "[gapfold] {} files changed, base {}",
                set.len(),
                pr.base.sha
            );
            let source = GithubContentSource::new(repo.clone(), pr.base.sha);
            (set, Arc::new(source))
        }
        _ => {
            let set = match &args.diff_file {
                Some(path) => loader::load_diff_file(path).await?,
                None => loader::load_local_diff(&args.git_rev, None).await?,
            };
            eprintln!("[gapfold] {} files in diff", set.len());
            (set, Arc::new(GitContentSource::new(args.git_rev.clone())))
        }
    };

    eprintln!("[gapfold] Validating trailing gaps...");
    loader::validate_trailing_gaps(&mut set, Arc::clone(&source)).await;

    if let Some(path) = &args.annotations {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read annotations file {}", path.display()))?;
        let targets: Vec<AnnotationTarget> =
            serde_json::from_str(&raw).context("failed to parse annotations JSON")?;
        eprintln!("[gapfold] Resolving {} annotation targets...", targets.len());

        let engine = ExpansionEngine::with_limits(&*source, config.expansion.limits());
        let resolved = reveal_annotation_targets(
            &mut set,
            &engine,
            &targets,
            config.expansion.context_radius,
        )
        .await;
        for group in &resolved {
            eprintln!(
                "[gapfold]   {}:{}-{} -> {:?}",
                group.file, group.line_start, group.line_end, group.outcome
            );
        }
    }

    if let Some(spec) = &args.expand {
        let (file_name, line) = spec
            .rsplit_once(':')
            .context("--expand takes FILE:LINE")?;
        let line: u32 = line.parse().context("--expand line must be a number")?;
        let direction = match args.direction.as_str() {
            "up" => Direction::Up,
            "down" => Direction::Down,
            other => anyhow::bail!("unknown --direction {:?} (use \"up\" or \"down\")", other),
        };
        let file = set
            .get_mut(file_name)
            .with_context(|| format!("no file {} in diff", file_name))?;
        let gap_id = file
            .find_gap_for_old_range(line, line)
            .with_context(|| format!("no gap contains {}:{}", file_name, line))?;

        let engine = ExpansionEngine::with_limits(&*source, config.expansion.limits());
        let outcome = engine
            .expand_directional(file, gap_id, direction, config.expansion.directional_step)
            .await?;
        eprintln!("[gapfold] Expand {}:{} -> {:?}", file_name, line, outcome);
    }

    if args.json {
        let report = DumpReport {
            generated_at: Utc::now().to_rfc3339(),
            files: set.files().map(dump_file).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for file in set.files() {
            print_file(file);
        }
    }
    Ok(())
}

fn dump_file(file: &gapfold::gap::FileDiff) -> FileDump {
    let rows = file
        .rows()
        .iter()
        .map(|row| match row {
            Row::HunkHeader { text, position } => RowDump::HunkHeader {
                text: text.clone(),
                position: *position,
            },
            Row::Line(line) => RowDump::Line {
                old: line.old_number,
                new: line.new_number,
                position: line.diff_position,
                content: line.content.clone(),
            },
            Row::Gap(id) => {
                let gap = file.gap(*id);
                RowDump::Gap {
                    old_start: gap.map(|g| g.old_start).unwrap_or(0),
                    old_end: gap.and_then(Gap::known_end),
                    hidden: gap.and_then(Gap::hidden_lines),
                }
            }
        })
        .collect();
    FileDump {
        filename: file.filename().to_string(),
        dropped_hunks: file.dropped_hunks(),
        rows,
    }
}

fn print_file(file: &gapfold::gap::FileDiff) {
    println!("=== {}", file.filename());
    for row in file.rows() {
        match row {
            Row::HunkHeader { text, position } => match position {
                Some(p) => println!("      [{:>4}] {}", p, text),
                None => println!("             {}", text),
            },
            Row::Line(line) => {
                let old = line
                    .old_number
                    .map_or_else(|| "    ".to_string(), |n| format!("{:>4}", n));
                let new = line
                    .new_number
                    .map_or_else(|| "    ".to_string(), |n| format!("{:>4}", n));
                println!("{} {}  {}", old, new, line.content);
            }
            Row::Gap(id) => {
                if let Some(gap) = file.gap(*id) {
                    let (end, hidden) = match (gap.known_end(), gap.hidden_lines()) {
                        (Some(end), Some(hidden)) => {
                            (end.to_string(), format!("{} lines hidden", hidden))
                        }
                        _ => ("?".to_string(), "unvalidated".to_string()),
                    };
                    let place = match gap.position {
                        GapPosition::Above => "above",
                        GapPosition::Between => "between",
                        GapPosition::Below => "below",
                    };
                    println!("  ~~~ {} old {}-{} ({})", place, gap.old_start, end, hidden);
                }
            }
        }
    }
}
