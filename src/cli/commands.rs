use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

use crate::adapters::{PresetAdapter, PresetSelector, StateStore};
use crate::config::{write_creating_parent, ConfigPaths, PickerConfig};
use crate::dates::{format_date, parse_input_text, parse_query_date};
use crate::expression;
use crate::reconciler::QueryRequest;
use crate::selection::{PersistedRange, PresetId, RangeSelection, Timestamp};
use crate::summary::{self, BoundText};
use crate::widget::RangePicker;

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Inclusive lower bound (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,
    /// Inclusive upper bound (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,
    /// Field compared with the lower bound (defaults to the configured one)
    #[arg(long)]
    pub field_from: Option<String>,
    /// Field compared with the upper bound (defaults to the configured one)
    #[arg(long)]
    pub field_to: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    /// Lower bound as the input would display it
    #[arg(long)]
    pub from: Option<String>,
    /// Upper bound as the input would display it
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PresetsArgs {
    /// Resolve presets relative to this day instead of today (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// File with one JSON event per line; reads stdin when omitted
    #[arg()]
    pub input: Option<PathBuf>,
    /// Start from the saved state and save the final state afterwards
    #[arg(long)]
    pub persist: bool,
    /// Enable presets even if the config does not
    #[arg(long)]
    pub presets: bool,
    /// Resolve presets relative to this day instead of today (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<String>,
}

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    /// The user typed into one or both inputs. Omitted inputs are untouched.
    Input {
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        to: Option<String>,
    },
    Preset {
        index: PresetId,
    },
    /// The persisted value changed from outside, e.g. back/forward.
    Navigate {
        state: Value,
    },
    Clear,
    BreadcrumbClear,
    ClearAll,
    QuerySuccess,
}

#[derive(Debug, Serialize)]
struct StepReport {
    step: usize,
    state: PersistedRange,
    active: bool,
    expression: Option<String>,
    breadcrumb: Option<String>,
    queries: Vec<QueryRequest>,
}

pub fn compile(config: &PickerConfig, args: CompileArgs) -> Result<()> {
    let selection = RangeSelection::new(
        parse_bound_arg("--from", args.from.as_deref())?,
        parse_bound_arg("--to", args.to.as_deref())?,
        None,
    );
    let field_from = args.field_from.as_deref().unwrap_or(&config.field_from);
    let field_to = args.field_to.as_deref().unwrap_or(&config.field_to);
    match expression::compile(&selection, field_from, field_to) {
        Some(expression) => println!("{expression}"),
        None => println!("(no filter)"),
    }
    Ok(())
}

pub fn summarize(config: &PickerConfig, args: SummarizeArgs) -> Result<()> {
    let from = parse_bound_arg("--from", args.from.as_deref())?;
    let to = parse_bound_arg("--to", args.to.as_deref())?;
    let selection = RangeSelection::new(from, to, None);
    let summary = summary::summarize(
        &selection,
        BoundText::new(&config.from_label, Ok(args.from.unwrap_or_default())),
        BoundText::new(&config.to_label, Ok(args.to.unwrap_or_default())),
    );
    match summary {
        Some(text) => println!("{}: {text}", config.title),
        None => println!("(no filter)"),
    }
    Ok(())
}

pub fn list_presets(config: &PickerConfig, args: PresetsArgs) -> Result<()> {
    let selector = preset_selector(config, args.today.as_deref())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "presets relative to {}", format_date(selector.today()))?;
    for (index, entry) in selector.catalog().iter() {
        let range = selector
            .resolve_range(index)
            .map(|(from, to)| format!("{} .. {}", format_date(from.date()), format_date(to.date())))
            .unwrap_or_else(|| "(unresolvable)".to_string());
        writeln!(out, "{index:>2}  {:<12} {:<11} {range}", entry.caption(), entry.kind.to_string())?;
    }
    Ok(())
}

pub fn replay(config: Arc<PickerConfig>, paths: &ConfigPaths, args: ReplayArgs) -> Result<()> {
    let config = if args.presets && !config.enable_presets {
        Arc::new(PickerConfig {
            enable_presets: true,
            ..(*config).clone()
        })
    } else {
        config
    };

    let store = StateStore::new();
    if args.persist && paths.state_file.exists() {
        let raw = fs::read_to_string(&paths.state_file)
            .with_context(|| format!("reading saved state {}", paths.state_file.display()))?;
        let snapshot: Value = serde_json::from_str(&raw).context("parsing saved state")?;
        store.restore(&snapshot);
    }

    let presets = preset_selector(&config, args.today.as_deref())?;
    let mut picker = RangePicker::with_presets(config, store.clone(), presets);

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            fs::File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let stdout = io::stdout();
    let steps = run_replay(&mut picker, &store, reader, stdout.lock())?;
    tracing::info!(steps, "replay finished");

    if args.persist {
        let snapshot = serde_json::to_string_pretty(&store.snapshot()).context("serializing state")?;
        write_creating_parent(&paths.state_file, &snapshot).context("saving replay state")?;
    }
    Ok(())
}

/// Applies each event, pumps the picker and writes one JSON report per event.
pub fn run_replay<R: BufRead, W: Write>(
    picker: &mut RangePicker,
    store: &StateStore,
    reader: R,
    mut out: W,
) -> Result<usize> {
    let attribute = picker.reconciler().config().state_attribute();
    let mut step = 0;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("reading replay input")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parsing event on line {}", line_no + 1))?;
        tracing::debug!(?event, "replaying");

        match event {
            ReplayEvent::Input { from, to } => {
                if let Some(text) = from {
                    picker.from_input().type_text(&text);
                }
                if let Some(text) = to {
                    picker.to_input().type_text(&text);
                }
            }
            ReplayEvent::Preset { index } => picker.presets().click(index),
            ReplayEvent::Navigate { state } => {
                store.set(&attribute, state);
            }
            ReplayEvent::Clear => {
                picker.clear();
            }
            ReplayEvent::BreadcrumbClear => {
                picker.breadcrumb_clear();
            }
            ReplayEvent::ClearAll => store.reset_all(),
            ReplayEvent::QuerySuccess => picker.query_succeeded(),
        }
        picker.pump();

        step += 1;
        let report = StepReport {
            step,
            state: picker.selection().to_persisted(),
            active: picker.is_active(),
            expression: picker.reconciler().expression(),
            breadcrumb: picker.breadcrumb().map(|crumb| crumb.to_string()),
            queries: picker.take_requests(),
        };
        let json = serde_json::to_string(&report).context("serializing step report")?;
        writeln!(out, "{json}")?;
    }
    Ok(step)
}

fn parse_bound_arg(flag: &str, value: Option<&str>) -> Result<Option<Timestamp>> {
    let Some(text) = value.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };
    match parse_input_text(text) {
        Some(timestamp) => Ok(Some(timestamp)),
        None => bail!("{flag} expects a date like 2024-01-31, got `{text}`"),
    }
}

fn parse_day_arg(value: &str) -> Result<Date> {
    match parse_query_date(value) {
        Some(date) => Ok(date),
        None => bail!("--today expects a date like 2024-01-31, got `{value}`"),
    }
}

fn preset_selector(config: &PickerConfig, today: Option<&str>) -> Result<PresetSelector> {
    let selector = PresetSelector::new(config.catalog(), config.week_start());
    Ok(match today {
        Some(day) => selector.with_today(parse_day_arg(day)?),
        None => selector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn replay_picker(store: &StateStore) -> RangePicker {
        let mut config = PickerConfig {
            id: "created".into(),
            field_from: "@created".into(),
            field_to: "@created".into(),
            enable_presets: true,
            ..PickerConfig::default()
        };
        config.post_load();
        let presets = preset_selector(&config, Some("2024-02-14")).expect("selector");
        RangePicker::with_presets(Arc::new(config), store.clone(), presets)
    }

    fn replay_lines(script: &str) -> Vec<Value> {
        let store = StateStore::new();
        let mut picker = replay_picker(&store);
        let mut out = Vec::new();
        run_replay(&mut picker, &store, script.as_bytes(), &mut out).expect("replay");
        String::from_utf8(out)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("report json"))
            .collect()
    }

    #[test]
    fn events_parse_from_tagged_json() {
        let event: ReplayEvent =
            serde_json::from_str(r#"{"event":"input","from":"2024-01-01"}"#).expect("event");
        assert_eq!(
            event,
            ReplayEvent::Input {
                from: Some("2024-01-01".into()),
                to: None
            }
        );
        let event: ReplayEvent = serde_json::from_str(r#"{"event":"breadcrumb_clear"}"#).expect("event");
        assert_matches!(event, ReplayEvent::BreadcrumbClear);
        assert!(serde_json::from_str::<ReplayEvent>(r#"{"event":"teleport"}"#).is_err());
    }

    #[test]
    fn replay_reports_queries_per_step() {
        let reports = replay_lines(
            r#"
# typed range, then a preset, then back to the typed range
{"event":"input","from":"2024-01-01","to":"2024-01-31"}
{"event":"preset","index":0}
{"event":"navigate","state":{"from":1704067200000,"to":1706659200000,"radio":-1}}
{"event":"clear"}
"#,
        );
        assert_eq!(reports.len(), 4);

        let queries = reports[0]["queries"].as_array().expect("queries");
        // Both inputs were edited before the pump: the second edit changes nothing.
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0]["cause"], "facetRangeInputChange");
        assert_eq!(
            reports[0]["expression"],
            "@created >= 2024-01-01 AND @created <= 2024-01-31"
        );

        assert_eq!(reports[1]["state"]["radio"], 0);
        assert_eq!(reports[1]["breadcrumb"], "Date: from 2024-02-14 - to 2024-02-14");
        assert_eq!(reports[1]["queries"][0]["cause"], "facetRangeRadioSelect");

        assert_eq!(reports[2]["queries"].as_array().map(Vec::len), Some(0));
        assert_eq!(reports[2]["state"]["radio"], -1);

        assert_eq!(reports[3]["active"], false);
        assert_eq!(reports[3]["queries"][0]["cause"], "facetRangeClear");
        assert_eq!(reports[3]["queries"][0]["expression"], Value::Null);
    }

    #[test]
    fn malformed_lines_name_their_position() {
        let store = StateStore::new();
        let mut picker = replay_picker(&store);
        let err = run_replay(&mut picker, &store, "\n{nope}\n".as_bytes(), Vec::new())
            .expect_err("bad line");
        assert!(err.to_string().contains("line 2"), "got {err}");
    }

    #[test]
    fn bound_arguments_must_be_dates() {
        assert_eq!(parse_bound_arg("--from", Some("  ")).expect("blank"), None);
        assert!(parse_bound_arg("--from", Some("2024-13-01")).is_err());
        assert_eq!(
            parse_bound_arg("--to", Some("1970-01-02"))
                .expect("date")
                .map(Timestamp::millis),
            Some(86_400_000)
        );
    }
}
