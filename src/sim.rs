use log::{debug, info, warn};

use seat_apportionment::projection::*;
use seat_apportionment::store::*;
use snafu::{prelude::*, ErrorCompat, Snafu};

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::{diff, Difference};

use crate::args::{Args, Command};
use crate::sim::config_reader::*;
use crate::sim::io_state::*;

pub mod config_reader;
pub mod io_state;

#[derive(Debug, Snafu)]
pub enum SimError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing the state file {path}"))]
    WritingState {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing the output"))]
    SerializingJson { source: serde_json::Error },

    #[snafu(display("Vote counts may not be negative: {field} is {votes}"))]
    NegativeVotes { field: String, votes: i64 },

    #[snafu(display("{source}"))]
    Store { source: StoreError },
    #[snafu(display("{source}"))]
    Projection { source: ProjectionError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SimResult<T> = Result<T, SimError>;

fn to_js<T: Serialize>(x: &T) -> SimResult<JSValue> {
    serde_json::to_value(x).context(SerializingJsonSnafu {})
}

// One line per party and per seated candidate, for diffing.
fn seat_table(p: &ScenarioProjection) -> String {
    let mut lines: Vec<String> = vec![format!(
        "electoralQuotient: {}",
        p.result.electoral_quotient
    )];
    for ps in p.result.parties.iter() {
        lines.push(format!(
            "{}: {} seats ({} votes)",
            ps.name, ps.seats_won, ps.total_votes
        ));
    }
    for c in p.elected.iter() {
        lines.push(format!("elected {}: {} ({} votes)", c.party, c.name, c.votes));
    }
    lines.join("\n")
}

/// A line diff of two seat tables: unchanged lines start with a space,
/// removed lines with `-` and added lines with `+`.
fn seat_diff(orig: &str, edit: &str) -> String {
    let (_, changes) = diff(orig, edit, "\n");
    let mut out = String::new();
    for change in changes.iter() {
        let (prefix, text) = match change {
            Difference::Same(x) => (' ', x),
            Difference::Rem(x) => ('-', x),
            Difference::Add(x) => ('+', x),
        };
        for line in text.split('\n') {
            out.push(prefix);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Runs one command against the state file.
///
/// Returns the JSON output of the command. The state file is only written
/// when the command changes the store.
pub fn run_command(args: &Args) -> SimResult<String> {
    let sim_config = match &args.config {
        Some(path) => read_config(path)?,
        None => SimConfig::default(),
    };
    let mut config = validate_rules(&sim_config)?;
    if let Some(seats) = args.seats {
        config.seats_available = seats;
    }
    info!("run_command: config: {:?}", config);

    let store = Arc::new(load_store(&args.state)?);
    let service = ProjectionService::new(store.clone(), config);
    let owner = args.owner.as_str();

    let (output, modified): (JSValue, bool) = match &args.command {
        Command::Init { roster, quotient } => {
            let parties = read_roster(roster)?;
            let q = match quotient {
                Some(q) => {
                    store.set_default_quotient(owner, *q).context(StoreSnafu {})?;
                    *q
                }
                None => service.effective_default_quotient(owner),
            };
            let id = store.create_base(owner, parties, q).context(StoreSnafu {})?;
            (json!({ "scenarioId": id, "electoralQuotient": q }), true)
        }
        Command::CloneScenario {
            name,
            description,
            from,
        } => {
            let id = store
                .clone_scenario(owner, name, description.as_deref(), from)
                .context(StoreSnafu {})?;
            (json!({ "scenarioId": id }), true)
        }
        Command::Update {
            scenario,
            roster,
            quotient,
        } => {
            let parties = read_roster(roster)?;
            let q = match quotient {
                Some(q) => *q,
                None => {
                    store
                        .get(owner, scenario)
                        .context(StoreSnafu {})?
                        .scenario
                        .electoral_quotient
                }
            };
            store
                .update(owner, scenario, parties, q)
                .context(StoreSnafu {})?;
            (json!({ "scenarioId": scenario, "electoralQuotient": q }), true)
        }
        Command::Delete { scenario } => {
            store.delete(owner, scenario).context(StoreSnafu {})?;
            (json!({ "deleted": scenario }), true)
        }
        Command::Activate { scenario, off } => {
            store
                .set_active(owner, scenario, !*off)
                .context(StoreSnafu {})?;
            (json!({ "scenarioId": scenario, "active": !*off }), true)
        }
        Command::List => {
            let (scenarios, active) = store.list_with_active(owner);
            let active_id = active.map(|rec| rec.scenario.id);
            (
                json!({ "scenarios": to_js(&scenarios)?, "active": active_id }),
                false,
            )
        }
        Command::Seats { party, scenario } => {
            let res = service
                .seats_for(owner, &ScenarioRef::parse(scenario), party)
                .context(ProjectionSnafu {})?;
            (to_js(&res)?, false)
        }
        Command::Project { scenario } => {
            let res = service
                .project(owner, &ScenarioRef::parse(scenario))
                .context(ProjectionSnafu {})?;
            (to_js(&res)?, false)
        }
        Command::Margin { party, scenario } => {
            let res = service
                .margin_for(owner, &ScenarioRef::parse(scenario), party)
                .context(ProjectionSnafu {})?;
            (to_js(&res)?, false)
        }
        Command::Rank {
            votes,
            exclude,
            scenario,
        } => {
            let res = service
                .candidate_rank(
                    owner,
                    &ScenarioRef::parse(scenario),
                    *votes,
                    exclude.as_deref(),
                )
                .context(ProjectionSnafu {})?;
            (to_js(&res)?, false)
        }
        Command::Compare { left, right } => {
            let res = service
                .compare(owner, &ScenarioRef::parse(left), &ScenarioRef::parse(right))
                .context(ProjectionSnafu {})?;
            if let Projection::Ready(cmp) = &res {
                let left_table = seat_table(&cmp.left);
                let right_table = seat_table(&cmp.right);
                if left_table != right_table {
                    warn!(
                        "Found differences between {:?} and {:?}",
                        cmp.left.scenario.id, cmp.right.scenario.id
                    );
                    // stdout only carries the JSON output.
                    eprint!("{}", seat_diff(left_table.as_str(), right_table.as_str()));
                }
            }
            let deltas = match res {
                Projection::Ready(cmp) => to_js(&cmp.deltas)?,
                Projection::NotConfigured { message } => {
                    json!({ "state": "notConfigured", "message": message })
                }
            };
            (deltas, false)
        }
    };

    if modified {
        save_store(&args.state, &store)?;
    }
    debug!("run_command: output: {:?}", output);
    serde_json::to_string_pretty(&output).context(SerializingJsonSnafu {})
}

pub fn report_error(e: &SimError) {
    warn!("Error occured {:?}", e);
    eprintln!("An error occured: {}", e);
    if let Some(bt) = ErrorCompat::backtrace(e) {
        eprintln!("trace: {}", bt);
    }
}
