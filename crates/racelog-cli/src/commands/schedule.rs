use serde_json::json;

use crate::cli::RaceArgs;
use crate::support::{load_race_or_exit, parse_now_or_exit, print_json_or_exit};

pub fn run(args: RaceArgs, json_output: bool) {
    let now = parse_now_or_exit(args.now.as_deref());
    let state = load_race_or_exit(&args, now);
    let race = state.log().race_id().clone();
    let pending = state.scheduler().pending();

    if json_output {
        let events: Vec<_> = pending
            .iter()
            .map(|event| {
                json!({
                    "name": event.name,
                    "at": event.at,
                    "due": event.at <= now,
                })
            })
            .collect();
        let payload = json!({
            "race": race,
            "evaluatedAt": now,
            "procedure": state.procedure().procedure_type(),
            "pending": events,
        });
        print_json_or_exit(&payload);
        return;
    }

    println!("racelog schedule");
    println!("  Race: {race}");
    println!("  Procedure: {}", state.procedure().procedure_type());
    if pending.is_empty() {
        println!("  Nothing pending");
        return;
    }
    for event in &pending {
        let marker = if event.at <= now { " (due)" } else { "" };
        println!("  {} {}{marker}", event.at.to_rfc3339(), event.name);
    }
}
