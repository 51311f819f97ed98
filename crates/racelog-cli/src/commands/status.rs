use racelog_core::ResolutionFailed;
use serde_json::json;

use crate::cli::RaceArgs;
use crate::support::{load_race_or_exit, parse_now_or_exit, print_json_or_exit};

pub fn run(args: RaceArgs, json_output: bool) {
    let now = parse_now_or_exit(args.now.as_deref());
    let state = load_race_or_exit(&args, now);
    let race = state.log().race_id().clone();
    let start = state.start_time_result();
    let procedure = state.procedure().procedure_type();

    if json_output {
        let payload = json!({
            "race": race,
            "evaluatedAt": now,
            "pass": state.current_pass(),
            "status": state.status(),
            "procedure": procedure,
            "start": start,
            "finishingTime": state.finishing_time(),
            "finishedTime": state.finished_time(),
        });
        print_json_or_exit(&payload);
        return;
    }

    let start_line = match (start.start_time(), start.failure()) {
        (Some(at), _) => at.to_rfc3339(),
        (None, Some(ResolutionFailed::CyclicDependency { chain })) => {
            let chain: Vec<&str> = chain.iter().map(|race| race.as_str()).collect();
            format!("unresolved (cyclic: {})", chain.join(" -> "))
        }
        (None, _) => "not set".to_string(),
    };
    println!("racelog status");
    println!("  Race: {race}");
    println!("  Evaluated at: {}", now.to_rfc3339());
    println!("  Pass: {}", state.current_pass());
    println!("  Procedure: {procedure}");
    println!("  Start: {start_line}");
    if start.is_dependent() {
        let chain: Vec<&str> = start.depends_on().iter().map(|race| race.as_str()).collect();
        println!("  Depends on: {}", chain.join(" -> "));
    }
    println!("  Status: {}", state.status());
    if let Some(at) = state.finishing_time() {
        println!("  Finishing: {}", at.to_rfc3339());
    }
    if let Some(at) = state.finished_time() {
        println!("  Finished: {}", at.to_rfc3339());
    }
}
