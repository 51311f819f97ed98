use racelog_procedure::{FlagPole, FlagPoleState};
use serde_json::json;

use crate::cli::RaceArgs;
use crate::support::{load_race_or_exit, parse_now_or_exit, print_json_or_exit};

fn describe(poles: &[FlagPole]) -> String {
    if poles.is_empty() {
        return "(none)".to_string();
    }
    poles
        .iter()
        .map(|pole| {
            let state = if pole.displayed { "up" } else { "down" };
            match pole.lower {
                racelog_core::Flag::None => format!("{} {state}", pole.upper),
                lower => format!("{}/{lower} {state}", pole.upper),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run(args: RaceArgs, json_output: bool) {
    let now = parse_now_or_exit(args.now.as_deref());
    let state = load_race_or_exit(&args, now);
    let race = state.log().race_id().clone();
    let procedure = state.procedure().procedure_type();
    let flags: Option<FlagPoleState> = state.active_flags(now);

    if json_output {
        let payload = json!({
            "race": race,
            "evaluatedAt": now,
            "procedure": procedure,
            "flags": flags,
        });
        print_json_or_exit(&payload);
        return;
    }

    println!("racelog flags");
    println!("  Race: {race}");
    println!("  Procedure: {procedure}");
    println!("  Evaluated at: {}", now.to_rfc3339());
    let Some(flags) = flags else {
        println!("  No start time; nothing displayed");
        return;
    };
    let since = flags
        .current_since
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    println!("  Current: {} (since {since})", describe(&flags.current));
    match flags.next_change_at {
        Some(at) => println!("  Next: {} at {}", describe(&flags.next), at.to_rfc3339()),
        None if !flags.next.is_empty() => {
            println!("  Next: {} (no scheduled time)", describe(&flags.next))
        }
        None => println!("  Next: -"),
    }
}
