use super::{colorize_state, json_pretty, Project};
use corral_core::{exit, CoreError};

pub fn run(project: &Project, json: bool) -> Result<u8, CoreError> {
    let statuses = project.orchestrator().status()?;
    if json {
        println!("{}", json_pretty(&statuses)?);
    } else if statuses.is_empty() {
        println!(
            "no scenarios found under {}",
            project.scenarios_dir().display()
        );
    } else {
        println!(
            "{:<24} {:<12} {:<10} {:>5}  STATE_DIR",
            "NAME", "DRIVER", "STATE", "STEPS"
        );
        for status in &statuses {
            let state = if status.converged {
                "converged"
            } else if status.created {
                "created"
            } else {
                "absent"
            };
            println!(
                "{:<24} {:<12} {} {:>5}  {}",
                status.name,
                status.driver,
                colorize_state(&format!("{state:<10}")),
                status.sequence.len(),
                status.state_location
            );
        }
    }
    Ok(exit::SUCCESS)
}
