use super::{json_pretty, selector, Project};
use corral_core::{exit, CoreError};

pub fn run(
    project: &Project,
    scenario_name: Option<String>,
    all: bool,
    json: bool,
) -> Result<u8, CoreError> {
    let names = project
        .orchestrator()
        .reset(&selector(scenario_name, all))?;
    if json {
        println!("{}", json_pretty(&names)?);
    } else {
        for name in &names {
            println!("reset state of '{name}'");
        }
    }
    Ok(exit::SUCCESS)
}
