use crate::driver::DriverRegistry;
use crate::executor::{StepExecutor, StepResult};
use crate::RuntimeError;
use corral_schema::{ScenarioDescriptor, Step};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};

/// A fully resolved process launch for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    program: String,
    args: Vec<String>,
}

/// Executes steps by spawning the scenario's configured commands.
///
/// Provisioner steps run `<provisioner.command> <playbook> [--limit <platform>] [extra args]`
/// in the scenario directory. `syntax` adds `--syntax-check` to the converge
/// playbook, `idempotence` re-runs converge and fails if any task reports a
/// change. `verify` prefers the `[verifier]` command, and `dependency` runs the
/// `[dependency]` command. Steps with nothing configured are skipped.
pub struct CommandExecutor {
    drivers: Arc<DriverRegistry>,
}

impl CommandExecutor {
    pub fn new(drivers: Arc<DriverRegistry>) -> Self {
        Self { drivers }
    }

    fn plan(
        scenario: &ScenarioDescriptor,
        step: Step,
        extra_args: &[String],
    ) -> Result<Option<Invocation>, RuntimeError> {
        match step {
            Step::Dependency => scenario
                .dependency
                .as_ref()
                .map(|dep| split_command(&dep.command))
                .transpose(),
            Step::Verify if scenario.verifier.is_some() => scenario
                .verifier
                .as_ref()
                .map(|verifier| split_command(&verifier.command))
                .transpose(),
            _ => {
                let Some(playbook) = scenario.provisioner.playbooks.for_step(step) else {
                    return Ok(None);
                };
                let resolved = scenario.directory.join(playbook);
                if !resolved.is_file() {
                    return Err(RuntimeError::PlaybookNotFound(
                        resolved.display().to_string(),
                    ));
                }

                let mut invocation = split_command(&scenario.provisioner.command)?;
                invocation.args.push(resolved.to_string_lossy().into_owned());
                if step == Step::Syntax {
                    invocation.args.push("--syntax-check".to_owned());
                }
                if let Some(ref platform) = scenario.platform_filter {
                    invocation.args.push("--limit".to_owned());
                    invocation.args.push(platform.to_string());
                }
                invocation.args.extend(extra_args.iter().cloned());
                Ok(Some(invocation))
            }
        }
    }

    fn environment(
        &self,
        scenario: &ScenarioDescriptor,
    ) -> Result<Vec<(String, String)>, RuntimeError> {
        let driver = self.drivers.select(&scenario.driver_name)?;
        let mut env = vec![
            ("CORRAL_SCENARIO_NAME".to_owned(), scenario.name.to_string()),
            ("CORRAL_DRIVER_NAME".to_owned(), driver.name().to_owned()),
            (
                "CORRAL_STATE_DIRECTORY".to_owned(),
                scenario.state_location.to_string(),
            ),
        ];
        if let Some(ref platform) = scenario.platform_filter {
            env.push(("CORRAL_PLATFORM_NAME".to_owned(), platform.to_string()));
        }
        env.extend(driver.environment(scenario));
        Ok(env)
    }

    fn invoke(
        &self,
        scenario: &ScenarioDescriptor,
        step: Step,
        invocation: &Invocation,
    ) -> Result<StepResult, RuntimeError> {
        let env = self.environment(scenario)?;
        std::fs::create_dir_all(scenario.state_location.as_path())?;
        info!(
            "{}: {step}: {} {}",
            scenario.name,
            invocation.program,
            invocation.args.join(" ")
        );

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(working_dir(&scenario.directory))
            .envs(env)
            .output()
            .map_err(|e| {
                RuntimeError::ExecFailed(format!("failed to launch '{}': {e}", invocation.program))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut diagnostics = format!("{stdout}{stderr}");

        if !output.status.success() {
            let status = output
                .status
                .code()
                .map_or_else(|| "killed by signal".to_owned(), |c| format!("exit code {c}"));
            debug!("{}: {step} failed ({status})", scenario.name);
            diagnostics.push_str(&format!("\n{} {status}", invocation.program));
            return Ok(StepResult::failed(step, diagnostics));
        }

        if step == Step::Idempotence {
            let changed = count_changed_tasks(&stdout);
            if changed > 0 {
                diagnostics.push_str(&format!(
                    "\nidempotence check failed: {changed} task(s) reported changes on the second converge"
                ));
                return Ok(StepResult::failed(step, diagnostics));
            }
        }
        Ok(StepResult::succeeded(step, diagnostics))
    }
}

impl StepExecutor for CommandExecutor {
    fn run(&self, scenario: &ScenarioDescriptor, step: Step, extra_args: &[String]) -> StepResult {
        let planned = Self::plan(scenario, step, extra_args)
            .and_then(|plan| plan.map(|inv| self.invoke(scenario, step, &inv)).transpose());
        match planned {
            Ok(Some(result)) => result,
            Ok(None) => {
                debug!("{}: {step}: nothing configured, skipping", scenario.name);
                StepResult::skipped(step, format!("no {step} action configured"))
            }
            Err(e) => StepResult::failed(step, e.to_string()),
        }
    }
}

fn split_command(command: &[String]) -> Result<Invocation, RuntimeError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| RuntimeError::ExecFailed("empty command".to_owned()))?;
    Ok(Invocation {
        program: program.clone(),
        args: args.to_vec(),
    })
}

fn working_dir(dir: &Path) -> &Path {
    if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    }
}

/// Sum of the `changed=N` counters in a play recap.
fn count_changed_tasks(output: &str) -> u64 {
    output
        .split_whitespace()
        .filter_map(|token| token.strip_prefix("changed="))
        .filter_map(|n| n.parse::<u64>().ok())
        .sum()
}
