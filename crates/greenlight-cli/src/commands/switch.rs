use greenlight_core::{Environment, OrchestratorConfig, SwitchOutcome, SwitchRequest, TeamName};
use greenlight_switch::AbortHandle;

use super::{build_orchestrator, epoch_secs, open_store};

pub async fn run(
    config: &OrchestratorConfig,
    team: &str,
    environment: &str,
    reason: &str,
) -> anyhow::Result<()> {
    let team = TeamName::new(team)?;
    let target: Environment = environment.parse()?;

    let store = open_store(config)?;
    let orchestrator = build_orchestrator(config, store);
    let request = SwitchRequest::user(team.clone(), target, reason);

    let outcome = orchestrator
        .switch(&request, &AbortHandle::new(), epoch_secs())
        .await?;

    match outcome {
        SwitchOutcome::Success { state } => {
            println!(
                "✓ {} switched to {} (switch #{})",
                team, state.active_environment, state.switch_count
            );
            Ok(())
        }
        SwitchOutcome::Blocked { reasons } => {
            eprintln!("Switch blocked:");
            for reason in &reasons {
                eprintln!("  - {reason}");
            }
            anyhow::bail!("switch blocked ({} reason(s))", reasons.len())
        }
        SwitchOutcome::Failed { step, cause } => {
            anyhow::bail!("switch failed at step '{step}': {cause}")
        }
        SwitchOutcome::Conflict => {
            anyhow::bail!("team state changed concurrently; re-run to retry")
        }
    }
}
