use greenlight_core::OrchestratorConfig;

pub fn run(config: &OrchestratorConfig, team: &str) -> anyhow::Result<()> {
    let problems = config.validate_team(team);
    if problems.is_empty() {
        println!("✓ Team '{team}' configuration is complete");
        return Ok(());
    }
    eprintln!("Configuration problems for '{team}':");
    for problem in &problems {
        eprintln!("  - {problem}");
    }
    anyhow::bail!("configuration invalid ({} problem(s))", problems.len())
}
